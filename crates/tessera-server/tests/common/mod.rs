//! Common test utilities for integration tests.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use tempfile::TempDir;
use tessera_auth::{AuthorizationEngine, StaticIdentityProvider, UserInfo};
use tessera_pipeline::{
    DirectoryDefinitionResolver, ExecutorSettings, JobStatusSource, LocalTaskQueue,
    OrchestratorContext, TaskExecutor,
};
use tessera_server::{ACCESS_TOKEN_HEADER, AppState, Server, ServerConfig, USERNAME_HEADER};
use tessera_store::{InMemoryWorkflowStore, RunLogDir};
use tessera_types::{JobDetail, JobListItem};
use tower::ServiceExt;

/// Definition that requires the `urn:example:genomics` entitlement.
pub const RESTRICTED_DEF: &str = "0f7c8a52-93b4-4d1e-a6f0-2b3c4d5e6f70";

/// Reports every job as running.
struct RunningJobs;

#[async_trait]
impl JobStatusSource for RunningJobs {
    async fn get_detail(&self, job_id: &str, _token: &str) -> Option<JobDetail> {
        Some(JobDetail {
            id: job_id.to_string(),
            created_at: Utc::now(),
            state: "RUNNING".to_string(),
            logs: String::new(),
        })
    }

    async fn get_list_item(&self, job_id: &str, _token: &str) -> Option<JobListItem> {
        Some(JobListItem {
            id: job_id.to_string(),
            created_at: Utc::now(),
            state: "RUNNING".to_string(),
        })
    }
}

/// Unsigned JWT carrying `sub` and `exp`.
pub fn jwt(sub: &str, exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"{sub}","exp":{exp}}}"#));
    format!("{header}.{payload}.c2ln")
}

fn far_future() -> i64 {
    Utc::now().timestamp() + 3600
}

/// Router plus handles on its collaborators.
#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub provider: Arc<StaticIdentityProvider>,
    pub repo: Arc<InMemoryWorkflowStore>,
    /// Token of `alice`, who holds the genomics entitlement.
    pub alice: String,
    /// Token of `bob`, who holds no entitlements.
    pub bob: String,
    dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        write_definition(&dir.path().join("definitions/restricted"));

        let provider = Arc::new(StaticIdentityProvider::new());
        let alice = jwt("alice@example.org", far_future());
        let bob = jwt("bob@example.org", far_future());
        provider.insert(
            alice.clone(),
            true,
            UserInfo {
                sub: "alice@example.org".to_string(),
                eduperson_entitlement: vec!["urn:example:genomics".to_string()],
                ..Default::default()
            },
        );
        provider.insert(
            bob.clone(),
            true,
            UserInfo {
                sub: "bob@example.org".to_string(),
                ..Default::default()
            },
        );

        let repo = Arc::new(InMemoryWorkflowStore::new());
        let settings = ExecutorSettings {
            binary: dir.path().join("no-such-pipeline"),
            software_deployment: "conda".to_string(),
            executor: "auth-tes".to_string(),
            container_image: String::new(),
            jobs: 1,
            default_storage_prefix: String::new(),
            s3_endpoint_url: String::new(),
            s3_access_key: String::new(),
            s3_secret_key: String::new(),
            oidc_url: String::new(),
            oidc_client_id: String::new(),
            oidc_client_secret: String::new(),
            oidc_audience: String::new(),
            extra_args: Vec::new(),
            workflow_dir: dir.path().join("runs"),
            poll_interval: Duration::from_millis(20),
        };
        let logs = RunLogDir::new(&dir.path().join("logs"));
        let executor = TaskExecutor::new(settings, repo.clone(), logs);
        let workflows = OrchestratorContext::new(
            repo.clone(),
            Arc::new(DirectoryDefinitionResolver::new(&dir.path().join("definitions"))),
            Arc::new(LocalTaskQueue::new(1)),
            Arc::new(executor),
            Arc::new(RunningJobs),
            "https://tes.example.org",
        );

        let engine = AuthorizationEngine::new(provider.clone(), 10);
        let config = ServerConfig::default().with_request_logging(false);
        let router = Server::from_state(AppState::new(engine, workflows, config)).router();

        Self {
            router,
            provider,
            repo,
            alice,
            bob,
            dir,
        }
    }

    /// Send a request as `user` with `token`; `None` omits the header.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        user: Option<&str>,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(USERNAME_HEADER, user);
        }
        if let Some(token) = token {
            builder = builder.header(ACCESS_TOKEN_HEADER, token);
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Directory holding definitions, runs and logs.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub async fn as_alice(
        &self,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> Response<Body> {
        self.send(method, uri, Some("alice"), Some(&self.alice), body).await
    }

    pub async fn as_bob(
        &self,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> Response<Body> {
        self.send(method, uri, Some("bob"), Some(&self.bob), body).await
    }
}

fn write_definition(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join("metadata.json"),
        format!(
            r#"{{"id": "{RESTRICTED_DEF}", "name": "Restricted",
                "allowed_entitlements": [{{"prefix": "urn:example:", "values": ["genomics"]}}]}}"#
        ),
    )
    .unwrap();
    fs::write(dir.join("Snakefile"), "rule all:\n    input: '{{output_dir}}/done'\n").unwrap();
}

/// Read a JSON response body.
pub async fn json_body<T: serde::de::DeserializeOwned>(response: Response<Body>) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
