//! Pipeline command line and environment.
//!
//! The argument vector is fully determined by the settings and the run, so
//! two launches of the same run produce identical commands. Credentials are
//! placed in the child's environment, never in argv, where they would be
//! visible to every user through the process table.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tessera_config::TesseraConfig;
use tessera_types::{RunParameters, WorkflowDefinition};
use uuid::Uuid;

/// Environment variable carrying the caller's access token for the executor plugin.
pub const ENV_ACCESS_TOKEN: &str = "SNAKEMAKE_AUTH_TES_OIDC_ACCESS_TOKEN";
/// Environment variable carrying the OIDC client secret for the executor plugin.
pub const ENV_CLIENT_SECRET: &str = "SNAKEMAKE_AUTH_TES_OIDC_CLIENT_SECRET";
/// Environment variable carrying the object storage secret key.
pub const ENV_S3_SECRET_KEY: &str = "SNAKEMAKE_STORAGE_S3_SECRET_KEY";
pub const ENV_WORKFLOW_ID: &str = "TESSERA_WORKFLOW_ID";
pub const ENV_USER_ID: &str = "TESSERA_USER_ID";
pub const ENV_RESULT_BUCKET: &str = "TESSERA_RESULT_BUCKET";

/// Static launcher settings shared by every run.
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub binary: PathBuf,
    pub software_deployment: String,
    pub executor: String,
    pub container_image: String,
    pub jobs: u32,
    pub default_storage_prefix: String,
    pub s3_endpoint_url: String,
    pub s3_access_key: String,
    pub s3_secret_key: String,
    pub oidc_url: String,
    pub oidc_client_id: String,
    pub oidc_client_secret: String,
    pub oidc_audience: String,
    pub extra_args: Vec<String>,
    /// Root under which run workspaces are created.
    pub workflow_dir: PathBuf,
    /// Bounded wait between abort checks.
    pub poll_interval: Duration,
}

impl ExecutorSettings {
    pub fn from_config(config: &TesseraConfig) -> Self {
        let pipeline = config.pipeline();
        let storage = config.storage();
        let oidc = config.oidc();
        Self {
            binary: PathBuf::from(&pipeline.binary),
            software_deployment: pipeline.software_deployment.clone(),
            executor: pipeline.executor.clone(),
            container_image: pipeline.container_image.clone(),
            jobs: pipeline.jobs,
            default_storage_prefix: pipeline.default_storage_prefix.clone(),
            s3_endpoint_url: storage.s3_endpoint_url,
            s3_access_key: storage.s3_access_key,
            s3_secret_key: storage.s3_secret_key,
            oidc_url: oidc.url,
            oidc_client_id: oidc.client_id,
            oidc_client_secret: oidc.client_secret,
            oidc_audience: oidc.audience,
            extra_args: pipeline.extra_args.clone(),
            workflow_dir: config.workflow_dir(),
            poll_interval: pipeline.poll_interval(),
        }
    }
}

/// Everything the executor needs to know about one run.
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    pub workflow_id: Uuid,
    pub definition: WorkflowDefinition,
    pub params: RunParameters,
    /// Definition input mapping, already formatted against `params`.
    pub input_mapping: BTreeMap<String, String>,
    /// Caller name; owns the record and names the log directory.
    pub username: String,
    /// Caller's bearer token, forwarded to the backend.
    pub access_token: String,
    pub result_bucket: String,
    /// Task-execution backend for this run (after dataset overrides).
    pub execution_url: String,
}

impl WorkflowRun {
    /// Values substituted for `{{placeholders}}` in the entry file.
    pub fn placeholder_values(&self) -> BTreeMap<String, String> {
        let mut values = self.input_mapping.clone();
        values.insert("input_dir".to_string(), self.params.input_dir.clone());
        values.insert("output_dir".to_string(), self.params.output_dir.clone());
        values.insert("result_bucket".to_string(), self.result_bucket.clone());
        values
    }
}

/// A fully specified process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub working_dir: PathBuf,
}

/// Result bucket name derived from the caller's subject.
pub fn result_bucket_for(subject: &str) -> String {
    subject.replace('@', "_")
}

/// Build the pipeline invocation for `run` inside `workspace`.
pub fn build_launch(settings: &ExecutorSettings, run: &WorkflowRun, workspace: &Path) -> LaunchSpec {
    let entry = workspace.join(&run.definition.entry_file);
    let mut args = vec![
        format!("--sdm={}", settings.software_deployment),
        format!("--executor={}", settings.executor),
        format!("--snakefile={}", entry.display()),
        format!("--directory={}", workspace.display()),
        "--default-storage-provider=s3".to_string(),
        format!("--default-storage-prefix={}", settings.default_storage_prefix),
        format!("--storage-s3-endpoint-url={}", settings.s3_endpoint_url),
        format!("--storage-s3-access-key={}", settings.s3_access_key),
        format!("--auth-tes-url={}", run.execution_url),
        format!("--auth-tes-oidc-client-id={}", settings.oidc_client_id),
        format!("--auth-tes-oidc-url={}", settings.oidc_url),
        format!("--auth-tes-oidc-audience={}", settings.oidc_audience),
        format!("--container-image={}", settings.container_image),
        format!("--jobs={}", settings.jobs),
    ];
    args.extend(settings.extra_args.iter().cloned());

    let env = BTreeMap::from([
        (ENV_ACCESS_TOKEN.to_string(), run.access_token.clone()),
        (ENV_CLIENT_SECRET.to_string(), settings.oidc_client_secret.clone()),
        (ENV_S3_SECRET_KEY.to_string(), settings.s3_secret_key.clone()),
        (ENV_WORKFLOW_ID.to_string(), run.workflow_id.to_string()),
        (ENV_USER_ID.to_string(), run.username.clone()),
        (ENV_RESULT_BUCKET.to_string(), run.result_bucket.clone()),
    ]);

    LaunchSpec {
        program: settings.binary.clone(),
        args,
        env,
        working_dir: workspace.to_path_buf(),
    }
}
