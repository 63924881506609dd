//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Default bind address for the HTTP server.
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// Application name used for data and log directories.
const APP_NAME: &str = "tessera";

// ─────────────────────────────────────────────────────────────────────────────
// Root Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// Maps to the full TOML config file. All sections are optional so that
/// partial configs (e.g., project-local overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseraConfig {
    /// Filesystem locations.
    pub app: Option<AppSection>,

    /// HTTP server configuration.
    pub server: Option<ServerSection>,

    /// OIDC client used for introspection, userinfo, and the backend executor plugin.
    pub oidc: Option<OidcSection>,

    /// External pipeline launcher configuration.
    pub pipeline: Option<PipelineSection>,

    /// Object storage handed to the pipeline.
    pub storage: Option<StorageSection>,

    /// Default task-execution backend.
    pub tes: Option<TesSection>,

    /// Per-dataset backend overrides, scanned in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub datasets: Vec<DatasetBackend>,
}

impl TesseraConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: TesseraConfig) {
        if other.app.is_some() {
            self.app = other.app;
        }
        if other.server.is_some() {
            self.server = other.server;
        }
        if other.oidc.is_some() {
            self.oidc = other.oidc;
        }
        if other.pipeline.is_some() {
            self.pipeline = other.pipeline;
        }
        if other.storage.is_some() {
            self.storage = other.storage;
        }
        if other.tes.is_some() {
            self.tes = other.tes;
        }
        if !other.datasets.is_empty() {
            self.datasets = other.datasets;
        }
    }

    /// Check that every field needed to serve requests is present.
    pub fn validate(&self) -> Result<()> {
        let app = self.app.as_ref().ok_or_else(|| missing("app", "config"))?;
        if app.workflow_dir.is_none() {
            return Err(missing("workflow_dir", "[app]"));
        }
        if app.workflow_definition_dir.is_none() {
            return Err(missing("workflow_definition_dir", "[app]"));
        }

        let oidc = self.oidc.as_ref().ok_or_else(|| missing("oidc", "config"))?;
        if oidc.url.is_empty() {
            return Err(missing("url", "[oidc]"));
        }
        if oidc.client_id.is_empty() {
            return Err(missing("client_id", "[oidc]"));
        }

        let tes = self.tes.as_ref().ok_or_else(|| missing("tes", "config"))?;
        if tes.url.is_empty() {
            return Err(missing("url", "[tes]"));
        }

        let pipeline = self.pipeline();
        if pipeline.jobs == 0 {
            return Err(ConfigError::Invalid {
                field: "pipeline.jobs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if pipeline.max_concurrent_runs == 0 {
            return Err(ConfigError::Invalid {
                field: "pipeline.max_concurrent_runs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        for (i, entry) in self.datasets.iter().enumerate() {
            if entry.execution_url.is_empty() {
                return Err(missing("execution_url", &format!("[[datasets]] entry {i}")));
            }
        }

        Ok(())
    }

    /// Pipeline section, or defaults when absent.
    pub fn pipeline(&self) -> PipelineSection {
        self.pipeline.clone().unwrap_or_default()
    }

    /// Server section, or defaults when absent.
    pub fn server(&self) -> ServerSection {
        self.server.clone().unwrap_or_default()
    }

    /// Storage section, or defaults when absent.
    pub fn storage(&self) -> StorageSection {
        self.storage.clone().unwrap_or_default()
    }

    /// OIDC section, or defaults when absent.
    pub fn oidc(&self) -> OidcSection {
        self.oidc.clone().unwrap_or_default()
    }

    /// Default task-execution backend URL.
    pub fn tes_url(&self) -> &str {
        self.tes.as_ref().map(|t| t.url.as_str()).unwrap_or_default()
    }

    /// Directory for per-run logs and the rolling service log.
    pub fn log_dir(&self) -> PathBuf {
        self.app
            .as_ref()
            .and_then(|a| a.log_dir.clone())
            .unwrap_or_else(|| data_dir().join("logs"))
    }

    /// SQLite database holding workflow records.
    pub fn database_path(&self) -> PathBuf {
        self.app
            .as_ref()
            .and_then(|a| a.database.clone())
            .unwrap_or_else(|| data_dir().join("workflows.db"))
    }

    /// Root under which per-run workspaces are materialized.
    pub fn workflow_dir(&self) -> PathBuf {
        self.app
            .as_ref()
            .and_then(|a| a.workflow_dir.clone())
            .unwrap_or_else(|| data_dir().join("runs"))
    }

    /// Directory holding one folder per workflow definition.
    pub fn workflow_definition_dir(&self) -> PathBuf {
        self.app
            .as_ref()
            .and_then(|a| a.workflow_definition_dir.clone())
            .unwrap_or_else(|| data_dir().join("definitions"))
    }
}

fn missing(field: &str, context: &str) -> ConfigError {
    ConfigError::MissingField {
        field: field.to_string(),
        context: context.to_string(),
    }
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

// ─────────────────────────────────────────────────────────────────────────────
// Application Paths
// ─────────────────────────────────────────────────────────────────────────────

/// Filesystem locations.
///
/// ```toml
/// [app]
/// log_dir = "/var/log/tessera"
/// workflow_dir = "/srv/tessera/runs"
/// workflow_definition_dir = "/srv/tessera/definitions"
/// database = "/srv/tessera/workflows.db"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub log_dir: Option<PathBuf>,
    pub workflow_dir: Option<PathBuf>,
    pub workflow_definition_dir: Option<PathBuf>,
    pub database: Option<PathBuf>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Server Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Address to bind to.
    pub bind: String,
    /// Enable request tracing.
    pub request_logging: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            request_logging: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OIDC Client
// ─────────────────────────────────────────────────────────────────────────────

/// OIDC client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OidcSection {
    /// Issuer URL; discovery reads `{url}/.well-known/openid-configuration`.
    pub url: String,
    pub client_id: String,
    pub client_secret: String,
    pub audience: String,
    /// Allowance subtracted from a token's expiry before comparing with now.
    pub clock_skew_secs: i64,
}

impl Default for OidcSection {
    fn default() -> Self {
        Self {
            url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            audience: String::new(),
            clock_skew_secs: 10,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline Launcher
// ─────────────────────────────────────────────────────────────────────────────

/// External pipeline launcher configuration.
///
/// ```toml
/// [pipeline]
/// binary = "snakemake"
/// container_image = "ghcr.io/org/snakemake:8"
/// jobs = 8
/// default_storage_prefix = "s3://results"
/// poll_interval_ms = 1000
/// max_concurrent_runs = 4
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    /// Pipeline executable, resolved through `PATH` when not absolute.
    pub binary: String,
    /// Software deployment method passed as `--sdm`.
    pub software_deployment: String,
    /// Executor plugin passed as `--executor`.
    pub executor: String,
    pub container_image: String,
    /// Concurrency limit passed as `--jobs`.
    pub jobs: u32,
    pub default_storage_prefix: String,
    /// Upper bound on how long the streaming loop waits before re-checking for abort.
    pub poll_interval_ms: u64,
    /// Worker slots on the local task queue.
    pub max_concurrent_runs: usize,
    /// Appended verbatim after the generated arguments.
    pub extra_args: Vec<String>,
}

impl PipelineSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            binary: "snakemake".to_string(),
            software_deployment: "conda".to_string(),
            executor: "auth-tes".to_string(),
            container_image: String::new(),
            jobs: 1,
            default_storage_prefix: String::new(),
            poll_interval_ms: 1000,
            max_concurrent_runs: 4,
            extra_args: Vec::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Storage / Backend
// ─────────────────────────────────────────────────────────────────────────────

/// S3-compatible object storage used as the pipeline's default storage provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub s3_endpoint_url: String,
    pub s3_access_key: String,
    pub s3_secret_key: String,
}

/// Task-execution backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TesSection {
    pub url: String,
}

/// Routes runs over any of `datasets` to `execution_url`.
///
/// ```toml
/// [[datasets]]
/// execution_url = "https://tes.site-b.example.org"
/// datasets = ["cohort-2019", "cohort-2020"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetBackend {
    pub execution_url: String,
    #[serde(default)]
    pub datasets: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
