//! Workflow execution engine for Tessera.
//!
//! Turns a workflow definition plus run parameters into a supervised pipeline
//! process, and folds what that process prints into the persisted workflow
//! record.
//!
//! # Architecture
//!
//! ```text
//! WorkflowOrchestrator ── per-request binding of OrchestratorContext
//!     ├── DefinitionResolver   - definition id → template dir + metadata
//!     ├── WorkflowRepository   - record persistence (tessera-store)
//!     ├── TaskQueue            - background units, abort by task handle
//!     │     └── TaskExecutor   - workspace, process, progress, exit status
//!     └── JobStatusSource      - live sub-job status from the TES backend
//! ```

pub mod definition;
pub mod error;
pub mod executor;
pub mod jobs;
pub mod launch;
pub mod orchestrator;
pub mod progress;
pub mod scheduler;
pub mod template;
pub mod workspace;

pub use definition::{DefinitionResolver, DirectoryDefinitionResolver, load_definition};
pub use error::{PipelineError, Result};
pub use executor::{ABORTED_BEFORE_LAUNCH, AbortSignal, NoAbort, TaskExecutor};
pub use jobs::{JobStatusSource, TesJobClient};
pub use launch::{ExecutorSettings, LaunchSpec, WorkflowRun, build_launch, result_bucket_for};
pub use orchestrator::{OrchestratorContext, Requester, WorkflowOrchestrator};
pub use progress::{ProgressEvent, parse_line};
pub use scheduler::{LocalTaskQueue, RunUnit, TaskQueue, run_unit};
pub use workspace::RunWorkspace;
