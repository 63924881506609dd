//! Error types for the workflow engine.

use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while resolving, launching or querying workflows.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No definition with this id is available.
    #[error("Workflow definition not found: {0}")]
    DefinitionNotFound(String),

    /// A definition folder exists but cannot be used.
    #[error("Invalid workflow definition: {0}")]
    InvalidDefinition(String),

    /// No workflow record with this id exists.
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    /// The orchestrator is already bound to a workflow that was run.
    #[error("Workflow was already run: {0}")]
    AlreadyRun(String),

    /// The orchestrator is not bound to an existing workflow.
    #[error("Workflow was not run yet")]
    NotRunYet,

    /// The per-run workspace could not be materialized.
    #[error("Workspace setup failed: {0}")]
    WorkspaceSetup(String),

    /// The pipeline could not be launched or supervised.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Workflow record persistence failed.
    #[error("Store error: {0}")]
    Store(#[from] tessera_store::StoreError),
}
