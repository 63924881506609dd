//! API routes.

pub mod definitions;
pub mod health;
pub mod workflows;

pub use definitions::list_definitions_handler;
pub use health::health_routes;
pub use workflows::{
    CancelResponse, RunRequest, RunResponse, cancel_workflow_handler, get_workflow_handler,
    list_workflows_handler, run_handler,
};
