//! Shared types for the Tessera workflow engine.

pub mod definition;
pub mod view;
pub mod workflow;

pub use definition::{
    DEFAULT_ENTRY_FILE, DefinitionListItem, EntitlementRule, RunParameters, WorkflowDefinition,
};
pub use view::{JobDetail, JobListItem, WorkflowDetail, WorkflowListItem};
pub use workflow::{ParseStateError, WorkflowRecord, WorkflowState};
