//! Workflow record persistence for Tessera.
//!
//! Workflow records live behind the [`WorkflowRepository`] trait, with SQLite
//! as the default backend. Filters are written over logical field names; the
//! SQLite store owns the mapping to its columns. Raw pipeline output for each
//! run goes to an append-only log file managed by [`RunLogDir`].

pub mod error;
pub mod filter;
pub mod repository;
pub mod run_log;
pub mod sqlite;

pub use error::{Result, StoreError};
pub use filter::{WorkflowField, WorkflowFilter};
pub use repository::{InMemoryWorkflowStore, WorkflowRepository};
pub use run_log::{RunLog, RunLogDir};
pub use sqlite::SqliteWorkflowStore;
