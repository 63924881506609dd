//! Record filters over logical field names.
//!
//! Callers never see storage column names; each backend maps
//! [`WorkflowField`] to its own physical layout.

use tessera_types::{WorkflowRecord, WorkflowState};
use uuid::Uuid;

/// Queryable fields of a workflow record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowField {
    Id,
    TaskHandle,
    CreatedBy,
    State,
}

impl WorkflowField {
    /// The field's value on `record`, in its canonical text form.
    pub fn value_of(self, record: &WorkflowRecord) -> String {
        match self {
            Self::Id => record.id.to_string(),
            Self::TaskHandle => record.task_handle.clone(),
            Self::CreatedBy => record.created_by.clone(),
            Self::State => record.state.as_str().to_string(),
        }
    }
}

/// Conjunction of equality conditions. An empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowFilter {
    conditions: Vec<(WorkflowField, String)>,
}

impl WorkflowFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: Uuid) -> Self {
        Self::all().id(id)
    }

    pub fn by_owner(subject: impl Into<String>) -> Self {
        Self::all().created_by(subject)
    }

    pub fn id(self, id: Uuid) -> Self {
        self.with(WorkflowField::Id, id.to_string())
    }

    pub fn task_handle(self, handle: impl Into<String>) -> Self {
        self.with(WorkflowField::TaskHandle, handle.into())
    }

    pub fn created_by(self, subject: impl Into<String>) -> Self {
        self.with(WorkflowField::CreatedBy, subject.into())
    }

    pub fn state(self, state: WorkflowState) -> Self {
        self.with(WorkflowField::State, state.as_str().to_string())
    }

    fn with(mut self, field: WorkflowField, value: String) -> Self {
        self.conditions.push((field, value));
        self
    }

    pub fn conditions(&self) -> &[(WorkflowField, String)] {
        &self.conditions
    }

    pub fn matches(&self, record: &WorkflowRecord) -> bool {
        self.conditions
            .iter()
            .all(|(field, value)| field.value_of(record) == *value)
    }
}
