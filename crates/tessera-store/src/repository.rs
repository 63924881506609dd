//! Storage abstraction for workflow records.
//!
//! # Architecture
//!
//! ```text
//! WorkflowRepository (trait)      - Record CRUD + atomic read-modify-write
//!     └── SqliteWorkflowStore     - Default SQLite implementation
//!     └── InMemoryWorkflowStore   - In-memory store for testing
//! ```

use std::collections::HashMap;

use parking_lot::Mutex;
use tessera_types::WorkflowRecord;
use uuid::Uuid;

use crate::filter::WorkflowFilter;
use crate::{Result, StoreError};

/// Persistence contract for workflow records.
pub trait WorkflowRepository: Send + Sync {
    /// First record matching `filter`, if any.
    fn get_one(&self, filter: &WorkflowFilter) -> Result<Option<WorkflowRecord>>;

    /// All records matching `filter`, newest first.
    fn get_many(&self, filter: &WorkflowFilter) -> Result<Vec<WorkflowRecord>>;

    /// Insert a new record. Fails with `Duplicate` if the id already exists.
    fn insert(&self, record: &WorkflowRecord) -> Result<()>;

    /// Overwrite every record matching `filter` with `record`'s mutable fields.
    ///
    /// Returns the number of records updated.
    fn update(&self, filter: &WorkflowFilter, record: &WorkflowRecord) -> Result<usize>;

    /// Delete records matching `filter`. Returns the number removed.
    fn delete(&self, filter: &WorkflowFilter) -> Result<usize>;

    /// Atomically read record `id`, let `f` mutate it, and persist the result
    /// when `f` returns `true`.
    ///
    /// Returns the record as it stands afterwards, or `None` if it does not exist.
    fn modify(
        &self,
        id: Uuid,
        f: &mut dyn FnMut(&mut WorkflowRecord) -> bool,
    ) -> Result<Option<WorkflowRecord>>;
}

/// In-memory repository for tests and single-process experiments.
#[derive(Debug, Default)]
pub struct InMemoryWorkflowStore {
    records: Mutex<HashMap<Uuid, WorkflowRecord>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkflowRepository for InMemoryWorkflowStore {
    fn get_one(&self, filter: &WorkflowFilter) -> Result<Option<WorkflowRecord>> {
        Ok(self
            .records
            .lock()
            .values()
            .find(|r| filter.matches(r))
            .cloned())
    }

    fn get_many(&self, filter: &WorkflowFilter) -> Result<Vec<WorkflowRecord>> {
        let mut rows: Vec<_> = self
            .records
            .lock()
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    fn insert(&self, record: &WorkflowRecord) -> Result<()> {
        let mut records = self.records.lock();
        if records.contains_key(&record.id) {
            return Err(StoreError::Duplicate(record.id.to_string()));
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    fn update(&self, filter: &WorkflowFilter, record: &WorkflowRecord) -> Result<usize> {
        let mut count = 0;
        for existing in self.records.lock().values_mut() {
            if filter.matches(existing) {
                apply_mutable_fields(existing, record);
                count += 1;
            }
        }
        Ok(count)
    }

    fn delete(&self, filter: &WorkflowFilter) -> Result<usize> {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|_, r| !filter.matches(r));
        Ok(before - records.len())
    }

    fn modify(
        &self,
        id: Uuid,
        f: &mut dyn FnMut(&mut WorkflowRecord) -> bool,
    ) -> Result<Option<WorkflowRecord>> {
        let mut records = self.records.lock();
        let Some(existing) = records.get_mut(&id) else {
            return Ok(None);
        };
        let mut draft = existing.clone();
        if f(&mut draft) {
            *existing = draft;
        }
        Ok(Some(existing.clone()))
    }
}

// Identity and provenance (id, created_at, created_by) are never rewritten.
pub(crate) fn apply_mutable_fields(target: &mut WorkflowRecord, source: &WorkflowRecord) {
    target.task_handle = source.task_handle.clone();
    target.total_jobs = source.total_jobs;
    target.finished_jobs = source.finished_jobs;
    target.state = source.state;
    target.job_ids = source.job_ids.clone();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_types::WorkflowState;

    #[test]
    fn test_insert_and_get() {
        let store = InMemoryWorkflowStore::new();
        let record = WorkflowRecord::new(Uuid::new_v4(), "h1", "alice");
        store.insert(&record).unwrap();

        let found = store.get_one(&WorkflowFilter::by_id(record.id)).unwrap();
        assert_eq!(found, Some(record.clone()));
        assert!(matches!(
            store.insert(&record),
            Err(StoreError::Duplicate(_))
        ));
    }

    #[test]
    fn test_modify_skips_write_when_closure_declines() {
        let store = InMemoryWorkflowStore::new();
        let record = WorkflowRecord::new(Uuid::new_v4(), "h1", "alice");
        store.insert(&record).unwrap();

        let after = store
            .modify(record.id, &mut |r| {
                r.total_jobs = 99;
                false
            })
            .unwrap()
            .unwrap();
        assert_eq!(after.total_jobs, 0);

        let after = store
            .modify(record.id, &mut |r| r.transition(WorkflowState::Running))
            .unwrap()
            .unwrap();
        assert_eq!(after.state, WorkflowState::Running);

        assert!(store.modify(Uuid::new_v4(), &mut |_| true).unwrap().is_none());
    }

    #[test]
    fn test_update_keeps_provenance() {
        let store = InMemoryWorkflowStore::new();
        let record = WorkflowRecord::new(Uuid::new_v4(), "h1", "alice");
        store.insert(&record).unwrap();

        let mut changed = record.clone();
        changed.created_by = "mallory".to_string();
        changed.finished_jobs = 3;
        assert_eq!(
            store.update(&WorkflowFilter::by_id(record.id), &changed).unwrap(),
            1
        );

        let found = store.get_one(&WorkflowFilter::by_id(record.id)).unwrap().unwrap();
        assert_eq!(found.created_by, "alice");
        assert_eq!(found.finished_jobs, 3);
    }

    #[test]
    fn test_get_many_and_delete_by_owner() {
        let store = InMemoryWorkflowStore::new();
        for owner in ["alice", "alice", "bob"] {
            store
                .insert(&WorkflowRecord::new(Uuid::new_v4(), "h", owner))
                .unwrap();
        }
        assert_eq!(store.get_many(&WorkflowFilter::by_owner("alice")).unwrap().len(), 2);
        assert_eq!(store.delete(&WorkflowFilter::by_owner("alice")).unwrap(), 2);
        assert_eq!(store.get_many(&WorkflowFilter::all()).unwrap().len(), 1);
    }
}
