use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use tessera_types::{WorkflowRecord, WorkflowState};
use uuid::Uuid;

use crate::filter::{WorkflowField, WorkflowFilter};
use crate::repository::{WorkflowRepository, apply_mutable_fields};
use crate::{Result, StoreError};

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

const SELECT_COLUMNS: &str =
    "id, task_id, created_at, created_by, total_jobs, finished_jobs, state, job_ids";

/// Physical column for each logical field.
const fn column(field: WorkflowField) -> &'static str {
    match field {
        WorkflowField::Id => "id",
        WorkflowField::TaskHandle => "task_id",
        WorkflowField::CreatedBy => "created_by",
        WorkflowField::State => "state",
    }
}

/// SQLite-backed workflow repository.
///
/// Thread-safe via internal `Mutex<Connection>`.
pub struct SqliteWorkflowStore {
    conn: Mutex<Connection>,
}

impl SqliteWorkflowStore {
    /// Open (or create) the database at `path` and run pending migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let mut store = Self {
            conn: Mutex::new(conn),
        };
        let applied = store.run_migrations()?;
        tracing::info!(path = %path.display(), applied, "Workflow store opened");
        Ok(store)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// Apply pending migrations, returning how many ran.
    fn run_migrations(&mut self) -> Result<usize> {
        let conn = self.conn.get_mut();
        let report = embedded::migrations::runner()
            .run(conn)
            .map_err(|e| {
                tracing::error!(error = %e, "Workflow store migration failed");
                StoreError::Migration(e.to_string())
            })?;
        for migration in report.applied_migrations() {
            tracing::debug!(version = migration.version(), name = migration.name(), "Applied migration");
        }
        Ok(report.applied_migrations().len())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}

/// Render `filter` as a WHERE clause with positional parameters starting at `?{first}`.
fn where_clause(filter: &WorkflowFilter, first: usize) -> (String, Vec<String>) {
    if filter.conditions().is_empty() {
        return (String::new(), Vec::new());
    }
    let mut parts = Vec::with_capacity(filter.conditions().len());
    let mut values = Vec::with_capacity(filter.conditions().len());
    for (i, (field, value)) in filter.conditions().iter().enumerate() {
        parts.push(format!("{} = ?{}", column(*field), first + i));
        values.push(value.clone());
    }
    (format!(" WHERE {}", parts.join(" AND ")), values)
}

impl WorkflowRepository for SqliteWorkflowStore {
    fn get_one(&self, filter: &WorkflowFilter) -> Result<Option<WorkflowRecord>> {
        let (clause, values) = where_clause(filter, 1);
        let sql = format!("SELECT {SELECT_COLUMNS} FROM workflows{clause} LIMIT 1");
        Ok(self
            .conn()
            .query_row(&sql, params_from_iter(values.iter()), row_to_record)
            .optional()?)
    }

    fn get_many(&self, filter: &WorkflowFilter) -> Result<Vec<WorkflowRecord>> {
        let (clause, values) = where_clause(filter, 1);
        let sql = format!("SELECT {SELECT_COLUMNS} FROM workflows{clause} ORDER BY created_at DESC");
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let iter = stmt.query_map(params_from_iter(values.iter()), row_to_record)?;
        let mut rows = Vec::new();
        for r in iter {
            rows.push(r?);
        }
        Ok(rows)
    }

    fn insert(&self, record: &WorkflowRecord) -> Result<()> {
        let job_ids = serde_json::to_string(&record.job_ids)?;
        let result = self.conn().execute(
            "INSERT INTO workflows (id, task_id, created_at, created_by, total_jobs, finished_jobs, state, job_ids)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id.to_string(),
                record.task_handle,
                record.created_at.to_rfc3339(),
                record.created_by,
                record.total_jobs,
                record.finished_jobs,
                record.state.as_str(),
                job_ids,
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::Duplicate(record.id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn update(&self, filter: &WorkflowFilter, record: &WorkflowRecord) -> Result<usize> {
        let (clause, filter_values) = where_clause(filter, 6);
        let sql = format!(
            "UPDATE workflows SET task_id = ?1, total_jobs = ?2, finished_jobs = ?3, state = ?4, job_ids = ?5{clause}"
        );
        let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![
            Box::new(record.task_handle.clone()),
            Box::new(record.total_jobs),
            Box::new(record.finished_jobs),
            Box::new(record.state.as_str()),
            Box::new(serde_json::to_string(&record.job_ids)?),
        ];
        for v in filter_values {
            values.push(Box::new(v));
        }
        let refs: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|b| b.as_ref()).collect();
        Ok(self.conn().execute(&sql, refs.as_slice())?)
    }

    fn delete(&self, filter: &WorkflowFilter) -> Result<usize> {
        let (clause, values) = where_clause(filter, 1);
        let sql = format!("DELETE FROM workflows{clause}");
        Ok(self.conn().execute(&sql, params_from_iter(values.iter()))?)
    }

    fn modify(
        &self,
        id: Uuid,
        f: &mut dyn FnMut(&mut WorkflowRecord) -> bool,
    ) -> Result<Option<WorkflowRecord>> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let current = tx
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM workflows WHERE id = ?1"),
                params![id.to_string()],
                row_to_record,
            )
            .optional()?;
        let Some(current) = current else {
            return Ok(None);
        };

        let mut draft = current.clone();
        if !f(&mut draft) {
            return Ok(Some(current));
        }

        let mut updated = current;
        apply_mutable_fields(&mut updated, &draft);
        tx.execute(
            "UPDATE workflows SET task_id = ?1, total_jobs = ?2, finished_jobs = ?3, state = ?4, job_ids = ?5
             WHERE id = ?6",
            params![
                updated.task_handle,
                updated.total_jobs,
                updated.finished_jobs,
                updated.state.as_str(),
                serde_json::to_string(&updated.job_ids)?,
                id.to_string(),
            ],
        )?;
        tx.commit()?;
        Ok(Some(updated))
    }
}

fn parse_dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn conversion_error(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkflowRecord> {
    let id: String = row.get(0)?;
    let state: String = row.get(6)?;
    let job_ids: String = row.get(7)?;
    Ok(WorkflowRecord {
        id: Uuid::parse_str(&id).map_err(|e| conversion_error(0, e))?,
        task_handle: row.get(1)?,
        created_at: parse_dt(&row.get::<_, String>(2)?),
        created_by: row.get(3)?,
        total_jobs: row.get(4)?,
        finished_jobs: row.get(5)?,
        state: state
            .parse::<WorkflowState>()
            .map_err(|e| conversion_error(6, e))?,
        job_ids: serde_json::from_str(&job_ids).map_err(|e| conversion_error(7, e))?,
    })
}
