//! Migrator (C10): one-shot ingest from a legacy workflow-state schema
//! into the unified store.
//!
//! Grounded in the teacher's `storage::persistence::SnapshotManager`
//! for the atomic report write (temp file + `fs::rename`), and in
//! `repository::stacks`/`repository::resources`'s existing
//! constraint-violation handling for the "insert, ignore duplicates"
//! behavior spec.md asks for.
//!
//! Legacy schema assumed (three tables, one JSON-text column each for
//! anything free-form, same convention the unified schema itself
//! uses):
//!
//! ```sql
//! CREATE TABLE workflow_states (
//!     id TEXT PRIMARY KEY, name TEXT NOT NULL, status TEXT NOT NULL,
//!     metadata TEXT, created_at TEXT NOT NULL, updated_at TEXT NOT NULL
//! );
//! CREATE TABLE workflow_resources (
//!     id TEXT PRIMARY KEY, workflow_id TEXT NOT NULL, type TEXT NOT NULL,
//!     name TEXT NOT NULL, properties TEXT, state TEXT,
//!     created_at TEXT NOT NULL, updated_at TEXT NOT NULL
//! );
//! CREATE TABLE workflow_outputs (
//!     id INTEGER PRIMARY KEY, workflow_id TEXT NOT NULL,
//!     resource_id TEXT, key TEXT NOT NULL, value TEXT, created_at TEXT
//! );
//! ```

use std::io::Write;
use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::backend::StateBackend;
use crate::error::{Result, StateError};
use crate::jsonmap::from_column;
use crate::model::{Resource, Stack, StackStatus, reserved_keys};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    pub stacks_migrated: usize,
    pub resources_migrated: usize,
    pub outputs_migrated: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
}

pub struct Migrator;

impl Migrator {
    /// Reads every row out of the legacy tables at `source_db_path`
    /// and writes it into `backend`'s store via an insert-or-ignore
    /// (duplicates are silently skipped, not errors). A single
    /// malformed record is recorded in the report and does not abort
    /// the rest of the batch; failing to open or read a table at all
    /// is a hard `MigrationError`.
    pub fn run(source_db_path: &Path, backend: &StateBackend) -> Result<MigrationReport> {
        let started_at = Utc::now();
        let start = Instant::now();

        let source = Connection::open_with_flags(source_db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| StateError::MigrationError(format!("cannot open source database: {e}")))?;

        let mut report = MigrationReport {
            stacks_migrated: 0,
            resources_migrated: 0,
            outputs_migrated: 0,
            skipped: 0,
            errors: Vec::new(),
            started_at,
            completed_at: started_at,
            duration_ms: 0,
        };

        Self::migrate_stacks(&source, backend, &mut report)?;
        Self::migrate_resources(&source, backend, &mut report)?;
        Self::migrate_outputs(&source, backend, &mut report)?;

        report.completed_at = Utc::now();
        report.duration_ms = start.elapsed().as_millis() as u64;
        Ok(report)
    }

    fn migrate_stacks(source: &Connection, backend: &StateBackend, report: &mut MigrationReport) -> Result<()> {
        let mut stmt = source
            .prepare("SELECT id, name, status, metadata, created_at, updated_at FROM workflow_states")
            .map_err(|e| StateError::MigrationError(format!("cannot read workflow_states: {e}")))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .map_err(|e| StateError::MigrationError(format!("cannot read workflow_states: {e}")))?;

        for row in rows {
            let (id, name, status, metadata_json, created_at, updated_at) = match row {
                Ok(r) => r,
                Err(e) => {
                    report.errors.push(format!("workflow_states row: {e}"));
                    continue;
                }
            };

            let mut stack = Stack::new(&id, &name);
            stack.status = StackStatus::parse(&status).unwrap_or(StackStatus::Created);
            stack.created_at = created_at.parse().unwrap_or_else(|_| Utc::now());
            stack.updated_at = updated_at.parse().unwrap_or(stack.created_at);
            let mut metadata = metadata_json.as_deref().map(from_column).unwrap_or_default();
            metadata.insert(
                reserved_keys::MIGRATED_ACTION.to_string(),
                json!("imported_from_workflow_states"),
            );
            stack.metadata = metadata;

            match backend.repository().create_stack(&stack) {
                Ok(()) => report.stacks_migrated += 1,
                Err(StateError::ConstraintError(_)) => report.skipped += 1,
                Err(e) => report.errors.push(format!("stack '{id}': {e}")),
            }
        }
        Ok(())
    }

    fn migrate_resources(source: &Connection, backend: &StateBackend, report: &mut MigrationReport) -> Result<()> {
        let mut stmt = source
            .prepare(
                "SELECT id, workflow_id, type, name, properties, state, created_at, updated_at \
                 FROM workflow_resources",
            )
            .map_err(|e| StateError::MigrationError(format!("cannot read workflow_resources: {e}")))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })
            .map_err(|e| StateError::MigrationError(format!("cannot read workflow_resources: {e}")))?;

        for row in rows {
            let (id, workflow_id, r#type, name, properties_json, state, created_at, updated_at) = match row {
                Ok(r) => r,
                Err(e) => {
                    report.errors.push(format!("workflow_resources row: {e}"));
                    continue;
                }
            };

            let mut resource = Resource::new(&id, &workflow_id, &r#type, &name);
            resource.properties = properties_json.as_deref().map(from_column).unwrap_or_default();
            resource.state = state.unwrap_or_default();
            resource.created_at = created_at.parse().unwrap_or_else(|_| Utc::now());
            resource.updated_at = updated_at.parse().unwrap_or(resource.created_at);
            resource
                .metadata
                .insert(reserved_keys::MIGRATED_ACTION.to_string(), json!("imported_from_workflow_resources"));

            match backend.repository().create_resource(&resource) {
                Ok(()) => report.resources_migrated += 1,
                Err(StateError::ConstraintError(_)) => report.skipped += 1,
                Err(e) => report.errors.push(format!("resource '{id}': {e}")),
            }
        }
        Ok(())
    }

    fn migrate_outputs(source: &Connection, backend: &StateBackend, report: &mut MigrationReport) -> Result<()> {
        let mut stmt = source
            .prepare("SELECT workflow_id, resource_id, key, value FROM workflow_outputs")
            .map_err(|e| StateError::MigrationError(format!("cannot read workflow_outputs: {e}")))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })
            .map_err(|e| StateError::MigrationError(format!("cannot read workflow_outputs: {e}")))?;

        for row in rows {
            let (workflow_id, resource_id, key, value) = match row {
                Ok(r) => r,
                Err(e) => {
                    report.errors.push(format!("workflow_outputs row: {e}"));
                    continue;
                }
            };

            let details = json!({ "key": key, "value": value });
            match backend.log_activity_value(
                &workflow_id,
                reserved_keys::MIGRATED_ACTION,
                resource_id.as_deref(),
                details,
                "migrator",
            ) {
                Ok(()) => report.outputs_migrated += 1,
                Err(e) => report.errors.push(format!("output '{key}' on '{workflow_id}': {e}")),
            }
        }
        Ok(())
    }
}

impl MigrationReport {
    /// Atomically writes this report as JSON next to `target_db_path`,
    /// as `<file_stem>.migration-report.json` in the same directory.
    /// Writes to a temp file in the same directory first, then renames
    /// over the final path, matching the teacher's
    /// `SnapshotManager::save` atomic-write discipline.
    pub fn write_next_to(&self, target_db_path: &Path) -> Result<()> {
        let dir = target_db_path.parent().unwrap_or_else(|| Path::new("."));
        let stem = target_db_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("migration");
        let report_path = dir.join(format!("{stem}.migration-report.json"));

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        let body = serde_json::to_vec_pretty(self)?;
        tmp.write_all(&body)?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&report_path).map_err(|e| e.error)?;
        Ok(())
    }
}
