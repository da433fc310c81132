/// Integration tests for the legacy migrator (C10).
///
/// Run with: cargo test --test migration

use std::sync::Arc;

use rusqlite::Connection;
use sloth_state::model::reserved_keys;
use sloth_state::{Migrator, StackRepository, StateBackend, StateError, Store};
use tempfile::TempDir;

fn legacy_db(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("legacy.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE workflow_states (id TEXT PRIMARY KEY, name TEXT NOT NULL, status TEXT NOT NULL, \
         metadata TEXT, created_at TEXT NOT NULL, updated_at TEXT NOT NULL);
         CREATE TABLE workflow_resources (id TEXT PRIMARY KEY, workflow_id TEXT NOT NULL, type TEXT NOT NULL, \
         name TEXT NOT NULL, properties TEXT, state TEXT, created_at TEXT NOT NULL, updated_at TEXT NOT NULL);
         CREATE TABLE workflow_outputs (id INTEGER PRIMARY KEY, workflow_id TEXT NOT NULL, resource_id TEXT, \
         key TEXT NOT NULL, value TEXT, created_at TEXT);
         INSERT INTO workflow_states (id, name, status, metadata, created_at, updated_at) \
         VALUES ('w1', 'legacy-flow', 'completed', NULL, '2024-01-01T00:00:00Z', '2024-01-02T00:00:00Z');
         INSERT INTO workflow_resources (id, workflow_id, type, name, properties, state, created_at, updated_at) \
         VALUES ('r1', 'w1', 'instance', 'box', '{\"size\":\"m\"}', 'applied', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z');
         INSERT INTO workflow_outputs (workflow_id, resource_id, key, value, created_at) \
         VALUES ('w1', 'r1', 'ip_address', '10.0.0.5', '2024-01-01T00:00:00Z');",
    )
    .unwrap();
    path
}

#[test]
fn migrates_legacy_rows_and_writes_report() {
    let dir = TempDir::new().unwrap();
    let source = legacy_db(&dir);

    let repo = Arc::new(StackRepository::new(Arc::new(Store::open_in_memory().unwrap())));
    let backend = StateBackend::new(repo);

    let report = Migrator::run(&source, &backend).unwrap();
    assert_eq!(report.stacks_migrated, 1);
    assert_eq!(report.resources_migrated, 1);
    assert_eq!(report.outputs_migrated, 1);
    assert!(report.errors.is_empty());

    let stack = backend.repository().get_stack("w1").unwrap().unwrap();
    assert_eq!(
        stack.metadata.get(reserved_keys::MIGRATED_ACTION).unwrap(),
        "imported_from_workflow_states"
    );

    let target_db = dir.path().join("state.db");
    report.write_next_to(&target_db).unwrap();
    assert!(dir.path().join("state.migration-report.json").exists());

    let second = Migrator::run(&source, &backend).unwrap();
    assert_eq!(second.stacks_migrated, 0);
    assert_eq!(second.skipped, 1);
}

#[test]
fn nonexistent_source_is_migration_error() {
    let dir = TempDir::new().unwrap();
    let repo = Arc::new(StackRepository::new(Arc::new(Store::open_in_memory().unwrap())));
    let backend = StateBackend::new(repo);
    let err = Migrator::run(&dir.path().join("nope.db"), &backend).unwrap_err();
    assert!(matches!(err, StateError::MigrationError(_)));
}
