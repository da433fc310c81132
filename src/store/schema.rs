//! DDL for the unified schema. Every table that references a stack or
//! resource declares `ON DELETE CASCADE`, matching the invariant that
//! `DeleteStack` cascades to every owned row.

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS stacks (
    id                      TEXT PRIMARY KEY,
    name                    TEXT NOT NULL,
    description             TEXT NOT NULL DEFAULT '',
    version                 TEXT NOT NULL DEFAULT '',
    status                  TEXT NOT NULL DEFAULT 'created',
    created_at              TEXT NOT NULL,
    updated_at              TEXT NOT NULL,
    completed_at            TEXT,
    workflow_file           TEXT NOT NULL DEFAULT '',
    execution_count         INTEGER NOT NULL DEFAULT 0,
    last_duration_ms        INTEGER,
    last_error              TEXT,
    resource_schema_version TEXT NOT NULL DEFAULT '1',
    task_results            TEXT NOT NULL DEFAULT '{}',
    outputs                 TEXT NOT NULL DEFAULT '{}',
    configuration           TEXT NOT NULL DEFAULT '{}',
    metadata                TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_stacks_name ON stacks(name);
CREATE INDEX IF NOT EXISTS idx_stacks_status ON stacks(status);
CREATE INDEX IF NOT EXISTS idx_stacks_updated_at ON stacks(updated_at);

CREATE TABLE IF NOT EXISTS resources (
    id              TEXT PRIMARY KEY,
    stack_id        TEXT NOT NULL REFERENCES stacks(id) ON DELETE CASCADE,
    type            TEXT NOT NULL,
    name            TEXT NOT NULL,
    module          TEXT NOT NULL DEFAULT '',
    properties      TEXT NOT NULL DEFAULT '{}',
    dependencies    TEXT NOT NULL DEFAULT '[]',
    state           TEXT NOT NULL DEFAULT '',
    checksum        TEXT NOT NULL DEFAULT '',
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    last_applied_at TEXT,
    error           TEXT,
    metadata        TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_resources_stack_id ON resources(stack_id);

CREATE TABLE IF NOT EXISTS executions (
    id              TEXT PRIMARY KEY,
    stack_id        TEXT NOT NULL REFERENCES stacks(id) ON DELETE CASCADE,
    started_at      TEXT NOT NULL,
    completed_at    TEXT,
    duration_ms     INTEGER,
    status          TEXT NOT NULL,
    task_count      INTEGER NOT NULL DEFAULT 0,
    success_count   INTEGER NOT NULL DEFAULT 0,
    failure_count   INTEGER NOT NULL DEFAULT 0,
    outputs         TEXT NOT NULL DEFAULT '{}',
    error           TEXT
);
CREATE INDEX IF NOT EXISTS idx_executions_stack_id ON executions(stack_id);
CREATE INDEX IF NOT EXISTS idx_executions_started_at ON executions(started_at);

CREATE TABLE IF NOT EXISTS snapshots (
    stack_id    TEXT NOT NULL REFERENCES stacks(id) ON DELETE CASCADE,
    version     INTEGER NOT NULL,
    checksum    TEXT NOT NULL,
    creator     TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    created_at  TEXT NOT NULL,
    data        TEXT NOT NULL,
    PRIMARY KEY (stack_id, version)
);
CREATE INDEX IF NOT EXISTS idx_snapshots_stack_id ON snapshots(stack_id);

CREATE TABLE IF NOT EXISTS locks (
    stack_id   TEXT PRIMARY KEY REFERENCES stacks(id) ON DELETE CASCADE,
    lock_id    TEXT NOT NULL,
    operation  TEXT NOT NULL,
    who        TEXT NOT NULL,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    info       TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS drifts (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    stack_id       TEXT NOT NULL REFERENCES stacks(id) ON DELETE CASCADE,
    resource_id    TEXT NOT NULL REFERENCES resources(id) ON DELETE CASCADE,
    detected_at    TEXT NOT NULL,
    expected_state TEXT NOT NULL DEFAULT '{}',
    actual_state   TEXT NOT NULL DEFAULT '{}',
    drifted_fields TEXT NOT NULL DEFAULT '[]',
    is_drifted     INTEGER NOT NULL DEFAULT 0,
    resolution     TEXT NOT NULL DEFAULT 'pending'
);
CREATE INDEX IF NOT EXISTS idx_drifts_stack_id ON drifts(stack_id);
CREATE INDEX IF NOT EXISTS idx_drifts_resource_id ON drifts(resource_id);
CREATE INDEX IF NOT EXISTS idx_drifts_resolution ON drifts(resolution);

CREATE TABLE IF NOT EXISTS tags (
    stack_id TEXT NOT NULL REFERENCES stacks(id) ON DELETE CASCADE,
    tag      TEXT NOT NULL,
    PRIMARY KEY (stack_id, tag)
);

CREATE TABLE IF NOT EXISTS resource_dependencies (
    resource_id    TEXT NOT NULL REFERENCES resources(id) ON DELETE CASCADE,
    depends_on_id  TEXT NOT NULL REFERENCES resources(id) ON DELETE CASCADE,
    dependency_type TEXT NOT NULL DEFAULT 'explicit',
    PRIMARY KEY (resource_id, depends_on_id)
);

CREATE TABLE IF NOT EXISTS activity (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    stack_id      TEXT NOT NULL REFERENCES stacks(id) ON DELETE CASCADE,
    activity_type TEXT NOT NULL,
    resource_id   TEXT,
    details       TEXT NOT NULL DEFAULT '{}',
    user          TEXT NOT NULL DEFAULT '',
    created_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_activity_stack_id ON activity(stack_id);
CREATE INDEX IF NOT EXISTS idx_activity_created_at ON activity(created_at);

CREATE TABLE IF NOT EXISTS events (
    id         TEXT PRIMARY KEY,
    event_type TEXT NOT NULL,
    timestamp  TEXT NOT NULL,
    source     TEXT NOT NULL,
    stack_id   TEXT NOT NULL REFERENCES stacks(id) ON DELETE CASCADE,
    stack_name TEXT NOT NULL,
    data       TEXT NOT NULL DEFAULT '{}',
    severity   TEXT NOT NULL DEFAULT 'info'
);
CREATE INDEX IF NOT EXISTS idx_events_stack_id ON events(stack_id);
CREATE INDEX IF NOT EXISTS idx_events_type ON events(event_type);
CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);
CREATE INDEX IF NOT EXISTS idx_events_severity ON events(severity);
"#;

pub const SECRETS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS secrets (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    stack_id        TEXT NOT NULL,
    name            TEXT NOT NULL,
    encrypted_value TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    UNIQUE(stack_id, name)
);
"#;
