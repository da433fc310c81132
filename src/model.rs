//! Data model: the entities enumerated in the engine's specification.
//!
//! Every free-form attribute (task results, outputs, configuration,
//! metadata, resource properties, drift expected/actual state) is kept
//! as a `serde_json::Value`/`JsonMap` rather than a typed struct — see
//! [`crate::jsonmap`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::jsonmap::JsonMap;

/// Reserved metadata keys. Kept verbatim snake_case for compatibility
/// with already-persisted stacks.
pub mod reserved_keys {
    pub const ENCRYPTION_SALT: &str = "encryption_salt";
    pub const ROLLBACK_FROM_VERSION: &str = "rollback_from_version";
    pub const ROLLBACK_TO_VERSION: &str = "rollback_to_version";
    pub const OPERATION_CATEGORY: &str = "operation_category";
    pub const MANAGED_BY: &str = "managed_by";
    pub const MIGRATED_ACTION: &str = "migrated_action";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackStatus {
    Created,
    Running,
    Completed,
    Failed,
    RolledBack,
}

impl StackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StackStatus::Created => "created",
            StackStatus::Running => "running",
            StackStatus::Completed => "completed",
            StackStatus::Failed => "failed",
            StackStatus::RolledBack => "rolled_back",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "created" => StackStatus::Created,
            "running" => StackStatus::Running,
            "completed" => StackStatus::Completed,
            "failed" => StackStatus::Failed,
            "rolled_back" => StackStatus::RolledBack,
            _ => return None,
        })
    }
}

impl std::fmt::Display for StackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftResolution {
    Pending,
    Resolved,
    Ignored,
}

impl DriftResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriftResolution::Pending => "pending",
            DriftResolution::Resolved => "resolved",
            DriftResolution::Ignored => "ignored",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => DriftResolution::Pending,
            "resolved" => DriftResolution::Resolved,
            "ignored" => DriftResolution::Ignored,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    Explicit,
    Implicit,
}

impl DependencyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyType::Explicit => "explicit",
            DependencyType::Implicit => "implicit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "explicit" => DependencyType::Explicit,
            "implicit" => DependencyType::Implicit,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stack {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub status: StackStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub workflow_file: String,
    pub execution_count: i64,
    pub last_duration_ms: Option<i64>,
    pub last_error: Option<String>,
    pub resource_schema_version: String,
    pub task_results: JsonMap,
    pub outputs: JsonMap,
    pub configuration: JsonMap,
    pub metadata: JsonMap,
}

impl Stack {
    /// Constructs a new stack with the required defaults: status
    /// `created`, resource-schema version `"1"`, timestamps stamped to
    /// now.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            version: String::new(),
            status: StackStatus::Created,
            created_at: now,
            updated_at: now,
            completed_at: None,
            workflow_file: String::new(),
            execution_count: 0,
            last_duration_ms: None,
            last_error: None,
            resource_schema_version: "1".to_string(),
            task_results: JsonMap::new(),
            outputs: JsonMap::new(),
            configuration: JsonMap::new(),
            metadata: JsonMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub stack_id: String,
    pub r#type: String,
    pub name: String,
    pub module: String,
    pub properties: JsonMap,
    pub dependencies: Vec<String>,
    pub state: String,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_applied_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub metadata: JsonMap,
}

impl Resource {
    pub fn new(
        id: impl Into<String>,
        stack_id: impl Into<String>,
        r#type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            stack_id: stack_id.into(),
            r#type: r#type.into(),
            name: name.into(),
            module: String::new(),
            properties: JsonMap::new(),
            dependencies: Vec::new(),
            state: String::new(),
            checksum: String::new(),
            created_at: now,
            updated_at: now,
            last_applied_at: None,
            error: None,
            metadata: JsonMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub stack_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub status: String,
    pub task_count: i64,
    pub success_count: i64,
    pub failure_count: i64,
    pub outputs: JsonMap,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackSnapshot {
    pub stack: Stack,
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub stack_id: String,
    pub version: i64,
    pub checksum: String,
    pub creator: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub data: StackSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lock {
    pub stack_id: String,
    pub lock_id: String,
    pub operation: String,
    pub who: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub info: JsonMap,
}

impl Lock {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftRecord {
    pub id: i64,
    pub stack_id: String,
    pub resource_id: String,
    pub detected_at: DateTime<Utc>,
    pub expected_state: JsonMap,
    pub actual_state: JsonMap,
    pub drifted_fields: Vec<String>,
    pub is_drifted: bool,
    pub resolution: DriftResolution,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: i64,
    pub stack_id: String,
    pub activity_type: String,
    pub resource_id: Option<String>,
    pub details: Value,
    pub user: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateEvent {
    pub id: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub stack_id: String,
    pub stack_name: String,
    pub data: Value,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Secret {
    pub id: i64,
    pub stack_id: String,
    pub name: String,
    pub encrypted_value: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
