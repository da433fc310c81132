use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::jsonmap::JsonMap;
use crate::model::Resource;

/// The closed enumeration of operation types, grouped into seven
/// synthetic stacks plus a catch-all `general-operations` bucket. The
/// engine's specification names the bucket list explicitly but leaves
/// the exact op-type strings within each bucket open; this is the
/// implementation's choice of one canonical, "well-known" op type per
/// bucket (used by `GetAllOperationStats`) plus room for arbitrary
/// op-type strings via `General`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    WorkflowExecution,
    AgentRegistration,
    AgentUpdate,
    SchedulerEnable,
    SecretOperation,
    HookOperation,
    SlothOperation,
    Deployment,
    Backup,
    General(String),
}

impl OperationType {
    pub fn as_str(&self) -> &str {
        match self {
            OperationType::WorkflowExecution => "workflow_execution",
            OperationType::AgentRegistration => "agent_registration",
            OperationType::AgentUpdate => "agent_update",
            OperationType::SchedulerEnable => "scheduler_enable",
            OperationType::SecretOperation => "secret_operation",
            OperationType::HookOperation => "hook_operation",
            OperationType::SlothOperation => "sloth_operation",
            OperationType::Deployment => "deployment",
            OperationType::Backup => "backup",
            OperationType::General(s) => s.as_str(),
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "workflow_execution" => OperationType::WorkflowExecution,
            "agent_registration" => OperationType::AgentRegistration,
            "agent_update" => OperationType::AgentUpdate,
            "scheduler_enable" => OperationType::SchedulerEnable,
            "secret_operation" => OperationType::SecretOperation,
            "hook_operation" => OperationType::HookOperation,
            "sloth_operation" => OperationType::SlothOperation,
            "deployment" => OperationType::Deployment,
            "backup" => OperationType::Backup,
            other => OperationType::General(other.to_string()),
        }
    }

    /// The name of the synthetic stack an operation of this type is
    /// materialized under.
    pub fn synthetic_stack(&self) -> &'static str {
        match self {
            OperationType::WorkflowExecution => "workflow-executions",
            OperationType::AgentRegistration | OperationType::AgentUpdate => "agent-operations",
            OperationType::SchedulerEnable => "scheduler-operations",
            OperationType::SecretOperation => "secret-operations",
            OperationType::HookOperation => "hook-operations",
            OperationType::SlothOperation => "sloth-operations",
            OperationType::Deployment | OperationType::Backup => "sysadmin-operations",
            OperationType::General(_) => "general-operations",
        }
    }

    /// Whether this op type is in the "important" set: a `completed`
    /// or `failed` outcome for these triggers an automatic snapshot.
    pub fn is_important(&self) -> bool {
        matches!(
            self,
            OperationType::WorkflowExecution
                | OperationType::AgentRegistration
                | OperationType::AgentUpdate
                | OperationType::SchedulerEnable
                | OperationType::Deployment
                | OperationType::Backup
        )
    }

    /// The 8 well-known op types `GetAllOperationStats` aggregates
    /// over: one representative per synthetic stack.
    pub fn well_known() -> Vec<OperationType> {
        vec![
            OperationType::WorkflowExecution,
            OperationType::AgentRegistration,
            OperationType::SchedulerEnable,
            OperationType::SecretOperation,
            OperationType::HookOperation,
            OperationType::SlothOperation,
            OperationType::Deployment,
            OperationType::General("general".to_string()),
        ]
    }

    /// The fixed allow-list of synthetic operation stack names that
    /// `SearchOperations` iterates.
    pub fn all_synthetic_stacks() -> &'static [&'static str] {
        &[
            "workflow-executions",
            "agent-operations",
            "scheduler-operations",
            "secret-operations",
            "hook-operations",
            "sloth-operations",
            "sysadmin-operations",
            "general-operations",
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Running => "running",
            OperationStatus::Completed => "completed",
            OperationStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => OperationStatus::Pending,
            "running" => OperationStatus::Running,
            "completed" => OperationStatus::Completed,
            "failed" => OperationStatus::Failed,
            _ => return None,
        })
    }
}

/// A tracked unit of external work, materialized as a synthetic
/// `Resource` in a synthetic operation-category `Stack`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub id: String,
    pub op_type: OperationType,
    pub resource_id: String,
    pub status: OperationStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub metadata: JsonMap,
    pub error: Option<String>,
    pub performer: String,
}

impl Operation {
    pub fn new(op_type: OperationType, resource_id: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            op_type,
            resource_id: resource_id.into(),
            status: OperationStatus::Pending,
            started_at: None,
            completed_at: None,
            duration_ms: None,
            metadata: JsonMap::new(),
            error: None,
            performer: String::new(),
        }
    }

    /// Flattens this operation's fields into the `properties` map of
    /// the synthetic resource that materializes it.
    pub fn to_properties(&self) -> JsonMap {
        let mut props = JsonMap::new();
        props.insert("op_id".into(), json!(self.id));
        props.insert("op_type".into(), json!(self.op_type.as_str()));
        props.insert("status".into(), json!(self.status.as_str()));
        props.insert("started_at".into(), json!(self.started_at.map(|t| t.to_rfc3339())));
        props.insert("completed_at".into(), json!(self.completed_at.map(|t| t.to_rfc3339())));
        props.insert("duration_ms".into(), json!(self.duration_ms));
        props.insert("metadata".into(), Value::Object(self.metadata.clone()));
        props.insert("error".into(), json!(self.error));
        props.insert("performer".into(), json!(self.performer));
        props
    }

    /// Reconstructs an operation from the synthetic resource that
    /// materializes it. Missing/malformed fields fall back to
    /// reasonable defaults rather than erroring — this mirrors the
    /// forward-compatible `JsonMap` column handling used everywhere
    /// else in this crate.
    pub fn from_resource(resource: &Resource) -> Self {
        let props = &resource.properties;
        let started_at = props
            .get("started_at")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<DateTime<Utc>>().ok());
        let completed_at = props
            .get("completed_at")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<DateTime<Utc>>().ok());
        let duration_ms = props.get("duration_ms").and_then(Value::as_i64);
        let metadata = props
            .get("metadata")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let error = props.get("error").and_then(Value::as_str).map(str::to_string);
        let performer = props
            .get("performer")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let status = props
            .get("status")
            .and_then(Value::as_str)
            .and_then(OperationStatus::parse)
            .unwrap_or(OperationStatus::Pending);

        Self {
            id: resource.id.clone(),
            op_type: OperationType::parse(&resource.r#type),
            resource_id: resource.name.clone(),
            status,
            started_at,
            completed_at,
            duration_ms,
            metadata,
            error,
            performer,
        }
    }
}
