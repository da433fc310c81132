//! State Tracker (C6): the public façade. Owns a State Backend and an
//! Event Bus, models external operations as synthetic resources inside
//! seven category stacks (plus a catch-all), and wraps the backend's
//! core mutations so every successful call also emits the matching
//! event.
//!
//! Grounded in `rustmemodb::facade::database`'s role as the top-level
//! type that owns a repository plus whatever auxiliary subsystems
//! (here: the event bus) the rest of the crate shouldn't have to wire
//! up themselves.

pub mod operations;
mod search;
mod stats;
mod validation;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use crate::backend::StateBackend;
use crate::error::{Result, StateError};
use crate::events::{EventBus, EventType};
use crate::jsonmap::JsonMap;
use crate::model::{DriftRecord, Resource, Severity, Stack, reserved_keys};

pub use operations::{Operation, OperationStatus, OperationType};
pub use search::OperationCriteria;
pub use stats::OperationStats;

pub struct StateTracker {
    backend: Arc<StateBackend>,
    events: Arc<EventBus>,
}

impl StateTracker {
    pub fn new(backend: Arc<StateBackend>, events: Arc<EventBus>) -> Self {
        Self { backend, events }
    }

    pub fn backend(&self) -> &Arc<StateBackend> {
        &self.backend
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    fn get_or_create_operation_stack(&self, stack_name: &str) -> Result<()> {
        let repo = self.backend.repository();
        if repo.get_stack(stack_name)?.is_some() {
            return Ok(());
        }
        let mut stack = Stack::new(stack_name, stack_name);
        stack.description = format!("Stack for {stack_name} operations");
        stack
            .metadata
            .insert(reserved_keys::OPERATION_CATEGORY.to_string(), json!(stack_name));
        stack
            .metadata
            .insert(reserved_keys::MANAGED_BY.to_string(), json!("state_tracker"));
        match repo.create_stack(&stack) {
            Ok(()) => Ok(()),
            Err(StateError::ConstraintError(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn stack_name_of(&self, stack_id: &str) -> Result<String> {
        Ok(self
            .backend
            .repository()
            .get_stack(stack_id)?
            .map(|s| s.name)
            .unwrap_or_default())
    }

    /// `TrackOperation`: resolves the synthetic stack, materializes the
    /// operation as a resource in it (creating or updating as needed),
    /// and — if the op type is in the important set and reached a
    /// terminal status — takes a snapshot describing the operation.
    pub async fn track_operation(&self, mut op: Operation) -> Result<Operation> {
        let stack_name = op.op_type.synthetic_stack();
        self.get_or_create_operation_stack(stack_name)?;

        if op.id.is_empty() {
            op.id = Uuid::new_v4().to_string();
        }
        if op.started_at.is_none() {
            op.started_at = Some(chrono::Utc::now());
        }
        if matches!(op.status, OperationStatus::Completed | OperationStatus::Failed)
            && op.completed_at.is_none()
        {
            let now = chrono::Utc::now();
            op.completed_at = Some(now);
            if op.duration_ms.is_none() {
                op.duration_ms = op
                    .started_at
                    .map(|started| (now - started).num_milliseconds().max(0));
            }
        }

        let repo = self.backend.repository();
        let properties = op.to_properties();
        match repo.get_resource(&op.id)? {
            Some(mut resource) => {
                resource.properties = properties;
                resource.state = op.status.as_str().to_string();
                resource.r#type = op.op_type.as_str().to_string();
                resource.name = op.resource_id.clone();
                repo.update_resource(&resource)?;
            }
            None => {
                let mut resource =
                    Resource::new(&op.id, stack_name, op.op_type.as_str(), &op.resource_id);
                resource.properties = properties;
                resource.state = op.status.as_str().to_string();
                repo.create_resource(&resource)?;
            }
        }

        if op.op_type.is_important()
            && matches!(op.status, OperationStatus::Completed | OperationStatus::Failed)
        {
            let description = format!(
                "Operation {} ({}) {}",
                op.id,
                op.op_type.as_str(),
                op.status.as_str()
            );
            self.backend.create_snapshot(stack_name, &op.performer, &description)?;
        }

        Ok(op)
    }

    /// `TrackOperationWithEvents`: emits `operation.started` before
    /// calling [`Self::track_operation`], then `operation.completed` or
    /// `operation.failed` after, depending on the tracked operation's
    /// final status.
    pub async fn track_operation_with_events(&self, op: Operation) -> Result<Operation> {
        let stack_name = op.op_type.synthetic_stack().to_string();
        self.events
            .publish(
                EventType::OperationStarted,
                "tracker",
                &stack_name,
                &stack_name,
                json!({ "op_id": op.id, "op_type": op.op_type.as_str() }),
                Severity::Info,
            )
            .await?;

        let tracked = self.track_operation(op).await?;

        let (event_type, severity) = match tracked.status {
            OperationStatus::Failed => (EventType::OperationFailed, Severity::Error),
            _ => (EventType::OperationCompleted, Severity::Info),
        };
        self.events
            .publish(
                event_type,
                "tracker",
                &stack_name,
                &stack_name,
                json!({ "op_id": tracked.id, "status": tracked.status.as_str() }),
                severity,
            )
            .await?;

        Ok(tracked)
    }

    pub async fn create_snapshot_with_event(
        &self,
        stack_id: &str,
        creator: &str,
        description: &str,
    ) -> Result<i64> {
        let version = self.backend.create_snapshot(stack_id, creator, description)?;
        let stack_name = self.stack_name_of(stack_id)?;
        self.events
            .publish(
                EventType::SnapshotCreated,
                "tracker",
                stack_id,
                &stack_name,
                json!({ "version": version, "description": description }),
                Severity::Info,
            )
            .await?;
        Ok(version)
    }

    pub async fn rollback_to_snapshot_with_event(
        &self,
        stack_id: &str,
        version: i64,
        performer: &str,
    ) -> Result<()> {
        self.backend.rollback_to_snapshot(stack_id, version, performer)?;
        let stack_name = self.stack_name_of(stack_id)?;
        self.events
            .publish(
                EventType::SnapshotRestored,
                "tracker",
                stack_id,
                &stack_name,
                json!({ "version": version, "performer": performer }),
                Severity::Warning,
            )
            .await?;
        Ok(())
    }

    pub async fn lock_state_with_event(
        &self,
        stack_id: &str,
        lock_id: &str,
        operation: &str,
        who: &str,
        duration: Duration,
    ) -> Result<()> {
        self.backend.lock_state(stack_id, lock_id, operation, who, duration)?;
        let stack_name = self.stack_name_of(stack_id)?;
        self.events
            .publish(
                EventType::StateLocked,
                "tracker",
                stack_id,
                &stack_name,
                json!({ "lock_id": lock_id, "operation": operation, "who": who }),
                Severity::Info,
            )
            .await?;
        Ok(())
    }

    pub async fn unlock_state_with_event(&self, stack_id: &str, lock_id: &str) -> Result<()> {
        self.backend.unlock_state(stack_id, lock_id)?;
        let stack_name = self.stack_name_of(stack_id)?;
        self.events
            .publish(
                EventType::StateUnlocked,
                "tracker",
                stack_id,
                &stack_name,
                json!({ "lock_id": lock_id }),
                Severity::Info,
            )
            .await?;
        Ok(())
    }

    pub async fn force_unlock_state_with_event(&self, stack_id: &str) -> Result<()> {
        self.backend.force_unlock_state(stack_id)?;
        let stack_name = self.stack_name_of(stack_id)?;
        self.events
            .publish(
                EventType::StateUnlocked,
                "tracker",
                stack_id,
                &stack_name,
                json!({ "forced": true }),
                Severity::Warning,
            )
            .await?;
        Ok(())
    }

    pub async fn detect_drift_with_event(
        &self,
        stack_id: &str,
        resource_id: &str,
        expected: &JsonMap,
        actual: &JsonMap,
    ) -> Result<DriftRecord> {
        let drift = self.backend.detect_drift(stack_id, resource_id, expected, actual)?;
        let stack_name = self.stack_name_of(stack_id)?;
        let severity = if drift.is_drifted { Severity::Warning } else { Severity::Info };
        self.events
            .publish(
                EventType::DriftDetected,
                "tracker",
                stack_id,
                &stack_name,
                json!({
                    "resource_id": resource_id,
                    "is_drifted": drift.is_drifted,
                    "drifted_fields": drift.drifted_fields,
                }),
                severity,
            )
            .await?;
        Ok(drift)
    }
}
