use chrono::{DateTime, Utc};

use crate::error::Result;

use super::operations::{Operation, OperationStatus, OperationType};
use super::StateTracker;

/// Filter criteria for [`StateTracker::search_operations`]. Every field
/// is optional; an absent field matches everything.
#[derive(Debug, Clone, Default)]
pub struct OperationCriteria {
    pub op_type: Option<OperationType>,
    pub status: Option<OperationStatus>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

impl StateTracker {
    /// Iterates every synthetic operation stack (the fixed allow-list
    /// of seven category names plus `general-operations`) and returns
    /// every tracked operation matching `criteria`. Stacks that were
    /// never materialized (no operation of that category has run yet)
    /// are silently skipped.
    pub fn search_operations(&self, criteria: &OperationCriteria) -> Result<Vec<Operation>> {
        let repo = self.backend.repository();
        let mut matches = Vec::new();

        for stack_name in OperationType::all_synthetic_stacks() {
            if repo.get_stack(stack_name)?.is_none() {
                continue;
            }
            for resource in repo.list_resources(stack_name)? {
                let op = Operation::from_resource(&resource);

                if let Some(want_type) = &criteria.op_type {
                    if op.op_type.as_str() != want_type.as_str() {
                        continue;
                    }
                }
                if let Some(want_status) = criteria.status {
                    if op.status != want_status {
                        continue;
                    }
                }
                if let Some(from) = criteria.date_from {
                    if op.started_at.map(|t| t < from).unwrap_or(true) {
                        continue;
                    }
                }
                if let Some(to) = criteria.date_to {
                    if op.started_at.map(|t| t > to).unwrap_or(false) {
                        continue;
                    }
                }
                matches.push(op);
            }
        }

        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StateBackend;
    use crate::events::EventBus;
    use crate::repository::StackRepository;
    use crate::store::Store;
    use std::sync::Arc;
    use std::time::Duration;

    fn tracker() -> StateTracker {
        let repo = Arc::new(StackRepository::new(Arc::new(Store::open_in_memory().unwrap())));
        let backend = Arc::new(StateBackend::new(repo));
        let events = Arc::new(EventBus::new(100, Duration::from_secs(5)));
        StateTracker::new(backend, events)
    }

    #[tokio::test]
    async fn finds_tracked_operations_by_type_and_status() {
        let tracker = tracker();
        let mut op = Operation::new(OperationType::WorkflowExecution, "wf-1");
        op.performer = "ci".into();
        tracker.track_operation(op.clone()).await.unwrap();

        let mut agent_op = Operation::new(OperationType::AgentRegistration, "agent-1");
        agent_op.status = OperationStatus::Completed;
        agent_op.performer = "ci".into();
        tracker.track_operation(agent_op).await.unwrap();

        let found = tracker
            .search_operations(&OperationCriteria {
                op_type: Some(OperationType::WorkflowExecution),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].resource_id, "wf-1");

        let completed = tracker
            .search_operations(&OperationCriteria {
                status: Some(OperationStatus::Completed),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].resource_id, "agent-1");
    }

    #[tokio::test]
    async fn missing_stacks_are_skipped_without_error() {
        let tracker = tracker();
        let found = tracker.search_operations(&OperationCriteria::default()).unwrap();
        assert!(found.is_empty());
    }
}
