use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::operations::{Operation, OperationStatus, OperationType};
use super::StateTracker;

/// Aggregate counts for one operation type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperationStats {
    pub total: i64,
    pub completed: i64,
    pub failed: i64,
    pub running: i64,
    pub pending: i64,
    /// Total count bucketed by the UTC calendar date (`YYYY-MM-DD`) the
    /// operation started on.
    pub by_date: HashMap<String, i64>,
}

impl OperationStats {
    fn record(&mut self, op: &Operation) {
        self.total += 1;
        match op.status {
            OperationStatus::Completed => self.completed += 1,
            OperationStatus::Failed => self.failed += 1,
            OperationStatus::Running => self.running += 1,
            OperationStatus::Pending => self.pending += 1,
        }
        if let Some(started) = op.started_at {
            *self.by_date.entry(started.format("%Y-%m-%d").to_string()).or_insert(0) += 1;
        }
    }
}

impl StateTracker {
    /// Counts operations of a single type, scoped to that type's
    /// synthetic stack. Returns an empty (all-zero) stats block if the
    /// stack was never materialized.
    pub fn get_operation_stats(&self, op_type: &OperationType) -> Result<OperationStats> {
        let repo = self.backend.repository();
        let stack_name = op_type.synthetic_stack();
        if repo.get_stack(stack_name)?.is_none() {
            return Ok(OperationStats::default());
        }
        let mut stats = OperationStats::default();
        for resource in repo.list_resources(stack_name)? {
            if resource.r#type != op_type.as_str() {
                continue;
            }
            stats.record(&Operation::from_resource(&resource));
        }
        Ok(stats)
    }

    /// Aggregates over the 8 well-known operation types (one
    /// representative per synthetic stack bucket), silently skipping
    /// any bucket whose stack hasn't been materialized yet.
    pub fn get_all_operation_stats(&self) -> Result<HashMap<String, OperationStats>> {
        let mut all = HashMap::new();
        for op_type in OperationType::well_known() {
            let stats = self.get_operation_stats(&op_type)?;
            if stats.total > 0 {
                all.insert(op_type.as_str().to_string(), stats);
            }
        }
        Ok(all)
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
    async fn counts_by_status_for_a_single_type() {
        let tracker = tracker();
        let mut completed = Operation::new(OperationType::WorkflowExecution, "wf-1");
        completed.status = OperationStatus::Completed;
        completed.performer = "ci".into();
        tracker.track_operation(completed).await.unwrap();

        let mut failed = Operation::new(OperationType::WorkflowExecution, "wf-2");
        failed.status = OperationStatus::Failed;
        failed.performer = "ci".into();
        tracker.track_operation(failed).await.unwrap();

        let stats = tracker.get_operation_stats(&OperationType::WorkflowExecution).unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn all_stats_skips_untouched_buckets() {
        let tracker = tracker();
        let mut op = Operation::new(OperationType::HookOperation, "h-1");
        op.performer = "ci".into();
        tracker.track_operation(op).await.unwrap();

        let all = tracker.get_all_operation_stats().unwrap();
        assert_eq!(all.len(), 1);
        assert!(all.contains_key("hook_operation"));
    }
}
