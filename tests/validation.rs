/// Integration tests for state validation (C6).
///
/// Run with: cargo test --test validation

use std::sync::Arc;
use std::time::Duration;

use sloth_state::model::{Resource, Stack};
use sloth_state::{EventBus, StackRepository, StateBackend, StateTracker, Store};

#[tokio::test]
async fn orphaned_dependency_and_missing_name_are_reported_s6() {
    let repo = StackRepository::new(Arc::new(Store::open_in_memory().unwrap()));
    let eps = Stack::new("eps", "");
    repo.create_stack(&eps).unwrap();

    let mut resource_a = Resource::new("A", "eps", "t", "A");
    resource_a.dependencies = vec!["Z".to_string()];
    repo.create_resource(&resource_a).unwrap();

    let backend = Arc::new(StateBackend::new(Arc::new(repo)));
    let events = Arc::new(EventBus::new(100, Duration::from_secs(5)));
    let tracker = StateTracker::new(backend, events.clone());

    let (valid, issues) = tracker.validate_state("eps").await.unwrap();
    assert!(!valid);
    assert!(issues.iter().any(|i| i == "resource A has orphaned dependency: Z"));
    assert!(issues.iter().any(|i| i == "stack has no name"));

    let recent = events.events_by_stack("eps", 10).unwrap();
    let failure = recent
        .iter()
        .find(|e| e.event_type == "validation.failed")
        .expect("validation.failed event was emitted");
    assert_eq!(failure.severity.as_str(), "error");
}
