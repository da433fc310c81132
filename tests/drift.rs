/// Integration tests for drift detection (C4).
///
/// Run with: cargo test --test drift

use std::sync::Arc;

use serde_json::Value;
use sloth_state::jsonmap::JsonMap;
use sloth_state::model::Stack;
use sloth_state::{StackRepository, StateBackend, Store};

fn backend() -> StateBackend {
    let repo = StackRepository::new(Arc::new(Store::open_in_memory().unwrap()));
    repo.create_stack(&Stack::new("s1", "alpha")).unwrap();
    repo.create_resource(&sloth_state::model::Resource::new("r1", "s1", "t", "n"))
        .unwrap();
    StateBackend::new(Arc::new(repo))
}

#[test]
fn matching_state_then_drifted_state_s3() {
    let backend = backend();

    let mut expected = JsonMap::new();
    expected.insert("k".into(), Value::from("value"));
    let mut actual = expected.clone();
    let unchanged = backend.detect_drift("s1", "r1", &expected, &actual).unwrap();
    assert!(!unchanged.is_drifted);
    assert!(unchanged.drifted_fields.is_empty());

    actual.insert("k".into(), Value::from("other"));
    actual.insert("extra".into(), Value::from("x"));
    let drifted = backend.detect_drift("s1", "r1", &expected, &actual).unwrap();
    assert!(drifted.is_drifted);
    assert!(drifted.drifted_fields.contains(&"k".to_string()));
    assert!(drifted.drifted_fields.contains(&"extra".to_string()));

    let info = backend.get_drift_info("s1").unwrap();
    assert_eq!(info.len(), 2);
}

#[test]
fn get_drift_info_caps_at_100_rows() {
    let backend = backend();
    let expected = JsonMap::new();
    for i in 0..120 {
        let mut actual = JsonMap::new();
        actual.insert("n".into(), Value::from(i));
        backend.detect_drift("s1", "r1", &expected, &actual).unwrap();
    }
    let info = backend.get_drift_info("s1").unwrap();
    assert_eq!(info.len(), 100);
}
