/// Integration tests for snapshot/rollback (C4).
///
/// Run with: cargo test --test snapshot_rollback

use std::sync::Arc;

use sloth_state::model::{Stack, StackStatus, reserved_keys};
use sloth_state::{StackRepository, StateBackend, Store};

fn backend() -> StateBackend {
    let repo = StackRepository::new(Arc::new(Store::open_in_memory().unwrap()));
    StateBackend::new(Arc::new(repo))
}

#[test]
fn snapshot_then_update_then_rollback_s1() {
    let backend = backend();
    let mut alpha = Stack::new("alpha", "alpha");
    alpha.version = "1.0.0".into();
    backend.repository().create_stack(&alpha).unwrap();

    let v1 = backend.create_snapshot("alpha", "u", "initial").unwrap();
    assert_eq!(v1, 1);

    let mut updated = backend.repository().get_stack("alpha").unwrap().unwrap();
    updated.status = StackStatus::Running;
    backend.repository().update_stack(&updated).unwrap();

    let v2 = backend.create_snapshot("alpha", "u", "after update").unwrap();
    assert_eq!(v2, 2);

    backend.rollback_to_snapshot("alpha", 1, "u").unwrap();

    let rolled_back = backend.repository().get_stack("alpha").unwrap().unwrap();
    assert_eq!(rolled_back.status, StackStatus::RolledBack);
    assert_eq!(
        rolled_back.metadata.get(reserved_keys::ROLLBACK_TO_VERSION).unwrap(),
        "1"
    );

    let snapshots = backend.list_snapshots("alpha").unwrap();
    assert_eq!(snapshots.len(), 3);
    let backup = snapshots.iter().find(|s| s.version == 3).unwrap();
    assert_eq!(backup.description, "Pre-rollback backup from v1");
}

#[test]
fn rollback_to_missing_version_is_not_found() {
    let backend = backend();
    backend.repository().create_stack(&Stack::new("s1", "alpha")).unwrap();
    let err = backend.rollback_to_snapshot("s1", 99, "u").unwrap_err();
    assert!(matches!(err, sloth_state::StateError::NotFound(_)));
}
