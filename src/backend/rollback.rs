use serde_json::json;

use crate::error::Result;
use crate::model::{StackStatus, reserved_keys};

use super::StateBackend;

impl StateBackend {
    /// Rolls a stack back to a prior snapshot version.
    ///
    /// 1. Load the target snapshot.
    /// 2. Take an automatic backup snapshot of the *current* state,
    ///    described `"Pre-rollback backup from v{version}"`.
    /// 3. Set the stack's status to `rolled_back` and record
    ///    `rollback_from_version`/`rollback_to_version` in its
    ///    metadata.
    /// 4. Delete every resource currently on the stack and recreate
    ///    them verbatim from the snapshot — no reconciliation is
    ///    attempted.
    pub fn rollback_to_snapshot(
        &self,
        stack_id: &str,
        version: i64,
        performer: &str,
    ) -> Result<()> {
        let target = self.get_snapshot(stack_id, version)?;

        // Step 2 happens before any mutation so the backup reflects
        // the pre-rollback state. This nested call acquires its own
        // store guard; we hold none here.
        let backup_description = format!("Pre-rollback backup from v{version}");
        let backup_version = self.create_snapshot(stack_id, performer, &backup_description)?;

        let mut stack = self
            .repo
            .get_stack(stack_id)?
            .ok_or_else(|| crate::error::StateError::NotFound(format!("stack '{stack_id}'")))?;
        stack.status = StackStatus::RolledBack;
        stack.metadata.insert(
            reserved_keys::ROLLBACK_FROM_VERSION.to_string(),
            json!(backup_version.to_string()),
        );
        stack.metadata.insert(
            reserved_keys::ROLLBACK_TO_VERSION.to_string(),
            json!(version.to_string()),
        );
        self.repo.update_stack(&stack)?;

        self.repo.delete_resources_for_stack(stack_id)?;
        for resource in &target.data.resources {
            self.repo.create_resource(resource)?;
        }

        self.log_activity(
            stack_id,
            "rollback",
            None,
            &format!("rolled back to v{version}"),
            performer,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Resource, Stack};
    use crate::repository::StackRepository;
    use crate::store::Store;
    use std::sync::Arc;

    fn backend() -> StateBackend {
        let repo = Arc::new(StackRepository::new(Arc::new(Store::open_in_memory().unwrap())));
        let mut stack = Stack::new("s1", "alpha");
        stack.version = "1.0.0".into();
        repo.create_stack(&stack).unwrap();
        StateBackend::new(repo)
    }

    #[test]
    fn rollback_restores_state_and_adds_backup_snapshot() {
        let backend = backend();
        backend
            .repo
            .create_resource(&Resource::new("r1", "s1", "t", "n"))
            .unwrap();
        assert_eq!(backend.create_snapshot("s1", "u", "v1").unwrap(), 1);

        let mut stack = backend.repo.get_stack("s1").unwrap().unwrap();
        stack.status = StackStatus::Completed;
        backend.repo.update_stack(&stack).unwrap();
        backend.repo.delete_resource("r1").unwrap();
        assert_eq!(backend.create_snapshot("s1", "u", "v2").unwrap(), 2);

        backend.rollback_to_snapshot("s1", 1, "performer").unwrap();

        let rolled_back = backend.repo.get_stack("s1").unwrap().unwrap();
        assert_eq!(rolled_back.status, StackStatus::RolledBack);
        assert_eq!(
            rolled_back.metadata.get(reserved_keys::ROLLBACK_TO_VERSION).unwrap(),
            "1"
        );

        let resources = backend.repo.list_resources("s1").unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].id, "r1");

        let snaps = backend.list_snapshots("s1").unwrap();
        assert_eq!(snaps.len(), 3);
        assert_eq!(snaps[0].description, "Pre-rollback backup from v1");
    }
}
