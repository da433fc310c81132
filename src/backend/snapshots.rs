use chrono::Utc;
use rusqlite::params;

use crate::checksum::checksum;
use crate::error::{Result, StateError};
use crate::model::{Snapshot, StackSnapshot};

use super::StateBackend;

impl StateBackend {
    /// Captures the stack and its resources at this instant. Versions
    /// are scoped per-stack, start at 1, and increase by exactly 1 per
    /// successful call — the read-modify-insert happens under the
    /// store's single write guard so two concurrent callers can never
    /// receive the same version.
    pub fn create_snapshot(
        &self,
        stack_id: &str,
        creator: &str,
        description: &str,
    ) -> Result<i64> {
        let stack = self
            .repo
            .get_stack(stack_id)?
            .ok_or_else(|| StateError::NotFound(format!("stack '{stack_id}'")))?;
        let resources = self.repo.list_resources(stack_id)?;
        let data = StackSnapshot { stack, resources };
        let payload = serde_json::to_string(&data)?;
        let sum = checksum(payload.as_bytes());

        let version = {
            let conn = self.repo.store().write()?;
            let current_max: Option<i64> = conn.query_row(
                "SELECT MAX(version) FROM snapshots WHERE stack_id = ?1",
                params![stack_id],
                |row| row.get(0),
            )?;
            let version = current_max.unwrap_or(0) + 1;
            conn.execute(
                "INSERT INTO snapshots (stack_id, version, checksum, creator, description, \
                 created_at, data) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    stack_id,
                    version,
                    sum,
                    creator,
                    description,
                    Utc::now().to_rfc3339(),
                    payload,
                ],
            )?;
            version
        };

        self.log_activity(stack_id, "snapshot", None, &format!("created snapshot v{version}"), creator)?;
        Ok(version)
    }

    pub fn get_snapshot(&self, stack_id: &str, version: i64) -> Result<Snapshot> {
        let conn = self.repo.store().read()?;
        conn.query_row(
            "SELECT * FROM snapshots WHERE stack_id = ?1 AND version = ?2",
            params![stack_id, version],
            row_to_snapshot,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                StateError::NotFound(format!("snapshot {stack_id}@v{version}"))
            }
            other => other.into(),
        })
    }

    /// Returns all snapshots for a stack, descending by version.
    pub fn list_snapshots(&self, stack_id: &str) -> Result<Vec<Snapshot>> {
        let conn = self.repo.store().read()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM snapshots WHERE stack_id = ?1 ORDER BY version DESC",
        )?;
        let rows = stmt.query_map(params![stack_id], row_to_snapshot)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Reserved operation: deletion of individual snapshots via
    /// retention pruning. Not yet wired up — see spec Open Question 1.
    pub fn delete_snapshot(&self, _stack_id: &str, _version: i64) -> Result<()> {
        Err(StateError::Unimplemented("delete_snapshot".into()))
    }
}

fn row_to_snapshot(row: &rusqlite::Row) -> rusqlite::Result<Snapshot> {
    let created_at: String = row.get("created_at")?;
    let data: String = row.get("data")?;
    Ok(Snapshot {
        stack_id: row.get("stack_id")?,
        version: row.get("version")?,
        checksum: row.get("checksum")?,
        creator: row.get("creator")?,
        description: row.get("description")?,
        created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
        data: serde_json::from_str(&data).unwrap_or_else(|_| StackSnapshot {
            stack: crate::model::Stack::new("", ""),
            resources: Vec::new(),
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Stack;
    use crate::repository::StackRepository;
    use crate::store::Store;
    use std::sync::Arc;

    fn backend() -> StateBackend {
        let repo = Arc::new(StackRepository::new(Arc::new(Store::open_in_memory().unwrap())));
        repo.create_stack(&Stack::new("s1", "alpha")).unwrap();
        StateBackend::new(repo)
    }

    #[test]
    fn versions_start_at_one_and_increment() {
        let backend = backend();
        assert_eq!(backend.create_snapshot("s1", "u", "first").unwrap(), 1);
        assert_eq!(backend.create_snapshot("s1", "u", "second").unwrap(), 2);
        let snaps = backend.list_snapshots("s1").unwrap();
        assert_eq!(snaps.len(), 2);
        assert_eq!(snaps[0].version, 2);
        assert_eq!(snaps[1].version, 1);
    }

    #[test]
    fn get_missing_snapshot_is_not_found() {
        let backend = backend();
        let err = backend.get_snapshot("s1", 99).unwrap_err();
        assert!(matches!(err, StateError::NotFound(_)));
    }
}
