use chrono::Utc;
use rusqlite::{Row, params};
use serde_json::{Value, json};

use crate::error::Result;
use crate::model::ActivityEntry;

use super::StateBackend;

fn row_to_activity(row: &Row) -> rusqlite::Result<ActivityEntry> {
    let created_at: String = row.get("created_at")?;
    let details: String = row.get("details")?;
    Ok(ActivityEntry {
        id: row.get("id")?,
        stack_id: row.get("stack_id")?,
        activity_type: row.get("activity_type")?,
        resource_id: row.get("resource_id")?,
        details: serde_json::from_str(&details).unwrap_or(Value::Null),
        user: row.get("user")?,
        created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
    })
}

impl StateBackend {
    /// Appends an activity row with `details` wrapped as
    /// `{"message": details}`. Best-effort: failures here must never
    /// fail the caller's primary operation, so callers should log and
    /// swallow the error rather than propagate it (see the public
    /// operations in `snapshots`/`rollback`/`drift`/`locks`, which all
    /// call this directly inside their own write path since it runs
    /// under the same transaction-free semantics as everything else
    /// here).
    pub(crate) fn log_activity(
        &self,
        stack_id: &str,
        activity_type: &str,
        resource_id: Option<&str>,
        details: &str,
        user: &str,
    ) -> Result<()> {
        let conn = self.repo.store().write()?;
        conn.execute(
            "INSERT INTO activity (stack_id, activity_type, resource_id, details, user, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                stack_id,
                activity_type,
                resource_id,
                json!({ "message": details }).to_string(),
                user,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Same as [`Self::log_activity`] but stores an arbitrary JSON
    /// value instead of wrapping a string message — used by the
    /// migrator (`migrated_action`) and remediation (`webhook_failed`)
    /// to record richer structured detail than a single string.
    pub(crate) fn log_activity_value(
        &self,
        stack_id: &str,
        activity_type: &str,
        resource_id: Option<&str>,
        details: Value,
        user: &str,
    ) -> Result<()> {
        let conn = self.repo.store().write()?;
        conn.execute(
            "INSERT INTO activity (stack_id, activity_type, resource_id, details, user, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                stack_id,
                activity_type,
                resource_id,
                details.to_string(),
                user,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Returns the `limit` most recent activity entries for a stack.
    pub fn get_activity(&self, stack_id: &str, limit: i64) -> Result<Vec<ActivityEntry>> {
        let conn = self.repo.store().read()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM activity WHERE stack_id = ?1 ORDER BY created_at DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![stack_id, limit], row_to_activity)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }
}
