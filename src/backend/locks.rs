use chrono::{Duration as ChronoDuration, Utc};
use rusqlite::{Row, params};

use crate::error::{Result, StateError};
use crate::jsonmap::from_column;
use crate::model::Lock;

use super::StateBackend;

fn row_to_lock(row: &Row) -> rusqlite::Result<Lock> {
    let created_at: String = row.get("created_at")?;
    let expires_at: String = row.get("expires_at")?;
    Ok(Lock {
        stack_id: row.get("stack_id")?,
        lock_id: row.get("lock_id")?,
        operation: row.get("operation")?,
        who: row.get("who")?,
        created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
        expires_at: expires_at.parse().unwrap_or_else(|_| Utc::now()),
        info: from_column(&row.get::<_, String>("info")?),
    })
}

impl StateBackend {
    /// Acquires an exclusive lease on a stack. If an unexpired lock
    /// already exists, fails with `AlreadyLocked{who}`. Otherwise the
    /// row is upserted (overwriting any expired lease) with
    /// `expires_at = now + duration`.
    pub fn lock_state(
        &self,
        stack_id: &str,
        lock_id: &str,
        operation: &str,
        who: &str,
        duration: std::time::Duration,
    ) -> Result<()> {
        let now = Utc::now();
        let conn = self.repo.store().write()?;
        let existing: Option<(String, String)> = conn
            .query_row(
                "SELECT who, expires_at FROM locks WHERE stack_id = ?1",
                params![stack_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .ok();

        if let Some((existing_who, expires_at)) = &existing {
            let expires_at: chrono::DateTime<Utc> = expires_at.parse().unwrap_or_else(|_| now);
            if expires_at > now {
                return Err(StateError::AlreadyLocked {
                    who: existing_who.clone(),
                });
            }
        }

        let expires_at = now + ChronoDuration::from_std(duration).unwrap_or(ChronoDuration::hours(1));
        conn.execute(
            "INSERT INTO locks (stack_id, lock_id, operation, who, created_at, expires_at, info) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, '{}') \
             ON CONFLICT(stack_id) DO UPDATE SET \
             lock_id = excluded.lock_id, operation = excluded.operation, who = excluded.who, \
             created_at = excluded.created_at, expires_at = excluded.expires_at, info = excluded.info",
            params![
                stack_id,
                lock_id,
                operation,
                who,
                now.to_rfc3339(),
                expires_at.to_rfc3339(),
            ],
        )?;
        drop(conn);

        self.log_activity(stack_id, "lock", None, &format!("locked by {who} for {operation}"), who)?;
        Ok(())
    }

    /// Releases a lock, matching on `(stack_id, lock_id)`. Fails with
    /// `LockNotFound` if no row matched.
    pub fn unlock_state(&self, stack_id: &str, lock_id: &str) -> Result<()> {
        let conn = self.repo.store().write()?;
        let affected = conn.execute(
            "DELETE FROM locks WHERE stack_id = ?1 AND lock_id = ?2",
            params![stack_id, lock_id],
        )?;
        if affected == 0 {
            return Err(StateError::LockNotFound);
        }
        Ok(())
    }

    /// Deletes the lock on a stack unconditionally, regardless of
    /// which lock ID holds it.
    ///
    /// Open Question 2 (spec §9): the documented fallback of matching
    /// a literal `"force-unlock"` lock ID always fails once the
    /// `(stack_id, lock_id)` pair is enforced, so this implementation
    /// takes the recommended option (a) instead — delete by
    /// `stack_id` alone.
    pub fn force_unlock_state(&self, stack_id: &str) -> Result<()> {
        let conn = self.repo.store().write()?;
        let affected = conn.execute("DELETE FROM locks WHERE stack_id = ?1", params![stack_id])?;
        if affected == 0 {
            return Err(StateError::LockNotFound);
        }
        Ok(())
    }

    /// Returns the lock on a stack, or `None` if absent or expired.
    /// Expiration is interpreted at read time — there is no background
    /// reaper.
    pub fn get_lock_info(&self, stack_id: &str) -> Result<Option<Lock>> {
        let conn = self.repo.store().read()?;
        let mut stmt = conn.prepare("SELECT * FROM locks WHERE stack_id = ?1")?;
        let mut rows = stmt.query(params![stack_id])?;
        match rows.next()? {
            Some(row) => {
                let lock = row_to_lock(row)?;
                if lock.is_expired(Utc::now()) {
                    Ok(None)
                } else {
                    Ok(Some(lock))
                }
            }
            None => Ok(None),
        }
    }

}
