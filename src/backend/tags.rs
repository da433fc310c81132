use rusqlite::params;

use crate::error::{Result, StateError};

use super::StateBackend;

impl StateBackend {
    /// Idempotent insert — tagging a stack twice with the same tag is
    /// a no-op.
    pub fn add_tag(&self, stack_id: &str, tag: &str) -> Result<()> {
        let conn = self.repo.store().write()?;
        conn.execute(
            "INSERT OR IGNORE INTO tags (stack_id, tag) VALUES (?1, ?2)",
            params![stack_id, tag],
        )?;
        Ok(())
    }

    pub fn remove_tag(&self, stack_id: &str, tag: &str) -> Result<()> {
        let conn = self.repo.store().write()?;
        let affected = conn.execute(
            "DELETE FROM tags WHERE stack_id = ?1 AND tag = ?2",
            params![stack_id, tag],
        )?;
        if affected == 0 {
            return Err(StateError::NotFound(format!("tag '{tag}' on stack '{stack_id}'")));
        }
        Ok(())
    }

    pub fn list_tags(&self, stack_id: &str) -> Result<Vec<String>> {
        let conn = self.repo.store().read()?;
        let mut stmt = conn.prepare("SELECT tag FROM tags WHERE stack_id = ?1 ORDER BY tag")?;
        let rows = stmt.query_map(params![stack_id], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<Vec<String>>>().map_err(Into::into)
    }
}
