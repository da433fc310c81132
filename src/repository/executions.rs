use chrono::Utc;
use rusqlite::{Row, params};
use uuid::Uuid;

use crate::error::Result;
use crate::jsonmap::{from_column, to_column};
use crate::model::Execution;

use super::StackRepository;

fn row_to_execution(row: &Row) -> rusqlite::Result<Execution> {
    let started_at: String = row.get("started_at")?;
    let completed_at: Option<String> = row.get("completed_at")?;
    Ok(Execution {
        id: row.get("id")?,
        stack_id: row.get("stack_id")?,
        started_at: started_at.parse().unwrap_or_else(|_| Utc::now()),
        completed_at: completed_at.and_then(|s| s.parse().ok()),
        duration_ms: row.get("duration_ms")?,
        status: row.get("status")?,
        task_count: row.get("task_count")?,
        success_count: row.get("success_count")?,
        failure_count: row.get("failure_count")?,
        outputs: from_column(&row.get::<_, String>("outputs")?),
        error: row.get("error")?,
    })
}

impl StackRepository {
    /// Appends an execution record. Executions are immutable once
    /// written — there is no update operation.
    pub fn record_execution(&self, stack_id: &str, exec: &Execution) -> Result<Execution> {
        let conn = self.store.write()?;
        let id = if exec.id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            exec.id.clone()
        };
        conn.execute(
            "INSERT INTO executions (id, stack_id, started_at, completed_at, duration_ms, \
             status, task_count, success_count, failure_count, outputs, error) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                id,
                stack_id,
                exec.started_at.to_rfc3339(),
                exec.completed_at.map(|t| t.to_rfc3339()),
                exec.duration_ms,
                exec.status,
                exec.task_count,
                exec.success_count,
                exec.failure_count,
                to_column(&exec.outputs),
                exec.error,
            ],
        )?;
        let mut stored = exec.clone();
        stored.id = id;
        stored.stack_id = stack_id.to_string();
        Ok(stored)
    }

    /// Returns the `limit` most recent executions for a stack, newest
    /// first.
    pub fn get_stack_executions(&self, stack_id: &str, limit: i64) -> Result<Vec<Execution>> {
        let conn = self.store.read()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM executions WHERE stack_id = ?1 ORDER BY started_at DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![stack_id, limit], row_to_execution)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Stack;
    use crate::store::Store;
    use std::sync::Arc;

    #[test]
    fn records_and_lists_newest_first() {
        let repo = StackRepository::new(Arc::new(Store::open_in_memory().unwrap()));
        repo.create_stack(&Stack::new("s1", "alpha")).unwrap();

        let mut e1 = Execution {
            id: String::new(),
            stack_id: "s1".into(),
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            status: "running".into(),
            task_count: 3,
            success_count: 0,
            failure_count: 0,
            outputs: Default::default(),
            error: None,
        };
        repo.record_execution("s1", &e1).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        e1.started_at = Utc::now();
        e1.status = "completed".into();
        repo.record_execution("s1", &e1).unwrap();

        let execs = repo.get_stack_executions("s1", 10).unwrap();
        assert_eq!(execs.len(), 2);
        assert_eq!(execs[0].status, "completed");
    }
}
