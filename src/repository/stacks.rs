use chrono::{DateTime, Utc};
use rusqlite::{Row, params};

use crate::error::{Result, StateError};
use crate::jsonmap::{from_column, to_column};
use crate::model::{Stack, StackStatus};

use super::StackRepository;

fn row_to_stack(row: &Row) -> rusqlite::Result<Stack> {
    let status_str: String = row.get("status")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let completed_at: Option<String> = row.get("completed_at")?;
    Ok(Stack {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        version: row.get("version")?,
        status: StackStatus::parse(&status_str).unwrap_or(StackStatus::Created),
        created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
        updated_at: updated_at.parse().unwrap_or_else(|_| Utc::now()),
        completed_at: completed_at.and_then(|s| s.parse::<DateTime<Utc>>().ok()),
        workflow_file: row.get("workflow_file")?,
        execution_count: row.get("execution_count")?,
        last_duration_ms: row.get("last_duration_ms")?,
        last_error: row.get("last_error")?,
        resource_schema_version: row.get("resource_schema_version")?,
        task_results: from_column(&row.get::<_, String>("task_results")?),
        outputs: from_column(&row.get::<_, String>("outputs")?),
        configuration: from_column(&row.get::<_, String>("configuration")?),
        metadata: from_column(&row.get::<_, String>("metadata")?),
    })
}

impl StackRepository {
    /// Creates a new stack row. Requires a non-empty ID; an empty name
    /// is allowed through (a data-quality issue `ValidateState` surfaces,
    /// not a hard constraint — see spec scenario S6). Fails with
    /// `ConstraintError` on a duplicate ID.
    pub fn create_stack(&self, stack: &Stack) -> Result<()> {
        if stack.id.is_empty() {
            return Err(StateError::ConstraintError("stack id must be non-empty".into()));
        }
        let conn = self.store.write()?;
        let result = conn.execute(
            "INSERT INTO stacks (id, name, description, version, status, created_at, \
             updated_at, completed_at, workflow_file, execution_count, last_duration_ms, \
             last_error, resource_schema_version, task_results, outputs, configuration, metadata) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                stack.id,
                stack.name,
                stack.description,
                stack.version,
                stack.status.as_str(),
                stack.created_at.to_rfc3339(),
                stack.updated_at.to_rfc3339(),
                stack.completed_at.map(|t| t.to_rfc3339()),
                stack.workflow_file,
                stack.execution_count,
                stack.last_duration_ms,
                stack.last_error,
                stack.resource_schema_version,
                to_column(&stack.task_results),
                to_column(&stack.outputs),
                to_column(&stack.configuration),
                to_column(&stack.metadata),
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StateError::ConstraintError(format!(
                    "stack '{}' already exists",
                    stack.id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_stack(&self, id: &str) -> Result<Option<Stack>> {
        let conn = self.store.read()?;
        let mut stmt = conn.prepare("SELECT * FROM stacks WHERE id = ?1")?;
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_stack(row)?)),
            None => Ok(None),
        }
    }

    /// Returns the stack with the given name whose `updated_at` is
    /// most recent — names are unique only up to the latest entry.
    pub fn get_stack_by_name(&self, name: &str) -> Result<Option<Stack>> {
        let conn = self.store.read()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM stacks WHERE name = ?1 ORDER BY updated_at DESC LIMIT 1",
        )?;
        let mut rows = stmt.query(params![name])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_stack(row)?)),
            None => Ok(None),
        }
    }

    pub fn list_stacks(&self) -> Result<Vec<Stack>> {
        let conn = self.store.read()?;
        let mut stmt = conn.prepare("SELECT * FROM stacks ORDER BY updated_at DESC")?;
        let rows = stmt.query_map([], row_to_stack)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Updates a stack, bumping `updated_at` to now. `completed_at` is
    /// only written when the caller has set it on `stack`.
    pub fn update_stack(&self, stack: &Stack) -> Result<()> {
        let conn = self.store.write()?;
        let now = Utc::now();
        let affected = conn.execute(
            "UPDATE stacks SET name = ?1, description = ?2, version = ?3, status = ?4, \
             updated_at = ?5, completed_at = COALESCE(?6, completed_at), workflow_file = ?7, \
             execution_count = ?8, last_duration_ms = ?9, last_error = ?10, \
             resource_schema_version = ?11, task_results = ?12, outputs = ?13, \
             configuration = ?14, metadata = ?15 WHERE id = ?16",
            params![
                stack.name,
                stack.description,
                stack.version,
                stack.status.as_str(),
                now.to_rfc3339(),
                stack.completed_at.map(|t| t.to_rfc3339()),
                stack.workflow_file,
                stack.execution_count,
                stack.last_duration_ms,
                stack.last_error,
                stack.resource_schema_version,
                to_column(&stack.task_results),
                to_column(&stack.outputs),
                to_column(&stack.configuration),
                to_column(&stack.metadata),
                stack.id,
            ],
        )?;
        if affected == 0 {
            return Err(StateError::NotFound(format!("stack '{}'", stack.id)));
        }
        Ok(())
    }

    /// Deletes a stack; `ON DELETE CASCADE` removes every row that
    /// references it.
    pub fn delete_stack(&self, id: &str) -> Result<()> {
        let conn = self.store.write()?;
        let affected = conn.execute("DELETE FROM stacks WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(StateError::NotFound(format!("stack '{id}'")));
        }
        Ok(())
    }
}
