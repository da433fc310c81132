use chrono::Utc;
use rusqlite::{Row, params};
use serde_json::Value;

use crate::error::{Result, StateError};
use crate::jsonmap::{from_column, to_column};
use crate::model::Resource;

use super::StackRepository;

fn row_to_resource(row: &Row) -> rusqlite::Result<Resource> {
    let dependencies: String = row.get("dependencies")?;
    let dependencies: Vec<String> = match serde_json::from_str::<Value>(&dependencies) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let last_applied_at: Option<String> = row.get("last_applied_at")?;
    Ok(Resource {
        id: row.get("id")?,
        stack_id: row.get("stack_id")?,
        r#type: row.get("type")?,
        name: row.get("name")?,
        module: row.get("module")?,
        properties: from_column(&row.get::<_, String>("properties")?),
        dependencies,
        state: row.get("state")?,
        checksum: row.get("checksum")?,
        created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
        updated_at: updated_at.parse().unwrap_or_else(|_| Utc::now()),
        last_applied_at: last_applied_at.and_then(|s| s.parse().ok()),
        error: row.get("error")?,
        metadata: from_column(&row.get::<_, String>("metadata")?),
    })
}

impl StackRepository {
    pub fn create_resource(&self, resource: &Resource) -> Result<()> {
        let conn = self.store.write()?;
        let deps = Value::Array(resource.dependencies.iter().cloned().map(Value::from).collect());
        let result = conn.execute(
            "INSERT INTO resources (id, stack_id, type, name, module, properties, dependencies, \
             state, checksum, created_at, updated_at, last_applied_at, error, metadata) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                resource.id,
                resource.stack_id,
                resource.r#type,
                resource.name,
                resource.module,
                to_column(&resource.properties),
                deps.to_string(),
                resource.state,
                resource.checksum,
                resource.created_at.to_rfc3339(),
                resource.updated_at.to_rfc3339(),
                resource.last_applied_at.map(|t| t.to_rfc3339()),
                resource.error,
                to_column(&resource.metadata),
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StateError::ConstraintError(format!(
                    "resource '{}' already exists or references a missing stack",
                    resource.id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_resource(&self, id: &str) -> Result<Option<Resource>> {
        let conn = self.store.read()?;
        let mut stmt = conn.prepare("SELECT * FROM resources WHERE id = ?1")?;
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_resource(row)?)),
            None => Ok(None),
        }
    }

    pub fn list_resources(&self, stack_id: &str) -> Result<Vec<Resource>> {
        let conn = self.store.read()?;
        let mut stmt = conn.prepare("SELECT * FROM resources WHERE stack_id = ?1 ORDER BY created_at")?;
        let rows = stmt.query_map(params![stack_id], row_to_resource)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn update_resource(&self, resource: &Resource) -> Result<()> {
        let conn = self.store.write()?;
        let deps = Value::Array(resource.dependencies.iter().cloned().map(Value::from).collect());
        let affected = conn.execute(
            "UPDATE resources SET type = ?1, name = ?2, module = ?3, properties = ?4, \
             dependencies = ?5, state = ?6, checksum = ?7, updated_at = ?8, \
             last_applied_at = ?9, error = ?10, metadata = ?11 WHERE id = ?12",
            params![
                resource.r#type,
                resource.name,
                resource.module,
                to_column(&resource.properties),
                deps.to_string(),
                resource.state,
                resource.checksum,
                Utc::now().to_rfc3339(),
                resource.last_applied_at.map(|t| t.to_rfc3339()),
                resource.error,
                to_column(&resource.metadata),
                resource.id,
            ],
        )?;
        if affected == 0 {
            return Err(StateError::NotFound(format!("resource '{}'", resource.id)));
        }
        Ok(())
    }

    pub fn delete_resource(&self, id: &str) -> Result<()> {
        let conn = self.store.write()?;
        let affected = conn.execute("DELETE FROM resources WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(StateError::NotFound(format!("resource '{id}'")));
        }
        Ok(())
    }

    /// Deletes every resource belonging to a stack. Used by
    /// `RollbackToSnapshot`'s total rebuild.
    pub fn delete_resources_for_stack(&self, stack_id: &str) -> Result<()> {
        let conn = self.store.write()?;
        conn.execute("DELETE FROM resources WHERE stack_id = ?1", params![stack_id])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Stack;
    use crate::store::Store;
    use std::sync::Arc;

    fn repo() -> StackRepository {
        let repo = StackRepository::new(Arc::new(Store::open_in_memory().unwrap()));
        repo.create_stack(&Stack::new("s1", "alpha")).unwrap();
        repo
    }

    #[test]
    fn create_get_update_delete() {
        let repo = repo();
        let mut resource = Resource::new("r1", "s1", "aws_instance", "web");
        resource.dependencies = vec!["r0".to_string()];
        repo.create_resource(&resource).unwrap();

        let fetched = repo.get_resource("r1").unwrap().unwrap();
        assert_eq!(fetched.dependencies, vec!["r0".to_string()]);

        let mut updated = fetched;
        updated.state = "applied".into();
        repo.update_resource(&updated).unwrap();
        assert_eq!(repo.get_resource("r1").unwrap().unwrap().state, "applied");

        repo.delete_resource("r1").unwrap();
        assert!(repo.get_resource("r1").unwrap().is_none());
    }

    #[test]
    fn orphaned_stack_reference_is_rejected() {
        let repo = repo();
        let resource = Resource::new("r1", "no-such-stack", "t", "n");
        let err = repo.create_resource(&resource).unwrap_err();
        assert!(matches!(err, StateError::ConstraintError(_)));
    }

    #[test]
    fn cascade_delete_removes_resources() {
        let repo = repo();
        repo.create_resource(&Resource::new("r1", "s1", "t", "n")).unwrap();
        repo.delete_stack("s1").unwrap();
        assert!(repo.get_resource("r1").unwrap().is_none());
    }
}
