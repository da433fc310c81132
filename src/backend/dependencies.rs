use rusqlite::params;

use crate::error::{Result, StateError};
use crate::model::DependencyType;

use super::StateBackend;

impl StateBackend {
    pub fn add_dependency(
        &self,
        resource_id: &str,
        depends_on_id: &str,
        dependency_type: DependencyType,
    ) -> Result<()> {
        let conn = self.repo.store().write()?;
        conn.execute(
            "INSERT OR IGNORE INTO resource_dependencies (resource_id, depends_on_id, dependency_type) \
             VALUES (?1, ?2, ?3)",
            params![resource_id, depends_on_id, dependency_type.as_str()],
        )?;
        Ok(())
    }

    pub fn remove_dependency(&self, resource_id: &str, depends_on_id: &str) -> Result<()> {
        let conn = self.repo.store().write()?;
        let affected = conn.execute(
            "DELETE FROM resource_dependencies WHERE resource_id = ?1 AND depends_on_id = ?2",
            params![resource_id, depends_on_id],
        )?;
        if affected == 0 {
            return Err(StateError::NotFound(format!(
                "dependency {resource_id} -> {depends_on_id}"
            )));
        }
        Ok(())
    }

    /// Returns `(depends_on_id, dependency_type)` pairs for a resource.
    pub fn list_dependencies(&self, resource_id: &str) -> Result<Vec<(String, DependencyType)>> {
        let conn = self.repo.store().read()?;
        let mut stmt = conn.prepare(
            "SELECT depends_on_id, dependency_type FROM resource_dependencies WHERE resource_id = ?1",
        )?;
        let rows = stmt.query_map(params![resource_id], |row| {
            let id: String = row.get(0)?;
            let kind: String = row.get(1)?;
            Ok((id, DependencyType::parse(&kind).unwrap_or(DependencyType::Explicit)))
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Resource, Stack};
    use crate::repository::StackRepository;
    use crate::store::Store;
    use std::sync::Arc;

    #[test]
    fn idempotent_and_not_found() {
        let repo = Arc::new(StackRepository::new(Arc::new(Store::open_in_memory().unwrap())));
        repo.create_stack(&Stack::new("s1", "alpha")).unwrap();
        repo.create_resource(&Resource::new("r1", "s1", "t", "n")).unwrap();
        repo.create_resource(&Resource::new("r2", "s1", "t", "n")).unwrap();
        let backend = StateBackend::new(repo);

        backend.add_dependency("r1", "r2", DependencyType::Explicit).unwrap();
        backend.add_dependency("r1", "r2", DependencyType::Explicit).unwrap();
        assert_eq!(backend.list_dependencies("r1").unwrap().len(), 1);

        backend.remove_dependency("r1", "r2").unwrap();
        let err = backend.remove_dependency("r1", "r2").unwrap_err();
        assert!(matches!(err, StateError::NotFound(_)));
    }
}
