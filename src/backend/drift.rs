use std::collections::BTreeSet;

use chrono::Utc;
use rusqlite::{Row, params};
use serde_json::Value;

use crate::error::Result;
use crate::jsonmap::{JsonMap, from_column, to_column};
use crate::model::{DriftRecord, DriftResolution};

use super::StateBackend;

fn stringify(value: Option<&Value>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "null".to_string(),
    }
}

/// Computes the set of field names that differ between `expected` and
/// `actual`.
///
/// This is the field-drift check: the union of keys present in either
/// map, keeping any key whose string-coerced value differs (or is
/// present on only one side). The string-coercion is preserved
/// verbatim from the documented legacy semantics rather than a
/// type-aware deep-equality check, and is isolated here as a single
/// pure helper so the comparison strategy can be swapped later without
/// touching call sites.
pub fn diff_drifted_fields(expected: &JsonMap, actual: &JsonMap) -> Vec<String> {
    let mut keys: BTreeSet<&String> = BTreeSet::new();
    keys.extend(expected.keys());
    keys.extend(actual.keys());

    let mut drifted: Vec<String> = keys
        .into_iter()
        .filter(|key| stringify(expected.get(*key)) != stringify(actual.get(*key)))
        .cloned()
        .collect();
    drifted.sort();
    drifted
}

fn row_to_drift(row: &Row) -> rusqlite::Result<DriftRecord> {
    let detected_at: String = row.get("detected_at")?;
    let drifted_fields: String = row.get("drifted_fields")?;
    let drifted_fields: Vec<String> = match serde_json::from_str::<Value>(&drifted_fields) {
        Ok(Value::Array(items)) => items.into_iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        _ => Vec::new(),
    };
    let resolution: String = row.get("resolution")?;
    Ok(DriftRecord {
        id: row.get("id")?,
        stack_id: row.get("stack_id")?,
        resource_id: row.get("resource_id")?,
        detected_at: detected_at.parse().unwrap_or_else(|_| Utc::now()),
        expected_state: from_column(&row.get::<_, String>("expected_state")?),
        actual_state: from_column(&row.get::<_, String>("actual_state")?),
        drifted_fields,
        is_drifted: row.get::<_, i64>("is_drifted")? != 0,
        resolution: DriftResolution::parse(&resolution).unwrap_or(DriftResolution::Pending),
    })
}

impl StateBackend {
    /// Always inserts a new drift row (drift detection is append-only,
    /// not upsert). Appends a `drift_detected` activity entry when the
    /// resource is found to be drifted.
    pub fn detect_drift(
        &self,
        stack_id: &str,
        resource_id: &str,
        expected: &JsonMap,
        actual: &JsonMap,
    ) -> Result<DriftRecord> {
        let drifted_fields = diff_drifted_fields(expected, actual);
        let is_drifted = !drifted_fields.is_empty();
        let detected_at = Utc::now();

        let id = {
            let conn = self.repo.store().write()?;
            conn.execute(
                "INSERT INTO drifts (stack_id, resource_id, detected_at, expected_state, \
                 actual_state, drifted_fields, is_drifted, resolution) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending')",
                params![
                    stack_id,
                    resource_id,
                    detected_at.to_rfc3339(),
                    to_column(expected),
                    to_column(actual),
                    serde_json::to_string(&drifted_fields)?,
                    is_drifted as i64,
                ],
            )?;
            conn.last_insert_rowid()
        };

        if is_drifted {
            self.log_activity(
                stack_id,
                "drift_detected",
                Some(resource_id),
                &format!("drifted fields: {}", drifted_fields.join(", ")),
                "system",
            )?;
        }

        Ok(DriftRecord {
            id,
            stack_id: stack_id.to_string(),
            resource_id: resource_id.to_string(),
            detected_at,
            expected_state: expected.clone(),
            actual_state: actual.clone(),
            drifted_fields,
            is_drifted,
            resolution: DriftResolution::Pending,
        })
    }

    /// Returns up to 100 newest drift rows for a stack.
    pub fn get_drift_info(&self, stack_id: &str) -> Result<Vec<DriftRecord>> {
        let conn = self.repo.store().read()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM drifts WHERE stack_id = ?1 ORDER BY detected_at DESC LIMIT 100",
        )?;
        let rows = stmt.query_map(params![stack_id], row_to_drift)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn set_drift_resolution(&self, drift_id: i64, resolution: DriftResolution) -> Result<()> {
        let conn = self.repo.store().write()?;
        conn.execute(
            "UPDATE drifts SET resolution = ?1 WHERE id = ?2",
            params![resolution.as_str(), drift_id],
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
    use serde_json::json;
    use std::sync::Arc;

    fn backend() -> StateBackend {
        let repo = Arc::new(StackRepository::new(Arc::new(Store::open_in_memory().unwrap())));
        repo.create_stack(&Stack::new("s1", "alpha")).unwrap();
        repo.create_resource(&Resource::new("r1", "s1", "t", "n")).unwrap();
        StateBackend::new(repo)
    }

    #[test]
    fn no_drift_when_equal_s3() {
        let backend = backend();
        let mut expected = JsonMap::new();
        expected.insert("k".into(), json!("value"));
        let actual = expected.clone();

        let drift = backend.detect_drift("s1", "r1", &expected, &actual).unwrap();
        assert!(!drift.is_drifted);
        assert!(drift.drifted_fields.is_empty());
    }

    #[test]
    fn drift_detected_with_union_of_fields_s3() {
        let backend = backend();
        let mut expected = JsonMap::new();
        expected.insert("k".into(), json!("value"));
        let mut actual = JsonMap::new();
        actual.insert("k".into(), json!("other"));
        actual.insert("extra".into(), json!("x"));

        let drift = backend.detect_drift("s1", "r1", &expected, &actual).unwrap();
        assert!(drift.is_drifted);
        assert!(drift.drifted_fields.contains(&"k".to_string()));
        assert!(drift.drifted_fields.contains(&"extra".to_string()));

        let history = backend.get_drift_info("s1").unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].is_drifted);
    }
}
