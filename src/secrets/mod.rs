//! Secrets Repository (C7): encrypted per-stack key-value storage in a
//! database file independent of the main store, so its containing
//! directory can be locked down to owner-only permissions.

mod salt;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rusqlite::{Row, params};

use crate::crypto;
use crate::error::{Result, StateError};
use crate::model::Secret;
use crate::store::Store;

pub use salt::get_or_create_salt;

fn row_to_secret(row: &Row) -> rusqlite::Result<Secret> {
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    Ok(Secret {
        id: row.get("id")?,
        stack_id: row.get("stack_id")?,
        name: row.get("name")?,
        encrypted_value: row.get("encrypted_value")?,
        created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
        updated_at: updated_at.parse().unwrap_or_else(|_| Utc::now()),
    })
}

pub struct SecretsRepository {
    store: Arc<Store>,
}

impl SecretsRepository {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Encrypts `value` and upserts it, keyed by `(stack_id, name)`.
    pub fn add_secret(
        &self,
        stack_id: &str,
        name: &str,
        value: &str,
        password: &str,
        salt: &[u8],
    ) -> Result<()> {
        let encrypted = crypto::encrypt(value, password, salt)?;
        let now = Utc::now().to_rfc3339();
        let conn = self.store.write()?;
        conn.execute(
            "INSERT INTO secrets (stack_id, name, encrypted_value, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?4) \
             ON CONFLICT(stack_id, name) DO UPDATE SET \
             encrypted_value = excluded.encrypted_value, updated_at = excluded.updated_at",
            params![stack_id, name, encrypted, now],
        )?;
        Ok(())
    }

    /// Fetches and decrypts a single secret. `DecryptError` propagates
    /// unchanged if the password or salt is wrong.
    pub fn get_secret(&self, stack_id: &str, name: &str, password: &str, salt: &[u8]) -> Result<String> {
        let conn = self.store.read()?;
        let encrypted: String = conn
            .query_row(
                "SELECT encrypted_value FROM secrets WHERE stack_id = ?1 AND name = ?2",
                params![stack_id, name],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    StateError::NotFound(format!("secret '{name}' on stack '{stack_id}'"))
                }
                other => other.into(),
            })?;
        crypto::decrypt(&encrypted, password, salt)
    }

    /// Fetches and decrypts every secret for a stack.
    pub fn get_all_secrets(
        &self,
        stack_id: &str,
        password: &str,
        salt: &[u8],
    ) -> Result<HashMap<String, String>> {
        let rows = self.list_secrets(stack_id)?;
        let mut out = HashMap::with_capacity(rows.len());
        for row in rows {
            let plaintext = crypto::decrypt(&row.encrypted_value, password, salt)?;
            out.insert(row.name, plaintext);
        }
        Ok(out)
    }

    /// Returns every secret row for a stack as-is — ciphertext
    /// included, never decrypted.
    pub fn list_secrets(&self, stack_id: &str) -> Result<Vec<Secret>> {
        let conn = self.store.read()?;
        let mut stmt = conn.prepare("SELECT * FROM secrets WHERE stack_id = ?1 ORDER BY name")?;
        let rows = stmt.query_map(params![stack_id], row_to_secret)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn remove_secret(&self, stack_id: &str, name: &str) -> Result<()> {
        let conn = self.store.write()?;
        let affected = conn.execute(
            "DELETE FROM secrets WHERE stack_id = ?1 AND name = ?2",
            params![stack_id, name],
        )?;
        if affected == 0 {
            return Err(StateError::NotFound(format!("secret '{name}' on stack '{stack_id}'")));
        }
        Ok(())
    }

    pub fn remove_all_secrets(&self, stack_id: &str) -> Result<()> {
        let conn = self.store.write()?;
        conn.execute("DELETE FROM secrets WHERE stack_id = ?1", params![stack_id])?;
        Ok(())
    }

    pub fn has_secrets(&self, stack_id: &str) -> Result<bool> {
        let conn = self.store.read()?;
        let count: i64 = conn.query_row(
            "SELECT count(*) FROM secrets WHERE stack_id = ?1",
            params![stack_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> SecretsRepository {
        SecretsRepository::new(Arc::new(Store::open_secrets_in_memory().unwrap()))
    }

    #[test]
    fn round_trip_and_upsert_s4() {
        let repo = repo();
        let salt = crypto::generate_salt();
        repo.add_secret("s1", "api_key", "sk-abc", "pw", &salt).unwrap();
        assert_eq!(repo.get_secret("s1", "api_key", "pw", &salt).unwrap(), "sk-abc");

        repo.add_secret("s1", "api_key", "sk-def", "pw", &salt).unwrap();
        assert_eq!(repo.get_secret("s1", "api_key", "pw", &salt).unwrap(), "sk-def");
        assert_eq!(repo.list_secrets("s1").unwrap().len(), 1);
    }

    #[test]
    fn wrong_password_is_decrypt_error() {
        let repo = repo();
        let salt = crypto::generate_salt();
        repo.add_secret("s1", "k", "v", "pw", &salt).unwrap();
        let err = repo.get_secret("s1", "k", "wrong", &salt).unwrap_err();
        assert!(matches!(err, StateError::DecryptError));
    }

    #[test]
    fn missing_secret_is_not_found() {
        let repo = repo();
        let err = repo.get_secret("s1", "nope", "pw", &[0u8; 16]).unwrap_err();
        assert!(matches!(err, StateError::NotFound(_)));
    }

    #[test]
    fn list_never_decrypts_and_removal_works() {
        let repo = repo();
        let salt = crypto::generate_salt();
        repo.add_secret("s1", "k1", "v1", "pw", &salt).unwrap();
        repo.add_secret("s1", "k2", "v2", "pw", &salt).unwrap();
        assert!(repo.has_secrets("s1").unwrap());

        let rows = repo.list_secrets("s1").unwrap();
        assert!(rows.iter().all(|r| r.encrypted_value != "v1" && r.encrypted_value != "v2"));

        repo.remove_secret("s1", "k1").unwrap();
        assert_eq!(repo.list_secrets("s1").unwrap().len(), 1);

        repo.remove_all_secrets("s1").unwrap();
        assert!(!repo.has_secrets("s1").unwrap());
    }
}
