use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, StateError};

const DEFAULT_DB_PATH: &str = "/var/lib/sloth-runner/state.db";
const DEFAULT_SECRETS_DB_PATH: &str = "/var/lib/sloth-runner/secrets.db";
const DB_PATH_ENV_VAR: &str = "SLOTH_RUNNER_DB_PATH";

/// Configuration for the state engine's storage, locking, and event
/// subsystems.
///
/// Mirrors `ConnectionConfig`'s fluent builder shape: fields are public,
/// setters consume and return `Self`, and `validate()` centralizes the
/// sanity checks callers would otherwise have to repeat.
#[derive(Debug, Clone)]
pub struct StateConfig {
    /// Path to the main relational store (stacks, resources, snapshots, …).
    pub db_path: PathBuf,

    /// Path to the secrets store. Kept in a separate file so the
    /// containing directory can be locked down to `0700`.
    pub secrets_db_path: PathBuf,

    /// Default lease duration for `LockState` when the caller doesn't
    /// specify one.
    pub default_lock_duration: Duration,

    /// Capacity of the in-memory event ring buffer.
    pub event_buffer_capacity: usize,

    /// Deadline for a single `Publish` call to finish dispatching to
    /// all handlers of an event type.
    pub event_publish_timeout: Duration,

    /// Number of most-recent snapshots retained by pruning (the
    /// pruning operation itself is a reserved, unimplemented op; this
    /// field exists so the signature is stable once it is wired up).
    pub snapshot_retention: usize,
}

impl StateConfig {
    /// Builds a configuration using `SLOTH_RUNNER_DB_PATH` when set,
    /// falling back to the well-known install-wide location.
    pub fn from_env() -> Self {
        let db_path = std::env::var_os(DB_PATH_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));
        Self {
            db_path,
            ..Self::default()
        }
    }

    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    pub fn secrets_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.secrets_db_path = path.into();
        self
    }

    pub fn default_lock_duration(mut self, duration: Duration) -> Self {
        self.default_lock_duration = duration;
        self
    }

    pub fn event_buffer_capacity(mut self, capacity: usize) -> Self {
        self.event_buffer_capacity = capacity;
        self
    }

    pub fn event_publish_timeout(mut self, timeout: Duration) -> Self {
        self.event_publish_timeout = timeout;
        self
    }

    pub fn snapshot_retention(mut self, retention: usize) -> Self {
        self.snapshot_retention = retention;
        self
    }

    /// Validates the configuration, rejecting the obviously broken
    /// combinations the way `ConnectionConfig::validate` does.
    pub fn validate(&self) -> Result<()> {
        if self.db_path.as_os_str().is_empty() {
            return Err(StateError::ConstraintError("db_path cannot be empty".into()));
        }
        if self.secrets_db_path.as_os_str().is_empty() {
            return Err(StateError::ConstraintError(
                "secrets_db_path cannot be empty".into(),
            ));
        }
        if self.db_path == self.secrets_db_path {
            return Err(StateError::ConstraintError(
                "db_path and secrets_db_path must differ".into(),
            ));
        }
        if self.event_buffer_capacity == 0 {
            return Err(StateError::ConstraintError(
                "event_buffer_capacity must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Ensures the parent directory of `path` exists with the given
    /// unix permissions (`0755` for the main store, `0700` for
    /// secrets). No-op on platforms without unix permission bits.
    pub fn ensure_parent_dir(path: &Path, mode: u32) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let perms = std::fs::Permissions::from_mode(mode);
                    std::fs::set_permissions(parent, perms)?;
                }
            }
        }
        Ok(())
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            secrets_db_path: PathBuf::from(DEFAULT_SECRETS_DB_PATH),
            default_lock_duration: Duration::from_secs(3600),
            event_buffer_capacity: 1000,
            event_publish_timeout: Duration::from_secs(5),
            snapshot_retention: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = StateConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_lock_duration, Duration::from_secs(3600));
        assert_eq!(config.event_buffer_capacity, 1000);
    }

    #[test]
    fn rejects_matching_paths() {
        let config = StateConfig::default().secrets_db_path(DEFAULT_DB_PATH);
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_override_is_respected() {
        unsafe {
            std::env::set_var(DB_PATH_ENV_VAR, "/tmp/sloth-state-test.db");
        }
        let config = StateConfig::from_env();
        assert_eq!(config.db_path, PathBuf::from("/tmp/sloth-state-test.db"));
        unsafe {
            std::env::remove_var(DB_PATH_ENV_VAR);
        }
    }
}
