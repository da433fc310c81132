use thiserror::Error;

/// Error kinds produced by the unified stack state engine.
///
/// Mirrors the error-kind taxonomy in the engine's specification:
/// relational lookups, the lock protocol, the crypto layer, the
/// resource graph, and remediation each surface a dedicated variant so
/// callers can match on outcome rather than parse a message string.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("constraint violation: {0}")]
    ConstraintError(String),

    #[error("stack is locked by {who}")]
    AlreadyLocked { who: String },

    #[error("lock not found")]
    LockNotFound,

    #[error("circular dependency at resource {node}")]
    CircularDependency { node: String },

    #[error("decryption failed: wrong password or tampered ciphertext")]
    DecryptError,

    #[error("bad format: {0}")]
    BadFormat(String),

    #[error("no completed snapshot available for rollback remediation")]
    NoGoodSnapshot,

    #[error("migration error: {0}")]
    MigrationError(String),

    #[error("operation timed out")]
    Timeout,

    #[error("{0} event handler(s) returned an error")]
    HandlerErrors(usize),

    #[error("reserved but not yet implemented: {0}")]
    Unimplemented(String),

    #[error("key derivation failed: {0}")]
    Kdf(String),

    #[error("sql error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, StateError>;

impl<T> From<std::sync::PoisonError<T>> for StateError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("poisoned lock: {err}"))
    }
}

impl From<base64::DecodeError> for StateError {
    fn from(err: base64::DecodeError) -> Self {
        Self::BadFormat(format!("base64: {err}"))
    }
}
