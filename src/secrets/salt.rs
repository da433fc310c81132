use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use serde_json::json;

use crate::crypto;
use crate::error::{Result, StateError};
use crate::model::reserved_keys;
use crate::repository::StackRepository;

/// Bridges C7 (Secrets) and C3 (Stack Repository): resolves the
/// per-stack encryption salt, generating and persisting one on first
/// use so it becomes a durable attribute of the stack rather than an
/// out-of-band secret the caller has to remember.
pub fn get_or_create_salt(repo: &StackRepository, stack_id: &str) -> Result<Vec<u8>> {
    let mut stack = repo
        .get_stack(stack_id)?
        .ok_or_else(|| StateError::NotFound(format!("stack '{stack_id}'")))?;

    if let Some(encoded) = stack.metadata.get(reserved_keys::ENCRYPTION_SALT).and_then(|v| v.as_str()) {
        return Ok(B64.decode(encoded)?);
    }

    let salt = crypto::generate_salt();
    stack
        .metadata
        .insert(reserved_keys::ENCRYPTION_SALT.to_string(), json!(B64.encode(salt)));
    repo.update_stack(&stack)?;
    Ok(salt.to_vec())
}
