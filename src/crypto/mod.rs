//! Crypto (C2): salt generation, a memory-hard key derivation, and
//! authenticated symmetric encryption for per-stack secrets.
//!
//! The ciphertext encoding is `nonce || ciphertext || tag`, base64
//! encoded. This layout is deterministic so legacy ciphertexts written
//! by an earlier build remain decryptable as long as the KDF
//! parameters below are never changed in place (bump them by
//! introducing a new encoded version byte instead, should that ever be
//! needed — not required by the current spec).

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use argon2::{Argon2, Params, Version};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use rand::RngCore;

use crate::error::{Result, StateError};

pub const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Argon2id parameters chosen so derivation costs tens of milliseconds
/// on commodity hardware: 19 MiB memory, 2 passes, 1 lane (the
/// recommended OWASP "2nd choice" baseline for interactive use).
fn kdf_params() -> Params {
    Params::new(19 * 1024, 2, 1, Some(KEY_LEN)).expect("static argon2 params are valid")
}

/// Generates 16 cryptographically random bytes for a fresh per-stack
/// salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

fn derive_key(password: &str, salt: &[u8]) -> Result<[u8; KEY_LEN]> {
    if salt.len() != SALT_LEN {
        return Err(StateError::BadFormat(format!(
            "salt must be {SALT_LEN} bytes, got {}",
            salt.len()
        )));
    }
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, kdf_params());
    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|e| StateError::Kdf(e.to_string()))?;
    Ok(key)
}

/// Encrypts `plaintext` under a key derived from `password` and
/// `salt`, returning a base64-encoded `nonce || ciphertext || tag`
/// string.
pub fn encrypt(plaintext: &str, password: &str, salt: &[u8]) -> Result<String> {
    let key_bytes = derive_key(password, salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|_| StateError::Internal("encryption failure".into()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(B64.encode(out))
}

/// Decrypts a string produced by [`encrypt`]. Fails with
/// `StateError::DecryptError` if the GCM authentication tag does not
/// verify (wrong password or tampered ciphertext), and
/// `StateError::BadFormat` if the encoding itself is malformed.
pub fn decrypt(encoded: &str, password: &str, salt: &[u8]) -> Result<String> {
    let raw = B64.decode(encoded)?;
    if raw.len() < NONCE_LEN {
        return Err(StateError::BadFormat("ciphertext too short".into()));
    }
    let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);

    let key_bytes = derive_key(password, salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
    let nonce = Nonce::from_slice(nonce_bytes);

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| StateError::DecryptError)?;
    String::from_utf8(plaintext).map_err(|e| StateError::BadFormat(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let salt = generate_salt();
        let ct = encrypt("sk-abc", "pw", &salt).unwrap();
        let pt = decrypt(&ct, "pw", &salt).unwrap();
        assert_eq!(pt, "sk-abc");
    }

    #[test]
    fn wrong_password_fails() {
        let salt = generate_salt();
        let ct = encrypt("sk-abc", "pw", &salt).unwrap();
        let err = decrypt(&ct, "wrong", &salt).unwrap_err();
        assert!(matches!(err, StateError::DecryptError));
    }

    #[test]
    fn bad_salt_length_is_bad_format() {
        let err = encrypt("x", "pw", &[0u8; 4]).unwrap_err();
        assert!(matches!(err, StateError::BadFormat(_)));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let salt = generate_salt();
        let ct = encrypt("sk-abc", "pw", &salt).unwrap();
        let mut raw = B64.decode(&ct).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        let tampered = B64.encode(raw);
        let err = decrypt(&tampered, "pw", &salt).unwrap_err();
        assert!(matches!(err, StateError::DecryptError));
    }
}
