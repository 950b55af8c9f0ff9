//! API key hashing and generation.
//!
//! Keys are only ever stored as lowercase hex SHA-256 digests; the plaintext
//! is shown once when created.

use aes_gcm::aead::{OsRng, rand_core::RngCore};
use sha2::{Digest, Sha256};

/// Prefix of every generated key, so leaked keys are recognizable.
pub const KEY_PREFIX: &str = "jugo_";

/// SHA-256 hex digest of an API key.
pub fn hash_api_key(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("{:x}", digest)
}

/// Generate a fresh random API key (32 random bytes, hex encoded).
pub fn generate_api_key() -> String {
    let mut key_bytes = [0u8; 32];
    OsRng.fill_bytes(&mut key_bytes);
    format!(
        "{KEY_PREFIX}{}",
        key_bytes.iter().map(|b| format!("{b:02x}")).collect::<String>()
    )
}
