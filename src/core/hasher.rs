//! Password digests.
//!
//! Stored credentials are compared digest-to-digest; the raw password never
//! reaches the database.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest of `password`.
pub fn hash(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}
