use sha2::{Digest, Sha256};

/// SHA-256 of the password as lowercase hex, the only form ever sent over the wire
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}
