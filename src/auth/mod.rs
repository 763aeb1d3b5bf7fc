pub mod handlers;
pub mod session;

use crate::error::{AppError, AppResult};

/// Hash a password for storage.
pub fn hash_password(password: &str) -> AppResult<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {e}")))
}

/// Verify a plaintext password against a stored hash. Constant-time via bcrypt;
/// a malformed hash verifies as false rather than erroring.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_roundtrip() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
    }

    #[test]
    fn hashes_are_salted() {
        let h1 = hash_password("hunter2").unwrap();
        let h2 = hash_password("hunter2").unwrap();
        assert_ne!(h1, h2);
        assert!(verify_password("hunter2", &h1));
        assert!(verify_password("hunter2", &h2));
    }

    #[test]
    fn malformed_hash_verifies_false() {
        assert!(!verify_password("hunter2", "not-a-bcrypt-hash"));
    }
}
