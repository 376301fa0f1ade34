/// Password hashing and verification
///
/// Argon2id with a fresh random salt per call, PHC string output.
/// Plaintext never leaves this module and is never logged.
use crate::error::{BlogError, BlogResult};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 32;

/// Hash a plaintext password
pub fn hash_password(password: &str) -> BlogResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| BlogError::Internal(format!("Failed to hash password: {}", e)))
}

/// Verify a candidate against a stored hash. Malformed hashes never match.
pub fn verify_password(hash: &str, candidate: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Password policy applied before hashing: 8-32 chars, no whitespace
pub fn check_password_policy(password: &str) -> BlogResult<()> {
    if password.chars().any(char::is_whitespace) {
        return Err(BlogError::Validation("Invalid password".to_string()));
    }

    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(BlogError::Validation(format!(
            "Password must be between {} and {} characters",
            MIN_PASSWORD_LEN, MAX_PASSWORD_LEN
        )));
    }

    Ok(())
}
