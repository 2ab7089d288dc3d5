//! Argon2id password hashing with PHC strings.

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use rand::rngs::OsRng;

use super::UserError;

/// Reject passwords that may not be stored.
///
/// # Errors
/// Returns [`UserError::InvalidPassword`] for an empty or blank password.
pub fn validate(password: &str) -> Result<(), UserError> {
    if password.trim().is_empty() {
        return Err(UserError::InvalidPassword(
            "password must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// # Errors
/// Returns [`UserError::Hash`] if hashing fails.
pub fn hash(password: &str) -> Result<String, UserError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| UserError::Hash(e.to_string()))
}

/// Returns `false` for a wrong password or an unparsable hash.
#[must_use]
pub fn verify(password: &str, hashed_password: &str) -> bool {
    PasswordHash::new(hashed_password).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// [`hash`] on the blocking thread pool.
///
/// # Errors
/// Returns [`UserError::Hash`] if hashing fails or the task is cancelled.
pub async fn hash_blocking(password: &str) -> Result<String, UserError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash(&password))
        .await
        .map_err(|e| UserError::Hash(e.to_string()))?
}

/// [`verify`] on the blocking thread pool. A cancelled task counts as a
/// mismatch.
pub async fn verify_blocking(password: &str, hashed_password: &str) -> bool {
    let password = password.to_string();
    let hashed_password = hashed_password.to_string();
    tokio::task::spawn_blocking(move || verify(&password, &hashed_password))
        .await
        .unwrap_or(false)
}
