//! HS256 tokens for access, password reset and email verification.
//!
//! The three kinds differ only by audience and signing key. Reset tokens are
//! signed with the reset secret bound to the user's current password hash, so
//! a token stops verifying once the password has changed.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub const AUTH_AUDIENCE: &str = "msdss-users:auth";
pub const RESET_PASSWORD_AUDIENCE: &str = "msdss-users:reset";
pub const VERIFY_AUDIENCE: &str = "msdss-users:verify";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub aud: String,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Claims {
    #[must_use]
    pub fn new(sub: impl Into<String>, aud: &str, lifetime_seconds: u64) -> Self {
        Self {
            sub: sub.into(),
            aud: aud.to_string(),
            exp: now().saturating_add(lifetime_seconds),
            email: None,
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

#[must_use]
pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

/// Signing key for `secret` alone.
#[must_use]
pub fn key(secret: &SecretString) -> Vec<u8> {
    secret.expose_secret().as_bytes().to_vec()
}

/// Signing key for `secret` bound to `binding`.
#[must_use]
pub fn bound_key(secret: &SecretString, binding: &str) -> Vec<u8> {
    let mut key = key(secret);
    key.push(b':');
    key.extend_from_slice(binding.as_bytes());
    key
}

/// # Errors
/// Returns an error if the claims cannot be encoded.
pub fn issue(claims: &Claims, key: &[u8]) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(key),
    )
}

/// Verify signature, expiry and audience.
///
/// # Errors
/// Returns an error if the token is malformed, expired, signed with another
/// key or meant for another audience.
pub fn verify(
    token: &str,
    key: &[u8],
    audience: &str,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[audience]);
    validation.leeway = 0;

    decode::<Claims>(token, &DecodingKey::from_secret(key), &validation).map(|data| data.claims)
}

/// Read the claims without checking the signature. Only used to find which
/// user a reset token names before its bound key can be built.
///
/// # Errors
/// Returns an error if the token is malformed or meant for another audience.
pub fn peek(token: &str, audience: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.set_audience(&[audience]);
    validation.leeway = 0;

    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation).map(|data| data.claims)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn secret() -> SecretString {
        SecretString::from("test-secret-key-that-is-long-enough")
    }

    #[test]
    fn verify_returns_claims() {
        let claims = Claims::new("user-123", AUTH_AUDIENCE, 60);
        let token = issue(&claims, &key(&secret())).unwrap();
        assert_eq!(verify(&token, &key(&secret()), AUTH_AUDIENCE).unwrap(), claims);
    }

    #[test]
    fn verify_rejects_other_audience() {
        let token = issue(
            &Claims::new("user-123", VERIFY_AUDIENCE, 60),
            &key(&secret()),
        )
        .unwrap();
        assert!(verify(&token, &key(&secret()), AUTH_AUDIENCE).is_err());
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let token = issue(&Claims::new("user-123", AUTH_AUDIENCE, 60), &key(&secret())).unwrap();
        let other = SecretString::from("wrong-secret-key-that-is-different");
        assert!(verify(&token, &key(&other), AUTH_AUDIENCE).is_err());
    }

    #[test]
    fn verify_rejects_expired() {
        let mut claims = Claims::new("user-123", AUTH_AUDIENCE, 0);
        claims.exp = now() - 10;
        let token = issue(&claims, &key(&secret())).unwrap();
        assert!(verify(&token, &key(&secret()), AUTH_AUDIENCE).is_err());
    }

    #[test]
    fn bound_key_changes_with_binding() {
        let claims = Claims::new("user-123", RESET_PASSWORD_AUDIENCE, 60);
        let token = issue(&claims, &bound_key(&secret(), "$argon2id$old")).unwrap();

        assert!(verify(&token, &bound_key(&secret(), "$argon2id$old"), RESET_PASSWORD_AUDIENCE).is_ok());
        assert!(verify(&token, &bound_key(&secret(), "$argon2id$new"), RESET_PASSWORD_AUDIENCE).is_err());
        assert_eq!(peek(&token, RESET_PASSWORD_AUDIENCE).unwrap().sub, "user-123");
    }

    #[test]
    fn email_claim_is_optional() {
        let claims = Claims::new("user-123", VERIFY_AUDIENCE, 60).with_email("a@example.com");
        let token = issue(&claims, &key(&secret())).unwrap();
        let decoded = verify(&token, &key(&secret()), VERIFY_AUDIENCE).unwrap();
        assert_eq!(decoded.email.as_deref(), Some("a@example.com"));
    }
}
