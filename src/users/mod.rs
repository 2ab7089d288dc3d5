//! User records, the data store and the user manager.

pub mod manager;
pub mod password;
pub mod store;
pub mod tokens;

pub use self::manager::{LogNotifier, ManagerSettings, UserManager, UserNotifier};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("user already exists")]
    AlreadyExists,
    #[error("user does not exist")]
    NotExists,
    #[error("invalid email: {0}")]
    InvalidEmail(String),
    #[error("invalid password: {0}")]
    InvalidPassword(String),
    #[error("invalid reset password token")]
    InvalidResetPasswordToken,
    #[error("invalid verification token")]
    InvalidVerifyToken,
    #[error("user is inactive")]
    Inactive,
    #[error("user is already verified")]
    AlreadyVerified,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("token signing failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Public view of a user, safe to serialize.
#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub is_verified: bool,
}

/// Stored user, including the password hash.
#[derive(Clone, Debug)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub hashed_password: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub is_verified: bool,
}

impl UserRecord {
    #[must_use]
    pub fn to_user(&self) -> User {
        User {
            id: self.id,
            email: self.email.clone(),
            is_active: self.is_active,
            is_superuser: self.is_superuser,
            is_verified: self.is_verified,
        }
    }
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            email: record.email,
            is_active: record.is_active,
            is_superuser: record.is_superuser,
            is_verified: record.is_verified,
        }
    }
}

/// Registration payload. Flags are only honored by unsafe creates.
#[derive(ToSchema, Deserialize, Serialize, Clone, Debug)]
pub struct UserCreate {
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_superuser: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_verified: Option<bool>,
}

impl UserCreate {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            is_active: None,
            is_superuser: None,
            is_verified: None,
        }
    }

    #[must_use]
    pub const fn with_superuser(mut self, is_superuser: bool) -> Self {
        self.is_superuser = Some(is_superuser);
        self
    }

    #[must_use]
    pub const fn with_verified(mut self, is_verified: bool) -> Self {
        self.is_verified = Some(is_verified);
        self
    }

    #[must_use]
    pub const fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }
}

/// Merge-patch. Absent fields are left unchanged; in safe mode only `email`
/// and `password` apply.
#[derive(ToSchema, Deserialize, Serialize, Clone, Debug, Default)]
pub struct UserUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_superuser: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_verified: Option<bool>,
}

impl UserUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.password.is_none()
            && self.is_active.is_none()
            && self.is_superuser.is_none()
            && self.is_verified.is_none()
    }

    /// Drop everything a user may not change about themselves.
    #[must_use]
    pub fn into_safe(self) -> Self {
        Self {
            email: self.email,
            password: self.password,
            ..Self::default()
        }
    }
}

static EMAIL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

/// Normalize an email for lookup and uniqueness checks.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Normalize and validate an email.
///
/// # Errors
/// Returns [`UserError::InvalidEmail`] if the address is malformed.
pub fn parse_email(email: &str) -> Result<String, UserError> {
    let normalized = normalize_email(email);
    if EMAIL.as_ref().is_some_and(|regex| regex.is_match(&normalized)) {
        Ok(normalized)
    } else {
        Err(UserError::InvalidEmail(email.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_email_normalizes() {
        assert_eq!(
            parse_email("  Test@Example.COM ").unwrap(),
            "test@example.com"
        );
    }

    #[test]
    fn email_pattern_compiles_once() {
        assert!(EMAIL.is_some());
        assert!(std::ptr::eq(LazyLock::force(&EMAIL), LazyLock::force(&EMAIL)));
    }

    #[test]
    fn parse_email_rejects_malformed() {
        for email in ["", "plain", "a@b", "a b@example.com", "@example.com"] {
            assert!(
                matches!(parse_email(email), Err(UserError::InvalidEmail(_))),
                "{email}"
            );
        }
    }

    #[test]
    fn safe_update_keeps_only_email_and_password() {
        let update = UserUpdate {
            email: Some("a@example.com".to_string()),
            password: Some("secret".to_string()),
            is_active: Some(false),
            is_superuser: Some(true),
            is_verified: Some(true),
        }
        .into_safe();

        assert_eq!(update.email.as_deref(), Some("a@example.com"));
        assert_eq!(update.password.as_deref(), Some("secret"));
        assert!(update.is_active.is_none());
        assert!(update.is_superuser.is_none());
        assert!(update.is_verified.is_none());
        assert!(!update.is_empty());
        assert!(UserUpdate::default().is_empty());
    }

    #[test]
    fn public_user_has_no_password_hash() {
        let record = UserRecord {
            id: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            hashed_password: "$argon2id$secret".to_string(),
            is_active: true,
            is_superuser: false,
            is_verified: false,
        };
        let json = serde_json::to_value(record.to_user()).unwrap();
        assert!(json.get("hashed_password").is_none());
        assert_eq!(json["email"], "a@example.com");
    }

    #[test]
    fn user_create_flags_default_to_none() {
        let create: UserCreate =
            serde_json::from_str(r#"{"email":"a@example.com","password":"pw"}"#).unwrap();
        assert!(create.is_superuser.is_none());
        assert!(create.is_active.is_none());
        assert!(create.is_verified.is_none());
    }
}
