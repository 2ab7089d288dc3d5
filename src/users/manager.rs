//! User manager: password rules, uniqueness, reset and verification flows.

use secrecy::SecretString;
use std::{fmt, sync::Arc};
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    User, UserCreate, UserError, UserRecord, UserUpdate, parse_email, password,
    store::{UserStore, is_unique_violation},
    tokens::{self, Claims, RESET_PASSWORD_AUDIENCE, VERIFY_AUDIENCE},
};
use crate::{
    config::{ConfigError, SecretKind, Secrets},
    database::Database,
};

pub const DEFAULT_RESET_PASSWORD_TOKEN_LIFETIME: u64 = 3600;
pub const DEFAULT_VERIFICATION_TOKEN_LIFETIME: u64 = 3600;

/// Secrets and lifetimes of the reset and verification tokens.
#[derive(Clone, Debug)]
pub struct ManagerSettings {
    reset_password_token_secret: SecretString,
    verification_token_secret: SecretString,
    reset_password_token_lifetime: u64,
    verification_token_lifetime: u64,
}

impl ManagerSettings {
    #[must_use]
    pub fn new(
        reset_password_token_secret: SecretString,
        verification_token_secret: SecretString,
    ) -> Self {
        Self {
            reset_password_token_secret,
            verification_token_secret,
            reset_password_token_lifetime: DEFAULT_RESET_PASSWORD_TOKEN_LIFETIME,
            verification_token_lifetime: DEFAULT_VERIFICATION_TOKEN_LIFETIME,
        }
    }

    /// # Errors
    /// Returns [`ConfigError::MissingSecret`] if the reset or verification
    /// secret resolved to nothing.
    pub fn from_secrets(secrets: &Secrets) -> Result<Self, ConfigError> {
        Ok(Self::new(
            secrets.require(SecretKind::ResetPasswordToken)?.clone(),
            secrets.require(SecretKind::VerificationToken)?.clone(),
        ))
    }

    #[must_use]
    pub const fn with_reset_password_token_lifetime(mut self, seconds: u64) -> Self {
        self.reset_password_token_lifetime = seconds;
        self
    }

    #[must_use]
    pub const fn with_verification_token_lifetime(mut self, seconds: u64) -> Self {
        self.verification_token_lifetime = seconds;
        self
    }

    #[must_use]
    pub const fn reset_password_token_lifetime(&self) -> u64 {
        self.reset_password_token_lifetime
    }

    #[must_use]
    pub const fn verification_token_lifetime(&self) -> u64 {
        self.verification_token_lifetime
    }
}

/// Lifecycle hooks, called after the change is stored.
pub trait UserNotifier: Send + Sync {
    fn after_register(&self, _user: &User) {}
    fn after_update(&self, _user: &User) {}
    fn after_delete(&self, _user: &User) {}
    fn after_forgot_password(&self, _user: &User, _token: &str) {}
    fn after_reset_password(&self, _user: &User) {}
    fn after_request_verify(&self, _user: &User, _token: &str) {}
    fn after_verify(&self, _user: &User) {}
}

/// Logs every event instead of delivering it.
#[derive(Clone, Debug)]
pub struct LogNotifier;

impl UserNotifier for LogNotifier {
    fn after_register(&self, user: &User) {
        info!(user_id = %user.id, email = %user.email, "user registered");
    }

    fn after_update(&self, user: &User) {
        info!(user_id = %user.id, "user updated");
    }

    fn after_delete(&self, user: &User) {
        info!(user_id = %user.id, "user deleted");
    }

    fn after_forgot_password(&self, user: &User, token: &str) {
        info!(user_id = %user.id, "password reset requested");
        debug!(user_id = %user.id, token, "reset password token stub");
    }

    fn after_reset_password(&self, user: &User) {
        info!(user_id = %user.id, "password reset");
    }

    fn after_request_verify(&self, user: &User, token: &str) {
        info!(user_id = %user.id, "verification requested");
        debug!(user_id = %user.id, token, "verification token stub");
    }

    fn after_verify(&self, user: &User) {
        info!(user_id = %user.id, "user verified");
    }
}

#[derive(Clone)]
pub struct UserManager {
    store: UserStore,
    settings: ManagerSettings,
    notifier: Arc<dyn UserNotifier>,
}

impl fmt::Debug for UserManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserManager")
            .field("store", &self.store)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl UserManager {
    #[must_use]
    pub fn new(db: Database, settings: ManagerSettings) -> Self {
        Self {
            store: UserStore::new(db),
            settings,
            notifier: Arc::new(LogNotifier),
        }
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn UserNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub const fn store(&self) -> &UserStore {
        &self.store
    }

    #[must_use]
    pub const fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    /// Create a user. In safe mode the flags of `create` are ignored.
    ///
    /// # Errors
    /// Returns [`UserError::AlreadyExists`] for a taken email, or an invalid
    /// email/password error.
    pub async fn create(&self, create: UserCreate, safe: bool) -> Result<User, UserError> {
        let email = parse_email(&create.email)?;
        password::validate(&create.password)?;

        if self.store.get_by_email(&email).await?.is_some() {
            return Err(UserError::AlreadyExists);
        }

        let flag = |value: Option<bool>, default: bool| {
            if safe { default } else { value.unwrap_or(default) }
        };

        let record = UserRecord {
            id: Uuid::new_v4(),
            email,
            hashed_password: password::hash_blocking(&create.password).await?,
            is_active: flag(create.is_active, true),
            is_superuser: flag(create.is_superuser, false),
            is_verified: flag(create.is_verified, false),
        };

        self.store.insert(&record).await.map_err(|err| {
            if is_unique_violation(&err) {
                UserError::AlreadyExists
            } else {
                UserError::Database(err)
            }
        })?;

        let user = record.to_user();
        self.notifier.after_register(&user);
        Ok(user)
    }

    /// # Errors
    /// Returns [`UserError::NotExists`] if no user has this id.
    pub async fn get(&self, id: Uuid) -> Result<UserRecord, UserError> {
        self.store.get(id).await?.ok_or(UserError::NotExists)
    }

    /// # Errors
    /// Returns [`UserError::NotExists`] if no user has this email.
    pub async fn get_by_email(&self, email: &str) -> Result<UserRecord, UserError> {
        self.store
            .get_by_email(&super::normalize_email(email))
            .await?
            .ok_or(UserError::NotExists)
    }

    /// Apply a merge-patch. Changing the email resets `is_verified`.
    ///
    /// # Errors
    /// Returns [`UserError::AlreadyExists`] if the new email is taken, an
    /// invalid email/password error, or [`UserError::NotExists`] if the user
    /// vanished.
    pub async fn update(
        &self,
        user: &UserRecord,
        update: UserUpdate,
        safe: bool,
    ) -> Result<User, UserError> {
        let update = if safe { update.into_safe() } else { update };
        let mut record = user.clone();

        if let Some(email) = update.email.as_deref() {
            let email = parse_email(email)?;
            if email != record.email {
                if self.store.get_by_email(&email).await?.is_some() {
                    return Err(UserError::AlreadyExists);
                }
                record.email = email;
                record.is_verified = false;
            }
        }

        if let Some(new_password) = update.password.as_deref() {
            password::validate(new_password)?;
            record.hashed_password = password::hash_blocking(new_password).await?;
        }

        if let Some(is_active) = update.is_active {
            record.is_active = is_active;
        }
        if let Some(is_superuser) = update.is_superuser {
            record.is_superuser = is_superuser;
        }
        if let Some(is_verified) = update.is_verified {
            record.is_verified = is_verified;
        }

        let updated = self.store.update(&record).await.map_err(|err| {
            if is_unique_violation(&err) {
                UserError::AlreadyExists
            } else {
                UserError::Database(err)
            }
        })?;
        if !updated {
            return Err(UserError::NotExists);
        }

        let user = record.to_user();
        self.notifier.after_update(&user);
        Ok(user)
    }

    /// # Errors
    /// Returns [`UserError::NotExists`] if the user was already gone.
    pub async fn delete(&self, user: &UserRecord) -> Result<(), UserError> {
        if !self.store.delete(user.id).await? {
            return Err(UserError::NotExists);
        }
        self.notifier.after_delete(&user.to_user());
        Ok(())
    }

    /// Check credentials. Returns `None` for an unknown email or a wrong
    /// password.
    ///
    /// # Errors
    /// Returns an error only if the database fails.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<UserRecord>, UserError> {
        let Some(user) = self
            .store
            .get_by_email(&super::normalize_email(email))
            .await?
        else {
            // Spend a hash on unknown emails too.
            let _ = password::hash_blocking(password).await;
            return Ok(None);
        };

        if password::verify_blocking(password, &user.hashed_password).await {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    /// Issue a reset token for an active user. Unknown or inactive emails
    /// yield `None` so callers cannot enumerate users.
    ///
    /// # Errors
    /// Returns an error if the database fails or the token cannot be signed.
    pub async fn forgot_password(&self, email: &str) -> Result<Option<String>, UserError> {
        let Some(user) = self
            .store
            .get_by_email(&super::normalize_email(email))
            .await?
        else {
            return Ok(None);
        };

        if !user.is_active {
            debug!(user_id = %user.id, "skipping reset token for inactive user");
            return Ok(None);
        }

        let claims = Claims::new(
            user.id.to_string(),
            RESET_PASSWORD_AUDIENCE,
            self.settings.reset_password_token_lifetime,
        );
        let token = tokens::issue(&claims, &self.reset_key(&user))?;

        self.notifier.after_forgot_password(&user.to_user(), &token);
        Ok(Some(token))
    }

    /// # Errors
    /// Returns [`UserError::InvalidResetPasswordToken`] for a bad, expired or
    /// already used token, [`UserError::Inactive`] for an inactive user and
    /// [`UserError::InvalidPassword`] for a rejected password.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<User, UserError> {
        let claims = tokens::peek(token, RESET_PASSWORD_AUDIENCE)
            .map_err(|_| UserError::InvalidResetPasswordToken)?;
        let id = Uuid::parse_str(&claims.sub).map_err(|_| UserError::InvalidResetPasswordToken)?;
        let mut user = self
            .store
            .get(id)
            .await?
            .ok_or(UserError::InvalidResetPasswordToken)?;

        tokens::verify(token, &self.reset_key(&user), RESET_PASSWORD_AUDIENCE)
            .map_err(|_| UserError::InvalidResetPasswordToken)?;

        if !user.is_active {
            return Err(UserError::Inactive);
        }

        password::validate(new_password)?;
        user.hashed_password = password::hash_blocking(new_password).await?;

        if !self.store.update(&user).await? {
            return Err(UserError::InvalidResetPasswordToken);
        }

        let user = user.to_user();
        self.notifier.after_reset_password(&user);
        Ok(user)
    }

    /// Issue a verification token for an active, unverified user. Other
    /// emails yield `None`.
    ///
    /// # Errors
    /// Returns an error if the database fails or the token cannot be signed.
    pub async fn request_verify(&self, email: &str) -> Result<Option<String>, UserError> {
        let Some(user) = self
            .store
            .get_by_email(&super::normalize_email(email))
            .await?
        else {
            return Ok(None);
        };

        if !user.is_active || user.is_verified {
            debug!(user_id = %user.id, "skipping verification token");
            return Ok(None);
        }

        let claims = Claims::new(
            user.id.to_string(),
            VERIFY_AUDIENCE,
            self.settings.verification_token_lifetime,
        )
        .with_email(user.email.clone());
        let token = tokens::issue(&claims, &tokens::key(&self.settings.verification_token_secret))?;

        self.notifier.after_request_verify(&user.to_user(), &token);
        Ok(Some(token))
    }

    /// # Errors
    /// Returns [`UserError::InvalidVerifyToken`] for a bad or expired token
    /// and [`UserError::AlreadyVerified`] if there is nothing to verify.
    pub async fn verify(&self, token: &str) -> Result<User, UserError> {
        let claims = tokens::verify(
            token,
            &tokens::key(&self.settings.verification_token_secret),
            VERIFY_AUDIENCE,
        )
        .map_err(|_| UserError::InvalidVerifyToken)?;

        let email = claims.email.ok_or(UserError::InvalidVerifyToken)?;
        let id = Uuid::parse_str(&claims.sub).map_err(|_| UserError::InvalidVerifyToken)?;

        let mut user = self
            .store
            .get_by_email(&email)
            .await?
            .filter(|user| user.id == id)
            .ok_or(UserError::InvalidVerifyToken)?;

        if user.is_verified {
            return Err(UserError::AlreadyVerified);
        }

        user.is_verified = true;
        if !self.store.update(&user).await? {
            return Err(UserError::InvalidVerifyToken);
        }

        let user = user.to_user();
        self.notifier.after_verify(&user);
        Ok(user)
    }

    fn reset_key(&self, user: &UserRecord) -> Vec<u8> {
        tokens::bound_key(
            &self.settings.reset_password_token_secret,
            &user.hashed_password,
        )
    }
}
