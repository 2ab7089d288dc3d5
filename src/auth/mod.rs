//! Auth backends and the request authenticator.
//!
//! Two backends exist: a bearer JWT read from the `Authorization` header and a
//! JWT carried in an `HttpOnly` cookie. Both sign the same access claims with
//! their own secret and lifetime. A backend without a secret is not built.

pub mod current_user;

pub use self::current_user::{AuthRejection, CurrentUser, UserRequirement, require_user};

use axum::http::{
    HeaderMap, HeaderValue,
    header::{AUTHORIZATION, COOKIE, InvalidHeaderValue},
};
use secrecy::SecretString;
use tracing::debug;
use uuid::Uuid;

use crate::{
    config::{SecretKind, Secrets},
    users::{
        UserError, UserManager, UserRecord,
        tokens::{self, AUTH_AUDIENCE, Claims},
    },
};

pub const DEFAULT_JWT_LIFETIME: u64 = 900;
pub const DEFAULT_COOKIE_LIFETIME: u64 = 2_592_000;
pub const DEFAULT_COOKIE_NAME: &str = "msdss_users_auth";
pub const DEFAULT_TOKEN_URL: &str = "auth/jwt/login";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transport {
    Bearer,
    Cookie,
}

/// Secrets, lifetimes and transport options for the backends.
#[derive(Clone, Debug)]
pub struct AuthSettings {
    jwt_secret: Option<SecretString>,
    cookie_secret: Option<SecretString>,
    jwt_lifetime: u64,
    cookie_lifetime: u64,
    token_url: String,
    cookie_name: String,
    cookie_secure: bool,
}

impl AuthSettings {
    /// Defaults without secrets, i.e. no backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            jwt_secret: None,
            cookie_secret: None,
            jwt_lifetime: DEFAULT_JWT_LIFETIME,
            cookie_lifetime: DEFAULT_COOKIE_LIFETIME,
            token_url: DEFAULT_TOKEN_URL.to_string(),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            cookie_secure: true,
        }
    }

    #[must_use]
    pub fn from_secrets(secrets: &Secrets) -> Self {
        Self::new()
            .with_jwt_secret(secrets.get(SecretKind::Jwt).cloned())
            .with_cookie_secret(secrets.get(SecretKind::Cookie).cloned())
    }

    #[must_use]
    pub fn with_jwt_secret(mut self, secret: Option<SecretString>) -> Self {
        self.jwt_secret = secret;
        self
    }

    #[must_use]
    pub fn with_cookie_secret(mut self, secret: Option<SecretString>) -> Self {
        self.cookie_secret = secret;
        self
    }

    #[must_use]
    pub const fn with_jwt_lifetime(mut self, seconds: u64) -> Self {
        self.jwt_lifetime = seconds;
        self
    }

    #[must_use]
    pub const fn with_cookie_lifetime(mut self, seconds: u64) -> Self {
        self.cookie_lifetime = seconds;
        self
    }

    #[must_use]
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    #[must_use]
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    #[must_use]
    pub const fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub const fn jwt_lifetime(&self) -> u64 {
        self.jwt_lifetime
    }

    #[must_use]
    pub const fn cookie_lifetime(&self) -> u64 {
        self.cookie_lifetime
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct AuthBackend {
    transport: Transport,
    secret: SecretString,
    lifetime: u64,
    token_url: String,
    cookie_name: String,
    cookie_secure: bool,
}

impl AuthBackend {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self.transport {
            Transport::Bearer => "jwt",
            Transport::Cookie => "cookie",
        }
    }

    #[must_use]
    pub const fn transport(&self) -> Transport {
        self.transport
    }

    #[must_use]
    pub const fn lifetime(&self) -> u64 {
        self.lifetime
    }

    #[must_use]
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// # Errors
    /// Returns an error if the token cannot be signed.
    pub fn write_token(&self, user: &UserRecord) -> Result<String, UserError> {
        let claims = Claims::new(user.id.to_string(), AUTH_AUDIENCE, self.lifetime);
        Ok(tokens::issue(&claims, &tokens::key(&self.secret))?)
    }

    /// User id of a valid token, `None` otherwise.
    #[must_use]
    pub fn read_token(&self, token: &str) -> Option<Uuid> {
        match tokens::verify(token, &tokens::key(&self.secret), AUTH_AUDIENCE) {
            Ok(claims) => Uuid::parse_str(&claims.sub).ok(),
            Err(err) => {
                debug!(backend = self.name(), "rejected token: {err}");
                None
            }
        }
    }

    /// Raw token carried by the request for this transport.
    #[must_use]
    pub fn extract(&self, headers: &HeaderMap) -> Option<String> {
        match self.transport {
            Transport::Bearer => extract_bearer_token(headers),
            Transport::Cookie => extract_cookie(headers, &self.cookie_name),
        }
    }

    /// `Set-Cookie` value carrying `token`.
    ///
    /// # Errors
    /// Returns an error if the token is not a valid header value.
    pub fn login_cookie(&self, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        self.cookie(token, self.lifetime)
    }

    /// `Set-Cookie` value that expires the auth cookie.
    ///
    /// # Errors
    /// Returns an error if the cookie name is not a valid header value.
    pub fn logout_cookie(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        self.cookie("", 0)
    }

    fn cookie(&self, value: &str, max_age: u64) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = format!(
            "{}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}",
            self.cookie_name
        );
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }
}

/// Backends with a secret, in the order `[jwt, cookie]`.
#[must_use]
pub fn build_backends(settings: &AuthSettings) -> Vec<AuthBackend> {
    let mut backends = Vec::with_capacity(2);
    let candidates = [
        (Transport::Bearer, &settings.jwt_secret, settings.jwt_lifetime),
        (Transport::Cookie, &settings.cookie_secret, settings.cookie_lifetime),
    ];

    for (transport, secret, lifetime) in candidates {
        let Some(secret) = secret else {
            debug!("no secret for {transport:?} backend, skipping");
            continue;
        };
        backends.push(AuthBackend {
            transport,
            secret: secret.clone(),
            lifetime,
            token_url: settings.token_url.clone(),
            cookie_name: settings.cookie_name.clone(),
            cookie_secure: settings.cookie_secure,
        });
    }

    backends
}

/// Resolves the current user by trying each backend in order.
#[derive(Clone, Debug)]
pub struct Authenticator {
    backends: Vec<AuthBackend>,
    manager: UserManager,
}

impl Authenticator {
    #[must_use]
    pub const fn new(backends: Vec<AuthBackend>, manager: UserManager) -> Self {
        Self { backends, manager }
    }

    #[must_use]
    pub fn backends(&self) -> &[AuthBackend] {
        &self.backends
    }

    #[must_use]
    pub fn backend(&self, transport: Transport) -> Option<&AuthBackend> {
        self.backends.iter().find(|b| b.transport == transport)
    }

    #[must_use]
    pub const fn manager(&self) -> &UserManager {
        &self.manager
    }

    /// The first backend that yields an existing user wins.
    ///
    /// # Errors
    /// Returns an error if the database fails.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Option<UserRecord>, UserError> {
        for backend in &self.backends {
            if let Some(user) = self.authenticate_with(backend, headers).await? {
                return Ok(Some(user));
            }
        }
        Ok(None)
    }

    /// Authenticate through one backend only.
    ///
    /// # Errors
    /// Returns an error if the database fails.
    pub async fn authenticate_with(
        &self,
        backend: &AuthBackend,
        headers: &HeaderMap,
    ) -> Result<Option<UserRecord>, UserError> {
        let Some(id) = backend
            .extract(headers)
            .and_then(|token| backend.read_token(&token))
        else {
            return Ok(None);
        };
        Ok(self.manager.store().get(id).await?)
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
