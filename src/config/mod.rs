//! Secret and setting resolution.
//!
//! Every value is resolved with one precedence rule:
//!
//! 1. an explicit value passed by the caller;
//! 2. the environment, when an env source exists and loading is enabled. The
//!    environment is the process environment overlaid on the dotenv file, the
//!    process environment taking precedence;
//! 3. a fallback.
//!
//! When a dotenv file is requested but missing, the environment step is
//! skipped entirely. Nothing here fails on an absent value: it stays `None`
//! until a factory that needs it reports [`ConfigError::MissingSecret`] or
//! [`ConfigError::MissingSetting`].

pub mod crypto;
pub mod dotenv;

pub use self::dotenv::DotEnv;

use secrecy::{ExposeSecret, SecretString};
use std::{collections::HashMap, path::PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Default location of the dotenv file.
pub const DEFAULT_ENV_FILE: &str = "./.env";

/// Built-in fallback for the general secret. Never deploy with it.
pub const PLACEHOLDER_SECRET: &str = "msdss-users-placeholder-secret-change-me";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing secret: {0}")]
    MissingSecret(&'static str),
    #[error("missing setting: {0}")]
    MissingSetting(String),
    #[error("invalid setting {name}: {reason}")]
    InvalidSetting { name: String, reason: String },
    #[error("unknown route group: {0}")]
    UnknownRoute(String),
    #[error("invalid route setting {route}.{key}: {reason}")]
    InvalidRouteSetting {
        route: String,
        key: String,
        reason: String,
    },
    #[error("route conflict: {method} {path} is registered by both `{first}` and `{second}`")]
    RouteConflict {
        method: String,
        path: String,
        first: String,
        second: String,
    },
    #[error("invalid key file {}: {reason}", .path.display())]
    InvalidKey { path: PathBuf, reason: String },
    #[error("{0}")]
    Crypto(String),
    #[error("invalid env file {}: {source}", .path.display())]
    Dotenv {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Snapshot of environment variables used for resolution.
#[derive(Clone, Debug, Default)]
pub struct EnvSource {
    vars: HashMap<String, String>,
}

impl EnvSource {
    #[must_use]
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Entries of `other` replace entries of `self`.
    #[must_use]
    pub fn overlay(mut self, other: Self) -> Self {
        self.vars.extend(other.vars);
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}

/// Where the environment comes from and whether to use it at all.
#[derive(Clone, Debug)]
pub struct EnvOptions {
    load_env: bool,
    env_file: Option<PathBuf>,
    key_path: Option<PathBuf>,
}

impl EnvOptions {
    /// Process environment plus `./.env` when it exists.
    #[must_use]
    pub fn new() -> Self {
        Self {
            load_env: true,
            env_file: Some(PathBuf::from(DEFAULT_ENV_FILE)),
            key_path: None,
        }
    }

    /// Process environment only.
    #[must_use]
    pub fn process_only() -> Self {
        Self {
            load_env: true,
            env_file: None,
            key_path: None,
        }
    }

    /// Skip the environment: explicit values and fallbacks only.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            load_env: false,
            env_file: None,
            key_path: None,
        }
    }

    #[must_use]
    pub fn with_env_file(mut self, env_file: impl Into<PathBuf>) -> Self {
        self.env_file = Some(env_file.into());
        self
    }

    #[must_use]
    pub fn with_key_path(mut self, key_path: Option<PathBuf>) -> Self {
        self.key_path = key_path;
        self
    }

    #[must_use]
    pub fn dotenv(&self) -> Option<DotEnv> {
        self.env_file
            .as_ref()
            .map(|file| DotEnv::new(file.clone(), self.key_path.clone()))
    }

    /// Build the env source, or `None` when the environment must be skipped.
    ///
    /// # Errors
    /// Returns an error if an existing dotenv file cannot be read or decrypted.
    pub fn source(&self) -> Result<Option<EnvSource>, ConfigError> {
        if !self.load_env {
            return Ok(None);
        }

        let Some(dotenv) = self.dotenv() else {
            return Ok(Some(EnvSource::from_process()));
        };

        if !dotenv.exists() {
            debug!(
                "env file {} not found, using explicit values and fallbacks",
                dotenv.env_file().display()
            );
            return Ok(None);
        }

        let file = EnvSource::from_pairs(dotenv.read()?);
        Ok(Some(file.overlay(EnvSource::from_process())))
    }
}

impl Default for EnvOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the explicit > environment > fallback rule.
#[derive(Clone, Debug, Default)]
pub struct Resolver {
    env: Option<EnvSource>,
}

impl Resolver {
    #[must_use]
    pub fn new(env: Option<EnvSource>) -> Self {
        Self { env }
    }

    /// # Errors
    /// Returns an error if the env source cannot be loaded.
    pub fn from_options(options: &EnvOptions) -> Result<Self, ConfigError> {
        Ok(Self::new(options.source()?))
    }

    #[must_use]
    pub fn resolve(
        &self,
        name: &str,
        explicit: Option<&str>,
        env_key: &str,
        fallback: Option<&str>,
    ) -> Option<String> {
        if let Some(value) = explicit {
            debug!("{name}: explicit value");
            return Some(value.to_string());
        }

        if let Some(value) = self.env.as_ref().and_then(|env| env.get(env_key)) {
            debug!("{name}: from {env_key}");
            return Some(value.to_string());
        }

        if fallback.is_some() {
            debug!("{name}: fallback value");
        }
        fallback.map(ToString::to_string)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SecretKind {
    General,
    Jwt,
    Cookie,
    ResetPasswordToken,
    VerificationToken,
}

impl SecretKind {
    pub const ALL: [Self; 5] = [
        Self::General,
        Self::Jwt,
        Self::Cookie,
        Self::ResetPasswordToken,
        Self::VerificationToken,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::General => "secret",
            Self::Jwt => "jwt_secret",
            Self::Cookie => "cookie_secret",
            Self::ResetPasswordToken => "reset_password_token_secret",
            Self::VerificationToken => "verification_token_secret",
        }
    }

    #[must_use]
    pub const fn default_env_key(self) -> &'static str {
        match self {
            Self::General => "MSDSS_USERS_SECRET",
            Self::Jwt => "MSDSS_USERS_JWT_SECRET",
            Self::Cookie => "MSDSS_USERS_COOKIE_SECRET",
            Self::ResetPasswordToken => "MSDSS_USERS_RESET_PASSWORD_TOKEN_SECRET",
            Self::VerificationToken => "MSDSS_USERS_VERIFICATION_TOKEN_SECRET",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    const fn index(self) -> usize {
        match self {
            Self::General => 0,
            Self::Jwt => 1,
            Self::Cookie => 2,
            Self::ResetPasswordToken => 3,
            Self::VerificationToken => 4,
        }
    }
}

/// Environment variable names for each secret.
#[derive(Clone, Debug)]
pub struct SecretKeys {
    keys: [String; 5],
}

impl SecretKeys {
    #[must_use]
    pub fn new() -> Self {
        Self {
            keys: SecretKind::ALL.map(|kind| kind.default_env_key().to_string()),
        }
    }

    #[must_use]
    pub fn with_key(mut self, kind: SecretKind, key: impl Into<String>) -> Self {
        self.keys[kind.index()] = key.into();
        self
    }

    #[must_use]
    pub fn key(&self, kind: SecretKind) -> &str {
        &self.keys[kind.index()]
    }
}

impl Default for SecretKeys {
    fn default() -> Self {
        Self::new()
    }
}

/// Explicit secret values supplied by the caller.
#[derive(Clone, Debug, Default)]
pub struct SecretOverrides {
    values: [Option<SecretString>; 5],
}

impl SecretOverrides {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, kind: SecretKind, value: impl Into<String>) -> Self {
        self.values[kind.index()] = Some(SecretString::from(value.into()));
        self
    }

    #[must_use]
    pub fn get(&self, kind: SecretKind) -> Option<&SecretString> {
        self.values[kind.index()].as_ref()
    }
}

/// Effective secrets after resolution.
///
/// The general secret falls back to [`PLACEHOLDER_SECRET`]; every other secret
/// falls back to the general secret. An empty explicit or environment value
/// disables a secret.
#[derive(Clone, Debug, Default)]
pub struct Secrets {
    values: [Option<SecretString>; 5],
}

impl Secrets {
    #[must_use]
    pub fn resolve(resolver: &Resolver, keys: &SecretKeys, overrides: &SecretOverrides) -> Self {
        let lookup = |kind: SecretKind, fallback: Option<&str>| {
            resolver
                .resolve(
                    kind.name(),
                    overrides.get(kind).map(ExposeSecret::expose_secret),
                    keys.key(kind),
                    fallback,
                )
                .filter(|value| !value.is_empty())
        };

        let general = lookup(SecretKind::General, Some(PLACEHOLDER_SECRET));

        let mut values: [Option<SecretString>; 5] = Default::default();
        for kind in SecretKind::ALL {
            let value = if kind == SecretKind::General {
                general.clone()
            } else {
                lookup(kind, general.as_deref())
            };

            if value.as_deref() == Some(PLACEHOLDER_SECRET) {
                warn!(
                    "{} is using the built-in placeholder secret, set {} before deploying",
                    kind.name(),
                    keys.key(kind)
                );
            }

            values[kind.index()] = value.map(SecretString::from);
        }

        Self { values }
    }

    #[must_use]
    pub fn get(&self, kind: SecretKind) -> Option<&SecretString> {
        self.values[kind.index()].as_ref()
    }

    /// Returns the secret or a [`ConfigError::MissingSecret`].
    ///
    /// # Errors
    /// Returns an error if the secret resolved to nothing.
    pub fn require(&self, kind: SecretKind) -> Result<&SecretString, ConfigError> {
        self.get(kind).ok_or(ConfigError::MissingSecret(kind.name()))
    }

    #[must_use]
    pub fn uses_placeholder(&self) -> bool {
        self.values
            .iter()
            .flatten()
            .any(|secret| secret.expose_secret() == PLACEHOLDER_SECRET)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn exposed(secrets: &Secrets, kind: SecretKind) -> Option<String> {
        secrets
            .get(kind)
            .map(|secret| secret.expose_secret().to_string())
    }

    #[test]
    fn resolve_prefers_explicit_then_env_then_fallback() {
        let resolver = Resolver::new(Some(EnvSource::from_pairs([("KEY", "env")])));

        assert_eq!(
            resolver.resolve("value", Some("explicit"), "KEY", Some("fallback")),
            Some("explicit".to_string())
        );
        assert_eq!(
            resolver.resolve("value", None, "KEY", Some("fallback")),
            Some("env".to_string())
        );
        assert_eq!(
            resolver.resolve("value", None, "OTHER", Some("fallback")),
            Some("fallback".to_string())
        );
        assert_eq!(resolver.resolve("value", None, "OTHER", None), None);
    }

    #[test]
    fn resolver_without_env_ignores_environment() {
        temp_env::with_var("MSDSS_TEST_RESOLVER_KEY", Some("env"), || {
            let resolver = Resolver::from_options(&EnvOptions::disabled()).unwrap();
            assert_eq!(
                resolver.resolve("value", None, "MSDSS_TEST_RESOLVER_KEY", Some("fallback")),
                Some("fallback".to_string())
            );
        });
    }

    #[test]
    fn missing_env_file_skips_environment() {
        let dir = tempfile::tempdir().unwrap();
        temp_env::with_var("MSDSS_TEST_MISSING_FILE_KEY", Some("env"), || {
            let options = EnvOptions::new().with_env_file(dir.path().join("absent.env"));
            let resolver = Resolver::from_options(&options).unwrap();
            assert_eq!(
                resolver.resolve("value", None, "MSDSS_TEST_MISSING_FILE_KEY", None),
                None
            );
        });
    }

    #[test]
    fn process_environment_overrides_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(".env");
        let dotenv = DotEnv::new(&file, None);
        dotenv.set("MSDSS_TEST_OVERLAY_A", "file").unwrap();
        dotenv.set("MSDSS_TEST_OVERLAY_B", "file").unwrap();

        temp_env::with_var("MSDSS_TEST_OVERLAY_A", Some("process"), || {
            let resolver = Resolver::from_options(&EnvOptions::new().with_env_file(&file)).unwrap();
            assert_eq!(
                resolver.resolve("a", None, "MSDSS_TEST_OVERLAY_A", None),
                Some("process".to_string())
            );
            assert_eq!(
                resolver.resolve("b", None, "MSDSS_TEST_OVERLAY_B", None),
                Some("file".to_string())
            );
        });
    }

    #[test]
    fn each_secret_prefers_explicit_over_env() {
        let keys = SecretKeys::new();
        for kind in SecretKind::ALL {
            let env = EnvSource::from_pairs([(keys.key(kind), "from-env")]);
            let overrides = SecretOverrides::new().with(kind, "explicit");
            let secrets = Secrets::resolve(&Resolver::new(Some(env)), &keys, &overrides);
            assert_eq!(exposed(&secrets, kind).as_deref(), Some("explicit"), "{kind:?}");
        }
    }

    #[test]
    fn each_secret_prefers_env_over_fallback() {
        let keys = SecretKeys::new();
        for kind in SecretKind::ALL {
            let env = EnvSource::from_pairs([(keys.key(kind), "from-env")]);
            let secrets = Secrets::resolve(
                &Resolver::new(Some(env)),
                &keys,
                &SecretOverrides::new(),
            );
            assert_eq!(exposed(&secrets, kind).as_deref(), Some("from-env"), "{kind:?}");

            // The other kinds are unaffected by this kind's variable.
            for other in SecretKind::ALL {
                if other != kind && (kind != SecretKind::General) {
                    assert_eq!(
                        exposed(&secrets, other).as_deref(),
                        Some(PLACEHOLDER_SECRET),
                        "{kind:?} leaked into {other:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn each_secret_falls_back() {
        let keys = SecretKeys::new();
        let secrets = Secrets::resolve(&Resolver::new(None), &keys, &SecretOverrides::new());
        for kind in SecretKind::ALL {
            assert_eq!(
                exposed(&secrets, kind).as_deref(),
                Some(PLACEHOLDER_SECRET),
                "{kind:?}"
            );
        }
        assert!(secrets.uses_placeholder());
    }

    #[test]
    fn specific_secrets_fall_back_to_general() {
        let keys = SecretKeys::new();
        let overrides = SecretOverrides::new().with(SecretKind::General, "general");
        let secrets = Secrets::resolve(&Resolver::new(None), &keys, &overrides);
        for kind in SecretKind::ALL {
            assert_eq!(exposed(&secrets, kind).as_deref(), Some("general"));
        }
        assert!(!secrets.uses_placeholder());
    }

    #[test]
    fn empty_value_disables_secret() {
        let keys = SecretKeys::new();
        let env = EnvSource::from_pairs([(keys.key(SecretKind::Cookie), "")]);
        let overrides = SecretOverrides::new()
            .with(SecretKind::General, "general")
            .with(SecretKind::Jwt, "");
        let secrets = Secrets::resolve(&Resolver::new(Some(env)), &keys, &overrides);

        assert!(secrets.get(SecretKind::Jwt).is_none());
        assert!(secrets.get(SecretKind::Cookie).is_none());
        assert!(matches!(
            secrets.require(SecretKind::Cookie),
            Err(ConfigError::MissingSecret("cookie_secret"))
        ));
        assert_eq!(
            exposed(&secrets, SecretKind::ResetPasswordToken).as_deref(),
            Some("general")
        );
    }

    #[test]
    fn renamed_keys_are_used() {
        let keys = SecretKeys::new().with_key(SecretKind::Cookie, "MSDSS_USERS_SECRET_B");
        let env = EnvSource::from_pairs([("MSDSS_USERS_SECRET_B", "renamed")]);
        let secrets = Secrets::resolve(&Resolver::new(Some(env)), &keys, &SecretOverrides::new());
        assert_eq!(
            exposed(&secrets, SecretKind::Cookie).as_deref(),
            Some("renamed")
        );
    }

    #[test]
    fn secret_kind_names_round_trip() {
        for kind in SecretKind::ALL {
            assert_eq!(SecretKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(SecretKind::from_name("nope"), None);
    }
}
