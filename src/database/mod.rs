//! Database adapter: connection settings, pooled handle and schema.

use secrecy::{ExposeSecret, SecretString};
use sqlx::{
    AnyPool, Connection,
    any::{AnyPoolOptions, install_default_drivers},
};
use std::{fmt, str::FromStr, time::Duration};
use tracing::{Instrument, debug, info, info_span};
use url::Url;

use crate::config::{ConfigError, Resolver};

pub const USERS_TABLE: &str = "msdss_users";

const CREATE_USERS_TABLE: &str = "CREATE TABLE IF NOT EXISTS msdss_users (
    id VARCHAR(36) PRIMARY KEY,
    email VARCHAR(320) NOT NULL UNIQUE,
    hashed_password TEXT NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    is_superuser BOOLEAN NOT NULL DEFAULT FALSE,
    is_verified BOOLEAN NOT NULL DEFAULT FALSE
)";

pub const ENV_DRIVER: &str = "MSDSS_DATABASE_DRIVER";
pub const ENV_USER: &str = "MSDSS_DATABASE_USER";
pub const ENV_PASSWORD: &str = "MSDSS_DATABASE_PASSWORD";
pub const ENV_HOST: &str = "MSDSS_DATABASE_HOST";
pub const ENV_PORT: &str = "MSDSS_DATABASE_PORT";
pub const ENV_NAME: &str = "MSDSS_DATABASE_NAME";

const MEMORY: &str = ":memory:";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Driver {
    Postgres,
    Sqlite,
}

impl Driver {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgresql",
            Self::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Driver {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(Self::Postgres),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(ConfigError::InvalidSetting {
                name: "driver".to_string(),
                reason: format!("unsupported driver `{other}`"),
            }),
        }
    }
}

/// Connection parameters for the users database.
#[derive(Clone, Debug)]
pub struct DatabaseSettings {
    driver: Driver,
    user: String,
    password: SecretString,
    host: String,
    port: u16,
    name: String,
}

impl DatabaseSettings {
    /// Local Postgres defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            driver: Driver::Postgres,
            user: "msdss".to_string(),
            password: SecretString::from("msdss123"),
            host: "localhost".to_string(),
            port: 5432,
            name: "msdss".to_string(),
        }
    }

    /// A private in-memory SQLite database.
    #[must_use]
    pub fn sqlite_memory() -> Self {
        Self::new().with_driver(Driver::Sqlite).with_name(MEMORY)
    }

    /// Resolve every parameter from the `MSDSS_DATABASE_*` environment keys,
    /// falling back to [`DatabaseSettings::new`].
    ///
    /// # Errors
    /// Returns an error if the driver or port cannot be parsed.
    pub fn from_resolver(resolver: &Resolver) -> Result<Self, ConfigError> {
        let defaults = Self::new();
        let port = defaults.port.to_string();
        let value = |name: &str, key: &str, fallback: &str| {
            resolver
                .resolve(name, None, key, Some(fallback))
                .unwrap_or_else(|| fallback.to_string())
        };

        let driver = value("database driver", ENV_DRIVER, defaults.driver.as_str()).parse()?;
        let port = value("database port", ENV_PORT, &port)
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidSetting {
                name: "port".to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            driver,
            user: value("database user", ENV_USER, &defaults.user),
            password: SecretString::from(value(
                "database password",
                ENV_PASSWORD,
                defaults.password.expose_secret(),
            )),
            host: value("database host", ENV_HOST, &defaults.host),
            port,
            name: value("database name", ENV_NAME, &defaults.name),
        })
    }

    #[must_use]
    pub fn with_driver(mut self, driver: Driver) -> Self {
        self.driver = driver;
        self
    }

    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = SecretString::from(password.into());
        self
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub const fn driver(&self) -> Driver {
        self.driver
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn is_memory(&self) -> bool {
        self.driver == Driver::Sqlite && self.name == MEMORY
    }

    /// Connection URL. Contains the password, do not log it.
    ///
    /// # Errors
    /// Returns an error if the parameters do not form a valid URL.
    pub fn url(&self) -> Result<SecretString, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidSetting {
            name: "database url".to_string(),
            reason,
        };

        match self.driver {
            Driver::Sqlite if self.is_memory() => Ok(SecretString::from("sqlite::memory:")),
            Driver::Sqlite => Ok(SecretString::from(format!("sqlite://{}?mode=rwc", self.name))),
            Driver::Postgres => {
                let mut url = Url::parse(&format!("postgresql://{}", self.host))
                    .map_err(|e| invalid(e.to_string()))?;
                url.set_port(Some(self.port))
                    .map_err(|()| invalid("cannot set port".to_string()))?;
                url.set_username(&self.user)
                    .map_err(|()| invalid("cannot set user".to_string()))?;
                url.set_password(Some(self.password.expose_secret()))
                    .map_err(|()| invalid("cannot set password".to_string()))?;
                url.set_path(&self.name);
                Ok(SecretString::from(url.to_string()))
            }
        }
    }

    /// Printable target without credentials.
    #[must_use]
    pub fn redacted(&self) -> String {
        match self.driver {
            Driver::Sqlite => format!("sqlite:{}", self.name),
            Driver::Postgres => format!(
                "postgresql://{}@{}:{}/{}",
                self.user, self.host, self.port, self.name
            ),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared pooled handle.
#[derive(Clone, Debug)]
pub struct Database {
    pool: AnyPool,
    driver: Driver,
}

impl Database {
    /// Open the pool.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the database is unreachable.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, sqlx::Error> {
        install_default_drivers();

        let url = settings
            .url()
            .map_err(|e| sqlx::Error::Configuration(Box::new(e)))?;

        // Every connection to `sqlite::memory:` is a separate database, so the
        // pool must hold exactly one connection for its whole lifetime.
        let options = if settings.is_memory() {
            AnyPoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            AnyPoolOptions::new()
                .min_connections(1)
                .max_connections(5)
                .max_lifetime(Duration::from_secs(60 * 2))
                .test_before_acquire(true)
        };

        let pool = options.connect(url.expose_secret()).await?;

        info!("Connected to database {}", settings.redacted());

        Ok(Self {
            pool,
            driver: settings.driver(),
        })
    }

    #[must_use]
    pub const fn pool(&self) -> &AnyPool {
        &self.pool
    }

    #[must_use]
    pub const fn driver(&self) -> Driver {
        self.driver
    }

    /// Create the users table if it does not exist.
    ///
    /// # Errors
    /// Returns an error if the statement fails.
    pub async fn create_schema(&self) -> Result<(), sqlx::Error> {
        let span = info_span!(
            "db.query",
            db.system = self.driver.as_str(),
            db.operation = "CREATE",
            db.statement = "CREATE TABLE IF NOT EXISTS msdss_users"
        );
        sqlx::query(CREATE_USERS_TABLE)
            .execute(&self.pool)
            .instrument(span)
            .await?;

        debug!("Ensured table {USERS_TABLE}");

        Ok(())
    }

    /// # Errors
    /// Returns an error if no connection can be acquired or the ping fails.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        let span = info_span!("db.ping", db.system = self.driver.as_str(), db.operation = "PING");
        async {
            let mut conn = self.pool.acquire().await?;
            conn.ping().await
        }
        .instrument(span)
        .await
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}
