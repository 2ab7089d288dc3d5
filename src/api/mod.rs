//! HTTP surface: route groups, `OpenAPI` document and the server loop.

pub mod error;
pub mod handlers;
pub mod openapi;
pub mod routers;
pub mod settings;

use anyhow::{Context, Result};
use axum::{
    Extension, Json, Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    routing::get,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, info, info_span, warn};
use ulid::Ulid;

use self::settings::{RouteGroup, RouteSettings};
use crate::{
    auth::{AuthSettings, Authenticator, DEFAULT_COOKIE_LIFETIME, DEFAULT_JWT_LIFETIME, build_backends},
    config::{EnvOptions, Resolver, SecretKeys, SecretOverrides, Secrets},
    database::{Database, DatabaseSettings},
    users::{
        LogNotifier, ManagerSettings, UserManager, UserNotifier,
        manager::{DEFAULT_RESET_PASSWORD_TOKEN_LIFETIME, DEFAULT_VERIFICATION_TOKEN_LIFETIME},
    },
};

const REQUEST_ID: &str = "x-request-id";

/// Everything needed to assemble a [`UsersApi`].
#[derive(Clone)]
pub struct UsersSettings {
    env: EnvOptions,
    secret_keys: SecretKeys,
    secrets: SecretOverrides,
    database: Option<DatabaseSettings>,
    routes: RouteSettings,
    jwt_lifetime: u64,
    cookie_lifetime: u64,
    reset_password_token_lifetime: u64,
    verification_token_lifetime: u64,
    cookie_secure: bool,
    notifier: Arc<dyn UserNotifier>,
}

impl std::fmt::Debug for UsersSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsersSettings")
            .field("env", &self.env)
            .field("database", &self.database.as_ref().map(DatabaseSettings::redacted))
            .field("routes", &self.routes)
            .field("jwt_lifetime", &self.jwt_lifetime)
            .field("cookie_lifetime", &self.cookie_lifetime)
            .finish_non_exhaustive()
    }
}

impl UsersSettings {
    #[must_use]
    pub fn new() -> Self {
        Self {
            env: EnvOptions::new(),
            secret_keys: SecretKeys::new(),
            secrets: SecretOverrides::new(),
            database: None,
            routes: RouteSettings::new(),
            jwt_lifetime: DEFAULT_JWT_LIFETIME,
            cookie_lifetime: DEFAULT_COOKIE_LIFETIME,
            reset_password_token_lifetime: DEFAULT_RESET_PASSWORD_TOKEN_LIFETIME,
            verification_token_lifetime: DEFAULT_VERIFICATION_TOKEN_LIFETIME,
            cookie_secure: true,
            notifier: Arc::new(LogNotifier),
        }
    }

    #[must_use]
    pub fn with_env(mut self, env: EnvOptions) -> Self {
        self.env = env;
        self
    }

    #[must_use]
    pub fn with_secret_keys(mut self, keys: SecretKeys) -> Self {
        self.secret_keys = keys;
        self
    }

    /// Explicit secrets, taking precedence over the environment.
    #[must_use]
    pub fn with_secrets(mut self, secrets: SecretOverrides) -> Self {
        self.secrets = secrets;
        self
    }

    /// Database settings. When unset they are resolved from the environment.
    #[must_use]
    pub fn with_database(mut self, database: DatabaseSettings) -> Self {
        self.database = Some(database);
        self
    }

    #[must_use]
    pub fn with_routes(mut self, routes: RouteSettings) -> Self {
        self.routes = routes;
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
    pub const fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn UserNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub const fn routes(&self) -> &RouteSettings {
        &self.routes
    }
}

impl Default for UsersSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// The assembled users application.
#[derive(Debug)]
pub struct UsersApi {
    database: Database,
    authenticator: Arc<Authenticator>,
    routes: RouteSettings,
    groups: Router,
    mounted: Vec<RouteGroup>,
}

impl UsersApi {
    /// Connect the database, create the schema, resolve secrets and mount the
    /// enabled route groups.
    ///
    /// # Errors
    /// Returns an error if the environment cannot be read, the database is
    /// unreachable, a required secret is missing or two groups conflict.
    pub async fn new(settings: UsersSettings) -> Result<Self> {
        let resolver = Resolver::from_options(&settings.env).context("Failed to read environment")?;

        let database_settings = match settings.database {
            Some(database) => database,
            None => DatabaseSettings::from_resolver(&resolver)
                .context("Invalid database settings")?,
        };

        let secrets = Secrets::resolve(&resolver, &settings.secret_keys, &settings.secrets);

        let manager_settings = ManagerSettings::from_secrets(&secrets)
            .context("Failed to configure user manager")?
            .with_reset_password_token_lifetime(settings.reset_password_token_lifetime)
            .with_verification_token_lifetime(settings.verification_token_lifetime);

        let auth_settings = AuthSettings::from_secrets(&secrets)
            .with_jwt_lifetime(settings.jwt_lifetime)
            .with_cookie_lifetime(settings.cookie_lifetime)
            .with_cookie_secure(settings.cookie_secure);
        let backends = build_backends(&auth_settings);
        if backends.is_empty() {
            warn!("No auth backend configured, login routes are disabled");
        }

        let database = Database::connect(&database_settings)
            .await
            .context("Failed to connect to database")?;
        database
            .create_schema()
            .await
            .context("Failed to create users table")?;

        let manager =
            UserManager::new(database.clone(), manager_settings).with_notifier(settings.notifier);
        let authenticator = Arc::new(Authenticator::new(backends, manager));

        let routers::Routes { router, mounted } = routers::build(&settings.routes, &authenticator)?;

        Ok(Self {
            database,
            authenticator,
            routes: settings.routes,
            groups: router,
            mounted,
        })
    }

    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.database
    }

    #[must_use]
    pub fn authenticator(&self) -> Arc<Authenticator> {
        self.authenticator.clone()
    }

    #[must_use]
    pub fn manager(&self) -> &UserManager {
        self.authenticator.manager()
    }

    /// Route groups that were mounted, in registration order.
    #[must_use]
    pub fn mounted(&self) -> &[RouteGroup] {
        &self.mounted
    }

    #[must_use]
    pub fn openapi(&self) -> utoipa::openapi::OpenApi {
        openapi::openapi(&self.routes, &self.mounted)
    }

    /// The complete application router with its layers.
    #[must_use]
    pub fn router(&self) -> Router {
        let spec = Arc::new(self.openapi());

        self.groups
            .clone()
            .route("/health", get(handlers::health::health))
            .route(
                "/openapi.json",
                get(move || {
                    let spec = spec.clone();
                    async move { Json(spec.as_ref().clone()) }
                }),
            )
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestHeaderLayer::if_not_present(
                        HeaderName::from_static(REQUEST_ID),
                        |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                    ))
                    .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                        REQUEST_ID,
                    )))
                    .layer(TraceLayer::new_for_http().make_span_with(make_span))
                    .layer(Extension(self.authenticator.clone()))
                    .layer(Extension(self.database.clone())),
            )
    }

    /// Serve until Ctrl-C or SIGTERM, then close the pool.
    ///
    /// # Errors
    /// Returns an error if the address cannot be bound or the server fails.
    pub async fn serve(self, host: &str, port: u16) -> Result<()> {
        let app = self.router();

        let listener = TcpListener::bind((host, port))
            .await
            .with_context(|| format!("Failed to bind {host}:{port}"))?;

        info!("Listening on {host}:{port}");

        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async {
                shutdown_signal().await;
                info!("Gracefully shutdown");
            })
            .await?;

        self.database.close().await;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::SecretKind;

    #[test]
    fn settings_defaults() {
        let settings = UsersSettings::new();
        assert_eq!(settings.jwt_lifetime, DEFAULT_JWT_LIFETIME);
        assert_eq!(settings.cookie_lifetime, DEFAULT_COOKIE_LIFETIME);
        assert!(settings.database.is_none());
        assert_eq!(settings.routes(), &RouteSettings::new());
    }

    #[tokio::test]
    async fn empty_secrets_disable_login_groups() {
        let settings = UsersSettings::new()
            .with_env(EnvOptions::disabled())
            .with_database(DatabaseSettings::sqlite_memory())
            .with_secrets(
                SecretOverrides::new()
                    .with(SecretKind::General, "general")
                    .with(SecretKind::Jwt, "")
                    .with(SecretKind::Cookie, ""),
            );

        let api = UsersApi::new(settings).await.unwrap();
        assert_eq!(
            api.mounted(),
            [
                RouteGroup::Register,
                RouteGroup::Verify,
                RouteGroup::Reset,
                RouteGroup::Users
            ]
        );
        assert!(api.authenticator().backends().is_empty());
    }

    #[tokio::test]
    async fn conflicting_prefixes_are_rejected() {
        let routes = RouteSettings::new()
            .with_prefix(RouteGroup::Cookie, "/auth/jwt")
            .unwrap();
        let settings = UsersSettings::new()
            .with_env(EnvOptions::disabled())
            .with_database(DatabaseSettings::sqlite_memory())
            .with_secrets(SecretOverrides::new().with(SecretKind::General, "general"))
            .with_routes(routes);

        let err = UsersApi::new(settings).await.unwrap_err();
        assert!(err.to_string().contains("route conflict"), "{err}");
    }
}
