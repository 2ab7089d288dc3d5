//! Route group assembly.

use axum::{
    Router,
    http::Method,
    middleware,
    routing::{MethodRouter, get, post},
};
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, info, warn};

use super::{
    handlers::{auth, register, reset, users, verify},
    settings::{RouteGroup, RouteSetting, RouteSettings},
};
use crate::{
    auth::{
        Authenticator, Transport,
        current_user::{Guard, guard},
    },
    config::ConfigError,
};

/// Paths served outside of any group.
pub const APP_ROUTES: [(Method, &str); 2] = [(Method::GET, "/health"), (Method::GET, "/openapi.json")];

/// Routes of the enabled groups and the groups that were mounted.
#[derive(Debug)]
pub struct Routes {
    pub router: Router,
    pub mounted: Vec<RouteGroup>,
}

/// Method and group-relative path of every endpoint in `group`.
#[must_use]
pub fn endpoints(group: RouteGroup, setting: &RouteSetting) -> Vec<(Method, &'static str)> {
    match group {
        RouteGroup::Jwt if setting.enable_refresh => {
            vec![(Method::POST, "/login"), (Method::POST, "/refresh")]
        }
        RouteGroup::Jwt => vec![(Method::POST, "/login")],
        RouteGroup::Cookie => vec![(Method::POST, "/login"), (Method::POST, "/logout")],
        RouteGroup::Register => vec![(Method::POST, "/register")],
        RouteGroup::Verify => vec![
            (Method::POST, "/request-verify-token"),
            (Method::POST, "/verify"),
        ],
        RouteGroup::Reset => vec![
            (Method::POST, "/forgot-password"),
            (Method::POST, "/reset-password"),
        ],
        RouteGroup::Users => vec![
            (Method::GET, "/me"),
            (Method::PATCH, "/me"),
            (Method::GET, "/{id}"),
            (Method::PATCH, "/{id}"),
            (Method::DELETE, "/{id}"),
        ],
    }
}

/// Build the routers of all enabled groups in registration order.
///
/// The `jwt` and `cookie` groups are skipped when their backend has no
/// secret.
///
/// # Errors
/// Returns [`ConfigError::RouteConflict`] if two groups register the same
/// method and path.
pub fn build(settings: &RouteSettings, authenticator: &Arc<Authenticator>) -> Result<Routes, ConfigError> {
    let mut owners: HashMap<(Method, String), String> = APP_ROUTES
        .iter()
        .map(|(method, path)| ((method.clone(), (*path).to_string()), "app".to_string()))
        .collect();

    let mut router = Router::new();
    let mut mounted = Vec::new();

    for (group, setting) in settings.enabled() {
        let transport = match group {
            RouteGroup::Jwt => Some(Transport::Bearer),
            RouteGroup::Cookie => Some(Transport::Cookie),
            _ => None,
        };
        if let Some(transport) = transport {
            if authenticator.backend(transport).is_none() {
                warn!("Route group `{group}` enabled without a {} secret, skipping", group.name());
                continue;
            }
        }

        for (method, path) in endpoints(group, setting) {
            let key = (method.clone(), setting.path(path));
            if let Some(first) = owners.get(&key) {
                return Err(ConfigError::RouteConflict {
                    method: method.to_string(),
                    path: key.1,
                    first: first.clone(),
                    second: group.name().to_string(),
                });
            }
            owners.insert(key, group.name().to_string());
        }

        for (key, value) in &setting.extra {
            debug!("Route group `{group}` ignores setting {key}={value}");
        }

        let mut group_router = group_routes(group, setting);
        if let Some(requirement) = setting.required_user {
            group_router = group_router.route_layer(middleware::from_fn_with_state(
                Guard {
                    authenticator: authenticator.clone(),
                    requirement,
                },
                guard,
            ));
        }

        info!("Mounted route group `{group}` at `{}`", setting.path("/"));
        router = router.merge(group_router);
        mounted.push(group);
    }

    Ok(Routes { router, mounted })
}

fn group_routes(group: RouteGroup, setting: &RouteSetting) -> Router {
    let routes: Vec<(&str, MethodRouter)> = match group {
        RouteGroup::Jwt => {
            let mut routes = vec![("/login", post(auth::jwt_login))];
            if setting.enable_refresh {
                routes.push(("/refresh", post(auth::jwt_refresh)));
            }
            routes
        }
        RouteGroup::Cookie => vec![
            ("/login", post(auth::cookie_login)),
            ("/logout", post(auth::cookie_logout)),
        ],
        RouteGroup::Register => vec![("/register", post(register::register))],
        RouteGroup::Verify => vec![
            ("/request-verify-token", post(verify::request_verify_token)),
            ("/verify", post(verify::verify)),
        ],
        RouteGroup::Reset => vec![
            ("/forgot-password", post(reset::forgot_password)),
            ("/reset-password", post(reset::reset_password)),
        ],
        RouteGroup::Users => vec![
            ("/me", get(users::me).patch(users::update_me)),
            (
                "/{id}",
                get(users::get_user)
                    .patch(users::update_user)
                    .delete(users::delete_user),
            ),
        ],
    };

    routes
        .into_iter()
        .fold(Router::new(), |router, (path, method_router)| {
            router.route(&setting.path(path), method_router)
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_follow_refresh_flag() {
        let settings = RouteSettings::new();
        assert_eq!(endpoints(RouteGroup::Jwt, settings.get(RouteGroup::Jwt)).len(), 2);

        let settings = settings.with_enable_refresh(false);
        assert_eq!(
            endpoints(RouteGroup::Jwt, settings.get(RouteGroup::Jwt)),
            [(Method::POST, "/login")]
        );
    }

    #[test]
    fn default_groups_do_not_overlap() {
        let settings = RouteSettings::new();
        let mut seen = std::collections::HashSet::new();
        for (group, setting) in settings.enabled() {
            for (method, path) in endpoints(group, setting) {
                assert!(seen.insert((method, setting.path(path))));
            }
        }
    }
}
