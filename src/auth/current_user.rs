//! Current-user extraction and the required-user route guard.

use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use super::Authenticator;
use crate::users::UserRecord;

/// Conditions a user must meet to reach a route.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UserRequirement {
    pub active: bool,
    pub verified: bool,
    pub superuser: bool,
}

impl UserRequirement {
    /// Any authenticated user.
    pub const ANY: Self = Self {
        active: false,
        verified: false,
        superuser: false,
    };

    pub const ACTIVE: Self = Self {
        active: true,
        verified: false,
        superuser: false,
    };

    pub const SUPERUSER: Self = Self {
        active: true,
        verified: false,
        superuser: true,
    };

    /// # Errors
    /// Returns 401 for an inactive user and 403 for a missing verification or
    /// superuser flag.
    pub const fn check(&self, user: &UserRecord) -> Result<(), AuthRejection> {
        if self.active && !user.is_active {
            return Err(AuthRejection::Unauthorized);
        }
        if (self.verified && !user.is_verified) || (self.superuser && !user.is_superuser) {
            return Err(AuthRejection::Forbidden);
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthRejection {
    Unauthorized,
    Forbidden,
    Internal,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            Self::Forbidden => (StatusCode::FORBIDDEN, "Forbidden"),
            Self::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Authenticate the request and apply `requirement`.
///
/// # Errors
/// Returns the rejection to send when no user qualifies.
pub async fn require_user(
    authenticator: &Authenticator,
    parts: &Parts,
    requirement: UserRequirement,
) -> Result<UserRecord, AuthRejection> {
    let user = authenticator
        .authenticate(&parts.headers)
        .await
        .map_err(|err| {
            error!("Failed to authenticate request: {err}");
            AuthRejection::Internal
        })?
        .ok_or(AuthRejection::Unauthorized)?;
    requirement.check(&user)?;
    Ok(user)
}

/// The authenticated user of a request.
///
/// Set by [`guard`] when a route group requires a user, resolved on demand
/// otherwise. Handlers still apply their own [`UserRequirement`].
#[derive(Clone, Debug)]
pub struct CurrentUser(pub UserRecord);

impl CurrentUser {
    /// # Errors
    /// Returns the rejection if the user does not meet `requirement`.
    pub fn require(self, requirement: UserRequirement) -> Result<UserRecord, AuthRejection> {
        requirement.check(&self.0)?;
        Ok(self.0)
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<Self>() {
            return Ok(user.clone());
        }

        let authenticator = parts
            .extensions
            .get::<Arc<Authenticator>>()
            .cloned()
            .ok_or_else(|| {
                error!("Authenticator extension missing");
                AuthRejection::Internal
            })?;

        require_user(&authenticator, parts, UserRequirement::ANY)
            .await
            .map(Self)
    }
}

/// State of the [`guard`] middleware.
#[derive(Clone, Debug)]
pub struct Guard {
    pub authenticator: Arc<Authenticator>,
    pub requirement: UserRequirement,
}

/// Route layer for groups configured with a required user.
pub async fn guard(State(guard): State<Guard>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();

    match require_user(&guard.authenticator, &parts, guard.requirement).await {
        Ok(user) => {
            parts.extensions.insert(CurrentUser(user));
            next.run(Request::from_parts(parts, body)).await
        }
        Err(rejection) => rejection.into_response(),
    }
}
