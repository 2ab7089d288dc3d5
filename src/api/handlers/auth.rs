//! Login, logout and token refresh for the bearer and cookie backends.

use axum::{
    Form,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::debug;

use super::{BearerResponse, LoginForm};
use crate::{
    api::error::{ApiError, LOGIN_BAD_CREDENTIALS},
    auth::{AuthBackend, AuthRejection, Authenticator, CurrentUser, Transport, UserRequirement},
    users::UserRecord,
};

fn backend_for(auth: &Authenticator, transport: Transport) -> Result<&AuthBackend, ApiError> {
    auth.backend(transport)
        .ok_or_else(|| ApiError::Internal(format!("no {transport:?} backend configured")))
}

async fn check_credentials(auth: &Authenticator, form: &LoginForm) -> Result<UserRecord, ApiError> {
    let user = auth
        .manager()
        .authenticate(&form.username, &form.password)
        .await
        .map_err(|err| ApiError::from_user_error(err, LOGIN_BAD_CREDENTIALS))?;

    match user {
        Some(user) if user.is_active => Ok(user),
        _ => {
            debug!("rejected login");
            Err(ApiError::Code(LOGIN_BAD_CREDENTIALS))
        }
    }
}

fn bearer_response(backend: &AuthBackend, user: &UserRecord) -> Result<Json<BearerResponse>, ApiError> {
    let token = backend
        .write_token(user)
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    Ok(Json(BearerResponse {
        access_token: token,
        token_type: "bearer".to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Access token issued", body = BearerResponse),
        (status = 400, description = "LOGIN_BAD_CREDENTIALS")
    ),
    tag = "auth"
)]
pub async fn jwt_login(
    auth: Extension<Arc<Authenticator>>,
    Form(form): Form<LoginForm>,
) -> Result<Json<BearerResponse>, ApiError> {
    let backend = backend_for(&auth, Transport::Bearer)?;
    let user = check_credentials(&auth, &form).await?;
    bearer_response(backend, &user)
}

#[utoipa::path(
    post,
    path = "/refresh",
    responses(
        (status = 200, description = "Access token re-issued", body = BearerResponse),
        (status = 401, description = "Missing, invalid or inactive user")
    ),
    tag = "auth"
)]
pub async fn jwt_refresh(
    auth: Extension<Arc<Authenticator>>,
    user: CurrentUser,
) -> Result<Json<BearerResponse>, ApiError> {
    let user = user.require(UserRequirement::ACTIVE)?;
    bearer_response(backend_for(&auth, Transport::Bearer)?, &user)
}

#[utoipa::path(
    post,
    path = "/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Auth cookie set"),
        (status = 400, description = "LOGIN_BAD_CREDENTIALS")
    ),
    tag = "auth"
)]
pub async fn cookie_login(
    auth: Extension<Arc<Authenticator>>,
    Form(form): Form<LoginForm>,
) -> Result<impl IntoResponse, ApiError> {
    let backend = backend_for(&auth, Transport::Cookie)?;
    let user = check_credentials(&auth, &form).await?;

    let token = backend
        .write_token(&user)
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    let cookie = backend
        .login_cookie(&token)
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    Ok((StatusCode::OK, headers))
}

#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 200, description = "Auth cookie cleared"),
        (status = 401, description = "Missing, invalid or inactive user")
    ),
    tag = "auth"
)]
pub async fn cookie_logout(
    auth: Extension<Arc<Authenticator>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let backend = backend_for(&auth, Transport::Cookie)?;
    let user = auth
        .authenticate_with(backend, &headers)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?
        .ok_or(AuthRejection::Unauthorized)?;
    UserRequirement::ACTIVE.check(&user)?;

    let cookie = backend
        .logout_cookie()
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, cookie);
    Ok((StatusCode::OK, response_headers))
}
