use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::debug;

use super::{EmailRequest, TokenRequest};
use crate::{
    api::error::{ApiError, VERIFY_USER_ALREADY_VERIFIED, VERIFY_USER_BAD_TOKEN},
    auth::Authenticator,
    users::{User, UserError},
};

#[utoipa::path(
    post,
    path = "/request-verify-token",
    request_body = EmailRequest,
    responses(
        (status = 202, description = "Accepted whether or not the email is known")
    ),
    tag = "auth"
)]
pub async fn request_verify_token(
    auth: Extension<Arc<Authenticator>>,
    Json(request): Json<EmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    match auth.manager().request_verify(&request.email).await {
        Ok(token) => debug!("verification token issued: {}", token.is_some()),
        Err(UserError::Database(err)) => return Err(ApiError::Internal(err.to_string())),
        Err(err) => debug!("verification request ignored: {err}"),
    }
    Ok((StatusCode::ACCEPTED, Json(serde_json::Value::Null)))
}

#[utoipa::path(
    post,
    path = "/verify",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "User verified", body = User),
        (status = 400, description = "VERIFY_USER_BAD_TOKEN or VERIFY_USER_ALREADY_VERIFIED")
    ),
    tag = "auth"
)]
pub async fn verify(
    auth: Extension<Arc<Authenticator>>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<User>, ApiError> {
    match auth.manager().verify(&request.token).await {
        Ok(user) => Ok(Json(user)),
        Err(UserError::AlreadyVerified) => Err(ApiError::Code(VERIFY_USER_ALREADY_VERIFIED)),
        Err(err) => Err(ApiError::from_user_error(err, VERIFY_USER_BAD_TOKEN)),
    }
}
