use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::debug;

use super::{EmailRequest, ResetPasswordRequest};
use crate::{
    api::error::{ApiError, RESET_PASSWORD_BAD_TOKEN, RESET_PASSWORD_INVALID_PASSWORD},
    auth::Authenticator,
    users::UserError,
};

#[utoipa::path(
    post,
    path = "/forgot-password",
    request_body = EmailRequest,
    responses(
        (status = 202, description = "Accepted whether or not the email is known")
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    auth: Extension<Arc<Authenticator>>,
    Json(request): Json<EmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    match auth.manager().forgot_password(&request.email).await {
        Ok(token) => debug!("reset token issued: {}", token.is_some()),
        Err(UserError::Database(err)) => return Err(ApiError::Internal(err.to_string())),
        Err(err) => debug!("reset request ignored: {err}"),
    }
    Ok((StatusCode::ACCEPTED, Json(serde_json::Value::Null)))
}

#[utoipa::path(
    post,
    path = "/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "RESET_PASSWORD_BAD_TOKEN or RESET_PASSWORD_INVALID_PASSWORD")
    ),
    tag = "auth"
)]
pub async fn reset_password(
    auth: Extension<Arc<Authenticator>>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    match auth
        .manager()
        .reset_password(&request.token, &request.password)
        .await
    {
        Ok(_) => Ok((StatusCode::OK, Json(serde_json::Value::Null))),
        Err(UserError::InvalidPassword(reason)) => Err(ApiError::CodeWithReason(
            RESET_PASSWORD_INVALID_PASSWORD,
            reason,
        )),
        Err(err) => Err(ApiError::from_user_error(err, RESET_PASSWORD_BAD_TOKEN)),
    }
}
