use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;

use crate::{
    api::error::{ApiError, REGISTER_INVALID_PASSWORD, REGISTER_USER_ALREADY_EXISTS},
    auth::Authenticator,
    users::{User, UserCreate, UserError},
};

#[utoipa::path(
    post,
    path = "/register",
    request_body = UserCreate,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "REGISTER_USER_ALREADY_EXISTS or REGISTER_INVALID_PASSWORD"),
        (status = 422, description = "Invalid email")
    ),
    tag = "auth"
)]
// axum handler for register
pub async fn register(
    auth: Extension<Arc<Authenticator>>,
    Json(create): Json<UserCreate>,
) -> Result<impl IntoResponse, ApiError> {
    match auth.manager().create(create, true).await {
        Ok(user) => Ok((StatusCode::CREATED, Json(user))),
        Err(UserError::InvalidPassword(reason)) => {
            Err(ApiError::CodeWithReason(REGISTER_INVALID_PASSWORD, reason))
        }
        Err(err) => Err(ApiError::from_user_error(err, REGISTER_USER_ALREADY_EXISTS)),
    }
}
