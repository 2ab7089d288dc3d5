//! `/me` routes for active users and `/{id}` routes for superusers.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    api::error::{ApiError, UPDATE_USER_EMAIL_ALREADY_EXISTS, UPDATE_USER_INVALID_PASSWORD},
    auth::{Authenticator, CurrentUser, UserRequirement},
    users::{User, UserError, UserRecord, UserUpdate},
};

async fn apply_update(
    auth: &Authenticator,
    user: &UserRecord,
    update: UserUpdate,
    safe: bool,
) -> Result<Json<User>, ApiError> {
    match auth.manager().update(user, update, safe).await {
        Ok(user) => Ok(Json(user)),
        Err(UserError::InvalidPassword(reason)) => Err(ApiError::CodeWithReason(
            UPDATE_USER_INVALID_PASSWORD,
            reason,
        )),
        Err(UserError::NotExists) => Err(ApiError::NotFound),
        Err(err) => Err(ApiError::from_user_error(err, UPDATE_USER_EMAIL_ALREADY_EXISTS)),
    }
}

async fn find_user(auth: &Authenticator, id: &str) -> Result<UserRecord, ApiError> {
    let id = Uuid::parse_str(id).map_err(|_| ApiError::NotFound)?;
    match auth.manager().get(id).await {
        Ok(user) => Ok(user),
        Err(UserError::NotExists) => Err(ApiError::NotFound),
        Err(err) => Err(ApiError::Internal(err.to_string())),
    }
}

#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Missing, invalid or inactive user")
    ),
    tag = "users"
)]
pub async fn me(user: CurrentUser) -> Result<Json<User>, ApiError> {
    Ok(Json(user.require(UserRequirement::ACTIVE)?.to_user()))
}

#[utoipa::path(
    patch,
    path = "/me",
    request_body = UserUpdate,
    responses(
        (status = 200, description = "Updated user", body = User),
        (status = 400, description = "UPDATE_USER_EMAIL_ALREADY_EXISTS or UPDATE_USER_INVALID_PASSWORD"),
        (status = 401, description = "Missing, invalid or inactive user")
    ),
    tag = "users"
)]
pub async fn update_me(
    auth: Extension<Arc<Authenticator>>,
    user: CurrentUser,
    Json(update): Json<UserUpdate>,
) -> Result<Json<User>, ApiError> {
    let user = user.require(UserRequirement::ACTIVE)?;
    apply_update(&auth, &user, update, true).await
}

#[utoipa::path(
    get,
    path = "/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 401, description = "Missing, invalid or inactive user"),
        (status = 403, description = "Not a superuser"),
        (status = 404, description = "No such user")
    ),
    tag = "users"
)]
pub async fn get_user(
    auth: Extension<Arc<Authenticator>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    user.require(UserRequirement::SUPERUSER)?;
    Ok(Json(find_user(&auth, &id).await?.to_user()))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    params(("id" = String, Path, description = "User id")),
    request_body = UserUpdate,
    responses(
        (status = 200, description = "Updated user", body = User),
        (status = 400, description = "UPDATE_USER_EMAIL_ALREADY_EXISTS or UPDATE_USER_INVALID_PASSWORD"),
        (status = 401, description = "Missing, invalid or inactive user"),
        (status = 403, description = "Not a superuser"),
        (status = 404, description = "No such user")
    ),
    tag = "users"
)]
pub async fn update_user(
    auth: Extension<Arc<Authenticator>>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(update): Json<UserUpdate>,
) -> Result<Json<User>, ApiError> {
    user.require(UserRequirement::SUPERUSER)?;
    let target = find_user(&auth, &id).await?;
    apply_update(&auth, &target, update, false).await
}

#[utoipa::path(
    delete,
    path = "/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 401, description = "Missing, invalid or inactive user"),
        (status = 403, description = "Not a superuser"),
        (status = 404, description = "No such user")
    ),
    tag = "users"
)]
pub async fn delete_user(
    auth: Extension<Arc<Authenticator>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    user.require(UserRequirement::SUPERUSER)?;
    let target = find_user(&auth, &id).await?;
    match auth.manager().delete(&target).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(UserError::NotExists) => Err(ApiError::NotFound),
        Err(err) => Err(ApiError::Internal(err.to_string())),
    }
}
