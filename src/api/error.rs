use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use crate::{auth::AuthRejection, users::UserError};

pub const LOGIN_BAD_CREDENTIALS: &str = "LOGIN_BAD_CREDENTIALS";
pub const REGISTER_USER_ALREADY_EXISTS: &str = "REGISTER_USER_ALREADY_EXISTS";
pub const REGISTER_INVALID_PASSWORD: &str = "REGISTER_INVALID_PASSWORD";
pub const VERIFY_USER_BAD_TOKEN: &str = "VERIFY_USER_BAD_TOKEN";
pub const VERIFY_USER_ALREADY_VERIFIED: &str = "VERIFY_USER_ALREADY_VERIFIED";
pub const RESET_PASSWORD_BAD_TOKEN: &str = "RESET_PASSWORD_BAD_TOKEN";
pub const RESET_PASSWORD_INVALID_PASSWORD: &str = "RESET_PASSWORD_INVALID_PASSWORD";
pub const UPDATE_USER_EMAIL_ALREADY_EXISTS: &str = "UPDATE_USER_EMAIL_ALREADY_EXISTS";
pub const UPDATE_USER_INVALID_PASSWORD: &str = "UPDATE_USER_INVALID_PASSWORD";

/// Handler failure rendered as `{"detail": ...}`.
#[derive(Debug)]
pub enum ApiError {
    /// 400 with a bare error code.
    Code(&'static str),
    /// 400 with `{"code": .., "reason": ..}`.
    CodeWithReason(&'static str, String),
    NotFound,
    Unprocessable(String),
    Auth(AuthRejection),
    Internal(String),
}

impl ApiError {
    /// Map the errors every handler treats alike; `code` covers the rest.
    pub(crate) fn from_user_error(err: UserError, code: &'static str) -> Self {
        match err {
            UserError::InvalidEmail(email) => Self::Unprocessable(format!("invalid email: {email}")),
            UserError::Database(err) => Self::Internal(err.to_string()),
            UserError::Hash(err) => Self::Internal(err),
            UserError::Token(err) => Self::Internal(err.to_string()),
            _ => Self::Code(code),
        }
    }
}

impl From<AuthRejection> for ApiError {
    fn from(rejection: AuthRejection) -> Self {
        Self::Auth(rejection)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Code(code) => (StatusCode::BAD_REQUEST, Json(json!({ "detail": code }))).into_response(),
            Self::CodeWithReason(code, reason) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "detail": { "code": code, "reason": reason } })),
            )
                .into_response(),
            Self::NotFound => {
                (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not Found" }))).into_response()
            }
            Self::Unprocessable(detail) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "detail": detail }))).into_response()
            }
            Self::Auth(rejection) => rejection.into_response(),
            Self::Internal(err) => {
                error!("Failed to handle users request: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(
            ApiError::Code(LOGIN_BAD_CREDENTIALS).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::NotFound.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from_user_error(UserError::InvalidEmail("x".to_string()), "X")
                .into_response()
                .status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::from_user_error(UserError::AlreadyExists, REGISTER_USER_ALREADY_EXISTS)
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Internal("boom".to_string()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
