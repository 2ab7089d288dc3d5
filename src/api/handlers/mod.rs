pub mod auth;
pub mod health;
pub mod register;
pub mod reset;
pub mod users;
pub mod verify;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// OAuth2 password form sent to the login routes.
#[derive(ToSchema, Deserialize, Serialize, Debug)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(ToSchema, Deserialize, Serialize, Debug)]
pub struct BearerResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(ToSchema, Deserialize, Serialize, Debug)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(ToSchema, Deserialize, Serialize, Debug)]
pub struct TokenRequest {
    pub token: String,
}

#[derive(ToSchema, Deserialize, Serialize, Debug)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}
