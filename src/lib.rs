//! # msdss-users
//!
//! User management API: registration, login, password reset, email
//! verification and user CRUD, assembled from a typed configuration.
//!
//! ## Configuration
//!
//! Every secret and connection parameter is resolved with the same precedence:
//! an explicit value wins over the environment (process environment overlaid on
//! an optional, optionally encrypted, dotenv file), which wins over a fallback.
//! See [`config`].
//!
//! ## Assembly
//!
//! [`api::UsersApi`] connects the database, builds the auth backends and the
//! [`users::UserManager`], and mounts the six route groups (`jwt`, `cookie`,
//! `register`, `verify`, `reset`, `users`) according to
//! [`api::settings::RouteSettings`].

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod users;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
