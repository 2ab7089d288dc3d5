use anyhow::{Context, Result};
use tracing::info;

use crate::{
    api::{UsersApi, UsersSettings, settings::RouteSettings},
    cli::globals::GlobalArgs,
};

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub host: String,
    pub port: u16,
    pub routes: Vec<(String, String, String)>,
    pub jwt_lifetime: u64,
    pub cookie_lifetime: u64,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the route settings are invalid, the database is
/// unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let routes = RouteSettings::from_overrides(args.routes.iter().map(|(group, key, value)| {
        (group.as_str(), key.as_str(), value.as_str())
    }))
    .context("Invalid route setting")?;

    log_startup_args(&args);

    let settings = UsersSettings::new()
        .with_env(args.globals.env_options())
        .with_routes(routes)
        .with_jwt_lifetime(args.jwt_lifetime)
        .with_cookie_lifetime(args.cookie_lifetime);

    let api = UsersApi::new(settings).await?;

    api.serve(&args.host, args.port).await
}

fn log_startup_args(args: &Args) {
    let mut entries = vec![
        ("listen", format!("{}:{}", args.host, args.port)),
        ("env_file", args.globals.env_file.display().to_string()),
        ("encrypted_env", args.globals.key_path.is_some().to_string()),
        ("jwt_lifetime", args.jwt_lifetime.to_string()),
        ("cookie_lifetime", args.cookie_lifetime.to_string()),
    ];
    for (group, key, value) in &args.routes {
        entries.push(("set", format!("{group}.{key}={value}")));
    }

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}
