use crate::cli::{
    actions::Action,
    commands::{self, logging::ARG_VERBOSITY, start as start_cmd},
    dispatch, telemetry,
};
use anyhow::Result;

/// Map verbosity count to tracing level
const fn get_verbosity_level(verbosity: u8) -> Option<tracing::Level> {
    match verbosity {
        0 => None,
        1 => Some(tracing::Level::WARN),
        2 => Some(tracing::Level::INFO),
        3 => Some(tracing::Level::DEBUG),
        _ => Some(tracing::Level::TRACE),
    }
}

/// Parse arguments, initialize telemetry and return the action to execute.
///
/// `-v` wins over `start --log_level`.
///
/// # Errors
///
/// Returns an error if argument parsing, telemetry initialization, or action dispatch fails
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    let verbosity = matches.get_one::<u8>(ARG_VERBOSITY).copied().unwrap_or(0);
    let server_level = matches
        .subcommand_matches(start_cmd::CMD_START)
        .and_then(|sub| sub.get_one::<u8>(start_cmd::ARG_LOG_LEVEL).copied());

    let verbosity_level = match (verbosity, server_level) {
        (0, Some(level)) => get_verbosity_level(level),
        (verbosity, _) => get_verbosity_level(verbosity),
    };

    telemetry::init(verbosity_level)?;

    dispatch::handler(&matches)
}
