use clap::{Arg, ArgAction, Command};

use super::logging::validator_log_level;

pub const CMD_START: &str = "start";

pub const ARG_HOST: &str = "host";
pub const ARG_PORT: &str = "port";
pub const ARG_LOG_LEVEL: &str = "log_level";
pub const ARG_SET: &str = "set";
pub const ARG_JWT_LIFETIME: &str = "jwt_lifetime";
pub const ARG_COOKIE_LIFETIME: &str = "cookie_lifetime";

#[must_use]
pub fn subcommand() -> Command {
    Command::new(CMD_START)
        .about("Start the users API server")
        .arg(
            Arg::new(ARG_HOST)
                .long(ARG_HOST)
                .help("Address to bind")
                .default_value("127.0.0.1")
                .env("MSDSS_USERS_HOST"),
        )
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8000")
                .env("MSDSS_USERS_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_LOG_LEVEL)
                .long(ARG_LOG_LEVEL)
                .alias("log-level")
                .help("Server log level: error, warn, info, debug, trace")
                .default_value("info")
                .value_parser(validator_log_level()),
        )
        .arg(
            Arg::new(ARG_SET)
                .long(ARG_SET)
                .help("Route group setting, e.g. --set users prefix /accounts")
                .value_names(["ROUTE", "KEY", "VALUE"])
                .num_args(3)
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new(ARG_JWT_LIFETIME)
                .long(ARG_JWT_LIFETIME)
                .alias("jwt-lifetime")
                .help("Bearer token lifetime in seconds")
                .default_value("900")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_COOKIE_LIFETIME)
                .long(ARG_COOKIE_LIFETIME)
                .alias("cookie-lifetime")
                .help("Auth cookie lifetime in seconds")
                .default_value("2592000")
                .value_parser(clap::value_parser!(u64)),
        )
}
