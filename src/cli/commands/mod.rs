pub mod env;
pub mod logging;
pub mod start;
pub mod users;

use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

use crate::config::DEFAULT_ENV_FILE;

pub const ARG_ENV_FILE: &str = "env_file";
pub const ARG_KEY_PATH: &str = "key_path";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("msdss-users")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new(ARG_ENV_FILE)
                .long(ARG_ENV_FILE)
                .alias("env-file")
                .help("Path of the env file holding secrets and database settings")
                .default_value(DEFAULT_ENV_FILE)
                .env("MSDSS_USERS_ENV_FILE")
                .global(true),
        )
        .arg(
            Arg::new(ARG_KEY_PATH)
                .long(ARG_KEY_PATH)
                .alias("key-path")
                .help("Path of the key file; when set the env file is encrypted")
                .env("MSDSS_USERS_KEY_PATH")
                .global(true),
        )
        .subcommands(users::subcommands())
        .subcommand(start::subcommand())
        .subcommand(env::subcommand());

    logging::with_args(command)
}
