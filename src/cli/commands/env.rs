use clap::{Arg, ArgAction, Command};

pub const CMD_ENV: &str = "env";
pub const CMD_SET: &str = "set";
pub const CMD_GET: &str = "get";
pub const CMD_DELETE: &str = "delete";
pub const CMD_KEYGEN: &str = "keygen";
pub const CMD_CLEAR: &str = "clear";

pub const ARG_NAME: &str = "name";
pub const ARG_VALUE: &str = "value";

fn name() -> Arg {
    Arg::new(ARG_NAME)
        .help("Secret name (secret, jwt_secret, cookie_secret, ...) or environment variable")
        .required(true)
}

#[must_use]
pub fn subcommand() -> Command {
    Command::new(CMD_ENV)
        .about("Manage the env file")
        .subcommand_required(true)
        .subcommand(
            Command::new(CMD_SET)
                .about("Set a value")
                .arg(name())
                .arg(Arg::new(ARG_VALUE).help("Value to store").required(true)),
        )
        .subcommand(Command::new(CMD_GET).about("Print a value").arg(name()))
        .subcommand(Command::new(CMD_DELETE).about("Remove a value").arg(name()))
        .subcommand(Command::new(CMD_KEYGEN).about("Create the key file used to encrypt the env file"))
        .subcommand(
            Command::new(CMD_CLEAR)
                .about("Remove the env file and its key file")
                .arg(
                    Arg::new("yes")
                        .long("yes")
                        .help("Do not ask for confirmation")
                        .action(ArgAction::SetTrue),
                ),
        )
}
