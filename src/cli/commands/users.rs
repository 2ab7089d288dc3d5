use clap::{Arg, ArgAction, Command, builder::BoolishValueParser};

pub const CMD_REGISTER: &str = "register";
pub const CMD_GET: &str = "get";
pub const CMD_DELETE: &str = "delete";
pub const CMD_RESET: &str = "reset";
pub const CMD_UPDATE: &str = "update";

pub const ARG_EMAIL: &str = "email";
pub const ARG_PASSWORD: &str = "password";
pub const ARG_SUPERUSER: &str = "superuser";
pub const ARG_IS_ACTIVE: &str = "is_active";
pub const ARG_IS_SUPERUSER: &str = "is_superuser";
pub const ARG_IS_VERIFIED: &str = "is_verified";

fn email(required: bool) -> Arg {
    Arg::new(ARG_EMAIL)
        .help("Email of the user")
        .required(required)
}

fn password() -> Arg {
    Arg::new(ARG_PASSWORD).help("Password of the user, prompted for when omitted")
}

fn flag(name: &'static str, alias: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .alias(alias)
        .help(help)
        .value_name("BOOL")
        .value_parser(BoolishValueParser::new())
}

#[must_use]
pub fn subcommands() -> Vec<Command> {
    vec![
        Command::new(CMD_REGISTER)
            .about("Register a user")
            .arg(email(false).help("Email of the user, prompted for when omitted"))
            .arg(password())
            .arg(
                Arg::new(ARG_SUPERUSER)
                    .long(ARG_SUPERUSER)
                    .help("Create the user as a superuser")
                    .action(ArgAction::SetTrue),
            ),
        Command::new(CMD_GET)
            .about("Show the attributes of a user")
            .arg(email(true)),
        Command::new(CMD_DELETE)
            .about("Delete a user")
            .arg(email(true)),
        Command::new(CMD_RESET)
            .about("Reset the password of a user")
            .arg(email(true))
            .arg(password()),
        Command::new(CMD_UPDATE)
            .about("Update the flags of a user")
            .arg(email(true))
            .arg(flag(ARG_IS_ACTIVE, "is-active", "Whether the user can log in"))
            .arg(flag(ARG_IS_SUPERUSER, "is-superuser", "Whether the user is a superuser"))
            .arg(flag(ARG_IS_VERIFIED, "is-verified", "Whether the user verified their email")),
    ]
}
