use crate::cli::{
    actions::{
        Action,
        env::{self, EnvCommand},
        server,
        users::{self, UserCommand},
    },
    commands::{self, env as env_cmd, start as start_cmd, users as users_cmd},
    globals::GlobalArgs,
};
use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use std::path::PathBuf;

fn globals(matches: &ArgMatches) -> GlobalArgs {
    let env_file = matches
        .get_one::<String>(commands::ARG_ENV_FILE)
        .map_or_else(GlobalArgs::default, GlobalArgs::new);
    env_file.with_key_path(matches.get_one::<String>(commands::ARG_KEY_PATH).map(PathBuf::from))
}

fn email(matches: &ArgMatches) -> Result<String> {
    matches
        .get_one::<String>(users_cmd::ARG_EMAIL)
        .cloned()
        .context("missing required argument: email")
}

fn name(matches: &ArgMatches) -> Result<String> {
    matches
        .get_one::<String>(env_cmd::ARG_NAME)
        .cloned()
        .context("missing required argument: name")
}

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    let globals = globals(matches);

    let Some((subcommand, sub)) = matches.subcommand() else {
        bail!("missing subcommand");
    };

    let command = match subcommand {
        users_cmd::CMD_REGISTER => UserCommand::Register {
            email: sub.get_one::<String>(users_cmd::ARG_EMAIL).cloned(),
            password: sub.get_one::<String>(users_cmd::ARG_PASSWORD).cloned(),
            superuser: sub.get_flag(users_cmd::ARG_SUPERUSER),
        },
        users_cmd::CMD_GET => UserCommand::Get { email: email(sub)? },
        users_cmd::CMD_DELETE => UserCommand::Delete { email: email(sub)? },
        users_cmd::CMD_RESET => UserCommand::Reset {
            email: email(sub)?,
            password: sub.get_one::<String>(users_cmd::ARG_PASSWORD).cloned(),
        },
        users_cmd::CMD_UPDATE => UserCommand::Update {
            email: email(sub)?,
            is_active: sub.get_one::<bool>(users_cmd::ARG_IS_ACTIVE).copied(),
            is_superuser: sub.get_one::<bool>(users_cmd::ARG_IS_SUPERUSER).copied(),
            is_verified: sub.get_one::<bool>(users_cmd::ARG_IS_VERIFIED).copied(),
        },
        start_cmd::CMD_START => return start(globals, sub).map(Action::Server),
        env_cmd::CMD_ENV => return env_action(globals, sub).map(Action::Env),
        other => bail!("unknown subcommand: {other}"),
    };

    Ok(Action::Users(users::Args { globals, command }))
}

fn start(globals: GlobalArgs, sub: &ArgMatches) -> Result<server::Args> {
    let routes = sub
        .get_occurrences::<String>(start_cmd::ARG_SET)
        .map(|occurrences| {
            occurrences
                .map(|values| {
                    let values: Vec<&String> = values.collect();
                    match values.as_slice() {
                        [group, key, value] => Ok(((*group).clone(), (*key).clone(), (*value).clone())),
                        _ => bail!("--set expects ROUTE KEY VALUE"),
                    }
                })
                .collect::<Result<Vec<_>>>()
        })
        .transpose()?
        .unwrap_or_default();

    Ok(server::Args {
        globals,
        host: sub
            .get_one::<String>(start_cmd::ARG_HOST)
            .cloned()
            .unwrap_or_else(|| "127.0.0.1".to_string()),
        port: sub.get_one::<u16>(start_cmd::ARG_PORT).copied().unwrap_or(8000),
        routes,
        jwt_lifetime: sub
            .get_one::<u64>(start_cmd::ARG_JWT_LIFETIME)
            .copied()
            .context("missing argument: --jwt_lifetime")?,
        cookie_lifetime: sub
            .get_one::<u64>(start_cmd::ARG_COOKIE_LIFETIME)
            .copied()
            .context("missing argument: --cookie_lifetime")?,
    })
}

fn env_action(globals: GlobalArgs, sub: &ArgMatches) -> Result<env::Args> {
    let Some((subcommand, args)) = sub.subcommand() else {
        bail!("missing env subcommand");
    };

    let command = match subcommand {
        env_cmd::CMD_SET => EnvCommand::Set {
            name: name(args)?,
            value: args
                .get_one::<String>(env_cmd::ARG_VALUE)
                .cloned()
                .context("missing required argument: value")?,
        },
        env_cmd::CMD_GET => EnvCommand::Get { name: name(args)? },
        env_cmd::CMD_DELETE => EnvCommand::Delete { name: name(args)? },
        env_cmd::CMD_KEYGEN => EnvCommand::Keygen,
        env_cmd::CMD_CLEAR => EnvCommand::Clear {
            yes: args.get_flag("yes"),
        },
        other => bail!("unknown env subcommand: {other}"),
    };

    Ok(env::Args { globals, command })
}
