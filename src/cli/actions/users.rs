use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};
use tracing::debug;

use crate::{
    cli::{globals::GlobalArgs, prompt::Prompt},
    config::{Resolver, SecretKeys, SecretOverrides, Secrets},
    database::{Database, DatabaseSettings},
    users::{ManagerSettings, UserCreate, UserError, UserManager, UserRecord, UserUpdate},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Register {
        email: Option<String>,
        password: Option<String>,
        superuser: bool,
    },
    Get {
        email: String,
    },
    Delete {
        email: String,
    },
    Reset {
        email: String,
        password: Option<String>,
    },
    Update {
        email: String,
        is_active: Option<bool>,
        is_superuser: Option<bool>,
        is_verified: Option<bool>,
    },
}

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub command: UserCommand,
}

/// Connect to the configured database and run a user command against it.
///
/// # Errors
/// Returns an error if the database is unreachable, a prompt fails or the
/// user manager reports an unexpected error.
pub async fn execute(args: Args) -> Result<()> {
    let resolver = Resolver::from_options(&args.globals.env_options())
        .context("Failed to read environment")?;
    let secrets = Secrets::resolve(&resolver, &SecretKeys::new(), &SecretOverrides::new());
    let settings = DatabaseSettings::from_resolver(&resolver).context("Invalid database settings")?;

    let database = Database::connect(&settings)
        .await
        .context("Failed to connect to database")?;
    database
        .create_schema()
        .await
        .context("Failed to create users table")?;

    let manager = UserManager::new(
        database.clone(),
        ManagerSettings::from_secrets(&secrets).context("Failed to configure user manager")?,
    );

    let stdin = io::stdin();
    let mut prompt = Prompt::new(stdin.lock(), io::stdout()).with_hidden_passwords();
    let result = run(&manager, args.command, &mut prompt, &mut io::stdout()).await;

    database.close().await;
    result
}

/// Run `command` and print its outcome to `out`.
///
/// # Errors
/// Returns an error if prompting fails or the database fails.
pub async fn run<R, W, O>(
    manager: &UserManager,
    command: UserCommand,
    prompt: &mut Prompt<R, W>,
    out: &mut O,
) -> Result<()>
where
    R: BufRead,
    W: Write,
    O: Write,
{
    debug!("user command: {command:?}");

    match command {
        UserCommand::Register {
            email,
            password,
            superuser,
        } => {
            let email = prompt.or_line(email, "Email")?;
            let password = prompt.or_password(password)?;
            let create = UserCreate::new(email.clone(), password).with_superuser(superuser);
            match manager.create(create, false).await {
                Ok(user) => writeln!(out, "User created {}", user.email)?,
                Err(UserError::AlreadyExists) => writeln!(out, "User {email} already exists")?,
                Err(err) => return Err(err).context("Failed to register user"),
            }
        }
        UserCommand::Get { email } => {
            let Some(user) = find(manager, &email, out).await? else {
                return Ok(());
            };
            writeln!(out, "id: {}", user.id)?;
            writeln!(out, "email: {}", user.email)?;
            writeln!(out, "is_active: {}", user.is_active)?;
            writeln!(out, "is_superuser: {}", user.is_superuser)?;
            writeln!(out, "is_verified: {}", user.is_verified)?;
        }
        UserCommand::Delete { email } => {
            let Some(user) = find(manager, &email, out).await? else {
                return Ok(());
            };
            match manager.delete(&user).await {
                Ok(()) => writeln!(out, "User deleted {}", user.email)?,
                Err(UserError::NotExists) => writeln!(out, "User {email} does not exist")?,
                Err(err) => return Err(err).context("Failed to delete user"),
            }
        }
        UserCommand::Reset { email, password } => {
            let Some(user) = find(manager, &email, out).await? else {
                return Ok(());
            };
            let password = prompt.or_password(password)?;
            let update = UserUpdate {
                password: Some(password),
                ..UserUpdate::default()
            };
            apply(manager, &user, update, out, "User password reset").await?;
        }
        UserCommand::Update {
            email,
            is_active,
            is_superuser,
            is_verified,
        } => {
            let Some(user) = find(manager, &email, out).await? else {
                return Ok(());
            };
            let update = UserUpdate {
                is_active,
                is_superuser,
                is_verified,
                ..UserUpdate::default()
            };
            apply(manager, &user, update, out, "User updated").await?;
        }
    }

    Ok(())
}

async fn find<O: Write>(
    manager: &UserManager,
    email: &str,
    out: &mut O,
) -> Result<Option<UserRecord>> {
    match manager.get_by_email(email).await {
        Ok(user) => Ok(Some(user)),
        Err(UserError::NotExists) => {
            writeln!(out, "User {email} does not exist")?;
            Ok(None)
        }
        Err(err) => Err(err).context("Failed to look up user"),
    }
}

async fn apply<O: Write>(
    manager: &UserManager,
    user: &UserRecord,
    update: UserUpdate,
    out: &mut O,
    message: &str,
) -> Result<()> {
    match manager.update(user, update, false).await {
        Ok(updated) => writeln!(out, "{message} {}", updated.email)?,
        Err(UserError::NotExists) => writeln!(out, "User {} does not exist", user.email)?,
        Err(err) => return Err(err).context("Failed to update user"),
    }
    Ok(())
}
