use anyhow::{Context, Result, bail};
use std::io::{self, Write};

use crate::{cli::globals::GlobalArgs, config::SecretKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvCommand {
    Set { name: String, value: String },
    Get { name: String },
    Delete { name: String },
    Keygen,
    Clear { yes: bool },
}

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub command: EnvCommand,
}

/// Environment variable for a logical secret name, or `name` itself.
#[must_use]
pub fn env_key(name: &str) -> String {
    SecretKind::from_name(name).map_or_else(|| name.to_string(), |kind| kind.default_env_key().to_string())
}

/// # Errors
/// Returns an error if the env or key file cannot be read or written.
pub fn execute(args: Args) -> Result<()> {
    run(&args.globals, args.command, &mut io::stdout())
}

/// # Errors
/// Returns an error if the env or key file cannot be read or written.
pub fn run<O: Write>(globals: &GlobalArgs, command: EnvCommand, out: &mut O) -> Result<()> {
    let dotenv = globals.dotenv();
    let file = dotenv.env_file().display().to_string();

    match command {
        EnvCommand::Set { name, value } => {
            let key = env_key(&name);
            dotenv
                .set(&key, &value)
                .with_context(|| format!("Failed to write {file}"))?;
            writeln!(out, "Set {key} in {file}")?;
        }
        EnvCommand::Get { name } => {
            let key = env_key(&name);
            match dotenv.get(&key).with_context(|| format!("Failed to read {file}"))? {
                Some(value) => writeln!(out, "{value}")?,
                None => writeln!(out, "{key} is not set in {file}")?,
            }
        }
        EnvCommand::Delete { name } => {
            let key = env_key(&name);
            if dotenv
                .delete(&key)
                .with_context(|| format!("Failed to write {file}"))?
            {
                writeln!(out, "Deleted {key} from {file}")?;
            } else {
                writeln!(out, "{key} is not set in {file}")?;
            }
        }
        EnvCommand::Keygen => {
            if dotenv.generate_key().context("Failed to create key file")? {
                writeln!(out, "Key created")?;
            } else {
                writeln!(out, "Key already exists")?;
            }
        }
        EnvCommand::Clear { yes } => {
            if !yes {
                bail!("Refusing to remove {file} without --yes");
            }
            dotenv.clear().context("Failed to remove env files")?;
            writeln!(out, "Removed {file}")?;
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn output(globals: &GlobalArgs, command: EnvCommand) -> String {
        let mut out = Vec::new();
        run(globals, command, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn logical_names_map_to_env_keys() {
        assert_eq!(env_key("jwt_secret"), "MSDSS_USERS_JWT_SECRET");
        assert_eq!(env_key("MSDSS_DATABASE_HOST"), "MSDSS_DATABASE_HOST");
    }

    #[test]
    fn encrypted_set_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let globals = GlobalArgs::new(dir.path().join(".env"))
            .with_key_path(Some(dir.path().join(".env.key")));

        assert_eq!(output(&globals, EnvCommand::Keygen), "Key created\n");
        assert_eq!(output(&globals, EnvCommand::Keygen), "Key already exists\n");

        output(
            &globals,
            EnvCommand::Set {
                name: "secret".to_string(),
                value: "s3cr3t".to_string(),
            },
        );
        let raw = std::fs::read_to_string(dir.path().join(".env")).unwrap();
        assert!(!raw.contains("s3cr3t"));

        assert_eq!(
            output(
                &globals,
                EnvCommand::Get {
                    name: "secret".to_string()
                }
            ),
            "s3cr3t\n"
        );

        output(
            &globals,
            EnvCommand::Delete {
                name: "secret".to_string(),
            },
        );
        assert!(output(
            &globals,
            EnvCommand::Get {
                name: "secret".to_string()
            }
        )
        .contains("is not set"));
    }

    #[test]
    fn clear_requires_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let globals = GlobalArgs::new(dir.path().join(".env"));
        output(
            &globals,
            EnvCommand::Set {
                name: "jwt_secret".to_string(),
                value: "x".to_string(),
            },
        );

        let mut out = Vec::new();
        assert!(run(&globals, EnvCommand::Clear { yes: false }, &mut out).is_err());
        assert!(dir.path().join(".env").exists());

        output(&globals, EnvCommand::Clear { yes: true });
        assert!(!dir.path().join(".env").exists());
    }
}
