use std::path::PathBuf;

use crate::config::{DEFAULT_ENV_FILE, DotEnv, EnvOptions};

/// Options shared by every subcommand.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub env_file: PathBuf,
    pub key_path: Option<PathBuf>,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(env_file: impl Into<PathBuf>) -> Self {
        Self {
            env_file: env_file.into(),
            key_path: None,
        }
    }

    #[must_use]
    pub fn with_key_path(mut self, key_path: Option<PathBuf>) -> Self {
        self.key_path = key_path;
        self
    }

    #[must_use]
    pub fn env_options(&self) -> EnvOptions {
        EnvOptions::new()
            .with_env_file(self.env_file.clone())
            .with_key_path(self.key_path.clone())
    }

    #[must_use]
    pub fn dotenv(&self) -> DotEnv {
        DotEnv::new(self.env_file.clone(), self.key_path.clone())
    }
}

impl Default for GlobalArgs {
    fn default() -> Self {
        Self::new(DEFAULT_ENV_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_args() {
        let args = GlobalArgs::default();
        assert_eq!(args.env_file, PathBuf::from("./.env"));
        assert!(args.key_path.is_none());
        assert!(!args.dotenv().is_encrypted());
    }

    #[test]
    fn test_key_path_encrypts() {
        let args = GlobalArgs::new("/tmp/users.env").with_key_path(Some("/tmp/users.key".into()));
        let dotenv = args.dotenv();
        assert!(dotenv.is_encrypted());
        assert_eq!(dotenv.env_file(), PathBuf::from("/tmp/users.env").as_path());
    }
}
