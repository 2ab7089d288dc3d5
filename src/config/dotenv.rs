//! Dotenv file management, plain or encrypted.
//!
//! With a key path the whole file is sealed with [`super::crypto`]; without one
//! it is a regular `KEY="value"` file parsed by `dotenvy`.

use std::{
    fs,
    io::{Cursor, Write},
    path::{Path, PathBuf},
};
use tracing::debug;

use super::{ConfigError, crypto};

#[derive(Clone, Debug)]
pub struct DotEnv {
    env_file: PathBuf,
    key_path: Option<PathBuf>,
}

impl DotEnv {
    #[must_use]
    pub fn new(env_file: impl Into<PathBuf>, key_path: Option<PathBuf>) -> Self {
        Self {
            env_file: env_file.into(),
            key_path,
        }
    }

    #[must_use]
    pub fn env_file(&self) -> &Path {
        &self.env_file
    }

    #[must_use]
    pub fn key_path(&self) -> Option<&Path> {
        self.key_path.as_deref()
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.env_file.is_file()
    }

    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.key_path.is_some()
    }

    /// Read all entries in file order. A missing file reads as empty.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, decrypted or parsed.
    pub fn read(&self) -> Result<Vec<(String, String)>, ConfigError> {
        if !self.exists() {
            return Ok(Vec::new());
        }

        let entries = match &self.key_path {
            Some(key_path) => {
                let key = crypto::read_key(key_path)?;
                let sealed = fs::read_to_string(&self.env_file)?;
                let plaintext = crypto::decrypt(&key, &sealed)?;
                dotenvy::from_read_iter(Cursor::new(plaintext))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|source| self.parse_error(source))?
            }
            None => dotenvy::from_path_iter(&self.env_file)
                .map_err(|source| self.parse_error(source))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|source| self.parse_error(source))?,
        };

        debug!(
            "read {} entries from {}",
            entries.len(),
            self.env_file.display()
        );

        Ok(entries)
    }

    /// # Errors
    /// Returns an error if the file cannot be read.
    pub fn get(&self, name: &str) -> Result<Option<String>, ConfigError> {
        Ok(self
            .read()?
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value))
    }

    /// # Errors
    /// Returns an error if the file cannot be read.
    pub fn is_set(&self, name: &str) -> Result<bool, ConfigError> {
        Ok(self.get(name)?.is_some())
    }

    /// Set `name` to `value`, creating the file if needed.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or written.
    pub fn set(&self, name: &str, value: &str) -> Result<(), ConfigError> {
        let mut entries = self.read()?;
        match entries.iter_mut().find(|(key, _)| key == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => entries.push((name.to_string(), value.to_string())),
        }
        self.save(&entries)
    }

    /// Remove `name`, returning whether it was present.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or written.
    pub fn delete(&self, name: &str) -> Result<bool, ConfigError> {
        let mut entries = self.read()?;
        let before = entries.len();
        entries.retain(|(key, _)| key != name);
        if entries.len() == before {
            return Ok(false);
        }
        self.save(&entries)?;
        Ok(true)
    }

    /// Write `entries`, encrypting when a key path is configured.
    ///
    /// # Errors
    /// Returns an error if the key cannot be read or the file cannot be written.
    pub fn save(&self, entries: &[(String, String)]) -> Result<(), ConfigError> {
        let mut contents = String::new();
        for (key, value) in entries {
            contents.push_str(key);
            contents.push_str("=\"");
            contents.push_str(&escape(value));
            contents.push_str("\"\n");
        }

        match &self.key_path {
            Some(key_path) => {
                let key = crypto::read_key(key_path)?;
                write_private(&self.env_file, crypto::encrypt(&key, contents.as_bytes())?.as_bytes())?;
            }
            None => write_private(&self.env_file, contents.as_bytes())?,
        }

        Ok(())
    }

    /// Create the key file if it does not exist yet. Returns `true` when a new
    /// key was written.
    ///
    /// # Errors
    /// Returns an error if no key path is configured or the file cannot be written.
    pub fn generate_key(&self) -> Result<bool, ConfigError> {
        let key_path = self
            .key_path
            .as_ref()
            .ok_or_else(|| ConfigError::MissingSetting("key_path".to_string()))?;

        if key_path.exists() {
            return Ok(false);
        }

        write_private(key_path, crypto::generate_key().as_bytes())?;
        Ok(true)
    }

    /// Remove the env file and, if configured, the key file.
    ///
    /// # Errors
    /// Returns an error if an existing file cannot be removed.
    pub fn clear(&self) -> Result<(), ConfigError> {
        if self.env_file.exists() {
            fs::remove_file(&self.env_file)?;
        }
        if let Some(key_path) = &self.key_path {
            if key_path.exists() {
                fs::remove_file(key_path)?;
            }
        }
        Ok(())
    }

    fn parse_error(&self, source: dotenvy::Error) -> ConfigError {
        ConfigError::Dotenv {
            path: self.env_file.clone(),
            source,
        }
    }
}

/// Write `contents` readable by the owner only.
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        options.mode(0o600);
        let mut file = options.open(path)?;
        // `mode` only applies on creation.
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
        file.write_all(contents)
    }

    #[cfg(not(unix))]
    {
        options.open(path)?.write_all(contents)
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '$' => out.push_str("\\$"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}
