//! Prompts for values missing from the command line.
//!
//! Passwords are read from the terminal without echo once
//! [`Prompt::with_hidden_passwords`] is set; otherwise they come from `input`
//! like any other line.

use anyhow::{Context, Result, bail};
use std::io::{BufRead, Write};

pub struct Prompt<R, W> {
    input: R,
    output: W,
    hidden: bool,
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    pub const fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            hidden: false,
        }
    }

    #[must_use]
    pub const fn with_hidden_passwords(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub const fn hides_passwords(&self) -> bool {
        self.hidden
    }

    /// # Errors
    /// Returns an error on I/O failure or end of input.
    pub fn line(&mut self, label: &str) -> Result<String> {
        write!(self.output, "{label}: ")?;
        self.output.flush()?;

        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("Failed to read from stdin")?;
        if read == 0 {
            bail!("No input for {label}");
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn secret(&mut self, label: &str) -> Result<String> {
        if self.hidden {
            return rpassword::prompt_password(format!("{label}: "))
                .context("Failed to read password from terminal");
        }
        self.line(label)
    }

    /// Ask for a password twice.
    ///
    /// # Errors
    /// Returns an error if the two entries differ.
    pub fn password(&mut self) -> Result<String> {
        let password = self.secret("Password")?;
        let confirm = self.secret("Confirm password")?;
        if password != confirm {
            bail!("Passwords do not match");
        }
        Ok(password)
    }

    /// Use `value` or prompt for it.
    ///
    /// # Errors
    /// Returns an error if prompting fails.
    pub fn or_line(&mut self, value: Option<String>, label: &str) -> Result<String> {
        match value {
            Some(value) => Ok(value),
            None => self.line(label),
        }
    }

    /// # Errors
    /// Returns an error if prompting fails or the passwords differ.
    pub fn or_password(&mut self, value: Option<String>) -> Result<String> {
        match value {
            Some(value) => Ok(value),
            None => self.password(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn password_twice() {
        let mut out = Vec::new();
        let mut prompt = Prompt::new(Cursor::new("secret\nsecret\n"), &mut out);
        assert_eq!(prompt.password().unwrap(), "secret");
        drop(prompt);
        assert_eq!(String::from_utf8(out).unwrap(), "Password: Confirm password: ");
    }

    #[test]
    fn terminal_prompt_hides_passwords() {
        let prompt = Prompt::new(Cursor::new(""), Vec::new());
        assert!(!prompt.hides_passwords());
        assert!(prompt.with_hidden_passwords().hides_passwords());
    }

    #[test]
    fn password_mismatch_aborts() {
        let mut prompt = Prompt::new(Cursor::new("one\ntwo\n"), Vec::new());
        let err = prompt.password().unwrap_err();
        assert_eq!(err.to_string(), "Passwords do not match");
    }

    #[test]
    fn given_values_skip_prompt() {
        let mut prompt = Prompt::new(Cursor::new(""), Vec::new());
        assert_eq!(
            prompt.or_line(Some("a@example.com".to_string()), "Email").unwrap(),
            "a@example.com"
        );
        assert!(prompt.or_line(None, "Email").is_err());
    }
}
