//! Per-group route settings.
//!
//! Overrides are given as `(group, key, value)` triples, e.g. from
//! `start --set users prefix /accounts`. Recognized keys:
//!
//! | key                  | value                                          |
//! |----------------------|------------------------------------------------|
//! | `prefix`             | mount prefix, `""` mounts at the root          |
//! | `tags`               | list (`["users"]`) or comma separated          |
//! | `_enable`            | boolean                                        |
//! | `_get_user`          | `{"active": .., "verified": .., "superuser": ..}` or `None` |
//! | `_enable_refresh`    | boolean, `jwt` only                            |
//! | `include_in_schema`  | boolean                                        |
//!
//! Booleans accept `true`/`false` in any case and `1`/`0`. Lists and maps
//! accept Python literal spelling (`True`, `None`, single quotes). Any other
//! key is kept in [`RouteSetting::extra`].

use serde_json::Value;
use std::{collections::BTreeMap, fmt, str::FromStr};

use crate::{auth::UserRequirement, config::ConfigError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RouteGroup {
    Jwt,
    Cookie,
    Register,
    Verify,
    Reset,
    Users,
}

impl RouteGroup {
    /// Registration order.
    pub const ALL: [Self; 6] = [
        Self::Jwt,
        Self::Cookie,
        Self::Register,
        Self::Verify,
        Self::Reset,
        Self::Users,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Jwt => "jwt",
            Self::Cookie => "cookie",
            Self::Register => "register",
            Self::Verify => "verify",
            Self::Reset => "reset",
            Self::Users => "users",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Jwt => 0,
            Self::Cookie => 1,
            Self::Register => 2,
            Self::Verify => 3,
            Self::Reset => 4,
            Self::Users => 5,
        }
    }

    fn defaults(self) -> RouteSetting {
        let (prefix, tag) = match self {
            Self::Jwt => ("/auth/jwt", "auth"),
            Self::Cookie | Self::Register | Self::Verify | Self::Reset => ("/auth", "auth"),
            Self::Users => ("/users", "users"),
        };
        RouteSetting {
            enabled: true,
            prefix: prefix.to_string(),
            tags: vec![tag.to_string()],
            required_user: None,
            enable_refresh: true,
            include_in_schema: true,
            extra: BTreeMap::new(),
        }
    }
}

impl fmt::Display for RouteGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RouteGroup {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|group| group.name() == s)
            .ok_or_else(|| ConfigError::UnknownRoute(s.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteSetting {
    pub enabled: bool,
    pub prefix: String,
    pub tags: Vec<String>,
    pub required_user: Option<UserRequirement>,
    /// Only read for the `jwt` group.
    pub enable_refresh: bool,
    pub include_in_schema: bool,
    pub extra: BTreeMap<String, String>,
}

impl RouteSetting {
    /// Full path of `path` under this group's prefix.
    #[must_use]
    pub fn path(&self, path: &str) -> String {
        format!("{}{path}", self.prefix)
    }
}

/// Settings for all six groups, defaults merged with overrides.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteSettings {
    groups: [RouteSetting; 6],
}

impl RouteSettings {
    #[must_use]
    pub fn new() -> Self {
        Self {
            groups: RouteGroup::ALL.map(RouteGroup::defaults),
        }
    }

    /// Apply `(group, key, value)` overrides in order.
    ///
    /// # Errors
    /// Returns an error for an unknown group or an unparsable value.
    pub fn from_overrides<I, G, K, V>(overrides: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (G, K, V)>,
        G: AsRef<str>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut settings = Self::new();
        for (group, key, value) in overrides {
            let group = group.as_ref().parse()?;
            settings.set(group, key.as_ref(), value.as_ref())?;
        }
        Ok(settings)
    }

    #[must_use]
    pub fn get(&self, group: RouteGroup) -> &RouteSetting {
        &self.groups[group.index()]
    }

    pub fn get_mut(&mut self, group: RouteGroup) -> &mut RouteSetting {
        &mut self.groups[group.index()]
    }

    /// Enabled groups in registration order.
    pub fn enabled(&self) -> impl Iterator<Item = (RouteGroup, &RouteSetting)> {
        RouteGroup::ALL
            .into_iter()
            .map(|group| (group, self.get(group)))
            .filter(|(_, setting)| setting.enabled)
    }

    #[must_use]
    pub fn with_enabled(mut self, group: RouteGroup, enabled: bool) -> Self {
        self.get_mut(group).enabled = enabled;
        self
    }

    /// # Errors
    /// Returns an error if the prefix is not a path.
    pub fn with_prefix(mut self, group: RouteGroup, prefix: &str) -> Result<Self, ConfigError> {
        self.get_mut(group).prefix = parse_prefix(group, prefix)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_required_user(
        mut self,
        group: RouteGroup,
        requirement: Option<UserRequirement>,
    ) -> Self {
        self.get_mut(group).required_user = requirement;
        self
    }

    #[must_use]
    pub fn with_enable_refresh(mut self, enabled: bool) -> Self {
        self.get_mut(RouteGroup::Jwt).enable_refresh = enabled;
        self
    }

    /// Set one key from its textual value.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidRouteSetting`] if the value cannot be parsed.
    pub fn set(&mut self, group: RouteGroup, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidRouteSetting {
            route: group.name().to_string(),
            key: key.to_string(),
            reason,
        };

        let setting = self.get_mut(group);
        match key {
            "prefix" => setting.prefix = parse_prefix(group, value)?,
            "tags" => setting.tags = parse_tags(value).map_err(invalid)?,
            "_enable" | "enabled" => setting.enabled = parse_bool(value).map_err(invalid)?,
            "_get_user" | "required_user" => {
                setting.required_user = parse_requirement(value).map_err(invalid)?;
            }
            "_enable_refresh" | "enable_refresh" => {
                if group != RouteGroup::Jwt {
                    return Err(invalid("only applies to the jwt group".to_string()));
                }
                setting.enable_refresh = parse_bool(value).map_err(invalid)?;
            }
            "include_in_schema" => {
                setting.include_in_schema = parse_bool(value).map_err(invalid)?;
            }
            other => {
                setting.extra.insert(other.to_string(), value.to_string());
            }
        }
        Ok(())
    }
}

impl Default for RouteSettings {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_prefix(group: RouteGroup, value: &str) -> Result<String, ConfigError> {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    if !trimmed.starts_with('/') || trimmed.contains(char::is_whitespace) {
        return Err(ConfigError::InvalidRouteSetting {
            route: group.name().to_string(),
            key: "prefix".to_string(),
            reason: format!("`{value}` is not an absolute path"),
        });
    }
    Ok(trimmed.to_string())
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(format!("`{other}` is not a boolean")),
    }
}

fn parse_tags(value: &str) -> Result<Vec<String>, String> {
    let trimmed = value.trim();
    if !trimmed.starts_with('[') {
        return Ok(trimmed
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(ToString::to_string)
            .collect());
    }

    match parse_literal(trimmed)? {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(tag) => Ok(tag),
                other => Err(format!("tag `{other}` is not a string")),
            })
            .collect(),
        other => Err(format!("`{other}` is not a list")),
    }
}

fn parse_requirement(value: &str) -> Result<Option<UserRequirement>, String> {
    let map = match parse_literal(value)? {
        Value::Null => return Ok(None),
        Value::Object(map) => map,
        other => return Err(format!("`{other}` is not a map")),
    };

    let mut requirement = UserRequirement::ANY;
    for (key, value) in map {
        let flag = value
            .as_bool()
            .ok_or_else(|| format!("`{key}` must be a boolean"))?;
        match key.as_str() {
            "active" => requirement.active = flag,
            "verified" => requirement.verified = flag,
            "superuser" => requirement.superuser = flag,
            other => return Err(format!("unknown user requirement `{other}`")),
        }
    }
    Ok(Some(requirement))
}

/// Parse JSON, also accepting Python literal spelling.
fn parse_literal(value: &str) -> Result<Value, String> {
    serde_json::from_str(&python_to_json(value.trim())).map_err(|e| e.to_string())
}

fn python_to_json(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut word = String::new();

    let flush = |word: &mut String, out: &mut String| {
        match word.as_str() {
            "True" => out.push_str("true"),
            "False" => out.push_str("false"),
            "None" => out.push_str("null"),
            _ => out.push_str(word),
        }
        word.clear();
    };

    while let Some(c) = chars.next() {
        match c {
            '"' | '\'' => {
                flush(&mut word, &mut out);
                out.push('"');
                while let Some(inner) = chars.next() {
                    match inner {
                        '\\' => {
                            out.push('\\');
                            if let Some(escaped) = chars.next() {
                                out.push(escaped);
                            }
                        }
                        '"' if c == '\'' => out.push_str("\\\""),
                        _ if inner == c => break,
                        _ => out.push(inner),
                    }
                }
                out.push('"');
            }
            c if c.is_alphanumeric() || c == '_' => word.push(c),
            _ => {
                flush(&mut word, &mut out);
                out.push(c);
            }
        }
    }
    flush(&mut word, &mut out);
    out
}
