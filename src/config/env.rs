//! Environment access and validation error collection.
//!
//! Loaders read through [`EnvSource`] so tests can inject a [`MapEnv`]
//! instead of mutating the process environment. Every missing or malformed
//! variable is recorded; loading fails once with the full list.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Read-only view of environment variables
pub trait EnvSource {
    /// Value of `key`; unset and blank values are both `None`
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|value| !value.trim().is_empty())
    }
}

/// Fixed set of variables, for tests
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_string(), value.to_string());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl EnvSource for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .filter(|value| !value.trim().is_empty())
            .cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssue {
    Missing { var: String },
    Invalid { var: String, reason: String },
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigIssue::Missing { var } => write!(f, "`{}` is not set", var),
            ConfigIssue::Invalid { var, reason } => write!(f, "`{}` is invalid: {}", var, reason),
        }
    }
}

/// Every problem found while loading configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
pub struct ConfigErrors {
    issues: Vec<ConfigIssue>,
}

impl ConfigErrors {
    pub fn missing(var: &str) -> Self {
        Self {
            issues: vec![ConfigIssue::Missing {
                var: var.to_string(),
            }],
        }
    }

    pub fn invalid(var: &str, reason: impl Into<String>) -> Self {
        Self {
            issues: vec![ConfigIssue::Invalid {
                var: var.to_string(),
                reason: reason.into(),
            }],
        }
    }

    pub fn issues(&self) -> &[ConfigIssue] {
        &self.issues
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn extend(&mut self, other: ConfigErrors) {
        self.issues.extend(other.issues);
    }

    /// Names of the variables that were required but unset
    pub fn missing_vars(&self) -> Vec<&str> {
        self.issues
            .iter()
            .filter_map(|issue| match issue {
                ConfigIssue::Missing { var } => Some(var.as_str()),
                ConfigIssue::Invalid { .. } => None,
            })
            .collect()
    }
}

impl fmt::Display for ConfigErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.issues.iter().map(ToString::to_string).collect();
        write!(f, "{}", rendered.join("; "))
    }
}

/// Reads variables while recording issues instead of stopping at the first.
pub struct EnvReader<'a> {
    env: &'a dyn EnvSource,
    errors: ConfigErrors,
}

impl<'a> EnvReader<'a> {
    pub fn new(env: &'a dyn EnvSource) -> Self {
        Self {
            env,
            errors: ConfigErrors::default(),
        }
    }

    pub fn optional(&self, var: &str) -> Option<String> {
        self.env.var(var)
    }

    pub fn required(&mut self, var: &str) -> Option<String> {
        let value = self.env.var(var);
        if value.is_none() {
            self.errors.extend(ConfigErrors::missing(var));
        }
        value
    }

    /// First set variable among `vars`; reported under the first name when none is
    pub fn required_any(&mut self, vars: &[&str]) -> Option<String> {
        let value = vars.iter().find_map(|var| self.env.var(var));
        if value.is_none() {
            if let Some(primary) = vars.first() {
                self.errors.extend(ConfigErrors::missing(primary));
            }
        }
        value
    }

    /// Whole number of seconds, `None` when unset or invalid
    pub fn optional_secs(&mut self, var: &str) -> Option<Duration> {
        let raw = self.env.var(var)?;
        match raw.trim().parse::<u64>() {
            Ok(0) => {
                self.invalid(var, "must be greater than zero");
                None
            }
            Ok(secs) => Some(Duration::from_secs(secs)),
            Err(e) => {
                self.invalid(var, format!("expected whole seconds, got {:?} ({})", raw, e));
                None
            }
        }
    }

    pub fn invalid(&mut self, var: &str, reason: impl Into<String>) {
        self.errors.extend(ConfigErrors::invalid(var, reason));
    }

    pub fn into_errors(self) -> ConfigErrors {
        self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
