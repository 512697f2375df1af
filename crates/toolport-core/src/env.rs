//! Environment-based configuration.
//!
//! Every adapter reads its credentials and connection settings from
//! environment variables. [`EnvSource`] takes a snapshot of the process
//! environment (after loading an optional `.env` file) so that adapters can
//! be configured from explicit key/value pairs in tests without touching the
//! real environment.
//!
//! # Example
//!
//! ```ignore
//! use toolport_core::EnvSource;
//!
//! let env = EnvSource::from_process();
//! env.require(&["JIRA_BASE_URL", "JIRA_EMAIL", "JIRA_API_TOKEN"])?;
//! let url = env.get("JIRA_BASE_URL").unwrap();
//! ```

use std::collections::HashMap;
use std::str::FromStr;

use tracing::debug;

use crate::{Error, Result};

/// Snapshot of configuration variables.
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    vars: HashMap<String, String>,
}

impl EnvSource {
    /// Snapshot the process environment, loading `.env` first if present.
    pub fn from_process() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = ?path, "Loaded .env file"),
            Err(e) if e.not_found() => {}
            Err(e) => debug!(error = %e, "Ignoring unreadable .env file"),
        }
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Build a source from explicit key/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Get a variable. Blank values count as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Get the first of several alternative keys that is set.
    pub fn get_any(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.get(k))
    }

    /// Get a variable or a default.
    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    /// Parse a variable into `T`. Absent yields `Ok(None)`.
    pub fn parse<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<T>().map(Some).map_err(|e| {
                Error::Config(format!("{} has invalid value '{}': {}", key, raw, e))
            }),
        }
    }

    /// Parse a variable into `T`, falling back to `default` when absent.
    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        Ok(self.parse(key)?.unwrap_or(default))
    }

    /// Read a boolean flag (`1`, `true`, `yes`, `on`).
    pub fn flag(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false)
    }

    /// List which of `keys` are absent, in the order given.
    pub fn missing(&self, keys: &[&str]) -> Vec<String> {
        keys.iter()
            .filter(|k| self.get(k).is_none())
            .map(|k| k.to_string())
            .collect()
    }

    /// Fail with [`Error::MissingEnv`] unless every key is set.
    pub fn require(&self, keys: &[&str]) -> Result<()> {
        let missing = self.missing(keys);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingEnv(missing))
        }
    }
}
