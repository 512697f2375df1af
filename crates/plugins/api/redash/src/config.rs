//! Redash adapter configuration.

use std::time::Duration;

use toolport_core::{EnvSource, Error, Result, Secret};

pub const REDASH_URL: &str = "REDASH_URL";
pub const REDASH_API_KEY: &str = "REDASH_API_KEY";
pub const REDASH_POLL_INTERVAL_MS: &str = "REDASH_POLL_INTERVAL_MS";
pub const REDASH_POLL_ATTEMPTS: &str = "REDASH_POLL_ATTEMPTS";

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_POLL_ATTEMPTS: u32 = 60;

/// How long to wait for a query execution job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_attempts: DEFAULT_POLL_ATTEMPTS,
        }
    }
}

impl PollSettings {
    /// Total wait before giving up, in milliseconds.
    pub fn budget_ms(&self) -> u64 {
        u64::try_from(self.interval.as_millis())
            .unwrap_or(u64::MAX)
            .saturating_mul(u64::from(self.max_attempts))
    }
}

#[derive(Debug, Clone)]
pub struct RedashConfig {
    pub url: String,
    pub api_key: Secret,
    pub poll: PollSettings,
}

impl RedashConfig {
    pub fn from_env(env: &EnvSource) -> Result<Self> {
        env.require(&[REDASH_URL, REDASH_API_KEY])?;

        let interval_ms = env.parse_or(REDASH_POLL_INTERVAL_MS, DEFAULT_POLL_INTERVAL_MS)?;
        let max_attempts = env.parse_or(REDASH_POLL_ATTEMPTS, DEFAULT_POLL_ATTEMPTS)?;
        if max_attempts == 0 {
            return Err(Error::Config(format!(
                "{} must be at least 1",
                REDASH_POLL_ATTEMPTS
            )));
        }

        Ok(Self {
            url: env.get_or(REDASH_URL, "").trim_end_matches('/').to_string(),
            api_key: Secret::new(env.get_or(REDASH_API_KEY, "")),
            poll: PollSettings {
                interval: Duration::from_millis(interval_ms),
                max_attempts,
            },
        })
    }
}
