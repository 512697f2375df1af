//! PostgreSQL adapter configuration.
//!
//! Unlike the API adapters, missing credentials do not stop the process:
//! the adapter runs in demo mode instead.

use toolport_core::{EnvSource, Error, Result, Secret};
use tracing::warn;

pub const POSTGRES_HOST: &str = "POSTGRES_HOST";
pub const POSTGRES_PORT: &str = "POSTGRES_PORT";
pub const POSTGRES_DB: &str = "POSTGRES_DB";
pub const POSTGRES_USER: &str = "POSTGRES_USER";
pub const POSTGRES_PASSWORD: &str = "POSTGRES_PASSWORD";
pub const POSTGRES_SSL_MODE: &str = "POSTGRES_SSL_MODE";
pub const POSTGRES_MAX_CONNECTIONS: &str = "POSTGRES_MAX_CONNECTIONS";

pub const REQUIRED_KEYS: &[&str] = &[POSTGRES_DB, POSTGRES_USER, POSTGRES_PASSWORD];

const SSL_MODES: &[&str] = &[
    "disable",
    "allow",
    "prefer",
    "require",
    "verify-ca",
    "verify-full",
];

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: Secret,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl PostgresConfig {
    /// Read the configuration. `Ok(None)` means required keys are missing
    /// and the adapter should run in demo mode.
    pub fn from_env(env: &EnvSource) -> Result<Option<Self>> {
        let missing = env.missing(REQUIRED_KEYS);
        if !missing.is_empty() {
            warn!(
                missing = %missing.join(", "),
                "PostgreSQL credentials incomplete, running in demo mode"
            );
            return Ok(None);
        }

        let ssl_mode = env.get_or(POSTGRES_SSL_MODE, "prefer").to_ascii_lowercase();
        if !SSL_MODES.contains(&ssl_mode.as_str()) {
            return Err(Error::Config(format!(
                "{} must be one of {}, got '{}'",
                POSTGRES_SSL_MODE,
                SSL_MODES.join(", "),
                ssl_mode
            )));
        }

        let max_connections = env.parse_or(POSTGRES_MAX_CONNECTIONS, 10u32)?;
        if max_connections == 0 {
            return Err(Error::Config(format!(
                "{} must be at least 1",
                POSTGRES_MAX_CONNECTIONS
            )));
        }

        Ok(Some(Self {
            host: env.get_or(POSTGRES_HOST, "localhost"),
            port: env.parse_or(POSTGRES_PORT, 5432u16)?,
            database: env.get_or(POSTGRES_DB, ""),
            user: env.get_or(POSTGRES_USER, ""),
            password: Secret::new(env.get_or(POSTGRES_PASSWORD, "")),
            ssl_mode,
            max_connections,
        }))
    }
}
