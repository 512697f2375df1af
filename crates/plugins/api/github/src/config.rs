//! GitHub adapter configuration.

use toolport_core::{EnvSource, Result, Secret};

use crate::DEFAULT_GITHUB_URL;

pub const GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const GITHUB_API_URL: &str = "GITHUB_API_URL";

/// Connection settings for the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// API root; GitHub Enterprise uses `https://host/api/v3`
    pub api_url: String,
    pub token: Secret,
}

impl GitHubConfig {
    pub fn from_env(env: &EnvSource) -> Result<Self> {
        env.require(&[GITHUB_TOKEN])?;

        Ok(Self {
            api_url: env.get_or(GITHUB_API_URL, DEFAULT_GITHUB_URL),
            token: Secret::new(env.get_or(GITHUB_TOKEN, "")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_public_api() {
        let env = EnvSource::from_pairs([(GITHUB_TOKEN, "ghp_x")]);
        let config = GitHubConfig::from_env(&env).unwrap();
        assert_eq!(config.api_url, "https://api.github.com");
    }

    #[test]
    fn test_token_required() {
        let env = EnvSource::from_pairs([(GITHUB_API_URL, "https://ghe.local/api/v3")]);
        assert!(GitHubConfig::from_env(&env).is_err());
    }
}
