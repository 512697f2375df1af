//! Jira adapter configuration.

use toolport_core::{EnvSource, Result, Secret};

pub const JIRA_BASE_URL: &str = "JIRA_BASE_URL";
pub const JIRA_EMAIL: &str = "JIRA_EMAIL";
pub const JIRA_API_TOKEN: &str = "JIRA_API_TOKEN";

/// Connection settings for a Jira instance.
#[derive(Debug, Clone)]
pub struct JiraConfig {
    /// Instance URL, e.g. `https://example.atlassian.net`
    pub base_url: String,
    pub email: String,
    /// API token (Cloud), personal access token or `user:password` (Self-Hosted)
    pub api_token: Secret,
}

impl JiraConfig {
    /// Read configuration from the environment. All three keys are required.
    pub fn from_env(env: &EnvSource) -> Result<Self> {
        env.require(&[JIRA_BASE_URL, JIRA_EMAIL, JIRA_API_TOKEN])?;

        Ok(Self {
            base_url: env.get_or(JIRA_BASE_URL, ""),
            email: env.get_or(JIRA_EMAIL, ""),
            api_token: Secret::new(env.get_or(JIRA_API_TOKEN, "")),
        })
    }
}
