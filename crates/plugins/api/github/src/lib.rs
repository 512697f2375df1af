//! GitHub adapter for toolport.
//!
//! Exposes repositories, issues, pull requests, branches and commits as MCP
//! tools, plus a deterministic pull request summary that can be posted back
//! as a comment.

mod client;
mod config;
mod summary;
mod tools;
mod types;

pub use client::GitHubClient;
pub use config::GitHubConfig;
pub use summary::{summarize, ExtensionStats, PullRequestSummary};
pub use tools::register_tools;
pub use types::*;

/// Default GitHub API URL.
pub const DEFAULT_GITHUB_URL: &str = "https://api.github.com";
