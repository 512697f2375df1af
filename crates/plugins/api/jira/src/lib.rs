//! Jira adapter for toolport.
//!
//! Exposes projects, JQL issue search, boards and sprints as MCP tools.
//! Supports both Jira Cloud (API v3) and Jira Self-Hosted/Data Center (API v2).

mod client;
mod config;
mod tools;
mod types;

pub use client::{detect_flavor, JiraClient, JiraFlavor};
pub use config::JiraConfig;
pub use tools::register_tools;
pub use types::*;
