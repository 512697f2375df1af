//! Adapter wiring for the `toolport` binary.
//!
//! Each adapter reads its configuration from the environment, builds its
//! client and registers its tools in a fresh registry. Adapters that cannot
//! build a client fail here, before the server starts.

use std::sync::Arc;

use clap::ValueEnum;
use toolport_core::{EnvSource, Result};
use toolport_mcp::{McpServer, ToolRegistry};
use tracing::info;

/// The service to expose over stdio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Adapter {
    Jira,
    Github,
    Kubernetes,
    Postgres,
    Pdf,
    Redash,
}

impl Adapter {
    /// Name reported in `serverInfo`.
    pub fn server_name(self) -> &'static str {
        match self {
            Adapter::Jira => "toolport-jira",
            Adapter::Github => "toolport-github",
            Adapter::Kubernetes => "toolport-kubernetes",
            Adapter::Postgres => "toolport-postgres",
            Adapter::Pdf => "toolport-pdf",
            Adapter::Redash => "toolport-redash",
        }
    }
}

/// Configure an adapter and wrap its registry in a server.
pub async fn build_server(adapter: Adapter, env: &EnvSource) -> Result<McpServer> {
    let mut registry = ToolRegistry::new();

    let server = match adapter {
        Adapter::Jira => {
            let config = toolport_jira::JiraConfig::from_env(env)?;
            let client = toolport_jira::JiraClient::new(&config)?;
            toolport_jira::register_tools(&mut registry, Arc::new(client))?;
            McpServer::new(adapter.server_name(), registry)
        }
        Adapter::Github => {
            let config = toolport_github::GitHubConfig::from_env(env)?;
            let client = toolport_github::GitHubClient::new(&config)?;
            toolport_github::register_tools(&mut registry, Arc::new(client))?;
            McpServer::new(adapter.server_name(), registry)
        }
        Adapter::Kubernetes => {
            let config = toolport_kubernetes::KubeConfig::from_env(env)?;
            let context = toolport_kubernetes::KubeContext::new(&config)?;
            toolport_kubernetes::register_tools(&mut registry, Arc::new(context))?;
            McpServer::new(adapter.server_name(), registry)
        }
        Adapter::Redash => {
            let config = toolport_redash::RedashConfig::from_env(env)?;
            let client = toolport_redash::RedashClient::new(&config)?;
            toolport_redash::register_tools(&mut registry, Arc::new(client))?;
            McpServer::new(adapter.server_name(), registry)
        }
        Adapter::Pdf => {
            let config = toolport_pdf::PdfConfig::from_env(env);
            toolport_pdf::register_tools(&mut registry, Arc::new(config))?;
            McpServer::new(adapter.server_name(), registry)
        }
        Adapter::Postgres => {
            let config = toolport_postgres::PostgresConfig::from_env(env)?;
            let db = toolport_postgres::open_database(config.as_ref()).await;
            info!(mode = ?db.mode(), "Database backend selected");
            toolport_postgres::register_tools(&mut registry, db.clone())?;

            let mut server = McpServer::new(adapter.server_name(), registry);
            server.on_shutdown(Arc::new(toolport_postgres::PoolGuard::new(db)));
            server
        }
    };

    Ok(server)
}
