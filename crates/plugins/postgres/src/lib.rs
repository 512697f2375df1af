//! PostgreSQL adapter for toolport.
//!
//! Introspects schemas and runs statements against a pooled connection.
//! Without credentials, or when the startup connectivity check fails, the
//! adapter switches to demo mode for the rest of the process and answers
//! every tool from fixed fixture data.

mod backend;
mod config;
mod fixture;
mod live;
mod sql;
mod tools;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use toolport_mcp::ShutdownHook;
use tracing::{debug, warn};

pub use backend::{
    ColumnInfo, ConnectionInfo, Database, Mode, QueryOutcome, TableDescription, TableInfo,
    TableList,
};
pub use config::PostgresConfig;
pub use fixture::FixtureDatabase;
pub use live::LiveDatabase;
pub use tools::register_tools;

/// Pick the backend for this process.
///
/// `None` (credentials missing) goes straight to demo mode without touching
/// the network. A configured database that cannot be reached also ends up
/// in demo mode; there is no later retry.
pub async fn open_database(config: Option<&PostgresConfig>) -> Arc<dyn Database> {
    let Some(config) = config else {
        return Arc::new(FixtureDatabase::new());
    };

    match LiveDatabase::connect(config).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            warn!(
                error = %e,
                host = %config.host,
                "PostgreSQL unreachable, running in demo mode"
            );
            Arc::new(FixtureDatabase::new())
        }
    }
}

/// Closes the database once at shutdown, however often it is asked to.
pub struct PoolGuard {
    db: Arc<dyn Database>,
    closed: AtomicBool,
}

impl PoolGuard {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self {
            db,
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ShutdownHook for PoolGuard {
    async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("Database already closed");
            return;
        }
        self.db.close().await;
    }
}
