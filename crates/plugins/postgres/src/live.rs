//! Live PostgreSQL backend on a sqlx connection pool.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use sqlx::Row;
use toolport_core::{Error, Result};
use tracing::{debug, info};

use crate::backend::{
    ColumnInfo, ConnectionInfo, Database, Mode, QueryOutcome, TableDescription, TableInfo,
    TableList,
};
use crate::config::PostgresConfig;
use crate::sql::{self, Plan};

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

fn db_error(e: sqlx::Error) -> Error {
    Error::Database(e.to_string())
}

pub struct LiveDatabase {
    pool: PgPool,
    config: PostgresConfig,
}

impl LiveDatabase {
    /// Build the pool and check connectivity once by acquiring and
    /// releasing a connection.
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let ssl_mode = PgSslMode::from_str(&config.ssl_mode)
            .map_err(|e| Error::Config(format!("invalid SSL mode: {}", e)))?;
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(config.password.expose())
            .ssl_mode(ssl_mode);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_lazy_with(options);

        let connection = pool.acquire().await.map_err(db_error)?;
        drop(connection);

        info!(
            host = %config.host,
            database = %config.database,
            max_connections = config.max_connections,
            "Connected to PostgreSQL"
        );
        Ok(Self {
            pool,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl Database for LiveDatabase {
    fn mode(&self) -> Mode {
        Mode::Live
    }

    async fn connection_info(&self) -> Result<ConnectionInfo> {
        let version: String = sqlx::query_scalar("SHOW server_version")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(ConnectionInfo {
            host: self.config.host.clone(),
            port: self.config.port,
            database: self.config.database.clone(),
            user: self.config.user.clone(),
            ssl_mode: self.config.ssl_mode.clone(),
            max_connections: self.config.max_connections,
            server_version: Some(version),
        })
    }

    async fn list_tables(&self, schema: &str) -> Result<TableList> {
        // information_schema uses domain types sqlx cannot decode directly
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT table_name::text, table_type::text \
             FROM information_schema.tables \
             WHERE table_schema = $1 \
             ORDER BY table_name",
        )
        .bind(schema)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(TableList {
            schema: schema.to_string(),
            tables: rows
                .into_iter()
                .map(|(name, table_type)| TableInfo { name, table_type })
                .collect(),
        })
    }

    async fn describe_table(&self, schema: &str, table: &str) -> Result<TableDescription> {
        let columns: Vec<(String, String, bool, Option<String>, i32)> = sqlx::query_as(
            "SELECT column_name::text, data_type::text, is_nullable = 'YES', \
                    column_default::text, ordinal_position::int4 \
             FROM information_schema.columns \
             WHERE table_schema = $1 AND table_name = $2 \
             ORDER BY ordinal_position",
        )
        .bind(schema)
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        if columns.is_empty() {
            return Err(Error::NotFound(format!("table {}.{}", schema, table)));
        }

        let primary_key: Vec<String> = sqlx::query_scalar(
            "SELECT kcu.column_name::text \
             FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu \
               ON tc.constraint_name = kcu.constraint_name \
              AND tc.table_schema = kcu.table_schema \
             WHERE tc.constraint_type = 'PRIMARY KEY' \
               AND tc.table_schema = $1 AND tc.table_name = $2 \
             ORDER BY kcu.ordinal_position",
        )
        .bind(schema)
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(TableDescription {
            schema: schema.to_string(),
            table: table.to_string(),
            columns: columns
                .into_iter()
                .map(|(name, data_type, nullable, default, position)| ColumnInfo {
                    name,
                    data_type,
                    nullable,
                    default,
                    position,
                })
                .collect(),
            primary_key,
        })
    }

    async fn execute(&self, statement: &str, params: &[Value]) -> Result<QueryOutcome> {
        let bound = sql::bind_inline(statement, params)?;
        match sql::plan(&bound) {
            Plan::Rows(wrapped) => {
                debug!(sql = %statement, params = params.len(), "Running row query");
                // Every call carries its own literals; no point caching it
                let rows = sqlx::query(&wrapped)
                    .persistent(false)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(db_error)?;

                let rows = rows
                    .iter()
                    .map(|row| match row.try_get::<Value, _>("row").map_err(db_error)? {
                        Value::Object(map) => Ok(map),
                        other => Err(Error::InvalidData(format!(
                            "expected a JSON object per row, got {}",
                            other
                        ))),
                    })
                    .collect::<Result<Vec<Map<String, Value>>>>()?;
                Ok(QueryOutcome::rows(rows))
            }
            Plan::Command(command) => {
                debug!(sql = %statement, params = params.len(), "Running statement");
                let done = sqlx::query(&command)
                    .persistent(false)
                    .execute(&self.pool)
                    .await
                    .map_err(db_error)?;
                Ok(QueryOutcome::Command {
                    rows_affected: done.rows_affected(),
                })
            }
        }
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("PostgreSQL pool closed");
    }
}
