//! Database backend abstraction.
//!
//! The adapter talks to one [`Database`]: a live PostgreSQL pool or the
//! fixture backend used in demo mode. The choice is made once at startup.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use toolport_core::Result;

/// Which backend answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Live,
    Demo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionInfo {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub ssl_mode: String,
    pub max_connections: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableInfo {
    pub name: String,
    pub table_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableList {
    pub schema: String,
    pub tables: Vec<TableInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableDescription {
    pub schema: String,
    pub table: String,
    pub columns: Vec<ColumnInfo>,
    pub primary_key: Vec<String>,
}

/// Result of running a statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryOutcome {
    /// Row-returning statement; rows keep the column order
    Rows {
        columns: Vec<String>,
        row_count: usize,
        rows: Vec<Map<String, Value>>,
    },
    Command { rows_affected: u64 },
}

impl QueryOutcome {
    pub fn rows(rows: Vec<Map<String, Value>>) -> Self {
        let columns = rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();
        QueryOutcome::Rows {
            columns,
            row_count: rows.len(),
            rows,
        }
    }
}

/// Operations the tools need from a database.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Database: Send + Sync {
    fn mode(&self) -> Mode;

    async fn connection_info(&self) -> Result<ConnectionInfo>;

    async fn list_tables(&self, schema: &str) -> Result<TableList>;

    async fn describe_table(&self, schema: &str, table: &str) -> Result<TableDescription>;

    /// Run `sql` with positional `$n` parameters.
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<QueryOutcome>;

    /// Release pooled connections.
    async fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rows_outcome_keeps_column_order() {
        let mut row = Map::new();
        row.insert("zeta".to_string(), json!(1));
        row.insert("alpha".to_string(), json!(2));

        let outcome = QueryOutcome::rows(vec![row]);
        let value = serde_json::to_value(&outcome).unwrap();

        assert_eq!(value["kind"], "rows");
        assert_eq!(value["columns"], json!(["zeta", "alpha"]));
        assert_eq!(value["row_count"], 1);
    }

    #[test]
    fn test_command_outcome() {
        let value = serde_json::to_value(QueryOutcome::Command { rows_affected: 4 }).unwrap();
        assert_eq!(value, json!({"kind": "command", "rows_affected": 4}));
    }
}
