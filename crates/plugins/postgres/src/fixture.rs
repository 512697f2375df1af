//! Demo backend with a small fixed shop schema.
//!
//! Answers never depend on time or randomness: the same call always yields
//! the same payload.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use toolport_core::{Error, Result};

use crate::backend::{
    ColumnInfo, ConnectionInfo, Database, Mode, QueryOutcome, TableDescription, TableInfo,
    TableList,
};
use crate::sql;

struct FixtureTable {
    name: &'static str,
    /// (name, type, nullable, default)
    columns: &'static [(&'static str, &'static str, bool, Option<&'static str>)],
    primary_key: &'static [&'static str],
}

const TABLES: &[FixtureTable] = &[
    FixtureTable {
        name: "customers",
        columns: &[
            ("id", "integer", false, Some("nextval('customers_id_seq'::regclass)")),
            ("email", "character varying", false, None),
            ("full_name", "character varying", true, None),
            ("created_at", "timestamp with time zone", false, Some("now()")),
        ],
        primary_key: &["id"],
    },
    FixtureTable {
        name: "order_items",
        columns: &[
            ("order_id", "integer", false, None),
            ("product_id", "integer", false, None),
            ("quantity", "integer", false, Some("1")),
        ],
        primary_key: &["order_id", "product_id"],
    },
    FixtureTable {
        name: "orders",
        columns: &[
            ("id", "integer", false, Some("nextval('orders_id_seq'::regclass)")),
            ("customer_id", "integer", false, None),
            ("status", "character varying", false, Some("'pending'::character varying")),
            ("total", "numeric", false, None),
            ("created_at", "timestamp with time zone", false, Some("now()")),
        ],
        primary_key: &["id"],
    },
    FixtureTable {
        name: "products",
        columns: &[
            ("id", "integer", false, Some("nextval('products_id_seq'::regclass)")),
            ("sku", "character varying", false, None),
            ("name", "character varying", false, None),
            ("price", "numeric", false, None),
        ],
        primary_key: &["id"],
    },
];

fn sample_rows(table: &str) -> Vec<Value> {
    match table {
        "orders" => vec![
            json!({"id": 1001, "customer_id": 1, "status": "shipped", "total": 59.9, "created_at": "2024-03-01T09:30:00Z"}),
            json!({"id": 1002, "customer_id": 2, "status": "pending", "total": 12.5, "created_at": "2024-03-02T14:05:00Z"}),
        ],
        "products" => vec![
            json!({"id": 1, "sku": "MUG-01", "name": "Coffee mug", "price": 12.5}),
            json!({"id": 2, "sku": "TEE-02", "name": "T-shirt", "price": 19.9}),
            json!({"id": 3, "sku": "CAP-03", "name": "Cap", "price": 15.0}),
        ],
        "order_items" => vec![
            json!({"order_id": 1001, "product_id": 2, "quantity": 2}),
            json!({"order_id": 1001, "product_id": 1, "quantity": 1}),
            json!({"order_id": 1002, "product_id": 1, "quantity": 1}),
        ],
        _ => vec![
            json!({"id": 1, "email": "ada@example.com", "full_name": "Ada Lovelace", "created_at": "2024-01-15T10:00:00Z"}),
            json!({"id": 2, "email": "alan@example.com", "full_name": "Alan Turing", "created_at": "2024-02-20T16:45:00Z"}),
        ],
    }
}

/// Pick the fixture table a statement seems to be about.
fn mentioned_table(statement: &str) -> &'static str {
    let lower = statement.to_ascii_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .collect();
    TABLES
        .iter()
        .map(|t| t.name)
        .find(|name| words.contains(name))
        .unwrap_or("customers")
}

/// Backend used when no database is configured or reachable.
#[derive(Debug, Default)]
pub struct FixtureDatabase;

impl FixtureDatabase {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Database for FixtureDatabase {
    fn mode(&self) -> Mode {
        Mode::Demo
    }

    async fn connection_info(&self) -> Result<ConnectionInfo> {
        Ok(ConnectionInfo {
            host: "demo".to_string(),
            port: 5432,
            database: "demo_shop".to_string(),
            user: "demo".to_string(),
            ssl_mode: "disable".to_string(),
            max_connections: 0,
            server_version: None,
        })
    }

    async fn list_tables(&self, schema: &str) -> Result<TableList> {
        let tables = if schema == "public" {
            TABLES
                .iter()
                .map(|t| TableInfo {
                    name: t.name.to_string(),
                    table_type: "BASE TABLE".to_string(),
                })
                .collect()
        } else {
            Vec::new()
        };
        Ok(TableList {
            schema: schema.to_string(),
            tables,
        })
    }

    async fn describe_table(&self, schema: &str, table: &str) -> Result<TableDescription> {
        let fixture = TABLES
            .iter()
            .find(|t| schema == "public" && t.name == table)
            .ok_or_else(|| Error::NotFound(format!("table {}.{}", schema, table)))?;

        Ok(TableDescription {
            schema: schema.to_string(),
            table: table.to_string(),
            columns: fixture
                .columns
                .iter()
                .zip(1..)
                .map(|(&(name, data_type, nullable, default), position)| ColumnInfo {
                    name: name.to_string(),
                    data_type: data_type.to_string(),
                    nullable,
                    default: default.map(String::from),
                    position,
                })
                .collect(),
            primary_key: fixture.primary_key.iter().map(|k| k.to_string()).collect(),
        })
    }

    async fn execute(&self, statement: &str, _params: &[Value]) -> Result<QueryOutcome> {
        if !sql::returns_rows(statement) {
            return Ok(QueryOutcome::Command { rows_affected: 0 });
        }

        let rows: Vec<Map<String, Value>> = sample_rows(mentioned_table(statement))
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        Ok(QueryOutcome::rows(rows))
    }

    async fn close(&self) {}
}
