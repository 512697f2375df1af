//! PostgreSQL tool handlers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use toolport_core::{Error, Result, ResultExt};
use toolport_mcp::{ParamSchema, ParamType, Params, ToolOutput, ToolRegistry};

use crate::backend::{Database, Mode, QueryOutcome};

/// Payload tagged with the backend that produced it.
#[derive(Serialize)]
struct Labelled<T> {
    mode: Mode,
    #[serde(flatten)]
    data: T,
}

fn output<T: Serialize>(db: &dyn Database, summary: String, data: T) -> Result<ToolOutput> {
    let mode = db.mode();
    let summary = match mode {
        Mode::Demo => format!("[demo] {}", summary),
        Mode::Live => summary,
    };
    ToolOutput::new(summary, Labelled { mode, data })
}

fn schema_field(schema: ParamSchema) -> ParamSchema {
    schema.with_default("schema", ParamType::String, "Schema name", "public")
}

#[derive(Debug, Deserialize)]
struct SchemaParams {
    schema: String,
}

#[derive(Debug, Deserialize)]
struct DescribeTableParams {
    schema: String,
    table_name: String,
}

#[derive(Debug, Deserialize)]
struct ExecuteParams {
    query: String,
    params: Vec<Value>,
}

/// Register every PostgreSQL tool.
pub fn register_tools(registry: &mut ToolRegistry, db: Arc<dyn Database>) -> Result<()> {
    registry.register_with(
        &db,
        "get_connection_info",
        "Show connection settings and server version",
        ParamSchema::new(),
        get_connection_info,
    )?;
    registry.register_with(
        &db,
        "list_tables",
        "List tables and views in a schema",
        schema_field(ParamSchema::new()),
        list_tables,
    )?;
    registry.register_with(
        &db,
        "describe_table",
        "Describe the columns and primary key of a table",
        schema_field(ParamSchema::new().required("table_name", ParamType::String, "Table name")),
        describe_table,
    )?;
    registry.register_with(
        &db,
        "execute_query",
        "Run a SQL statement with $1, $2, ... parameters. Queries return rows, other statements the affected row count",
        ParamSchema::new()
            .required("query", ParamType::String, "SQL statement")
            .with_default(
                "params",
                ParamType::Array,
                "Positional parameter values",
                Value::Array(Vec::new()),
            ),
        execute_query,
    )?;
    Ok(())
}

async fn get_connection_info(db: Arc<dyn Database>, _params: Params) -> Result<ToolOutput> {
    let info = db
        .connection_info()
        .await
        .context("fetching connection info")?;
    let summary = format!(
        "Connected to {}@{}:{}/{}",
        info.user, info.host, info.port, info.database
    );
    output(db.as_ref(), summary, info)
}

async fn list_tables(db: Arc<dyn Database>, params: SchemaParams) -> Result<ToolOutput> {
    let schema = params.schema.as_str();
    let list = db
        .list_tables(schema)
        .await
        .with_context(|| format!("listing tables in schema {}", schema))?;
    let summary = format!("Found {} tables in schema {}", list.tables.len(), schema);
    output(db.as_ref(), summary, list)
}

async fn describe_table(db: Arc<dyn Database>, params: DescribeTableParams) -> Result<ToolOutput> {
    let (schema, table) = (params.schema.as_str(), params.table_name.as_str());
    let description = db
        .describe_table(schema, table)
        .await
        .with_context(|| format!("describing table {}.{}", schema, table))?;
    let summary = format!(
        "Table {}.{} has {} columns",
        schema,
        table,
        description.columns.len()
    );
    output(db.as_ref(), summary, description)
}

async fn execute_query(db: Arc<dyn Database>, params: ExecuteParams) -> Result<ToolOutput> {
    if params.query.trim().is_empty() {
        return Err(Error::validation("query", "must not be empty"));
    }

    let outcome = db
        .execute(&params.query, &params.params)
        .await
        .context("executing query")?;
    let summary = match &outcome {
        QueryOutcome::Rows { row_count, .. } => format!("Query returned {} rows", row_count),
        QueryOutcome::Command { rows_affected } => {
            format!("Statement affected {} rows", rows_affected)
        }
    };
    output(db.as_ref(), summary, outcome)
}
