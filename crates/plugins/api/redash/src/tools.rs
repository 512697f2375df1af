//! Redash tool handlers.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use toolport_core::{Error, Result, ResultExt};
use toolport_mcp::{ParamSchema, ParamType, Params, ToolOutput, ToolRegistry};

use crate::client::{CreateQueryRequest, RedashClient};
use crate::poller::wait_for_result;
use crate::types::{Execution, QueryResult};
use crate::visualization::{default_options, ColumnHints, SERIES_TYPES, VISUALIZATION_TYPES};

const MAX_PAGE_SIZE: i64 = 250;

fn paged(schema: ParamSchema) -> ParamSchema {
    schema
        .with_default("page", ParamType::Integer, "Page number, starting at 1", 1)
        .at_least(1)
        .with_default("page_size", ParamType::Integer, "Results per page", 25)
        .range(1, MAX_PAGE_SIZE)
}

fn query_id() -> ParamSchema {
    ParamSchema::new().required("query_id", ParamType::Integer, "Query id")
}

#[derive(Debug, Deserialize)]
struct ListQueriesParams {
    page: u64,
    page_size: u64,
    search: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryIdParams {
    query_id: u64,
}

#[derive(Debug, Deserialize)]
struct CreateQueryParams {
    name: String,
    query: String,
    data_source_id: u64,
    description: Option<String>,
    parameters: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct UpdateQueryParams {
    query_id: u64,
    name: Option<String>,
    query: Option<String>,
    description: Option<String>,
    options: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ExecuteQueryParams {
    query_id: u64,
    parameters: Option<Value>,
    max_age: u64,
    wait: bool,
}

#[derive(Debug, Deserialize)]
struct JobParams {
    job_id: String,
}

#[derive(Debug, Deserialize)]
struct QueryResultParams {
    result_id: u64,
    format: String,
}

#[derive(Debug, Deserialize)]
struct CreateVisualizationParams {
    query_id: u64,
    name: String,
    #[serde(rename = "type")]
    viz_type: String,
    description: Option<String>,
    options: Option<Value>,
    x_column: Option<String>,
    #[serde(default)]
    y_columns: Vec<String>,
    series_type: String,
}

#[derive(Debug, Deserialize)]
struct ListDashboardsParams {
    page: u64,
    page_size: u64,
}

#[derive(Debug, Deserialize)]
struct DashboardRefParams {
    dashboard_id: String,
}

#[derive(Debug, Deserialize)]
struct NameParams {
    name: String,
}

#[derive(Debug, Deserialize)]
struct DashboardIdParams {
    dashboard_id: u64,
}

#[derive(Debug, Deserialize)]
struct UpdateDashboardParams {
    dashboard_id: u64,
    name: Option<String>,
    tags: Option<Vec<String>>,
    dashboard_filters_enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct AddWidgetParams {
    dashboard_id: u64,
    visualization_id: Option<u64>,
    text: Option<String>,
    col: u64,
    row: u64,
    size_x: u64,
    size_y: u64,
}

#[derive(Debug, Deserialize)]
struct UpdateWidgetParams {
    widget_id: u64,
    text: Option<String>,
    col: Option<u64>,
    row: Option<u64>,
    size_x: Option<u64>,
    size_y: Option<u64>,
}

/// Register every Redash tool.
pub fn register_tools(registry: &mut ToolRegistry, client: Arc<RedashClient>) -> Result<()> {
    // Queries
    registry.register_with(
        &client,
        "list_queries",
        "List saved queries, optionally filtered by a search term",
        paged(ParamSchema::new()).optional("search", ParamType::String, "Search term"),
        list_queries,
    )?;
    registry.register_with(
        &client,
        "get_query",
        "Get a query with its visualizations",
        query_id(),
        get_query,
    )?;
    registry.register_with(
        &client,
        "create_query",
        "Create a query (as a draft) on a data source",
        ParamSchema::new()
            .required("name", ParamType::String, "Query name")
            .required("query", ParamType::String, "Query text")
            .required("data_source_id", ParamType::Integer, "Data source id")
            .optional("description", ParamType::String, "Description")
            .optional("parameters", ParamType::Array, "Query parameter definitions"),
        create_query,
    )?;
    registry.register_with(
        &client,
        "update_query",
        "Update name, text, description or options of a query",
        query_id()
            .optional("name", ParamType::String, "New name")
            .optional("query", ParamType::String, "New query text")
            .optional("description", ParamType::String, "New description")
            .optional("options", ParamType::Object, "Replacement query options"),
        update_query,
    )?;
    registry.register_with(
        &client,
        "publish_query",
        "Publish a draft query",
        query_id(),
        publish_query,
    )?;
    registry.register_with(
        &client,
        "fork_query",
        "Fork a query into a new copy",
        query_id(),
        fork_query,
    )?;
    registry.register_with(
        &client,
        "execute_query",
        "Execute a query. With wait=true the job is polled until its result is ready",
        query_id()
            .optional("parameters", ParamType::Object, "Values for query parameters")
            .with_default(
                "max_age",
                ParamType::Integer,
                "Accept a cached result up to this many seconds old; 0 always runs",
                0,
            )
            .at_least(0)
            .with_default("wait", ParamType::Boolean, "Wait for the result", true),
        execute_query,
    )?;
    registry.register_with(
        &client,
        "get_job_status",
        "Get the status of a query execution job",
        ParamSchema::new().required("job_id", ParamType::String, "Job id"),
        get_job_status,
    )?;
    registry.register_with(
        &client,
        "get_query_result",
        "Get a query result as JSON rows or CSV text",
        ParamSchema::new()
            .required("result_id", ParamType::Integer, "Query result id")
            .with_default("format", ParamType::String, "Result format", "json")
            .one_of(&["json", "csv"]),
        get_query_result,
    )?;

    // Visualizations
    registry.register_with(
        &client,
        "create_visualization",
        "Create a visualization for a query; default options are derived from column names",
        query_id()
            .required("name", ParamType::String, "Visualization name")
            .with_default("type", ParamType::String, "Visualization type", "TABLE")
            .one_of(VISUALIZATION_TYPES)
            .optional("description", ParamType::String, "Description")
            .optional("options", ParamType::Object, "Explicit visualization options")
            .optional("x_column", ParamType::String, "Column for the x axis (charts)")
            .optional("y_columns", ParamType::Array, "Columns for the y axis or counter")
            .with_default("series_type", ParamType::String, "Chart series type", "column")
            .one_of(SERIES_TYPES),
        create_visualization,
    )?;

    // Dashboards and widgets
    registry.register_with(
        &client,
        "list_dashboards",
        "List dashboards",
        paged(ParamSchema::new()),
        list_dashboards,
    )?;
    registry.register_with(
        &client,
        "get_dashboard",
        "Get a dashboard with its widgets, by id or slug",
        ParamSchema::new().required("dashboard_id", ParamType::String, "Dashboard id or slug"),
        get_dashboard,
    )?;
    registry.register_with(
        &client,
        "create_dashboard",
        "Create an empty dashboard",
        ParamSchema::new().required("name", ParamType::String, "Dashboard name"),
        create_dashboard,
    )?;
    registry.register_with(
        &client,
        "update_dashboard",
        "Rename a dashboard, set its tags or toggle dashboard filters",
        ParamSchema::new()
            .required("dashboard_id", ParamType::Integer, "Dashboard id")
            .optional("name", ParamType::String, "New name")
            .optional("tags", ParamType::Array, "Tags")
            .optional(
                "dashboard_filters_enabled",
                ParamType::Boolean,
                "Enable dashboard-level filters",
            ),
        update_dashboard,
    )?;
    registry.register_with(
        &client,
        "publish_dashboard",
        "Publish a draft dashboard",
        ParamSchema::new().required("dashboard_id", ParamType::Integer, "Dashboard id"),
        publish_dashboard,
    )?;
    registry.register_with(
        &client,
        "add_widget_to_dashboard",
        "Add a visualization or text widget to a dashboard",
        ParamSchema::new()
            .required("dashboard_id", ParamType::Integer, "Dashboard id")
            .optional("visualization_id", ParamType::Integer, "Visualization to show")
            .optional("text", ParamType::String, "Markdown text for a text widget")
            .with_default("col", ParamType::Integer, "Grid column", 0)
            .at_least(0)
            .with_default("row", ParamType::Integer, "Grid row", 0)
            .at_least(0)
            .with_default("size_x", ParamType::Integer, "Width in grid cells", 3)
            .at_least(0)
            .with_default("size_y", ParamType::Integer, "Height in grid cells", 8)
            .at_least(0),
        add_widget_to_dashboard,
    )?;
    registry.register_with(
        &client,
        "update_widget",
        "Change the text or position of a widget",
        ParamSchema::new()
            .required("widget_id", ParamType::Integer, "Widget id")
            .optional("text", ParamType::String, "New text")
            .optional("col", ParamType::Integer, "Grid column")
            .at_least(0)
            .optional("row", ParamType::Integer, "Grid row")
            .at_least(0)
            .optional("size_x", ParamType::Integer, "Width in grid cells")
            .at_least(0)
            .optional("size_y", ParamType::Integer, "Height in grid cells")
            .at_least(0),
        update_widget,
    )?;

    // Workspace
    registry.register_with(
        &client,
        "list_data_sources",
        "List data sources queries can run on",
        ParamSchema::new(),
        list_data_sources,
    )?;
    registry.register_with(
        &client,
        "get_workspace_overview",
        "Summarize queries, dashboards and data sources of the workspace",
        ParamSchema::new(),
        get_workspace_overview,
    )?;
    Ok(())
}

// =============================================================================
// Queries
// =============================================================================

async fn list_queries(client: Arc<RedashClient>, params: ListQueriesParams) -> Result<ToolOutput> {
    let page = params.page;
    let queries = client
        .list_queries(page, params.page_size, params.search.as_deref())
        .await
        .context("listing queries")?;
    ToolOutput::new(
        format!(
            "Showing {} of {} queries (page {})",
            queries.results.len(),
            queries.count,
            page
        ),
        queries,
    )
}

async fn get_query(client: Arc<RedashClient>, params: QueryIdParams) -> Result<ToolOutput> {
    let id = params.query_id;
    let query = client
        .get_query(id)
        .await
        .with_context(|| format!("fetching query {}", id))?;
    ToolOutput::new(
        format!(
            "Query {}: {} ({} visualizations)",
            query.id,
            query.name,
            query.visualizations.len()
        ),
        query,
    )
}

async fn create_query(client: Arc<RedashClient>, params: CreateQueryParams) -> Result<ToolOutput> {
    let request = CreateQueryRequest {
        name: params.name,
        query: params.query,
        data_source_id: params.data_source_id,
        description: params.description,
        options: json!({
            "parameters": params.parameters.unwrap_or_else(|| json!([])),
        }),
    };
    let query = client
        .create_query(&request)
        .await
        .with_context(|| format!("creating query '{}'", request.name))?;
    ToolOutput::new(format!("Created query {}: {}", query.id, query.name), query)
}

async fn update_query(client: Arc<RedashClient>, params: UpdateQueryParams) -> Result<ToolOutput> {
    let id = params.query_id;
    let mut changes = Map::new();
    let text_fields = [
        ("name", params.name),
        ("query", params.query),
        ("description", params.description),
    ];
    for (field, value) in text_fields {
        if let Some(value) = value {
            changes.insert(field.to_string(), Value::String(value));
        }
    }
    if let Some(options) = params.options {
        changes.insert("options".to_string(), options);
    }
    if changes.is_empty() {
        return Err(Error::validation(
            "query_id",
            "nothing to update; pass name, query, description or options",
        ));
    }

    let query = client
        .update_query(id, &Value::Object(changes))
        .await
        .with_context(|| format!("updating query {}", id))?;
    ToolOutput::new(format!("Updated query {}: {}", query.id, query.name), query)
}

async fn publish_query(client: Arc<RedashClient>, params: QueryIdParams) -> Result<ToolOutput> {
    let id = params.query_id;
    let query = client
        .update_query(id, &json!({"is_draft": false}))
        .await
        .with_context(|| format!("publishing query {}", id))?;
    ToolOutput::new(format!("Published query {}: {}", query.id, query.name), query)
}

async fn fork_query(client: Arc<RedashClient>, params: QueryIdParams) -> Result<ToolOutput> {
    let id = params.query_id;
    let fork = client
        .fork_query(id)
        .await
        .with_context(|| format!("forking query {}", id))?;
    ToolOutput::new(format!("Forked query {} into {}", id, fork.id), fork)
}

fn result_output(query_id: u64, result: QueryResult, how: &str) -> Result<ToolOutput> {
    ToolOutput::new(
        format!(
            "Query {} returned {} rows ({})",
            query_id,
            result.data.rows.len(),
            how
        ),
        result,
    )
}

async fn execute_query(client: Arc<RedashClient>, params: ExecuteQueryParams) -> Result<ToolOutput> {
    let id = params.query_id;
    let execution = client
        .execute_query(id, params.parameters.as_ref(), params.max_age)
        .await
        .with_context(|| format!("executing query {}", id))?;

    match execution {
        Execution::Ready(result) => result_output(id, result, "cached result"),
        Execution::Pending(job) if params.wait => {
            let job_id = job.id.clone();
            let result = wait_for_result(client.as_ref(), job, client.poll_settings())
                .await
                .with_context(|| format!("executing query {}", id))?;
            result_output(id, result, &format!("job {}", job_id))
        }
        Execution::Pending(job) => ToolOutput::new(
            format!(
                "Query {} submitted as job {} ({})",
                id, job.id, job.status
            ),
            job,
        ),
    }
}

async fn get_job_status(client: Arc<RedashClient>, params: JobParams) -> Result<ToolOutput> {
    let job_id = params.job_id.as_str();
    let job = client
        .get_job(job_id)
        .await
        .with_context(|| format!("fetching job {}", job_id))?;
    ToolOutput::new(format!("Job {}: {}", job.id, job.status), job)
}

async fn get_query_result(client: Arc<RedashClient>, params: QueryResultParams) -> Result<ToolOutput> {
    let id = params.result_id;
    if params.format == "csv" {
        let csv = client
            .get_query_result_csv(id)
            .await
            .with_context(|| format!("fetching query result {}", id))?;
        return ToolOutput::new(
            format!("Query result {} as CSV ({} bytes)", id, csv.len()),
            json!({"result_id": id, "format": "csv", "csv": csv}),
        );
    }

    let result = client
        .get_query_result(id)
        .await
        .with_context(|| format!("fetching query result {}", id))?;
    ToolOutput::new(
        format!(
            "Query result {}: {} rows, {} columns",
            id,
            result.data.rows.len(),
            result.data.columns.len()
        ),
        result,
    )
}

// =============================================================================
// Visualizations
// =============================================================================

/// Column hints from the parameters, completed with the columns of the
/// query's latest result when the caller named none.
async fn column_hints(
    client: &RedashClient,
    query_id: u64,
    x_column: Option<String>,
    y_columns: Vec<String>,
) -> Result<ColumnHints> {
    let mut hints = ColumnHints {
        x_column,
        y_columns,
        all_columns: Vec::new(),
    };

    if hints.x_column.is_none() || hints.y_columns.is_empty() {
        let query = client.get_query(query_id).await?;
        if let Some(result_id) = query.latest_query_data_id {
            hints.all_columns = client.get_query_result(result_id).await?.column_names();
        }
    }
    if hints.all_columns.is_empty() {
        hints.all_columns = hints
            .x_column
            .iter()
            .chain(hints.y_columns.iter())
            .cloned()
            .collect();
    }

    if hints.x_column.is_none() {
        hints.x_column = hints.all_columns.first().cloned();
    }
    if hints.y_columns.is_empty() {
        hints.y_columns = hints
            .all_columns
            .iter()
            .filter(|c| Some(*c) != hints.x_column.as_ref())
            .cloned()
            .collect();
    }
    Ok(hints)
}

async fn create_visualization(
    client: Arc<RedashClient>,
    params: CreateVisualizationParams,
) -> Result<ToolOutput> {
    let query_id = params.query_id;
    let viz_type = params.viz_type.as_str();

    let options = match params.options {
        Some(options) => options,
        None => {
            let hints = column_hints(&client, query_id, params.x_column, params.y_columns)
                .await
                .with_context(|| format!("reading columns of query {}", query_id))?;
            default_options(viz_type, &params.series_type, &hints)
        }
    };

    let mut request = json!({
        "query_id": query_id,
        "name": params.name,
        "type": viz_type,
        "options": options,
    });
    if let Some(description) = params.description {
        request["description"] = json!(description);
    }

    let visualization = client
        .create_visualization(&request)
        .await
        .with_context(|| format!("creating visualization for query {}", query_id))?;
    ToolOutput::new(
        format!(
            "Created {} visualization {} for query {}",
            visualization.viz_type, visualization.id, query_id
        ),
        visualization,
    )
}

// =============================================================================
// Dashboards and widgets
// =============================================================================

async fn list_dashboards(client: Arc<RedashClient>, params: ListDashboardsParams) -> Result<ToolOutput> {
    let page = params.page;
    let dashboards = client
        .list_dashboards(page, params.page_size)
        .await
        .context("listing dashboards")?;
    ToolOutput::new(
        format!(
            "Showing {} of {} dashboards (page {})",
            dashboards.results.len(),
            dashboards.count,
            page
        ),
        dashboards,
    )
}

async fn get_dashboard(client: Arc<RedashClient>, params: DashboardRefParams) -> Result<ToolOutput> {
    let id = params.dashboard_id.as_str();
    let dashboard = client
        .get_dashboard(id)
        .await
        .with_context(|| format!("fetching dashboard {}", id))?;
    ToolOutput::new(
        format!(
            "Dashboard {}: {} ({} widgets)",
            dashboard.id,
            dashboard.name,
            dashboard.widgets.len()
        ),
        dashboard,
    )
}

async fn create_dashboard(client: Arc<RedashClient>, params: NameParams) -> Result<ToolOutput> {
    let name = params.name.as_str();
    let dashboard = client
        .create_dashboard(name)
        .await
        .with_context(|| format!("creating dashboard '{}'", name))?;
    ToolOutput::new(
        format!("Created dashboard {}: {}", dashboard.id, dashboard.name),
        dashboard,
    )
}

async fn update_dashboard(
    client: Arc<RedashClient>,
    params: UpdateDashboardParams,
) -> Result<ToolOutput> {
    let id = params.dashboard_id;
    let mut changes = Map::new();
    if let Some(name) = params.name {
        changes.insert("name".to_string(), json!(name));
    }
    if let Some(tags) = params.tags {
        changes.insert("tags".to_string(), json!(tags));
    }
    if let Some(enabled) = params.dashboard_filters_enabled {
        changes.insert("dashboard_filters_enabled".to_string(), json!(enabled));
    }
    if changes.is_empty() {
        return Err(Error::validation(
            "dashboard_id",
            "nothing to update; pass name, tags or dashboard_filters_enabled",
        ));
    }

    let dashboard = client
        .update_dashboard(id, &Value::Object(changes))
        .await
        .with_context(|| format!("updating dashboard {}", id))?;
    ToolOutput::new(
        format!("Updated dashboard {}: {}", dashboard.id, dashboard.name),
        dashboard,
    )
}

async fn publish_dashboard(client: Arc<RedashClient>, params: DashboardIdParams) -> Result<ToolOutput> {
    let id = params.dashboard_id;
    let dashboard = client
        .update_dashboard(id, &json!({"is_draft": false}))
        .await
        .with_context(|| format!("publishing dashboard {}", id))?;
    ToolOutput::new(
        format!("Published dashboard {}: {}", dashboard.id, dashboard.name),
        dashboard,
    )
}

async fn add_widget_to_dashboard(
    client: Arc<RedashClient>,
    params: AddWidgetParams,
) -> Result<ToolOutput> {
    let dashboard_id = params.dashboard_id;
    let visualization_id = params.visualization_id;
    let text = params.text.as_deref().filter(|t| !t.trim().is_empty());
    if visualization_id.is_none() && text.is_none() {
        return Err(Error::validation(
            "visualization_id",
            "either visualization_id or text is required",
        ));
    }

    let request = json!({
        "dashboard_id": dashboard_id,
        "visualization_id": visualization_id,
        "text": text.unwrap_or(""),
        "width": 1,
        "options": {
            "isHidden": false,
            "position": {
                "col": params.col,
                "row": params.row,
                "sizeX": params.size_x,
                "sizeY": params.size_y,
            },
        },
    });

    let widget = client
        .create_widget(&request)
        .await
        .with_context(|| format!("adding widget to dashboard {}", dashboard_id))?;
    ToolOutput::new(
        format!("Added widget {} to dashboard {}", widget.id, dashboard_id),
        widget,
    )
}

async fn update_widget(client: Arc<RedashClient>, params: UpdateWidgetParams) -> Result<ToolOutput> {
    let id = params.widget_id;
    let mut changes = Map::new();
    if let Some(text) = params.text {
        changes.insert("text".to_string(), json!(text));
    }

    let mut position = Map::new();
    let fields = [
        ("col", params.col),
        ("row", params.row),
        ("sizeX", params.size_x),
        ("sizeY", params.size_y),
    ];
    for (key, value) in fields {
        if let Some(value) = value {
            position.insert(key.to_string(), json!(value));
        }
    }
    if !position.is_empty() {
        changes.insert("options".to_string(), json!({"position": position}));
    }
    if changes.is_empty() {
        return Err(Error::validation(
            "widget_id",
            "nothing to update; pass text or a position field",
        ));
    }

    let widget = client
        .update_widget(id, &Value::Object(changes))
        .await
        .with_context(|| format!("updating widget {}", id))?;
    ToolOutput::new(format!("Updated widget {}", widget.id), widget)
}

// =============================================================================
// Workspace
// =============================================================================

async fn list_data_sources(client: Arc<RedashClient>, _params: Params) -> Result<ToolOutput> {
    let sources = client
        .list_data_sources()
        .await
        .context("listing data sources")?;
    ToolOutput::new(format!("Found {} data sources", sources.len()), sources)
}

async fn get_workspace_overview(client: Arc<RedashClient>, _params: Params) -> Result<ToolOutput> {
    let (queries, dashboards, sources) = tokio::try_join!(
        client.list_queries(1, 25, None),
        client.list_dashboards(1, 25),
        client.list_data_sources(),
    )
    .context("building workspace overview")?;

    let recent_queries: Vec<Value> = queries
        .results
        .iter()
        .map(|q| json!({"id": q.id, "name": q.name, "is_draft": q.is_draft, "updated_at": q.updated_at}))
        .collect();
    let recent_dashboards: Vec<Value> = dashboards
        .results
        .iter()
        .map(|d| json!({"id": d.id, "name": d.name, "slug": d.slug, "is_draft": d.is_draft}))
        .collect();
    let data_sources: Vec<Value> = sources
        .iter()
        .map(|s| json!({"id": s.id, "name": s.name, "type": s.source_type}))
        .collect();

    ToolOutput::new(
        format!(
            "{} queries, {} dashboards, {} data sources",
            queries.count,
            dashboards.count,
            sources.len()
        ),
        json!({
            "queries": {"total": queries.count, "recent": recent_queries},
            "dashboards": {"total": dashboards.count, "recent": recent_dashboards},
            "data_sources": data_sources,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PollSettings;
    use httpmock::prelude::*;
    use std::time::Duration;

    fn registry(server: &MockServer) -> ToolRegistry {
        let client = RedashClient::with_base_url(&server.base_url(), "k")
            .unwrap()
            .with_poll_settings(PollSettings {
                interval: Duration::from_millis(1),
                max_attempts: 3,
            });
        let mut registry = ToolRegistry::new();
        register_tools(&mut registry, Arc::new(client)).unwrap();
        registry
    }

    fn payload(result: &toolport_mcp::ToolCallResult) -> Value {
        serde_json::from_str(result.content[1].text()).unwrap()
    }

    #[tokio::test]
    async fn test_add_text_widget() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/widgets").json_body(json!({
                "dashboard_id": 42,
                "visualization_id": null,
                "text": "hello",
                "width": 1,
                "options": {
                    "isHidden": false,
                    "position": {"col": 0, "row": 0, "sizeX": 3, "sizeY": 8}
                }
            }));
            then.status(200).json_body(json!({
                "id": 501,
                "dashboard_id": 42,
                "text": "hello",
                "options": {}
            }));
        });

        let result = registry(&server)
            .dispatch(
                "add_widget_to_dashboard",
                Some(json!({"dashboard_id": 42, "text": "hello"})),
            )
            .await;

        mock.assert();
        assert!(!result.is_error());
        assert_eq!(result.first_text(), Some("Added widget 501 to dashboard 42"));
        assert_eq!(payload(&result)["id"], 501);
    }

    #[tokio::test]
    async fn test_widget_needs_visualization_or_text() {
        let server = MockServer::start();
        let result = registry(&server)
            .dispatch("add_widget_to_dashboard", Some(json!({"dashboard_id": 42})))
            .await;

        assert!(result.is_error());
        assert_eq!(
            result.first_text(),
            Some("Error: Invalid parameter 'visualization_id': either visualization_id or text is required")
        );
    }

    #[tokio::test]
    async fn test_execute_query_waits_for_job() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/queries/3/results");
            then.status(200)
                .json_body(json!({"job": {"id": "j", "status": 1}}));
        });
        let poll = server.mock(|when, then| {
            when.method(GET).path("/api/jobs/j");
            then.status(200)
                .json_body(json!({"job": {"id": "j", "status": 3, "query_result_id": 8}}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/query_results/8");
            then.status(200).json_body(json!({
                "query_result": {"id": 8, "data": {"columns": [{"name": "n"}], "rows": [{"n": 1}, {"n": 2}]}}
            }));
        });

        let result = registry(&server)
            .dispatch("execute_query", Some(json!({"query_id": 3})))
            .await;

        poll.assert_hits(1);
        assert_eq!(result.first_text(), Some("Query 3 returned 2 rows (job j)"));
    }

    #[tokio::test]
    async fn test_execute_query_timeout_envelope() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/queries/3/results");
            then.status(200)
                .json_body(json!({"job": {"id": "slow", "status": 1}}));
        });
        let poll = server.mock(|when, then| {
            when.method(GET).path("/api/jobs/slow");
            then.status(200)
                .json_body(json!({"job": {"id": "slow", "status": 2}}));
        });

        let result = registry(&server)
            .dispatch("execute_query", Some(json!({"query_id": 3})))
            .await;

        poll.assert_hits(3);
        assert!(result.is_error());
        assert_eq!(
            result.first_text(),
            Some("Error executing query 3: Redash job slow timed out after 3ms")
        );
    }

    #[tokio::test]
    async fn test_execute_query_without_wait_returns_job() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/queries/3/results");
            then.status(200)
                .json_body(json!({"job": {"id": "j", "status": 1}}));
        });
        let poll = server.mock(|when, then| {
            when.method(GET).path("/api/jobs/j");
            then.status(200);
        });

        let result = registry(&server)
            .dispatch("execute_query", Some(json!({"query_id": 3, "wait": false})))
            .await;

        poll.assert_hits(0);
        assert_eq!(result.first_text(), Some("Query 3 submitted as job j (pending)"));
    }

    #[tokio::test]
    async fn test_create_visualization_uses_result_columns() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/queries/3");
            then.status(200).json_body(json!({
                "id": 3, "name": "Signups", "latest_query_data_id": 8
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/query_results/8");
            then.status(200).json_body(json!({
                "query_result": {"id": 8, "data": {
                    "columns": [{"name": "day"}, {"name": "conversion_rate"}],
                    "rows": []
                }}
            }));
        });
        let create = server.mock(|when, then| {
            when.method(POST)
                .path("/api/visualizations")
                .body_includes("\"globalSeriesType\":\"line\"")
                .body_includes("\"conversion_rate\":\"y\"");
            then.status(200).json_body(json!({
                "id": 12, "type": "CHART", "name": "Trend", "options": {}
            }));
        });

        let result = registry(&server)
            .dispatch(
                "create_visualization",
                Some(json!({"query_id": 3, "name": "Trend", "type": "CHART", "series_type": "line"})),
            )
            .await;

        create.assert();
        assert_eq!(
            result.first_text(),
            Some("Created CHART visualization 12 for query 3")
        );
    }

    #[tokio::test]
    async fn test_update_query_requires_changes() {
        let server = MockServer::start();
        let result = registry(&server)
            .dispatch("update_query", Some(json!({"query_id": 3})))
            .await;
        assert!(result.is_error());
    }

    #[tokio::test]
    async fn test_page_size_bounds() {
        let server = MockServer::start();
        let registry = registry(&server);

        let result = registry
            .dispatch("list_dashboards", Some(json!({"page_size": 251})))
            .await;
        assert_eq!(
            result.first_text(),
            Some("Error: Invalid parameter 'page_size': must be between 1 and 250")
        );

        let result = registry
            .dispatch("list_queries", Some(json!({"page": 0})))
            .await;
        assert_eq!(
            result.first_text(),
            Some("Error: Invalid parameter 'page': must be at least 1")
        );

        let schema = registry
            .definitions()
            .into_iter()
            .find(|tool| tool.name == "list_queries")
            .unwrap()
            .input_schema;
        assert_eq!(schema["properties"]["page_size"]["maximum"], 250);
    }

    #[tokio::test]
    async fn test_workspace_overview() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/queries");
            then.status(200).json_body(json!({
                "count": 40, "page": 1, "page_size": 25,
                "results": [{"id": 1, "name": "Revenue"}]
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/dashboards");
            then.status(200).json_body(json!({
                "count": 2, "page": 1, "page_size": 25,
                "results": [{"id": 42, "name": "KPIs", "slug": "kpis"}]
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/data_sources");
            then.status(200)
                .json_body(json!([{"id": 1, "name": "warehouse", "type": "pg"}]));
        });

        let result = registry(&server)
            .dispatch("get_workspace_overview", None)
            .await;

        assert_eq!(
            result.first_text(),
            Some("40 queries, 2 dashboards, 1 data sources")
        );
        let payload = payload(&result);
        assert_eq!(payload["dashboards"]["recent"][0]["slug"], "kpis");
        assert_eq!(payload["data_sources"][0]["type"], "pg");
    }
}
