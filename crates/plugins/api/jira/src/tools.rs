//! Jira tool handlers.

use std::sync::Arc;

use serde::Deserialize;
use toolport_core::{Result, ResultExt};
use toolport_mcp::{ParamSchema, ParamType, Params, ToolOutput, ToolRegistry};

use crate::client::JiraClient;

const SPRINT_STATES: &[&str] = &["future", "active", "closed"];

/// Register every Jira tool.
pub fn register_tools(registry: &mut ToolRegistry, client: Arc<JiraClient>) -> Result<()> {
    registry.register_with(
        &client,
        "list_projects",
        "List all Jira projects visible to the configured account",
        ParamSchema::new(),
        list_projects,
    )?;
    registry.register_with(
        &client,
        "get_project",
        "Get details of a Jira project by key",
        ParamSchema::new().required("project_key", ParamType::String, "Project key, e.g. PROJ"),
        get_project,
    )?;
    registry.register_with(
        &client,
        "search_issues",
        "Search Jira issues with a JQL query",
        ParamSchema::new()
            .required("jql", ParamType::String, "JQL query string")
            .with_default(
                "max_results",
                ParamType::Integer,
                "Maximum number of issues to return",
                50,
            )
            .range(1, 100),
        search_issues,
    )?;
    registry.register_with(
        &client,
        "get_issue",
        "Get a Jira issue by key",
        ParamSchema::new().required("issue_key", ParamType::String, "Issue key, e.g. PROJ-123"),
        get_issue,
    )?;
    registry.register_with(
        &client,
        "list_boards",
        "List agile boards, optionally for one project",
        ParamSchema::new().optional("project_key", ParamType::String, "Project key filter"),
        list_boards,
    )?;
    registry.register_with(
        &client,
        "list_sprints",
        "List sprints of an agile board",
        ParamSchema::new()
            .required("board_id", ParamType::Integer, "Board id")
            .optional("state", ParamType::String, "Sprint state filter")
            .one_of(SPRINT_STATES),
        list_sprints,
    )?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct ProjectParams {
    project_key: String,
}

#[derive(Debug, Deserialize)]
struct SearchIssuesParams {
    jql: String,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct IssueParams {
    issue_key: String,
}

#[derive(Debug, Deserialize)]
struct ListBoardsParams {
    project_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListSprintsParams {
    board_id: u64,
    state: Option<String>,
}

async fn list_projects(client: Arc<JiraClient>, _params: Params) -> Result<ToolOutput> {
    let projects = client.list_projects().await.context("listing projects")?;
    ToolOutput::new(format!("Found {} projects", projects.len()), projects)
}

async fn get_project(client: Arc<JiraClient>, params: ProjectParams) -> Result<ToolOutput> {
    let key = &params.project_key;
    let project = client
        .get_project(key)
        .await
        .with_context(|| format!("fetching project {}", key))?;
    ToolOutput::new(format!("Project {}: {}", project.key, project.name), project)
}

async fn search_issues(client: Arc<JiraClient>, params: SearchIssuesParams) -> Result<ToolOutput> {
    let result = client
        .search_issues(&params.jql, params.max_results)
        .await
        .context("searching issues")?;

    let summary = match result.total {
        Some(total) => format!("Found {} issues (showing {})", total, result.issues.len()),
        None => format!("Found {} issues", result.issues.len()),
    };
    ToolOutput::new(summary, result)
}

async fn get_issue(client: Arc<JiraClient>, params: IssueParams) -> Result<ToolOutput> {
    let key = &params.issue_key;
    let issue = client
        .get_issue(key)
        .await
        .with_context(|| format!("fetching issue {}", key))?;
    ToolOutput::new(
        format!("{} [{}] {}", issue.key, issue.status, issue.summary),
        issue,
    )
}

async fn list_boards(client: Arc<JiraClient>, params: ListBoardsParams) -> Result<ToolOutput> {
    let boards = client
        .list_boards(params.project_key.as_deref())
        .await
        .context("listing boards")?;
    ToolOutput::new(format!("Found {} boards", boards.len()), boards)
}

async fn list_sprints(client: Arc<JiraClient>, params: ListSprintsParams) -> Result<ToolOutput> {
    let board_id = params.board_id;
    let sprints = client
        .list_sprints(board_id, params.state.as_deref())
        .await
        .with_context(|| format!("listing sprints for board {}", board_id))?;
    ToolOutput::new(
        format!("Found {} sprints on board {}", sprints.len(), board_id),
        sprints,
    )
}
