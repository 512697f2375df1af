//! GitHub tool handlers.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use toolport_core::{Error, Result, ResultExt};
use toolport_mcp::{ParamSchema, ParamType, ToolOutput, ToolRegistry};

use crate::client::GitHubClient;
use crate::summary::summarize;

const STATES: &[&str] = &["open", "closed", "all"];

fn repo_schema() -> ParamSchema {
    ParamSchema::new()
        .required("owner", ParamType::String, "Repository owner (user or organization)")
        .required("repo", ParamType::String, "Repository name")
}

fn per_page(schema: ParamSchema) -> ParamSchema {
    schema
        .with_default("per_page", ParamType::Integer, "Results per page", 30)
        .range(1, 100)
}

/// Repository named by every per-repository tool.
#[derive(Debug, Deserialize)]
struct RepoRef {
    owner: String,
    repo: String,
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

#[derive(Debug, Deserialize)]
struct ListRepositoriesParams {
    owner: Option<String>,
    per_page: u32,
}

#[derive(Debug, Deserialize)]
struct RepoParams {
    #[serde(flatten)]
    repo: RepoRef,
}

#[derive(Debug, Deserialize)]
struct ListByStateParams {
    #[serde(flatten)]
    repo: RepoRef,
    state: String,
    per_page: u32,
}

#[derive(Debug, Deserialize)]
struct IssueParams {
    #[serde(flatten)]
    repo: RepoRef,
    issue_number: u64,
}

#[derive(Debug, Deserialize)]
struct PullRequestParams {
    #[serde(flatten)]
    repo: RepoRef,
    pull_number: u64,
}

#[derive(Debug, Deserialize)]
struct ListBranchesParams {
    #[serde(flatten)]
    repo: RepoRef,
    per_page: u32,
}

#[derive(Debug, Deserialize)]
struct ListCommitsParams {
    #[serde(flatten)]
    repo: RepoRef,
    branch: Option<String>,
    per_page: u32,
}

#[derive(Debug, Deserialize)]
struct CommentParams {
    #[serde(flatten)]
    repo: RepoRef,
    pull_number: u64,
    body: String,
}

#[derive(Debug, Deserialize)]
struct SummarizeParams {
    #[serde(flatten)]
    repo: RepoRef,
    pull_number: u64,
    post_comment: bool,
}

/// Register every GitHub tool.
pub fn register_tools(registry: &mut ToolRegistry, client: Arc<GitHubClient>) -> Result<()> {
    registry.register_with(
        &client,
        "list_repositories",
        "List repositories of a user or organization, or of the authenticated user",
        per_page(ParamSchema::new().optional(
            "owner",
            ParamType::String,
            "User or organization; defaults to the authenticated user",
        )),
        list_repositories,
    )?;
    registry.register_with(
        &client,
        "get_repository",
        "Get repository details",
        repo_schema(),
        get_repository,
    )?;
    registry.register_with(
        &client,
        "list_issues",
        "List issues of a repository (pull requests excluded)",
        per_page(
            repo_schema()
                .with_default("state", ParamType::String, "Issue state", "open")
                .one_of(STATES),
        ),
        list_issues,
    )?;
    registry.register_with(
        &client,
        "get_issue",
        "Get an issue by number",
        repo_schema().required("issue_number", ParamType::Integer, "Issue number"),
        get_issue,
    )?;
    registry.register_with(
        &client,
        "list_pull_requests",
        "List pull requests of a repository",
        per_page(
            repo_schema()
                .with_default("state", ParamType::String, "Pull request state", "open")
                .one_of(STATES),
        ),
        list_pull_requests,
    )?;
    registry.register_with(
        &client,
        "get_pull_request",
        "Get a pull request by number",
        repo_schema().required("pull_number", ParamType::Integer, "Pull request number"),
        get_pull_request,
    )?;
    registry.register_with(
        &client,
        "list_branches",
        "List branches of a repository",
        per_page(repo_schema()),
        list_branches,
    )?;
    registry.register_with(
        &client,
        "list_commits",
        "List recent commits, optionally on a branch",
        per_page(repo_schema().optional("branch", ParamType::String, "Branch name or SHA")),
        list_commits,
    )?;
    registry.register_with(
        &client,
        "comment_on_pull_request",
        "Post a comment on a pull request",
        repo_schema()
            .required("pull_number", ParamType::Integer, "Pull request number")
            .required("body", ParamType::String, "Comment text (markdown)"),
        comment_on_pull_request,
    )?;
    registry.register_with(
        &client,
        "summarize_pull_request",
        "Summarize the changes of a pull request, optionally posting the summary as a comment",
        repo_schema()
            .required("pull_number", ParamType::Integer, "Pull request number")
            .with_default(
                "post_comment",
                ParamType::Boolean,
                "Post the summary as a PR comment",
                false,
            ),
        summarize_pull_request,
    )?;
    Ok(())
}

async fn list_repositories(
    client: Arc<GitHubClient>,
    params: ListRepositoriesParams,
) -> Result<ToolOutput> {
    let owner = params.owner.as_deref();
    let repos = client
        .list_repositories(owner, params.per_page)
        .await
        .context("listing repositories")?;
    let whose = owner.unwrap_or("authenticated user");
    ToolOutput::new(
        format!("Found {} repositories for {}", repos.len(), whose),
        repos,
    )
}

async fn get_repository(client: Arc<GitHubClient>, params: RepoParams) -> Result<ToolOutput> {
    let repo = &params.repo;
    let repository = client
        .get_repository(&repo.owner, &repo.repo)
        .await
        .with_context(|| format!("fetching repository {}", repo))?;
    ToolOutput::new(
        format!(
            "{} ({} stars, {} open issues)",
            repository.full_name, repository.stargazers_count, repository.open_issues_count
        ),
        repository,
    )
}

async fn list_issues(client: Arc<GitHubClient>, params: ListByStateParams) -> Result<ToolOutput> {
    let repo = &params.repo;
    let issues = client
        .list_issues(&repo.owner, &repo.repo, &params.state, params.per_page)
        .await
        .with_context(|| format!("listing issues of {}", repo))?;
    ToolOutput::new(
        format!("Found {} {} issues in {}", issues.len(), params.state, repo),
        issues,
    )
}

async fn get_issue(client: Arc<GitHubClient>, params: IssueParams) -> Result<ToolOutput> {
    let (repo, number) = (&params.repo, params.issue_number);
    let issue = client
        .get_issue(&repo.owner, &repo.repo, number)
        .await
        .with_context(|| format!("fetching issue #{} of {}", number, repo))?;
    ToolOutput::new(
        format!("#{} [{}] {}", issue.number, issue.state, issue.title),
        issue,
    )
}

async fn list_pull_requests(
    client: Arc<GitHubClient>,
    params: ListByStateParams,
) -> Result<ToolOutput> {
    let repo = &params.repo;
    let prs = client
        .list_pull_requests(&repo.owner, &repo.repo, &params.state, params.per_page)
        .await
        .with_context(|| format!("listing pull requests of {}", repo))?;
    ToolOutput::new(
        format!(
            "Found {} {} pull requests in {}",
            prs.len(),
            params.state,
            repo
        ),
        prs,
    )
}

async fn get_pull_request(
    client: Arc<GitHubClient>,
    params: PullRequestParams,
) -> Result<ToolOutput> {
    let (repo, number) = (&params.repo, params.pull_number);
    let pr = client
        .get_pull_request(&repo.owner, &repo.repo, number)
        .await
        .with_context(|| format!("fetching pull request #{} of {}", number, repo))?;
    ToolOutput::new(
        format!(
            "PR #{} [{}] {} ({} → {})",
            pr.number, pr.state, pr.title, pr.head.ref_name, pr.base.ref_name
        ),
        pr,
    )
}

async fn list_branches(client: Arc<GitHubClient>, params: ListBranchesParams) -> Result<ToolOutput> {
    let repo = &params.repo;
    let branches = client
        .list_branches(&repo.owner, &repo.repo, params.per_page)
        .await
        .with_context(|| format!("listing branches of {}", repo))?;
    ToolOutput::new(
        format!("Found {} branches in {}", branches.len(), repo),
        branches,
    )
}

async fn list_commits(client: Arc<GitHubClient>, params: ListCommitsParams) -> Result<ToolOutput> {
    let repo = &params.repo;
    let branch = params.branch.as_deref();
    let commits = client
        .list_commits(&repo.owner, &repo.repo, branch, params.per_page)
        .await
        .with_context(|| format!("listing commits of {}", repo))?;
    let summary = match branch {
        Some(b) => format!("Found {} commits on {}", commits.len(), b),
        None => format!("Found {} commits", commits.len()),
    };
    ToolOutput::new(summary, commits)
}

async fn comment_on_pull_request(
    client: Arc<GitHubClient>,
    params: CommentParams,
) -> Result<ToolOutput> {
    let (repo, number) = (&params.repo, params.pull_number);
    if params.body.trim().is_empty() {
        return Err(Error::validation("body", "must not be empty"));
    }

    let comment = client
        .create_comment(&repo.owner, &repo.repo, number, &params.body)
        .await
        .with_context(|| format!("commenting on pull request #{}", number))?;
    ToolOutput::new(
        format!("Posted comment {} on PR #{}", comment.id, number),
        comment,
    )
}

async fn summarize_pull_request(
    client: Arc<GitHubClient>,
    params: SummarizeParams,
) -> Result<ToolOutput> {
    let (owner, name, number) = (&params.repo.owner, &params.repo.repo, params.pull_number);

    let pr = client
        .get_pull_request(owner, name, number)
        .await
        .with_context(|| format!("fetching pull request #{}", number))?;
    let files = client
        .list_pull_request_files(owner, name, number)
        .await
        .with_context(|| format!("fetching files of pull request #{}", number))?;

    let mut summary = summarize(&pr, &files);

    if params.post_comment {
        let comment = client
            .create_comment(owner, name, number, &summary.markdown)
            .await
            .with_context(|| format!("posting summary on pull request #{}", number))?;
        summary.comment_url = comment.html_url;
    }

    let headline = format!(
        "PR #{}: {} files changed (+{} / -{}){}",
        summary.number,
        summary.files_changed,
        summary.additions,
        summary.deletions,
        if summary.comment_url.is_some() {
            ", summary posted"
        } else {
            ""
        }
    );
    ToolOutput::new(headline, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::{json, Value};

    fn registry(server: &MockServer) -> ToolRegistry {
        let client = GitHubClient::with_base_url(&server.base_url(), "t").unwrap();
        let mut registry = ToolRegistry::new();
        register_tools(&mut registry, Arc::new(client)).unwrap();
        registry
    }

    fn mock_pr(server: &MockServer) {
        server.mock(|when, then| {
            when.method(GET).path("/repos/o/r/pulls/3");
            then.status(200).json_body(json!({
                "id": 300,
                "number": 3,
                "title": "Refactor",
                "state": "open",
                "html_url": "https://github.com/o/r/pull/3",
                "head": {"ref": "refactor", "sha": "a"},
                "base": {"ref": "main", "sha": "b"},
                "created_at": "t",
                "updated_at": "t"
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/repos/o/r/pulls/3/files");
            then.status(200).json_body(json!([
                {"filename": "src/a.rs", "status": "modified", "additions": 10, "deletions": 4, "changes": 14},
                {"filename": "docs/guide.md", "status": "added", "additions": 20, "deletions": 0, "changes": 20}
            ]));
        });
    }

    #[tokio::test]
    async fn test_summarize_without_posting() {
        let server = MockServer::start();
        mock_pr(&server);
        let post = server.mock(|when, then| {
            when.method(POST).path("/repos/o/r/issues/3/comments");
            then.status(201);
        });

        let result = registry(&server)
            .dispatch(
                "summarize_pull_request",
                Some(json!({"owner": "o", "repo": "r", "pull_number": 3})),
            )
            .await;

        assert!(!result.is_error());
        assert_eq!(
            result.first_text(),
            Some("PR #3: 2 files changed (+30 / -4)")
        );
        let payload: Value = serde_json::from_str(result.content[1].text()).unwrap();
        assert_eq!(payload["by_extension"]["md"]["additions"], 20);
        assert!(payload.get("comment_url").is_none());
        post.assert_hits(0);
    }

    #[tokio::test]
    async fn test_summarize_and_post() {
        let server = MockServer::start();
        mock_pr(&server);
        let post = server.mock(|when, then| {
            when.method(POST)
                .path("/repos/o/r/issues/3/comments")
                .body_includes("## Summary of PR #3: Refactor");
            then.status(201).json_body(json!({
                "id": 9,
                "body": "...",
                "html_url": "https://github.com/o/r/pull/3#issuecomment-9",
                "created_at": "t"
            }));
        });

        let result = registry(&server)
            .dispatch(
                "summarize_pull_request",
                Some(json!({"owner": "o", "repo": "r", "pull_number": "3", "post_comment": true})),
            )
            .await;

        post.assert();
        assert_eq!(
            result.first_text(),
            Some("PR #3: 2 files changed (+30 / -4), summary posted")
        );
    }

    #[tokio::test]
    async fn test_comment_requires_body_text() {
        let server = MockServer::start();
        let result = registry(&server)
            .dispatch(
                "comment_on_pull_request",
                Some(json!({"owner": "o", "repo": "r", "pull_number": 3, "body": "   "})),
            )
            .await;

        assert!(result.is_error());
        assert_eq!(
            result.first_text(),
            Some("Error: Invalid parameter 'body': must not be empty")
        );
    }

    #[tokio::test]
    async fn test_list_issues_state_validated() {
        let server = MockServer::start();
        let result = registry(&server)
            .dispatch(
                "list_issues",
                Some(json!({"owner": "o", "repo": "r", "state": "merged"})),
            )
            .await;

        assert!(result.is_error());
        assert!(result.first_text().unwrap().starts_with("Error: Invalid parameter 'state'"));
    }

    #[tokio::test]
    async fn test_missing_repo_is_validation_error() {
        let server = MockServer::start();
        let result = registry(&server)
            .dispatch("get_repository", Some(json!({"owner": "o"})))
            .await;

        assert_eq!(
            result.first_text(),
            Some("Error: Invalid parameter 'repo': is required")
        );
    }

    #[tokio::test]
    async fn test_per_page_bounds() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/repos/o/r/branches")
                .query_param("per_page", "100");
            then.status(200).json_body(json!([]));
        });
        let registry = registry(&server);

        let result = registry
            .dispatch(
                "list_branches",
                Some(json!({"owner": "o", "repo": "r", "per_page": 100})),
            )
            .await;
        assert_eq!(result.first_text(), Some("Found 0 branches in o/r"));
        mock.assert();

        let result = registry
            .dispatch(
                "list_branches",
                Some(json!({"owner": "o", "repo": "r", "per_page": 101})),
            )
            .await;
        assert_eq!(
            result.first_text(),
            Some("Error: Invalid parameter 'per_page': must be between 1 and 100")
        );
    }
}
