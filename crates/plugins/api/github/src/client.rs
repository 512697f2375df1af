//! GitHub API client implementation.

use serde::de::DeserializeOwned;
use serde::Serialize;
use toolport_core::{endpoint, Error, Result};
use tracing::{debug, warn};

use crate::config::GitHubConfig;
use crate::types::{
    CreateCommentRequest, GitHubBranch, GitHubComment, GitHubCommit, GitHubFile, GitHubIssue,
    GitHubPullRequest, GitHubRepository,
};

/// Largest page size the API accepts.
const MAX_PER_PAGE: u32 = 100;

/// GitHub stops listing PR files after 3000 entries.
const MAX_FILE_PAGES: u32 = 30;

/// GitHub API client.
pub struct GitHubClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl GitHubClient {
    /// Create a client from configuration.
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        Self::with_base_url(&config.api_url, config.token.expose())
    }

    /// Create a client with a custom base URL.
    pub fn with_base_url(base_url: &str, token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("toolport")
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            client,
        })
    }

    fn request(&self, method: reqwest::Method, url: reqwest::Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    /// Make an authenticated GET request.
    async fn get<T: DeserializeOwned>(&self, path: &[&str], query: &[(&str, String)]) -> Result<T> {
        let url = endpoint(&self.base_url, path)?;
        debug!(url = %url, params = ?query, "GitHub GET request");

        let response = self
            .request(reqwest::Method::GET, url)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        handle_response(response).await
    }

    /// Make an authenticated POST request.
    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &[&str], body: &B) -> Result<T> {
        let url = endpoint(&self.base_url, path)?;
        debug!(url = %url, "GitHub POST request");

        let response = self
            .request(reqwest::Method::POST, url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        handle_response(response).await
    }

    // =========================================================================
    // Repositories
    // =========================================================================

    /// List repositories of `owner`, or of the authenticated user when absent.
    pub async fn list_repositories(
        &self,
        owner: Option<&str>,
        per_page: u32,
    ) -> Result<Vec<GitHubRepository>> {
        let path = match owner {
            Some(owner) => vec!["users", owner, "repos"],
            None => vec!["user", "repos"],
        };
        let query = [
            ("sort", "updated".to_string()),
            ("per_page", per_page.to_string()),
        ];
        self.get(&path, &query).await
    }

    pub async fn get_repository(&self, owner: &str, repo: &str) -> Result<GitHubRepository> {
        self.get(&["repos", owner, repo], &[]).await
    }

    // =========================================================================
    // Issues
    // =========================================================================

    /// List issues. Pull requests, which the endpoint also returns, are dropped.
    pub async fn list_issues(
        &self,
        owner: &str,
        repo: &str,
        state: &str,
        per_page: u32,
    ) -> Result<Vec<GitHubIssue>> {
        let query = [
            ("state", state.to_string()),
            ("per_page", per_page.to_string()),
        ];
        let issues: Vec<GitHubIssue> = self
            .get(&["repos", owner, repo, "issues"], &query)
            .await?;
        Ok(issues
            .into_iter()
            .filter(|i| i.pull_request.is_none())
            .collect())
    }

    pub async fn get_issue(&self, owner: &str, repo: &str, number: u64) -> Result<GitHubIssue> {
        let number = number.to_string();
        self.get(&["repos", owner, repo, "issues", number.as_str()], &[])
            .await
    }

    // =========================================================================
    // Pull requests
    // =========================================================================

    pub async fn list_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        state: &str,
        per_page: u32,
    ) -> Result<Vec<GitHubPullRequest>> {
        let query = [
            ("state", state.to_string()),
            ("per_page", per_page.to_string()),
        ];
        self.get(&["repos", owner, repo, "pulls"], &query)
            .await
    }

    pub async fn get_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<GitHubPullRequest> {
        let number = number.to_string();
        self.get(&["repos", owner, repo, "pulls", number.as_str()], &[])
            .await
    }

    /// Every file changed by a pull request, following pagination.
    pub async fn list_pull_request_files(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<GitHubFile>> {
        let number = number.to_string();
        let path = ["repos", owner, repo, "pulls", number.as_str(), "files"];
        let mut files = Vec::new();

        for page in 1..=MAX_FILE_PAGES {
            let query = [
                ("per_page", MAX_PER_PAGE.to_string()),
                ("page", page.to_string()),
            ];
            let batch: Vec<GitHubFile> = self.get(&path, &query).await?;
            let done = batch.len() < MAX_PER_PAGE as usize;
            files.extend(batch);
            if done {
                break;
            }
        }

        Ok(files)
    }

    /// Post a conversation comment on an issue or pull request.
    pub async fn create_comment(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<GitHubComment> {
        let request = CreateCommentRequest {
            body: body.to_string(),
        };
        let number = number.to_string();
        self.post(&["repos", owner, repo, "issues", number.as_str(), "comments"], &request)
            .await
    }

    // =========================================================================
    // Branches and commits
    // =========================================================================

    pub async fn list_branches(
        &self,
        owner: &str,
        repo: &str,
        per_page: u32,
    ) -> Result<Vec<GitHubBranch>> {
        let query = [("per_page", per_page.to_string())];
        self.get(&["repos", owner, repo, "branches"], &query)
            .await
    }

    /// List commits, newest first, optionally starting from `branch`.
    pub async fn list_commits(
        &self,
        owner: &str,
        repo: &str,
        branch: Option<&str>,
        per_page: u32,
    ) -> Result<Vec<GitHubCommit>> {
        let mut query = vec![("per_page", per_page.to_string())];
        if let Some(branch) = branch {
            query.push(("sha", branch.to_string()));
        }
        self.get(&["repos", owner, repo, "commits"], &query)
            .await
    }
}

async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();

    if !status.is_success() {
        let status_code = status.as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body);
        warn!(
            status = status_code,
            message = message,
            "GitHub API error response"
        );
        return Err(Error::from_status(status_code, message));
    }

    response
        .json()
        .await
        .map_err(|e| Error::InvalidData(format!("Failed to parse response: {}", e)))
}

/// GitHub error bodies look like `{"message": "Not Found", "documentation_url": ...}`.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| body.to_string())
}
