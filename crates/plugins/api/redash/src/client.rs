//! Redash API client implementation.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use toolport_core::{endpoint, Error, Result};
use tracing::{debug, warn};

use crate::config::{PollSettings, RedashConfig};
use crate::poller::JobApi;
use crate::types::{
    Dashboard, DataSource, ExecuteResponse, Execution, Job, JobEnvelope, Page, Query,
    QueryResult, QueryResultEnvelope, Visualization, Widget,
};

/// Body of `POST /api/queries`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateQueryRequest {
    pub name: String,
    pub query: String,
    pub data_source_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub options: Value,
}

/// Redash API client.
pub struct RedashClient {
    base_url: String,
    api_key: String,
    poll: PollSettings,
    client: reqwest::Client,
}

impl RedashClient {
    pub fn new(config: &RedashConfig) -> Result<Self> {
        let client = Self::with_base_url(&config.url, config.api_key.expose())?;
        Ok(client.with_poll_settings(config.poll))
    }

    /// Create a client with a custom base URL and default polling.
    pub fn with_base_url(base_url: &str, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("toolport")
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            poll: PollSettings::default(),
            client,
        })
    }

    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    pub fn poll_settings(&self) -> &PollSettings {
        &self.poll
    }

    fn request(&self, method: reqwest::Method, url: reqwest::Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("Key {}", self.api_key))
    }

    async fn get<T: DeserializeOwned>(&self, path: &[&str], query: &[(&str, String)]) -> Result<T> {
        let url = endpoint(&self.base_url, path)?;
        debug!(url = %url, params = ?query, "Redash GET request");

        let response = self
            .request(reqwest::Method::GET, url)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        handle_response(response).await
    }

    /// Redash uses POST both for creation and for (partial) updates.
    async fn post<T, B>(&self, path: &[&str], body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = endpoint(&self.base_url, path)?;
        debug!(url = %url, "Redash POST request");

        let response = self
            .request(reqwest::Method::POST, url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        handle_response(response).await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn list_queries(
        &self,
        page: u64,
        page_size: u64,
        search: Option<&str>,
    ) -> Result<Page<Query>> {
        let mut query = vec![
            ("page", page.to_string()),
            ("page_size", page_size.to_string()),
        ];
        if let Some(search) = search {
            query.push(("q", search.to_string()));
        }
        self.get(&["api", "queries"], &query).await
    }

    pub async fn get_query(&self, id: u64) -> Result<Query> {
        let id = id.to_string();
        self.get(&["api", "queries", id.as_str()], &[]).await
    }

    pub async fn create_query(&self, request: &CreateQueryRequest) -> Result<Query> {
        self.post(&["api", "queries"], request).await
    }

    /// Apply a partial update (`name`, `query`, `is_draft`, ...).
    pub async fn update_query(&self, id: u64, changes: &Value) -> Result<Query> {
        let id = id.to_string();
        self.post(&["api", "queries", id.as_str()], changes).await
    }

    pub async fn fork_query(&self, id: u64) -> Result<Query> {
        let id = id.to_string();
        self.post(&["api", "queries", id.as_str(), "fork"], &json!({}))
            .await
    }

    /// Submit an execution. Redash answers with a cached result when one
    /// younger than `max_age` seconds exists, otherwise with a job.
    pub async fn execute_query(
        &self,
        id: u64,
        parameters: Option<&Value>,
        max_age: u64,
    ) -> Result<Execution> {
        let mut body = json!({"max_age": max_age});
        if let Some(parameters) = parameters {
            body["parameters"] = parameters.clone();
        }

        let id = id.to_string();
        let response: ExecuteResponse = self
            .post(&["api", "queries", id.as_str(), "results"], &body)
            .await?;

        match (response.query_result, response.job) {
            (Some(result), _) => Ok(Execution::Ready(result)),
            (None, Some(job)) => Ok(Execution::Pending(job)),
            (None, None) => Err(Error::Protocol(
                "execution response has neither a job nor a query result".to_string(),
            )),
        }
    }

    pub async fn get_job(&self, job_id: &str) -> Result<Job> {
        let envelope: JobEnvelope = self.get(&["api", "jobs", job_id], &[]).await?;
        Ok(envelope.job)
    }

    pub async fn get_query_result(&self, result_id: u64) -> Result<QueryResult> {
        let result_id = result_id.to_string();
        let envelope: QueryResultEnvelope = self
            .get(&["api", "query_results", result_id.as_str()], &[])
            .await?;
        Ok(envelope.query_result)
    }

    /// Download a result as CSV text.
    pub async fn get_query_result_csv(&self, result_id: u64) -> Result<String> {
        let file = format!("{}.csv", result_id);
        let url = endpoint(&self.base_url, &["api", "query_results", file.as_str()])?;
        debug!(url = %url, "Redash GET request");

        let response = self
            .request(reqwest::Method::GET, url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let response = check_status(response).await?;
        response
            .text()
            .await
            .map_err(|e| Error::Http(e.to_string()))
    }

    // =========================================================================
    // Visualizations
    // =========================================================================

    pub async fn create_visualization(&self, request: &Value) -> Result<Visualization> {
        self.post(&["api", "visualizations"], request).await
    }

    // =========================================================================
    // Dashboards and widgets
    // =========================================================================

    pub async fn list_dashboards(&self, page: u64, page_size: u64) -> Result<Page<Dashboard>> {
        let query = [
            ("page", page.to_string()),
            ("page_size", page_size.to_string()),
        ];
        self.get(&["api", "dashboards"], &query).await
    }

    /// Fetch a dashboard by numeric id or slug.
    pub async fn get_dashboard(&self, id_or_slug: &str) -> Result<Dashboard> {
        self.get(&["api", "dashboards", id_or_slug], &[])
            .await
    }

    pub async fn create_dashboard(&self, name: &str) -> Result<Dashboard> {
        self.post(&["api", "dashboards"], &json!({"name": name})).await
    }

    pub async fn update_dashboard(&self, id: u64, changes: &Value) -> Result<Dashboard> {
        let id = id.to_string();
        self.post(&["api", "dashboards", id.as_str()], changes).await
    }

    pub async fn create_widget(&self, request: &Value) -> Result<Widget> {
        self.post(&["api", "widgets"], request).await
    }

    pub async fn update_widget(&self, id: u64, changes: &Value) -> Result<Widget> {
        let id = id.to_string();
        self.post(&["api", "widgets", id.as_str()], changes).await
    }

    // =========================================================================
    // Data sources
    // =========================================================================

    pub async fn list_data_sources(&self) -> Result<Vec<DataSource>> {
        self.get(&["api", "data_sources"], &[]).await
    }
}

#[async_trait]
impl JobApi for RedashClient {
    async fn job(&self, job_id: &str) -> Result<Job> {
        self.get_job(job_id).await
    }

    async fn query_result(&self, result_id: u64) -> Result<QueryResult> {
        self.get_query_result(result_id).await
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let status_code = status.as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);
    warn!(
        status = status_code,
        message = message,
        "Redash API error response"
    );
    Err(Error::from_status(status_code, message))
}

async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    check_status(response)
        .await?
        .json()
        .await
        .map_err(|e| Error::InvalidData(format!("Failed to parse response: {}", e)))
}

/// Redash error bodies carry `message` (API) or `error` (job failures).
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(r#"{"message": "Couldn't find object"}"#),
            "Couldn't find object"
        );
        assert_eq!(error_message(r#"{"error": "boom"}"#), "boom");
        assert_eq!(error_message("<html>502</html>"), "<html>502</html>");
    }

    mod integration {
        use super::*;
        use crate::poller::wait_for_result;
        use crate::types::JobStatus;
        use httpmock::prelude::*;
        use std::time::Duration;

        fn client(server: &MockServer) -> RedashClient {
            RedashClient::with_base_url(&server.base_url(), "secret-key")
                .unwrap()
                .with_poll_settings(PollSettings {
                    interval: Duration::from_millis(1),
                    max_attempts: 5,
                })
        }

        #[tokio::test]
        async fn test_list_queries_with_search() {
            let server = MockServer::start();
            let mock = server.mock(|when, then| {
                when.method(GET)
                    .path("/api/queries")
                    .query_param("page", "2")
                    .query_param("page_size", "10")
                    .query_param("q", "revenue")
                    .header("Authorization", "Key secret-key");
                then.status(200).json_body(json!({
                    "count": 11,
                    "page": 2,
                    "page_size": 10,
                    "results": [{"id": 3, "name": "Revenue by day", "query": "select 1"}]
                }));
            });

            let page = client(&server)
                .list_queries(2, 10, Some("revenue"))
                .await
                .unwrap();

            mock.assert();
            assert_eq!(page.count, 11);
            assert_eq!(page.results[0].name, "Revenue by day");
        }

        #[tokio::test]
        async fn test_execute_returns_cached_result() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(POST)
                    .path("/api/queries/3/results")
                    .json_body(json!({"max_age": 600}));
                then.status(200).json_body(json!({
                    "query_result": {"id": 90, "data": {"columns": [], "rows": []}}
                }));
            });

            let execution = client(&server).execute_query(3, None, 600).await.unwrap();
            assert!(matches!(execution, Execution::Ready(ref r) if r.id == 90));
        }

        #[tokio::test]
        async fn test_execute_and_poll_job() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(POST)
                    .path("/api/queries/3/results")
                    .json_body(json!({"max_age": 0, "parameters": {"day": "2024-01-01"}}));
                then.status(200)
                    .json_body(json!({"job": {"id": "j-1", "status": 1}}));
            });
            let poll = server.mock(|when, then| {
                when.method(GET).path("/api/jobs/j-1");
                then.status(200).json_body(json!({
                    "job": {"id": "j-1", "status": 3, "query_result_id": 91}
                }));
            });
            let fetch = server.mock(|when, then| {
                when.method(GET).path("/api/query_results/91");
                then.status(200).json_body(json!({
                    "query_result": {
                        "id": 91,
                        "data": {"columns": [{"name": "n"}], "rows": [{"n": 1}]}
                    }
                }));
            });

            let client = client(&server);
            let parameters = json!({"day": "2024-01-01"});
            let job = match client.execute_query(3, Some(&parameters), 0).await.unwrap() {
                Execution::Pending(job) => job,
                Execution::Ready(_) => panic!("expected a job"),
            };
            assert_eq!(job.status, JobStatus::Pending);

            let result = wait_for_result(&client, job, client.poll_settings())
                .await
                .unwrap();

            poll.assert_hits(1);
            fetch.assert();
            assert_eq!(result.id, 91);
            assert_eq!(result.data.rows.len(), 1);
        }

        #[tokio::test]
        async fn test_result_csv() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(GET).path("/api/query_results/91.csv");
                then.status(200).body("n\n1\n");
            });

            let csv = client(&server).get_query_result_csv(91).await.unwrap();
            assert_eq!(csv, "n\n1\n");
        }

        #[tokio::test]
        async fn test_dashboard_by_slug() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(GET).path("/api/dashboards/kpis");
                then.status(200).json_body(json!({
                    "id": 42,
                    "name": "KPIs",
                    "slug": "kpis",
                    "widgets": [{"id": 7, "text": "note", "options": {}}]
                }));
            });

            let dashboard = client(&server).get_dashboard("kpis").await.unwrap();
            assert_eq!(dashboard.id, 42);
            assert_eq!(dashboard.widgets[0].text, "note");
        }

        #[tokio::test]
        async fn test_slug_is_one_segment() {
            let server = MockServer::start();
            let sources = server.mock(|when, then| {
                when.method(GET).path("/api/data_sources");
                then.status(200).json_body(json!([]));
            });

            let client = client(&server);
            assert!(client.get_dashboard("../data_sources").await.is_err());
            assert!(matches!(
                client.get_dashboard("..").await,
                Err(Error::InvalidData(_))
            ));
            assert_eq!(sources.hits(), 0);
        }

        #[tokio::test]
        async fn test_invalid_api_key() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(GET).path("/api/data_sources");
                then.status(403).json_body(json!({"message": "Invalid API key"}));
            });

            let err = client(&server).list_data_sources().await.unwrap_err();
            assert_eq!(err.to_string(), "Authentication error: Invalid API key");
        }
    }
}
