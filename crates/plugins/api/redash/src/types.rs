//! Redash API types.
//!
//! Redash payloads carry many optional and version-dependent fields, so most
//! fields default and free-form parts (`options`, widget layouts) stay as
//! [`serde_json::Value`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Paginated listing (`/api/queries`, `/api/dashboards`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub page_size: u64,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedashUser {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Query text
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub data_source_id: Option<u64>,
    #[serde(default)]
    pub is_draft: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub latest_query_data_id: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub options: Value,
    #[serde(default)]
    pub user: Option<RedashUser>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub visualizations: Vec<Visualization>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visualization {
    pub id: u64,
    #[serde(rename = "type")]
    pub viz_type: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub options: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSource {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(default)]
    pub syntax: Option<String>,
    #[serde(default)]
    pub paused: u8,
    #[serde(default)]
    pub view_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub is_draft: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub dashboard_filters_enabled: bool,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub widgets: Vec<Widget>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Widget {
    pub id: u64,
    #[serde(default)]
    pub dashboard_id: Option<u64>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub visualization: Option<Visualization>,
    #[serde(default)]
    pub options: Value,
}

/// Lifecycle of a query execution job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum JobStatus {
    Pending,
    Started,
    Success,
    Failure,
    Cancelled,
}

impl JobStatus {
    /// Success, failure and cancellation end polling.
    pub fn is_terminal(self) -> bool {
        u8::from(self) >= 3
    }
}

impl TryFrom<u8> for JobStatus {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(JobStatus::Pending),
            2 => Ok(JobStatus::Started),
            3 => Ok(JobStatus::Success),
            4 => Ok(JobStatus::Failure),
            5 => Ok(JobStatus::Cancelled),
            other => Err(format!("unknown job status {}", other)),
        }
    }
}

impl From<JobStatus> for u8 {
    fn from(status: JobStatus) -> u8 {
        match status {
            JobStatus::Pending => 1,
            JobStatus::Started => 2,
            JobStatus::Success => 3,
            JobStatus::Failure => 4,
            JobStatus::Cancelled => 5,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Pending => "pending",
            JobStatus::Started => "started",
            JobStatus::Success => "success",
            JobStatus::Failure => "failure",
            JobStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub query_result_id: Option<u64>,
}

/// `{"job": {...}}` wrapper returned by `/api/jobs/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct JobEnvelope {
    pub job: Job,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(default)]
    pub friendly_name: Option<String>,
    #[serde(default, rename = "type")]
    pub column_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResultData {
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub rows: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub id: u64,
    #[serde(default)]
    pub query_hash: Option<String>,
    #[serde(default)]
    pub data_source_id: Option<u64>,
    #[serde(default)]
    pub runtime: Option<f64>,
    #[serde(default)]
    pub retrieved_at: Option<String>,
    #[serde(default)]
    pub data: QueryResultData,
}

impl QueryResult {
    pub fn column_names(&self) -> Vec<String> {
        self.data.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// `{"query_result": {...}}` wrapper returned by `/api/query_results/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResultEnvelope {
    pub query_result: QueryResult,
}

/// Answer to `POST /api/queries/{id}/results`: a cached result or a job.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteResponse {
    #[serde(default)]
    pub job: Option<Job>,
    #[serde(default)]
    pub query_result: Option<QueryResult>,
}

/// Outcome of submitting an execution.
#[derive(Debug, Clone)]
pub enum Execution {
    Ready(QueryResult),
    Pending(Job),
}
