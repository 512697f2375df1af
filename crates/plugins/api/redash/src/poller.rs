//! Waiting for query execution jobs.
//!
//! A job is polled at a fixed interval until it reaches a terminal status
//! or the attempt budget runs out. Jobs are never cancelled from here.

use async_trait::async_trait;
use toolport_core::{Error, Result};
use tracing::{debug, info};

use crate::config::PollSettings;
use crate::types::{Job, JobStatus, QueryResult};

/// The two calls polling needs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobApi: Send + Sync {
    async fn job(&self, job_id: &str) -> Result<Job>;
    async fn query_result(&self, result_id: u64) -> Result<QueryResult>;
}

/// Poll `job` until it finishes and return its result.
///
/// Each attempt sleeps one interval and then fetches the job once. After
/// `max_attempts` polls without a terminal status the wait fails with
/// [`Error::Timeout`] stating `max_attempts × interval`.
pub async fn wait_for_result<A>(api: &A, job: Job, settings: &PollSettings) -> Result<QueryResult>
where
    A: JobApi + ?Sized,
{
    let mut job = job;
    let mut attempts = 0;

    while !job.status.is_terminal() {
        if attempts == settings.max_attempts {
            return Err(Error::Timeout {
                operation: format!("Redash job {}", job.id),
                elapsed_ms: settings.budget_ms(),
            });
        }
        tokio::time::sleep(settings.interval).await;
        attempts += 1;
        job = api.job(&job.id).await?;
        debug!(job = %job.id, status = %job.status, attempt = attempts, "Polled Redash job");
    }

    match job.status {
        JobStatus::Success => {
            let result_id = job.query_result_id.ok_or_else(|| {
                Error::Protocol(format!(
                    "job {} succeeded without a query result id",
                    job.id
                ))
            })?;
            info!(job = %job.id, result_id, attempts, "Redash job finished");
            api.query_result(result_id).await
        }
        JobStatus::Failure => Err(Error::Remote(
            job.error
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| format!("job {} failed", job.id)),
        )),
        JobStatus::Cancelled => Err(Error::Cancelled(format!("job {} was cancelled", job.id))),
        JobStatus::Pending | JobStatus::Started => Err(Error::Protocol(format!(
            "job {} stopped in non-terminal status {}",
            job.id, job.status
        ))),
    }
}
