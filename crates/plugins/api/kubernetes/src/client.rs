//! Kubernetes REST API client.
//!
//! Covers the pod endpoints of core/v1. Exec is handled separately by
//! [`crate::exec`] since it needs a streaming upgrade the REST client
//! does not speak.

use serde::de::DeserializeOwned;
use toolport_core::{endpoint, Error, Result};
use tracing::{debug, warn};

use crate::config::KubeConfig;
use crate::types::{ApiStatus, Pod, PodList};

/// Scope of a pod listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    Namespace(&'a str),
    AllNamespaces,
}

/// Options for `GET .../pods/{name}/log`.
#[derive(Debug, Clone, Default)]
pub struct LogOptions<'a> {
    pub container: Option<&'a str>,
    pub tail_lines: Option<u64>,
    pub previous: bool,
}

/// Kubernetes API client.
pub struct KubeClient {
    api_server: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl KubeClient {
    /// Create a client from configuration, trusting the configured CA bundle.
    pub fn new(config: &KubeConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent("toolport");

        if let Some(path) = &config.ca_cert {
            let pem = std::fs::read(path).map_err(|e| {
                Error::Config(format!("cannot read CA bundle {}: {}", path.display(), e))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| Error::Config(format!("invalid CA bundle: {}", e)))?;
            builder = builder.add_root_certificate(cert);
        }
        if config.insecure_skip_tls_verify {
            warn!("TLS verification disabled for the Kubernetes API");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            api_server: config.api_server.trim_end_matches('/').to_string(),
            token: config.token.as_ref().map(|t| t.expose().to_string()),
            client,
        })
    }

    /// Create a plain client against `api_server`.
    pub fn with_base_url(api_server: &str, token: Option<&str>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("toolport")
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            api_server: api_server.trim_end_matches('/').to_string(),
            token: token.map(String::from),
            client,
        })
    }

    fn request(&self, method: reqwest::Method, url: reqwest::Url) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(
        &self,
        method: reqwest::Method,
        path: &[&str],
        query: &[(&str, String)],
    ) -> Result<reqwest::Response> {
        let url = endpoint(&self.api_server, path)?;
        debug!(method = %method, url = %url, params = ?query, "Kubernetes request");

        let response = self
            .request(method, url)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        check_status(response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &[&str], query: &[(&str, String)]) -> Result<T> {
        let response = self.send(reqwest::Method::GET, path, query).await?;
        parse_json(response).await
    }

    // =========================================================================
    // Pods
    // =========================================================================

    pub async fn list_pods(
        &self,
        scope: Scope<'_>,
        label_selector: Option<&str>,
        field_selector: Option<&str>,
    ) -> Result<Vec<Pod>> {
        let path = match scope {
            Scope::Namespace(ns) => vec!["api", "v1", "namespaces", ns, "pods"],
            Scope::AllNamespaces => vec!["api", "v1", "pods"],
        };

        let mut query = Vec::new();
        if let Some(selector) = label_selector {
            query.push(("labelSelector", selector.to_string()));
        }
        if let Some(selector) = field_selector {
            query.push(("fieldSelector", selector.to_string()));
        }

        let list: PodList = self.get(&path, &query).await?;
        Ok(list.items)
    }

    /// Delete a pod. The API answers with the pod as it is being terminated.
    pub async fn delete_pod(
        &self,
        namespace: &str,
        name: &str,
        grace_period_seconds: Option<u64>,
    ) -> Result<Pod> {
        let mut query = Vec::new();
        if let Some(seconds) = grace_period_seconds {
            query.push(("gracePeriodSeconds", seconds.to_string()));
        }

        let response = self
            .send(
                reqwest::Method::DELETE,
                &["api", "v1", "namespaces", namespace, "pods", name],
                &query,
            )
            .await?;
        parse_json(response).await
    }

    /// Fetch container logs as plain text.
    pub async fn pod_logs(
        &self,
        namespace: &str,
        name: &str,
        options: &LogOptions<'_>,
    ) -> Result<String> {
        let mut query = Vec::new();
        if let Some(container) = options.container {
            query.push(("container", container.to_string()));
        }
        if let Some(lines) = options.tail_lines {
            query.push(("tailLines", lines.to_string()));
        }
        if options.previous {
            query.push(("previous", "true".to_string()));
        }

        let response = self
            .send(
                reqwest::Method::GET,
                &["api", "v1", "namespaces", namespace, "pods", name, "log"],
                &query,
            )
            .await?;

        response
            .text()
            .await
            .map_err(|e| Error::Http(format!("Failed to read log stream: {}", e)))
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
        "Kubernetes API error response"
    );
    Err(Error::from_status(status_code, message))
}

async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| Error::InvalidData(format!("Failed to parse response: {}", e)))
}

/// Failed calls return a `Status` object whose `message` is the useful part.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ApiStatus>(body)
        .ok()
        .and_then(|s| s.message)
        .unwrap_or_else(|| body.to_string())
}
