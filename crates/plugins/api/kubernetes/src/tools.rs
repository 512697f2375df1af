//! Kubernetes tool handlers.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use toolport_core::{Result, ResultExt};
use toolport_mcp::{ParamSchema, ParamType, ToolOutput, ToolRegistry};

use crate::client::{KubeClient, LogOptions, Scope};
use crate::config::KubeConfig;
use crate::exec::{ExecCommand, ExecTarget, Kubectl};
use crate::pattern::NamePattern;
use crate::types::PodSummary;

/// Everything the pod tools need: REST client, kubectl and default namespace.
pub struct KubeContext {
    client: KubeClient,
    kubectl: Kubectl,
    default_namespace: String,
}

impl KubeContext {
    pub fn new(config: &KubeConfig) -> Result<Self> {
        Ok(Self::from_parts(
            KubeClient::new(config)?,
            Kubectl::new(config),
            &config.namespace,
        ))
    }

    pub fn from_parts(client: KubeClient, kubectl: Kubectl, default_namespace: &str) -> Self {
        Self {
            client,
            kubectl,
            default_namespace: default_namespace.to_string(),
        }
    }

    fn namespace<'a>(&'a self, requested: &'a Option<String>) -> &'a str {
        requested.as_deref().unwrap_or(&self.default_namespace)
    }

    fn scope<'a>(&'a self, requested: &'a Option<String>, all_namespaces: bool) -> Scope<'a> {
        if all_namespaces {
            Scope::AllNamespaces
        } else {
            Scope::Namespace(self.namespace(requested))
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListPodsParams {
    namespace: Option<String>,
    all_namespaces: bool,
    label_selector: Option<String>,
    field_selector: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FindPodsParams {
    pattern: String,
    namespace: Option<String>,
    all_namespaces: bool,
}

#[derive(Debug, Deserialize)]
struct DeletePodParams {
    pod_name: String,
    namespace: Option<String>,
    grace_period_seconds: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ExecParams {
    pod_name: String,
    namespace: Option<String>,
    command: Value,
    container: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PodLogsParams {
    pod_name: String,
    namespace: Option<String>,
    container: Option<String>,
    tail_lines: Option<u64>,
    previous: bool,
}

fn describe(scope: Scope<'_>) -> String {
    match scope {
        Scope::Namespace(ns) => format!("namespace {}", ns),
        Scope::AllNamespaces => "all namespaces".to_string(),
    }
}

fn namespace_field(schema: ParamSchema) -> ParamSchema {
    schema.optional(
        "namespace",
        ParamType::String,
        "Namespace; defaults to the configured namespace",
    )
}

fn all_namespaces_field(schema: ParamSchema) -> ParamSchema {
    schema.with_default(
        "all_namespaces",
        ParamType::Boolean,
        "Search every namespace",
        false,
    )
}

/// Register every Kubernetes tool.
pub fn register_tools(registry: &mut ToolRegistry, context: Arc<KubeContext>) -> Result<()> {
    registry.register_with(
        &context,
        "list_pods",
        "List pods in a namespace or across the cluster",
        all_namespaces_field(namespace_field(ParamSchema::new()))
            .optional(
                "label_selector",
                ParamType::String,
                "Label selector, e.g. app=nginx",
            )
            .optional(
                "field_selector",
                ParamType::String,
                "Field selector, e.g. status.phase=Running",
            ),
        list_pods,
    )?;
    registry.register_with(
        &context,
        "find_pods_by_name",
        "Find pods whose name matches a pattern where * matches any sequence",
        all_namespaces_field(namespace_field(ParamSchema::new().required(
            "pattern",
            ParamType::String,
            "Name pattern, e.g. nginx*",
        ))),
        find_pods_by_name,
    )?;
    registry.register_with(
        &context,
        "delete_pod",
        "Delete a pod",
        namespace_field(ParamSchema::new().required("pod_name", ParamType::String, "Pod name"))
            .optional(
                "grace_period_seconds",
                ParamType::Integer,
                "Termination grace period; 0 deletes immediately",
            )
            .at_least(0),
        delete_pod,
    )?;
    registry.register_with(
        &context,
        "exec_in_pod",
        "Run a command in a pod container. A string runs through sh -c, an array runs as argv",
        namespace_field(
            ParamSchema::new()
                .required("pod_name", ParamType::String, "Pod name")
                .required("command", ParamType::Any, "Command string or argv array"),
        )
        .optional(
            "container",
            ParamType::String,
            "Container name; defaults to the pod's default container",
        ),
        exec_in_pod,
    )?;
    registry.register_with(
        &context,
        "get_pod_logs",
        "Fetch logs of a pod container",
        namespace_field(ParamSchema::new().required("pod_name", ParamType::String, "Pod name"))
            .optional("container", ParamType::String, "Container name")
            .optional("tail_lines", ParamType::Integer, "Only return the last N lines")
            .at_least(0)
            .with_default(
                "previous",
                ParamType::Boolean,
                "Logs of the previous, terminated container instance",
                false,
            ),
        get_pod_logs,
    )?;
    Ok(())
}

async fn list_pods(context: Arc<KubeContext>, params: ListPodsParams) -> Result<ToolOutput> {
    let scope = context.scope(&params.namespace, params.all_namespaces);
    let pods = context
        .client
        .list_pods(
            scope,
            params.label_selector.as_deref(),
            params.field_selector.as_deref(),
        )
        .await
        .with_context(|| format!("listing pods in {}", describe(scope)))?;

    let pods: Vec<PodSummary> = pods.into_iter().map(PodSummary::from).collect();
    ToolOutput::new(
        format!("Found {} pods in {}", pods.len(), describe(scope)),
        pods,
    )
}

async fn find_pods_by_name(context: Arc<KubeContext>, params: FindPodsParams) -> Result<ToolOutput> {
    let pattern = NamePattern::new(&params.pattern)?;
    let scope = context.scope(&params.namespace, params.all_namespaces);
    let pods = context
        .client
        .list_pods(scope, None, None)
        .await
        .with_context(|| format!("finding pods matching {}", pattern.as_str()))?;

    let matches: Vec<PodSummary> = pods
        .into_iter()
        .filter(|pod| pattern.matches(&pod.metadata.name))
        .map(PodSummary::from)
        .collect();
    ToolOutput::new(
        format!(
            "Found {} pods matching '{}' in {}",
            matches.len(),
            pattern.as_str(),
            describe(scope)
        ),
        matches,
    )
}

async fn delete_pod(context: Arc<KubeContext>, params: DeletePodParams) -> Result<ToolOutput> {
    let name = params.pod_name.as_str();
    let namespace = context.namespace(&params.namespace);

    let pod = context
        .client
        .delete_pod(namespace, name, params.grace_period_seconds)
        .await
        .with_context(|| format!("deleting pod {}/{}", namespace, name))?;
    ToolOutput::new(
        format!("Deleted pod {}/{}", namespace, name),
        PodSummary::from(pod),
    )
}

async fn exec_in_pod(context: Arc<KubeContext>, params: ExecParams) -> Result<ToolOutput> {
    let name = params.pod_name.as_str();
    let command = ExecCommand::from_value(&params.command)?;
    let target = ExecTarget {
        namespace: context.namespace(&params.namespace),
        pod: name,
        container: params.container.as_deref(),
    };

    let output = context
        .kubectl
        .exec(&target, &command)
        .await
        .with_context(|| format!("executing command in pod {}/{}", target.namespace, name))?;
    ToolOutput::new(
        format!(
            "Command exited with code {} in pod {}/{}",
            output.exit_code, target.namespace, name
        ),
        output,
    )
}

async fn get_pod_logs(context: Arc<KubeContext>, params: PodLogsParams) -> Result<ToolOutput> {
    let name = params.pod_name.as_str();
    let namespace = context.namespace(&params.namespace);
    let options = LogOptions {
        container: params.container.as_deref(),
        tail_lines: params.tail_lines,
        previous: params.previous,
    };

    let logs = context
        .client
        .pod_logs(namespace, name, &options)
        .await
        .with_context(|| format!("fetching logs of pod {}/{}", namespace, name))?;

    let lines = logs.lines().count();
    ToolOutput::new(
        format!("Fetched {} log lines from pod {}/{}", lines, namespace, name),
        serde_json::json!({
            "pod": name,
            "namespace": namespace,
            "container": options.container,
            "previous": options.previous,
            "lines": lines,
            "logs": logs,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn registry(server: &MockServer) -> ToolRegistry {
        let config = KubeConfig {
            api_server: server.base_url(),
            token: None,
            namespace: "web".to_string(),
            ca_cert: None,
            insecure_skip_tls_verify: false,
            kubectl_path: "/nonexistent/kubectl".to_string(),
            context: None,
        };
        let context = KubeContext::new(&config).unwrap();
        let mut registry = ToolRegistry::new();
        register_tools(&mut registry, Arc::new(context)).unwrap();
        registry
    }

    fn pod_list(names: &[&str]) -> Value {
        let items: Vec<Value> = names
            .iter()
            .map(|n| json!({"metadata": {"name": n, "namespace": "web"}, "status": {"phase": "Running"}}))
            .collect();
        json!({"items": items})
    }

    #[tokio::test]
    async fn test_find_pods_by_name_wildcard() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/namespaces/web/pods");
            then.status(200)
                .json_body(pod_list(&["nginx-abc", "nginx", "my-nginx", "redis-0"]));
        });

        let result = registry(&server)
            .dispatch("find_pods_by_name", Some(json!({"pattern": "nginx*"})))
            .await;

        assert!(!result.is_error());
        assert_eq!(
            result.first_text(),
            Some("Found 2 pods matching 'nginx*' in namespace web")
        );
        let payload: Value = serde_json::from_str(result.content[1].text()).unwrap();
        let names: Vec<&str> = payload
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["nginx-abc", "nginx"]);
    }

    #[tokio::test]
    async fn test_list_pods_all_namespaces_ignores_namespace() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/v1/pods");
            then.status(200).json_body(pod_list(&["a"]));
        });

        let result = registry(&server)
            .dispatch(
                "list_pods",
                Some(json!({"namespace": "ignored", "all_namespaces": "true"})),
            )
            .await;

        mock.assert();
        assert_eq!(result.first_text(), Some("Found 1 pods in all namespaces"));
    }

    #[tokio::test]
    async fn test_get_pod_logs() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/v1/namespaces/jobs/pods/etl-1/log")
                .query_param("tailLines", "3");
            then.status(200).body("a\nb\nc\n");
        });

        let result = registry(&server)
            .dispatch(
                "get_pod_logs",
                Some(json!({"pod_name": "etl-1", "namespace": "jobs", "tail_lines": 3})),
            )
            .await;

        assert_eq!(
            result.first_text(),
            Some("Fetched 3 log lines from pod jobs/etl-1")
        );
        let payload: Value = serde_json::from_str(result.content[1].text()).unwrap();
        assert_eq!(payload["logs"], "a\nb\nc\n");
        assert_eq!(payload["previous"], false);
    }

    #[tokio::test]
    async fn test_delete_pod_error_envelope() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE).path("/api/v1/namespaces/web/pods/ghost");
            then.status(404)
                .json_body(json!({"message": "pods \"ghost\" not found"}));
        });

        let result = registry(&server)
            .dispatch("delete_pod", Some(json!({"pod_name": "ghost"})))
            .await;

        assert!(result.is_error());
        assert_eq!(
            result.first_text(),
            Some("Error deleting pod web/ghost: Not found: pods \"ghost\" not found")
        );
    }

    #[tokio::test]
    async fn test_exec_rejects_bad_command() {
        let server = MockServer::start();
        let result = registry(&server)
            .dispatch(
                "exec_in_pod",
                Some(json!({"pod_name": "nginx-1", "command": {"run": "ls"}})),
            )
            .await;

        assert!(result.is_error());
        assert_eq!(
            result.first_text(),
            Some("Error: Invalid parameter 'command': expected a string or an array of strings")
        );
    }

    #[tokio::test]
    async fn test_negative_grace_period() {
        let server = MockServer::start();
        let result = registry(&server)
            .dispatch(
                "delete_pod",
                Some(json!({"pod_name": "x", "grace_period_seconds": -1})),
            )
            .await;

        assert_eq!(
            result.first_text(),
            Some("Error: Invalid parameter 'grace_period_seconds': must be at least 0")
        );
    }
}
