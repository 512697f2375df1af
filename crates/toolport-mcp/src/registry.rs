//! Tool registry.
//!
//! One registry is built per process at startup, filled by the adapter's
//! `register_tools` function and then handed to the server. Names are unique
//! and case-sensitive; registering a name twice is a startup error.

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use toolport_core::{Error, Result};

use crate::envelope::{self, ToolOutput};
use crate::protocol::{ToolCallResult, ToolDefinition};
use crate::schema::{ParamSchema, Params};

/// Asynchronous tool handler.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, params: Params) -> Result<ToolOutput>;
}

#[async_trait]
impl<F, Fut> ToolHandler for F
where
    F: Fn(Params) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ToolOutput>> + Send,
{
    async fn call(&self, params: Params) -> Result<ToolOutput> {
        (self)(params).await
    }
}

/// Handler bound to shared adapter state (a client or backend) that takes
/// its arguments as a typed parameter struct `A`.
struct StatefulHandler<S: ?Sized, F, A> {
    state: Arc<S>,
    func: F,
    args: PhantomData<fn() -> A>,
}

#[async_trait]
impl<S, F, A, Fut> ToolHandler for StatefulHandler<S, F, A>
where
    S: ?Sized + Send + Sync,
    F: Fn(Arc<S>, A) -> Fut + Send + Sync,
    A: DeserializeOwned + Send,
    Fut: Future<Output = Result<ToolOutput>> + Send,
{
    async fn call(&self, params: Params) -> Result<ToolOutput> {
        let args = params.parse::<A>()?;
        (self.func)(Arc::clone(&self.state), args).await
    }
}

struct ToolEntry {
    name: String,
    description: String,
    schema: ParamSchema,
    handler: Arc<dyn ToolHandler>,
}

/// Registration table mapping tool names to schemas and handlers.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<ToolEntry>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool.
    pub fn register<H>(
        &mut self,
        name: &str,
        description: &str,
        schema: ParamSchema,
        handler: H,
    ) -> Result<()>
    where
        H: ToolHandler + 'static,
    {
        if name.trim().is_empty() {
            return Err(Error::Config("tool name must not be empty".to_string()));
        }
        if self.index.contains_key(name) {
            return Err(Error::DuplicateTool(name.to_string()));
        }

        self.index.insert(name.to_string(), self.tools.len());
        self.tools.push(ToolEntry {
            name: name.to_string(),
            description: description.to_string(),
            schema,
            handler: Arc::new(handler),
        });
        Ok(())
    }

    /// Register a tool whose handler receives shared adapter state and its
    /// arguments deserialized into a parameter struct.
    ///
    /// ```ignore
    /// #[derive(Deserialize)]
    /// struct GetIssueParams {
    ///     issue_key: String,
    /// }
    ///
    /// registry.register_with(&client, "get_issue", "Get a Jira issue", schema, get_issue)?;
    ///
    /// async fn get_issue(client: Arc<JiraClient>, params: GetIssueParams) -> Result<ToolOutput> { .. }
    /// ```
    pub fn register_with<S, F, A, Fut>(
        &mut self,
        state: &Arc<S>,
        name: &str,
        description: &str,
        schema: ParamSchema,
        func: F,
    ) -> Result<()>
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<S>, A) -> Fut + Send + Sync + 'static,
        A: DeserializeOwned + Send + 'static,
        Fut: Future<Output = Result<ToolOutput>> + Send + 'static,
    {
        self.register(
            name,
            description,
            schema,
            StatefulHandler {
                state: Arc::clone(state),
                func,
                args: PhantomData,
            },
        )
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    /// Tool definitions for `tools/list`, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.schema.to_json_schema(),
            })
            .collect()
    }

    /// Dispatch a call by name. Always produces an envelope.
    pub async fn dispatch(&self, name: &str, arguments: Option<Value>) -> ToolCallResult {
        let Some(entry) = self.index.get(name).map(|&i| &self.tools[i]) else {
            tracing::warn!(tool = name, "Unknown tool requested");
            return envelope::failure(&Error::UnknownTool(name.to_string()));
        };

        let params = match entry.schema.coerce(arguments) {
            Ok(params) => params,
            Err(e) => {
                tracing::warn!(tool = name, error = %e, "Rejected tool arguments");
                return envelope::failure(&e);
            }
        };

        let result = entry.handler.call(params).await;
        if let Err(e) = &result {
            tracing::warn!(tool = name, error = ?e, "Tool call failed");
        }
        envelope::from_result(result, &format!("{} completed", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ParamType;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        calls: AtomicUsize,
    }

    #[derive(serde::Deserialize)]
    struct CountParams {
        label: Option<String>,
        step: u64,
    }

    async fn count(counter: Arc<Counter>, params: CountParams) -> Result<ToolOutput> {
        let n = counter.calls.fetch_add(params.step as usize, Ordering::SeqCst) + params.step as usize;
        ToolOutput::new(
            format!("Called {} times", n),
            json!({"calls": n, "label": params.label}),
        )
    }

    async fn echo(params: Params) -> Result<ToolOutput> {
        let text = params.str("text")?;
        ToolOutput::new(format!("Echoed {} chars", text.len()), json!({"text": text}))
    }

    async fn fail(_params: Params) -> Result<ToolOutput> {
        Err(Error::from_status(502, "bad gateway").context("fetching upstream"))
    }

    fn registry() -> (ToolRegistry, Arc<Counter>) {
        let counter = Arc::new(Counter {
            calls: AtomicUsize::new(0),
        });
        let mut registry = ToolRegistry::new();
        registry
            .register(
                "echo",
                "Echo text back",
                ParamSchema::new().required("text", ParamType::String, "Text"),
                echo,
            )
            .unwrap();
        registry
            .register_with(
                &counter,
                "count",
                "Count calls",
                ParamSchema::new()
                    .optional("label", ParamType::String, "Label")
                    .with_default("step", ParamType::Integer, "Increment", 1),
                count,
            )
            .unwrap();
        registry
            .register("fail", "Always fails", ParamSchema::new(), fail)
            .unwrap();
        (registry, counter)
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let (mut registry, _) = registry();
        let err = registry
            .register("echo", "again", ParamSchema::new(), echo)
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateTool(ref n) if n == "echo"));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let (mut registry, _) = registry();
        assert!(registry
            .register("Echo", "capitalised", ParamSchema::new(), echo)
            .is_ok());
        assert!(registry.contains("Echo"));
        assert!(registry.contains("echo"));
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut registry = ToolRegistry::new();
        assert!(registry
            .register(" ", "blank", ParamSchema::new(), echo)
            .is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_definitions_in_registration_order() {
        let (registry, _) = registry();
        let defs = registry.definitions();
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["echo", "count", "fail"]);
        assert_eq!(registry.names(), names);
        assert_eq!(defs[0].input_schema["required"], json!(["text"]));
    }

    #[tokio::test]
    async fn test_dispatch_success() {
        let (registry, _) = registry();
        let result = registry.dispatch("echo", Some(json!({"text": "hello"}))).await;

        assert!(!result.is_error());
        assert_eq!(result.first_text(), Some("Echoed 5 chars"));
        let payload: Value = serde_json::from_str(result.content[1].text()).unwrap();
        assert_eq!(payload["text"], "hello");
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool() {
        let (registry, counter) = registry();
        let result = registry.dispatch("nope", None).await;

        assert!(result.is_error());
        assert_eq!(result.first_text(), Some("Error: Unknown tool: nope"));
        assert_eq!(counter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dispatch_validation_failure_skips_handler() {
        let (registry, _) = registry();
        let result = registry.dispatch("echo", Some(json!({}))).await;

        assert!(result.is_error());
        assert_eq!(
            result.first_text(),
            Some("Error: Invalid parameter 'text': is required")
        );
    }

    #[tokio::test]
    async fn test_dispatch_handler_error() {
        let (registry, _) = registry();
        let result = registry.dispatch("fail", None).await;

        assert!(result.is_error());
        assert_eq!(
            result.first_text(),
            Some("Error fetching upstream: API error: 502 - bad gateway")
        );
    }

    #[tokio::test]
    async fn test_stateful_handler_shares_state() {
        let (registry, counter) = registry();
        registry.dispatch("count", None).await;
        let result = registry
            .dispatch("count", Some(json!({"label": "second"})))
            .await;

        assert_eq!(result.first_text(), Some("Called 2 times"));
        assert_eq!(counter.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_typed_params_reject_values_the_struct_cannot_hold() {
        let (registry, counter) = registry();
        let result = registry.dispatch("count", Some(json!({"step": -1}))).await;

        assert!(result.is_error());
        assert!(result
            .first_text()
            .unwrap()
            .starts_with("Error: Invalid parameter 'arguments': invalid value: integer `-1`"));
        assert_eq!(counter.calls.load(Ordering::SeqCst), 0);
    }
}
