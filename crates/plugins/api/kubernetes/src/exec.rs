//! Command execution inside containers via `kubectl exec`.

use std::io::Write;
use std::path::Path;
use std::process::Stdio;

use serde_json::{json, Map, Value};
use tempfile::NamedTempFile;
use tokio::process::Command;
use toolport_core::{Error, Result};
use tracing::{debug, warn};

use crate::config::KubeConfig;
use crate::types::ExecOutput;

/// Command to run in a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecCommand {
    /// Run through `sh -c`
    Shell(String),
    /// Run as-is
    Argv(Vec<String>),
}

impl ExecCommand {
    /// Accepts a string (shell) or an array of strings (argv).
    pub fn from_value(value: &Value) -> Result<Self> {
        let command = match value {
            Value::String(s) => ExecCommand::Shell(s.clone()),
            Value::Array(items) => ExecCommand::Argv(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => Ok(s.clone()),
                        Value::Number(n) => Ok(n.to_string()),
                        _ => Err(Error::validation(
                            "command",
                            "array elements must be strings",
                        )),
                    })
                    .collect::<Result<_>>()?,
            ),
            _ => {
                return Err(Error::validation(
                    "command",
                    "expected a string or an array of strings",
                ))
            }
        };

        if command.argv().iter().all(|arg| arg.trim().is_empty()) {
            return Err(Error::validation("command", "must not be empty"));
        }
        Ok(command)
    }

    pub fn argv(&self) -> Vec<String> {
        match self {
            ExecCommand::Shell(script) => {
                vec!["sh".to_string(), "-c".to_string(), script.clone()]
            }
            ExecCommand::Argv(args) => args.clone(),
        }
    }
}

/// Where to run the command.
#[derive(Debug, Clone)]
pub struct ExecTarget<'a> {
    pub namespace: &'a str,
    pub pod: &'a str,
    pub container: Option<&'a str>,
}

/// Name of the cluster, user and context in a generated kubeconfig.
const GENERATED_NAME: &str = "toolport";

/// `kubectl` invocation carrying the cluster connection settings.
///
/// With a bearer token the connection goes into a private kubeconfig file
/// written for each call, so the token never shows up in the process
/// arguments. Without one, kubectl's own configuration is used and only
/// non-secret flags are passed.
pub struct Kubectl {
    program: String,
    global_args: Vec<String>,
    kubeconfig: Option<Value>,
}

impl Kubectl {
    pub fn new(config: &KubeConfig) -> Self {
        let mut global_args = Vec::new();
        let kubeconfig = match &config.token {
            Some(token) => Some(kubeconfig_document(config, token.expose())),
            None => {
                if let Some(context) = &config.context {
                    global_args.push(format!("--context={}", context));
                }
                global_args.push(format!("--server={}", config.api_server));
                if let Some(ca) = &config.ca_cert {
                    global_args.push(format!("--certificate-authority={}", ca.display()));
                }
                if config.insecure_skip_tls_verify {
                    global_args.push("--insecure-skip-tls-verify=true".to_string());
                }
                None
            }
        };

        Self {
            program: config.kubectl_path.clone(),
            global_args,
            kubeconfig,
        }
    }

    /// Write the connection settings to a file readable only by the owner.
    /// The file is removed when the returned handle drops.
    fn write_kubeconfig(&self) -> Result<Option<NamedTempFile>> {
        let Some(document) = &self.kubeconfig else {
            return Ok(None);
        };
        let mut file = tempfile::Builder::new()
            .prefix("toolport-kubeconfig-")
            .tempfile()
            .map_err(|e| Error::Config(format!("cannot create kubeconfig: {}", e)))?;
        serde_json::to_writer(file.as_file_mut(), document)?;
        file.as_file_mut()
            .flush()
            .map_err(|e| Error::Config(format!("cannot write kubeconfig: {}", e)))?;
        Ok(Some(file))
    }

    fn exec_args(
        &self,
        kubeconfig: Option<&Path>,
        target: &ExecTarget<'_>,
        command: &ExecCommand,
    ) -> Vec<String> {
        let mut args = self.global_args.clone();
        if let Some(path) = kubeconfig {
            args.push(format!("--kubeconfig={}", path.display()));
        }
        args.extend([
            "exec".to_string(),
            "-n".to_string(),
            target.namespace.to_string(),
            target.pod.to_string(),
        ]);
        if let Some(container) = target.container {
            args.push("-c".to_string());
            args.push(container.to_string());
        }
        args.push("--".to_string());
        args.extend(command.argv());
        args
    }

    /// Run `command` in the target container and wait for it to exit.
    ///
    /// A non-zero exit becomes [`Error::Command`] with the captured stderr.
    pub async fn exec(&self, target: &ExecTarget<'_>, command: &ExecCommand) -> Result<ExecOutput> {
        debug!(
            pod = target.pod,
            namespace = target.namespace,
            command = ?command.argv(),
            "kubectl exec"
        );

        let kubeconfig = self.write_kubeconfig()?;
        let args = self.exec_args(kubeconfig.as_ref().map(NamedTempFile::path), target, command);
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::Config(format!("failed to run {}: {}", self.program, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            warn!(
                pod = target.pod,
                code = ?output.status.code(),
                "kubectl exec failed"
            );
            return Err(Error::Command {
                code: output.status.code(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(ExecOutput {
            pod: target.pod.to_string(),
            namespace: target.namespace.to_string(),
            container: target.container.map(String::from),
            command: command.argv(),
            exit_code: output.status.code().unwrap_or(0),
            stdout,
            stderr,
        })
    }
}

/// Kubeconfig (JSON is valid YAML) with a single cluster, user and context.
fn kubeconfig_document(config: &KubeConfig, token: &str) -> Value {
    let mut cluster = Map::new();
    cluster.insert("server".to_string(), json!(config.api_server));
    if let Some(ca) = &config.ca_cert {
        cluster.insert(
            "certificate-authority".to_string(),
            json!(ca.display().to_string()),
        );
    }
    if config.insecure_skip_tls_verify {
        cluster.insert("insecure-skip-tls-verify".to_string(), json!(true));
    }
    let context = config.context.as_deref().unwrap_or(GENERATED_NAME);

    json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{"name": GENERATED_NAME, "cluster": cluster}],
        "users": [{"name": GENERATED_NAME, "user": {"token": token}}],
        "contexts": [{
            "name": context,
            "context": {"cluster": GENERATED_NAME, "user": GENERATED_NAME},
        }],
        "current-context": context,
    })
}
