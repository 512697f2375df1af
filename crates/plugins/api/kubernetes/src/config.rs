//! Kubernetes adapter configuration.
//!
//! Outside a cluster the API server comes from `KUBE_API_SERVER`; inside a
//! pod the standard service environment and service-account files are used.

use std::path::{Path, PathBuf};

use toolport_core::{EnvSource, Error, Result, Secret};

pub const KUBE_API_SERVER: &str = "KUBE_API_SERVER";
pub const KUBE_TOKEN: &str = "KUBE_TOKEN";
pub const KUBE_NAMESPACE: &str = "KUBE_NAMESPACE";
pub const KUBE_CA_CERT: &str = "KUBE_CA_CERT";
pub const KUBE_INSECURE_SKIP_TLS_VERIFY: &str = "KUBE_INSECURE_SKIP_TLS_VERIFY";
pub const KUBECTL_PATH: &str = "KUBECTL_PATH";
pub const KUBE_CONTEXT: &str = "KUBE_CONTEXT";

const SERVICE_HOST: &str = "KUBERNETES_SERVICE_HOST";
const SERVICE_PORT: &str = "KUBERNETES_SERVICE_PORT";

/// Mounted service-account credentials inside a pod.
const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Connection settings for the Kubernetes API.
#[derive(Debug, Clone)]
pub struct KubeConfig {
    pub api_server: String,
    pub token: Option<Secret>,
    /// Namespace used when a tool call does not name one
    pub namespace: String,
    /// PEM bundle trusted in addition to the system roots
    pub ca_cert: Option<PathBuf>,
    pub insecure_skip_tls_verify: bool,
    pub kubectl_path: String,
    pub context: Option<String>,
}

impl KubeConfig {
    pub fn from_env(env: &EnvSource) -> Result<Self> {
        Self::from_env_with_account_dir(env, Path::new(SERVICE_ACCOUNT_DIR))
    }

    fn from_env_with_account_dir(env: &EnvSource, account_dir: &Path) -> Result<Self> {
        let in_cluster = match (env.get(SERVICE_HOST), env.get(SERVICE_PORT)) {
            (Some(host), Some(port)) => Some(in_cluster_url(host, port)),
            _ => None,
        };

        let api_server = match (env.get(KUBE_API_SERVER), &in_cluster) {
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, Some(url)) => url.clone(),
            (None, None) => return Err(Error::MissingEnv(vec![KUBE_API_SERVER.to_string()])),
        };

        let token = match env.get(KUBE_TOKEN) {
            Some(token) => Some(Secret::new(token)),
            None => read_account_file(account_dir, "token")?.map(Secret::new),
        };

        let ca_cert = match env.get(KUBE_CA_CERT) {
            Some(path) => Some(PathBuf::from(path)),
            None if in_cluster.is_some() => {
                let path = account_dir.join("ca.crt");
                path.exists().then_some(path)
            }
            None => None,
        };

        let namespace = match env.get(KUBE_NAMESPACE) {
            Some(ns) => ns.to_string(),
            None => read_account_file(account_dir, "namespace")?
                .unwrap_or_else(|| "default".to_string()),
        };

        Ok(Self {
            api_server,
            token,
            namespace,
            ca_cert,
            insecure_skip_tls_verify: env.flag(KUBE_INSECURE_SKIP_TLS_VERIFY),
            kubectl_path: env.get_or(KUBECTL_PATH, "kubectl"),
            context: env.get(KUBE_CONTEXT).map(String::from),
        })
    }
}

fn in_cluster_url(host: &str, port: &str) -> String {
    // IPv6 service hosts need brackets
    if host.contains(':') {
        format!("https://[{}]:{}", host, port)
    } else {
        format!("https://{}:{}", host, port)
    }
}

fn read_account_file(dir: &Path, name: &str) -> Result<Option<String>> {
    let path = dir.join(name);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)?;
    let content = content.trim();
    Ok((!content.is_empty()).then(|| content.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn empty_dir() -> TempDir {
        TempDir::new().unwrap()
    }

    #[test]
    fn test_explicit_server() {
        let dir = empty_dir();
        let env = EnvSource::from_pairs([
            (KUBE_API_SERVER, "https://k8s.example.com:6443/"),
            (KUBE_TOKEN, "abc"),
            (KUBE_NAMESPACE, "apps"),
        ]);
        let config = KubeConfig::from_env_with_account_dir(&env, dir.path()).unwrap();

        assert_eq!(config.api_server, "https://k8s.example.com:6443");
        assert_eq!(config.token.unwrap().expose(), "abc");
        assert_eq!(config.namespace, "apps");
        assert_eq!(config.kubectl_path, "kubectl");
        assert!(!config.insecure_skip_tls_verify);
        assert!(config.ca_cert.is_none());
    }

    #[test]
    fn test_in_cluster_defaults() {
        let dir = empty_dir();
        std::fs::write(dir.path().join("token"), "sa-token\n").unwrap();
        std::fs::write(dir.path().join("namespace"), "monitoring").unwrap();
        std::fs::write(dir.path().join("ca.crt"), "pem").unwrap();

        let env = EnvSource::from_pairs([(SERVICE_HOST, "10.0.0.1"), (SERVICE_PORT, "443")]);
        let config = KubeConfig::from_env_with_account_dir(&env, dir.path()).unwrap();

        assert_eq!(config.api_server, "https://10.0.0.1:443");
        assert_eq!(config.token.unwrap().expose(), "sa-token");
        assert_eq!(config.namespace, "monitoring");
        assert_eq!(config.ca_cert, Some(dir.path().join("ca.crt")));
    }

    #[test]
    fn test_ipv6_service_host() {
        assert_eq!(in_cluster_url("fd00::1", "443"), "https://[fd00::1]:443");
    }

    #[test]
    fn test_missing_server() {
        let dir = empty_dir();
        let env = EnvSource::from_pairs([(KUBE_TOKEN, "abc")]);
        let err = KubeConfig::from_env_with_account_dir(&env, dir.path()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required environment variables: KUBE_API_SERVER"
        );
    }

    #[test]
    fn test_default_namespace() {
        let dir = empty_dir();
        let env = EnvSource::from_pairs([
            (KUBE_API_SERVER, "https://k8s"),
            (KUBE_INSECURE_SKIP_TLS_VERIFY, "true"),
        ]);
        let config = KubeConfig::from_env_with_account_dir(&env, dir.path()).unwrap();
        assert_eq!(config.namespace, "default");
        assert!(config.token.is_none());
        assert!(config.insecure_skip_tls_verify);
    }
}
