//! Kubernetes adapter for toolport.
//!
//! Lists, finds, deletes and inspects pods through the Kubernetes REST API.
//! Commands inside containers run through a `kubectl exec` subprocess.

mod client;
mod config;
mod exec;
mod pattern;
mod tools;
mod types;

pub use client::{KubeClient, LogOptions, Scope};
pub use config::KubeConfig;
pub use exec::{ExecCommand, ExecTarget, Kubectl};
pub use pattern::NamePattern;
pub use tools::{register_tools, KubeContext};
pub use types::*;
