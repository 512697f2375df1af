//! Redash adapter for toolport.
//!
//! Manages queries, visualizations and dashboards, and executes queries.
//! Executions that are not served from cache run as jobs, which are polled
//! at a fixed interval until they finish or the attempt budget runs out.

mod client;
mod config;
mod poller;
mod tools;
mod types;
mod visualization;

pub use client::{CreateQueryRequest, RedashClient};
pub use config::{PollSettings, RedashConfig};
pub use poller::{wait_for_result, JobApi};
pub use tools::register_tools;
pub use types::*;
pub use visualization::{classify, default_options, ColumnHints, ColumnKind};
