//! Response envelope.
//!
//! Every tool call answers with the same shape: on success a one-line
//! summary followed by the payload as pretty-printed JSON text, on failure a
//! single `Error…` line with `isError: true`.

use serde::Serialize;
use serde_json::Value;
use toolport_core::{Error, Result};

use crate::protocol::ToolCallResult;

/// Successful handler output.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub summary: String,
    pub payload: Value,
}

impl ToolOutput {
    /// Build an output from a summary line and any serializable payload.
    pub fn new(summary: impl Into<String>, payload: impl Serialize) -> Result<Self> {
        Ok(Self {
            summary: summary.into(),
            payload: serde_json::to_value(payload)?,
        })
    }
}

/// Convert a handler output into a success envelope.
///
/// `fallback_summary` is used when the handler produced a blank summary so
/// the first part is never empty.
pub fn success(output: ToolOutput, fallback_summary: &str) -> ToolCallResult {
    let summary = output
        .summary
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let summary = if summary.is_empty() {
        fallback_summary.to_string()
    } else {
        summary
    };

    match serde_json::to_string_pretty(&output.payload) {
        Ok(json) => ToolCallResult::parts([summary, json]),
        Err(e) => failure(&Error::Serialization(e)),
    }
}

/// Convert an error into an error envelope.
pub fn failure(error: &Error) -> ToolCallResult {
    ToolCallResult::error(error.user_message())
}

/// Convert any handler result into an envelope.
pub fn from_result(result: Result<ToolOutput>, fallback_summary: &str) -> ToolCallResult {
    match result {
        Ok(output) => success(output, fallback_summary),
        Err(e) => failure(&e),
    }
}
