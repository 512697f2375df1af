//! MCP (Model Context Protocol) server framework for toolport.
//!
//! Every adapter exposes its operations as tools registered in a
//! [`ToolRegistry`]; the [`McpServer`] reads newline-delimited JSON-RPC
//! frames from stdin, dispatches `tools/call` requests through the registry
//! and writes exactly one response per request to stdout.

pub mod envelope;
pub mod protocol;
pub mod registry;
pub mod schema;
pub mod server;
pub mod transport;

pub use envelope::ToolOutput;
pub use protocol::{ToolCallResult, ToolDefinition, ToolResultContent};
pub use registry::{ToolHandler, ToolRegistry};
pub use schema::{ParamSchema, ParamType, Params};
pub use server::{McpServer, ShutdownHook};
pub use transport::StdioTransport;
