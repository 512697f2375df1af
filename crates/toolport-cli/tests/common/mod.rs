//! Helpers for driving a configured server over an in-memory transport.

use serde_json::{json, Value};
use tokio::io::BufReader;
use toolport_cli::{build_server, Adapter};
use toolport_core::EnvSource;
use toolport_mcp::StdioTransport;

/// Handshake followed by one `tools/call` per entry.
pub fn session(calls: &[(&str, Value)]) -> String {
    let mut frames = vec![
        json!({
            "jsonrpc": "2.0",
            "id": 0,
            "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "scenario", "version": "1.0.0"}
            }
        }),
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
    ];
    for (index, (name, arguments)) in calls.iter().enumerate() {
        frames.push(json!({
            "jsonrpc": "2.0",
            "id": index + 1,
            "method": "tools/call",
            "params": {"name": name, "arguments": arguments}
        }));
    }
    frames
        .iter()
        .map(|f| format!("{}\n", f))
        .collect()
}

/// Serve a whole session until EOF and return the `tools/call` results in
/// request order.
pub async fn run_session<I, K, V>(adapter: Adapter, env: I, calls: &[(&str, Value)]) -> Vec<Value>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let env = EnvSource::from_pairs(env);
    let mut server = build_server(adapter, &env).await.expect("adapter configures");

    let input = session(calls);
    let mut transport = StdioTransport::new(BufReader::new(input.as_bytes()), Vec::new());
    server
        .serve(&mut transport, std::future::pending::<()>())
        .await
        .expect("server runs to EOF");

    let output = String::from_utf8(transport.into_writer()).expect("utf-8 output");
    let responses: Vec<Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).expect("one JSON frame per line"))
        .collect();

    // First response answers `initialize`; notifications get none
    assert_eq!(responses[0]["id"], 0);
    assert_eq!(responses.len(), calls.len() + 1);
    responses[1..]
        .iter()
        .map(|r| r["result"].clone())
        .collect()
}

/// Summary line of a call result.
pub fn summary(result: &Value) -> &str {
    result["content"][0]["text"].as_str().unwrap_or_default()
}

/// Parsed JSON payload of a successful call result.
pub fn payload(result: &Value) -> Value {
    let text = result["content"][1]["text"]
        .as_str()
        .expect("success envelope has a payload part");
    serde_json::from_str(text).expect("payload is JSON")
}

pub fn is_error(result: &Value) -> bool {
    result["isError"].as_bool().unwrap_or(false)
}
