//! MCP stdio handshake and tool discovery
//!
//! Speaks newline-delimited JSON-RPC 2.0 to a freshly spawned server:
//! `initialize`, the `notifications/initialized` notification, then
//! `tools/list`. `resources/list` and `prompts/list` are optional; servers
//! that do not implement them report zero.

use std::time::{Duration, Instant};

use e14z_errors::{Error, ExecError};
use e14z_types::ToolInfo;
use serde_json::{json, Value};

use crate::ChildSession;

/// MCP protocol revision offered during `initialize`
pub const PROTOCOL_VERSION: &str = "2024-11-05";

const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(15);

/// What a server told us about itself
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeReport {
    pub protocol_version: Option<String>,
    pub server_name: Option<String>,
    pub server_version: Option<String>,
    pub tools: Vec<ToolInfo>,
    pub resources_count: usize,
    pub prompts_count: usize,
}

#[derive(Debug, Clone)]
pub struct McpProbe {
    client_name: String,
    client_version: String,
    response_timeout: Duration,
}

impl Default for McpProbe {
    fn default() -> Self {
        Self {
            client_name: "e14z".to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }
}

impl McpProbe {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deadline for each individual response
    #[must_use]
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Run the handshake and list the server's capabilities
    ///
    /// # Errors
    ///
    /// Fails with [`ExecError::ProtocolFailed`] if `initialize` or
    /// `tools/list` errors or the server closes stdout, and with a timeout
    /// if a response does not arrive in time.
    pub async fn probe(&self, session: &mut dyn ChildSession) -> Result<ProbeReport, Error> {
        let init = self
            .request(
                session,
                1,
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {
                        "roots": { "listChanged": true },
                        "sampling": {}
                    },
                    "clientInfo": {
                        "name": self.client_name,
                        "version": self.client_version
                    }
                }),
            )
            .await?;

        let mut report = ProbeReport {
            protocol_version: init
                .get("protocolVersion")
                .and_then(Value::as_str)
                .map(str::to_string),
            server_name: init
                .pointer("/serverInfo/name")
                .and_then(Value::as_str)
                .map(str::to_string),
            server_version: init
                .pointer("/serverInfo/version")
                .and_then(Value::as_str)
                .map(str::to_string),
            ..ProbeReport::default()
        };

        let notification = json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        });
        session.send_line(&notification.to_string()).await?;

        let tools = self.request(session, 2, "tools/list", json!({})).await?;
        report.tools = parse_tools(&tools);

        report.resources_count = self
            .optional_count(session, 3, "resources/list", "resources")
            .await?;
        report.prompts_count = self
            .optional_count(session, 4, "prompts/list", "prompts")
            .await?;

        tracing::debug!(
            server = ?report.server_name,
            tools = report.tools.len(),
            "MCP probe completed"
        );
        Ok(report)
    }

    async fn optional_count(
        &self,
        session: &mut dyn ChildSession,
        id: u64,
        method: &str,
        key: &str,
    ) -> Result<usize, Error> {
        match self.request(session, id, method, json!({})).await {
            Ok(result) => Ok(result.get(key).and_then(Value::as_array).map_or(0, Vec::len)),
            Err(Error::Exec(
                err @ (ExecError::ProtocolFailed { .. } | ExecError::Timeout { .. }),
            )) => {
                tracing::debug!(method, error = %err, "optional MCP method unavailable");
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    /// Send one request and wait for the response carrying the same id
    ///
    /// Lines that are not JSON, notifications and responses to other ids
    /// are skipped; servers commonly log to stdout before answering.
    async fn request(
        &self,
        session: &mut dyn ChildSession,
        id: u64,
        method: &str,
        params: Value,
    ) -> Result<Value, Error> {
        let message = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });
        session.send_line(&message.to_string()).await?;

        let deadline = Instant::now() + self.response_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Some(line) = session.read_line(remaining).await? else {
                return Err(protocol_failed(format!(
                    "server closed stdout before answering {method}"
                )));
            };
            let Ok(response) = serde_json::from_str::<Value>(line.trim()) else {
                continue;
            };
            if response.get("id").and_then(Value::as_u64) != Some(id) {
                continue;
            }
            if let Some(error) = response.get("error") {
                let detail = error
                    .get("message")
                    .and_then(Value::as_str)
                    .map_or_else(|| error.to_string(), str::to_string);
                return Err(protocol_failed(format!("{method} failed: {detail}")));
            }
            return Ok(response.get("result").cloned().unwrap_or(Value::Null));
        }
    }
}

fn protocol_failed(message: String) -> Error {
    ExecError::ProtocolFailed { message }.into()
}

fn parse_tools(result: &Value) -> Vec<ToolInfo> {
    let Some(tools) = result.get("tools").and_then(Value::as_array) else {
        return Vec::new();
    };
    tools
        .iter()
        .filter_map(|tool| {
            let name = tool.get("name")?.as_str()?.to_string();
            let description = tool
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let mut parameters: Vec<String> = tool
                .pointer("/inputSchema/properties")
                .and_then(Value::as_object)
                .map(|props| props.keys().cloned().collect())
                .unwrap_or_default();
            parameters.sort();
            Some(ToolInfo {
                name,
                description,
                parameters,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tools() {
        let result = json!({
            "tools": [
                {
                    "name": "get_time",
                    "description": "Current time",
                    "inputSchema": { "type": "object", "properties": { "tz": {}, "format": {} } }
                },
                { "description": "nameless tools are ignored" },
                { "name": "ping" }
            ]
        });
        let tools = parse_tools(&result);
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, "get_time");
        assert_eq!(tools[0].parameters, vec!["format", "tz"]);
        assert_eq!(tools[1].description, "");
        assert!(tools[1].parameters.is_empty());
    }

    #[test]
    fn test_parse_tools_missing() {
        assert!(parse_tools(&json!({})).is_empty());
        assert!(parse_tools(&Value::Null).is_empty());
    }
}
