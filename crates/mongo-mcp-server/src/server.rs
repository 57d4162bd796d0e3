//! MCP server implementation
//!
//! Implements the Model Context Protocol over newline-delimited JSON-RPC.
//! Each request runs on its own task; responses are funnelled through a
//! channel to a single writer so lines never interleave.

use std::io;

use mongo_mcp_common::{ErrorKind, MongoMcpError};
use mongo_mcp_mongodb::Operations;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::tools::MongoTools;

pub const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "mongo-mcp";

// JSON-RPC error codes
const PARSE_ERROR: i32 = -32700;
const INVALID_REQUEST: i32 = -32600;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;
const INTERNAL_ERROR: i32 = -32603;

// Application error codes
const PERMISSION_DENIED: i32 = -32001;
const CONFIG_ERROR: i32 = -32002;
const CONNECTION_ERROR: i32 = -32003;
const OPERATION_ERROR: i32 = -32004;

/// MCP JSON-RPC request. A missing `id` marks a notification.
#[derive(Debug, Deserialize)]
struct McpRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

/// MCP JSON-RPC response
#[derive(Debug, Serialize)]
pub struct McpResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<McpError>,
}

impl McpResponse {
    fn reply(id: Value, outcome: Result<Value, McpError>) -> Self {
        let (result, error) = match outcome {
            Ok(value) => (Some(value), None),
            Err(e) => (None, Some(e)),
        };
        Self {
            jsonrpc: "2.0",
            id,
            result,
            error,
        }
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn error_code(&self) -> Option<i32> {
        self.error.as_ref().map(|e| e.code)
    }
}

/// MCP error
#[derive(Debug, Serialize)]
struct McpError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl McpError {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl From<MongoMcpError> for McpError {
    fn from(err: MongoMcpError) -> Self {
        let kind = err.kind();
        let code = match kind {
            ErrorKind::ValidationError => INVALID_PARAMS,
            ErrorKind::PermissionError => PERMISSION_DENIED,
            ErrorKind::ConfigError => CONFIG_ERROR,
            ErrorKind::ConnectionError => CONNECTION_ERROR,
            ErrorKind::OperationError => OPERATION_ERROR,
            ErrorKind::SerializationError | ErrorKind::InternalError => INTERNAL_ERROR,
        };
        Self {
            code,
            message: err.to_string(),
            data: Some(json!({ "kind": kind.as_str(), "retryable": err.is_retryable() })),
        }
    }
}

/// MCP server over an arbitrary line-oriented byte stream
#[derive(Clone)]
pub struct McpServer {
    operations: Operations,
}

impl McpServer {
    pub fn new(operations: Operations) -> Self {
        Self { operations }
    }

    pub fn operations(&self) -> &Operations {
        &self.operations
    }

    /// Serve stdin/stdout until stdin closes
    pub async fn run(&self) -> io::Result<()> {
        info!(protocol = PROTOCOL_VERSION, "MCP server listening on stdio");
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve requests from `reader`, writing responses to `writer`.
    ///
    /// Returns once the input is exhausted and every in-flight request has
    /// written its response.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        let writer_task = tokio::spawn(async move {
            let mut writer = writer;
            while let Some(line) = rx.recv().await {
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            Ok::<_, io::Error>(())
        });

        let mut lines = BufReader::new(reader).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let server = self.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let Some(response) = server.handle_line(&line).await else {
                    return;
                };
                match serde_json::to_string(&response) {
                    Ok(json) => {
                        if tx.send(json).is_err() {
                            warn!("Response dropped; writer has stopped");
                        }
                    }
                    Err(e) => error!(error = %e, "Failed to serialize response"),
                }
            });
        }

        debug!("Input closed; draining in-flight requests");
        // Request tasks hold their own senders; the writer stops after the last one
        drop(tx);
        writer_task
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
    }

    /// Handle one input line. Notifications produce no response.
    pub async fn handle_line(&self, line: &str) -> Option<McpResponse> {
        let raw: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                return Some(McpResponse::reply(
                    Value::Null,
                    Err(McpError::new(PARSE_ERROR, format!("Parse error: {}", e))),
                ))
            }
        };

        let fallback_id = raw.get("id").cloned().unwrap_or(Value::Null);
        let request: McpRequest = match serde_json::from_value(raw) {
            Ok(r) => r,
            Err(e) => {
                return Some(McpResponse::reply(
                    fallback_id,
                    Err(McpError::new(INVALID_REQUEST, format!("Invalid request: {}", e))),
                ))
            }
        };

        match request.id {
            None => {
                self.handle_notification(&request.method);
                None
            }
            Some(ref id) => {
                let outcome = self.handle_method(&request.method, request.params.clone()).await;
                Some(McpResponse::reply(id.clone(), outcome))
            }
        }
    }

    fn handle_notification(&self, method: &str) {
        match method {
            "notifications/initialized" => info!("Client initialized"),
            "notifications/cancelled" => debug!("Client cancelled a request"),
            other => debug!(method = other, "Ignoring notification"),
        }
    }

    async fn handle_method(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        match method {
            "initialize" => Ok(self.handle_initialize()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": MongoTools::list() })),
            "tools/call" => self.handle_tools_call(params).await,
            _ => Err(McpError::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {}", method),
            )),
        }
    }

    fn handle_initialize(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            }
        })
    }

    async fn handle_tools_call(&self, params: Option<Value>) -> Result<Value, McpError> {
        let params = params.ok_or_else(|| McpError::new(INVALID_PARAMS, "Missing params"))?;

        let name = params
            .get("name")
            .and_then(|n| n.as_str())
            .ok_or_else(|| McpError::new(INVALID_PARAMS, "Missing tool name"))?;

        if !MongoTools::contains(name) {
            return Err(McpError::new(METHOD_NOT_FOUND, format!("Unknown tool: {}", name)));
        }

        let arguments = params.get("arguments").cloned();
        debug!(tool = name, "Calling tool");

        let value = MongoTools::call(&self.operations, name, arguments)
            .await
            .map_err(|e| {
                warn!(tool = name, kind = %e.kind(), error = %e, "Tool call failed");
                McpError::from(e)
            })?;

        Ok(json!({
            "content": [{
                "type": "text",
                "text": serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
            }]
        }))
    }
}

/// MCP client configuration snippet for launching this server
pub fn client_config() -> Value {
    json!({
        "mcpServers": {
            "mongodb": {
                "command": "mongo-mcp",
                "args": ["serve"],
                "env": {
                    "MONGODB_URI": mongo_mcp_mongodb::config::DEFAULT_URI,
                }
            }
        }
    })
}
