//! End-to-end protocol tests over in-memory pipes.

use std::collections::HashMap;
use std::sync::Arc;

use mongo_mcp_mongodb::{
    ConfigSources, ConnectionDescriptor, ConnectionResolver, ConnectionState, Operations,
};
use mongo_mcp_server::McpServer;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

fn server() -> McpServer {
    let sources = ConfigSources::default()
        .with_env("MONGODB_URI", "mongodb://192.0.2.1:27017")
        .with_env("ENABLE_INDEX_OPERATIONS", "false");
    let descriptor = ConnectionDescriptor::resolve(&sources).unwrap();
    McpServer::new(Operations::new(Arc::new(ConnectionResolver::from_descriptor(descriptor))))
}

/// Feed `requests` to the server and collect responses keyed by id
async fn exchange(server: &McpServer, requests: &[Value]) -> HashMap<String, Value> {
    let (mut client_in, server_in) = tokio::io::duplex(64 * 1024);
    let (server_out, client_out) = tokio::io::duplex(64 * 1024);

    let mut input = String::new();
    for request in requests {
        input.push_str(&request.to_string());
        input.push('\n');
    }
    input.push('\n');
    client_in.write_all(input.as_bytes()).await.unwrap();
    drop(client_in);

    server.serve(server_in, server_out).await.unwrap();

    let mut responses = HashMap::new();
    let mut lines = BufReader::new(client_out).lines();
    while let Some(line) = lines.next_line().await.unwrap() {
        let response: Value = serde_json::from_str(&line).unwrap();
        responses.insert(response["id"].to_string(), response);
    }
    responses
}

#[tokio::test]
async fn test_session_round_trip() {
    let server = server();
    let responses = exchange(
        &server,
        &[
            json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} }),
            json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
            json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }),
            json!({ "jsonrpc": "2.0", "id": 3, "method": "ping" }),
            json!({
                "jsonrpc": "2.0", "id": 4, "method": "tools/call",
                "params": { "name": "get_connection_details", "arguments": {} }
            }),
        ],
    )
    .await;

    // The notification gets no reply
    assert_eq!(responses.len(), 4);
    assert_eq!(responses["1"]["result"]["serverInfo"]["name"], "mongo-mcp");
    assert_eq!(responses["2"]["result"]["tools"].as_array().unwrap().len(), 30);
    assert_eq!(responses["3"]["result"], json!({}));

    let text = responses["4"]["result"]["content"][0]["text"].as_str().unwrap();
    let details: Value = serde_json::from_str(text).unwrap();
    assert_eq!(details["configuration"]["features"]["index_operations"], false);
}

#[tokio::test]
async fn test_errors_are_typed() {
    let server = server();
    let responses = exchange(
        &server,
        &[
            json!({
                "jsonrpc": "2.0", "id": "idx", "method": "tools/call",
                "params": { "name": "create_index", "arguments": {
                    "database_name": "shop", "collection_name": "users", "keys": { "email": 1 }
                } }
            }),
            json!({
                "jsonrpc": "2.0", "id": "db", "method": "tools/call",
                "params": { "name": "list_collections", "arguments": {} }
            }),
            json!({
                "jsonrpc": "2.0", "id": "name", "method": "tools/call",
                "params": { "name": "count_documents", "arguments": {
                    "database_name": "shop", "collection_name": "$bad"
                } }
            }),
        ],
    )
    .await;

    let idx = &responses["\"idx\""]["error"];
    assert_eq!(idx["code"], -32001);
    assert_eq!(idx["data"]["kind"], "PermissionError");

    // No default database is configured
    let db = &responses["\"db\""]["error"];
    assert_eq!(db["data"]["kind"], "ValidationError");

    let name = &responses["\"name\""]["error"];
    assert_eq!(name["code"], -32602);

    assert_eq!(server.operations().resolver().state(), ConnectionState::Uninitialized);
}

#[tokio::test]
async fn test_garbage_line_does_not_stop_the_session() {
    let server = server();
    let (mut client_in, server_in) = tokio::io::duplex(4096);
    let (server_out, client_out) = tokio::io::duplex(4096);

    client_in
        .write_all(b"not json\n{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n")
        .await
        .unwrap();
    drop(client_in);
    server.serve(server_in, server_out).await.unwrap();

    let mut lines = BufReader::new(client_out).lines();
    let mut codes = Vec::new();
    while let Some(line) = lines.next_line().await.unwrap() {
        let response: Value = serde_json::from_str(&line).unwrap();
        codes.push(response["error"]["code"].as_i64());
    }
    codes.sort();
    assert_eq!(codes, vec![None, Some(-32700)]);
}
