//! MCP (Model Context Protocol) server for MongoDB
//!
//! Exposes the operations of `mongo-mcp-mongodb` as MCP tools over stdio.

pub mod server;
pub mod tools;

pub use server::{client_config, McpServer};
pub use tools::{MongoTools, ToolSchema};
