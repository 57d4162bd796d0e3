//! Shared types for the mongo-mcp workspace.

pub mod error;

pub use error::{ErrorKind, MongoMcpError, Result};
