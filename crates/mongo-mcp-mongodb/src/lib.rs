//! MongoDB layer for mongo-mcp
//!
//! This crate owns everything between tool arguments and the driver.
//!
//! # Features
//! - Layered configuration (overrides, environment, defaults)
//! - One lazily-opened, shared client per process
//! - JSON to BSON decoding with identifier conversion
//! - BSON to JSON sanitizing for tool results
//! - Feature-flag gating of destructive, admin and index operations
//! - Database, collection, document, index, aggregation and admin operations

pub mod codec;
pub mod config;
pub mod connection;
pub mod ops;
pub mod sanitize;
pub mod validation;

pub use config::{
    ConfigOverrides, ConfigSources, ConnectionDescriptor, FeatureFlags, OperationClass,
};
pub use connection::{
    ConnectionHandle, ConnectionReport, ConnectionResolver, ConnectionState, Connector,
    MongoConnector, Topology, TopologyRole,
};
pub use mongo_mcp_common::{MongoMcpError, Result};
pub use ops::{Operations, ReplicaSetStatus};
pub use validation::{ValidatedCollectionName, ValidatedDatabaseName};
