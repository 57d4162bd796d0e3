//! Connection resolution: one lazily-opened, shared client per process.
//!
//! [`ConnectionResolver`] owns the client behind a small state machine:
//!
//! ```text
//! Uninitialized -> Connecting -> Connected -> Closed -> Connecting -> ...
//! ```
//!
//! The connect path is serialized by an async mutex; the steady-state path
//! only takes a short read lock on the slot. The resolver is generic over a
//! [`Connector`] so the state machine can be exercised without a server.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bson::{doc, Document};
use chrono::{DateTime, Utc};
use mongo_mcp_common::{MongoMcpError, Result};
use mongodb::options::{AuthMechanism, ClientOptions, DatabaseOptions, Tls, TlsOptions};
use mongodb::{Client, Collection, Database};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use crate::config::ConnectionDescriptor;
use crate::validation::{ValidatedCollectionName, ValidatedDatabaseName};

const APP_NAME: &str = "mongo-mcp";
/// Databases hidden from user-facing listings
pub const SYSTEM_DATABASES: &[&str] = &["admin", "local", "config"];

// ---------------------------------------------------------------------------
// Topology
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyRole {
    Standalone,
    ReplicaSetPrimary,
    ReplicaSetSecondary,
    ReplicaSetArbiter,
    ReplicaSetOther,
    Mongos,
    #[default]
    Unknown,
}

/// Topology snapshot captured at connect time
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Topology {
    pub role: TopologyRole,
    pub set_name: Option<String>,
    pub primary: Option<String>,
    pub secondaries: Vec<String>,
    pub arbiters: Vec<String>,
    pub server_version: Option<String>,
}

impl Topology {
    /// Build a snapshot from a `hello` reply
    pub fn from_hello(hello: &Document) -> Self {
        let flag = |key: &str| hello.get_bool(key).unwrap_or(false);
        let hosts = |key: &str| -> Vec<String> {
            hello
                .get_array(key)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|h| h.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default()
        };

        let set_name = hello.get_str("setName").ok().map(str::to_string);
        let primary = hello.get_str("primary").ok().map(str::to_string);

        let role = if hello.get_str("msg").ok() == Some("isdbgrid") {
            TopologyRole::Mongos
        } else if set_name.is_none() {
            TopologyRole::Standalone
        } else if flag("isWritablePrimary") || flag("ismaster") {
            TopologyRole::ReplicaSetPrimary
        } else if flag("secondary") {
            TopologyRole::ReplicaSetSecondary
        } else if flag("arbiterOnly") {
            TopologyRole::ReplicaSetArbiter
        } else {
            TopologyRole::ReplicaSetOther
        };

        let mut secondaries = hosts("hosts");
        secondaries.extend(hosts("passives"));
        if let Some(p) = &primary {
            secondaries.retain(|h| h != p);
        }

        Self {
            role,
            set_name,
            primary,
            secondaries,
            arbiters: hosts("arbiters"),
            server_version: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Connector seam
// ---------------------------------------------------------------------------

/// Opens and checks physical connections for the resolver
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Client: Send + Sync + 'static;

    /// Build a client for `descriptor`
    async fn open(&self, descriptor: &ConnectionDescriptor) -> Result<Self::Client>;

    /// Liveness round-trip
    async fn ping(&self, client: &Self::Client) -> Result<()>;

    /// Informational probes after a successful ping. Never fails.
    async fn probe(&self, client: &Self::Client) -> Topology;

    /// Release a client the resolver no longer hands out
    async fn close(&self, client: &Self::Client);
}

/// Production connector backed by the official driver
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoConnector;

impl MongoConnector {
    async fn client_options(descriptor: &ConnectionDescriptor) -> Result<ClientOptions> {
        let mut options = ClientOptions::parse(&descriptor.uri)
            .await
            .map_err(|e| MongoMcpError::Config(format!("Invalid MongoDB URI: {}", e)))?;

        options.app_name = Some(APP_NAME.to_string());
        options.min_pool_size = Some(descriptor.min_pool_size);
        options.max_pool_size = Some(descriptor.max_pool_size);
        options.max_idle_time = Some(descriptor.max_idle_time);
        options.connect_timeout = Some(descriptor.connect_timeout);
        options.server_selection_timeout = Some(descriptor.server_selection_timeout);

        if descriptor.tls.enabled {
            let tls = TlsOptions::builder()
                .ca_file_path(descriptor.tls.ca_file.clone())
                .cert_key_file_path(descriptor.tls.cert_key_file.clone())
                .build();
            options.tls = Some(Tls::Enabled(tls));
        }

        // Auth source and mechanism only matter when the URI carries credentials
        if let Some(credential) = options.credential.as_mut() {
            if credential.source.is_none() {
                credential.source = Some(descriptor.auth_source.clone());
            }
            if let Some(mechanism) = &descriptor.auth_mechanism {
                let parsed = AuthMechanism::from_str(mechanism).map_err(|e| {
                    MongoMcpError::Config(format!("Invalid auth mechanism '{}': {}", mechanism, e))
                })?;
                credential.mechanism = Some(parsed);
            }
        }

        Ok(options)
    }

    async fn log_server_info(client: &Client) {
        let admin = client.database("admin");
        match admin.run_command(doc! { "serverStatus": 1 }).await {
            Ok(status) => {
                let connections = status.get_document("connections").ok();
                info!(
                    version = status.get_str("version").unwrap_or("unknown"),
                    current_connections = ?connections.and_then(|c| c.get("current")).map(|v| v.to_string()),
                    available_connections = ?connections.and_then(|c| c.get("available")).map(|v| v.to_string()),
                    "MongoDB server status"
                );
            }
            Err(e) => warn!(error = %e, "Could not read server status"),
        }

        match client.list_database_names().await {
            Ok(names) => {
                let user: Vec<&str> = names
                    .iter()
                    .map(String::as_str)
                    .filter(|n| !SYSTEM_DATABASES.contains(n))
                    .collect();
                info!(databases = ?user, "Available user databases");
            }
            Err(e) => warn!(error = %e, "Could not list databases"),
        }
    }
}

#[async_trait]
impl Connector for MongoConnector {
    type Client = Client;

    async fn open(&self, descriptor: &ConnectionDescriptor) -> Result<Client> {
        let options = Self::client_options(descriptor).await?;
        Client::with_options(options)
            .map_err(|e| MongoMcpError::Connection(format!("Failed to create client: {}", e)))
    }

    async fn ping(&self, client: &Client) -> Result<()> {
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(|e| MongoMcpError::Connection(format!("Ping failed: {}", e)))
    }

    async fn probe(&self, client: &Client) -> Topology {
        let admin = client.database("admin");
        let mut topology = match admin.run_command(doc! { "hello": 1 }).await {
            Ok(hello) => Topology::from_hello(&hello),
            Err(e) => {
                warn!(error = %e, "Could not read topology");
                Topology::default()
            }
        };

        match admin.run_command(doc! { "buildInfo": 1 }).await {
            Ok(info) => topology.server_version = info.get_str("version").ok().map(str::to_string),
            Err(e) => warn!(error = %e, "Could not read server version"),
        }

        Self::log_server_info(client).await;
        match &topology.set_name {
            Some(set) => info!(replica_set = %set, role = ?topology.role, "Replica set"),
            None => info!(role = ?topology.role, "Standalone deployment"),
        }

        topology
    }

    async fn close(&self, client: &Client) {
        // Waits for checked-out sessions and cursors, then stops the pool
        client.clone().shutdown().await;
    }
}

// ---------------------------------------------------------------------------
// Handle and state
// ---------------------------------------------------------------------------

/// One live client plus what was learned when it was opened
#[derive(Debug)]
pub struct ConnectionHandle<T> {
    client: T,
    topology: Topology,
    generation: u64,
    connected_at: DateTime<Utc>,
}

impl<T> ConnectionHandle<T> {
    pub fn client(&self) -> &T {
        &self.client
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Incremented on every successful connect
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Uninitialized,
    Connecting,
    Connected,
    Closed,
}

/// Read-only view of the resolver for diagnostics
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConnectionReport {
    NotConnected {
        state: ConnectionState,
        configuration: Value,
    },
    Connected {
        generation: u64,
        connected_at: String,
        topology: Topology,
        configuration: Value,
    },
}

struct Slot<T> {
    state: ConnectionState,
    handle: Option<Arc<ConnectionHandle<T>>>,
}

/// Restores the prior state if a connect attempt does not finish
struct ConnectAttempt<'a, T> {
    slot: &'a RwLock<Slot<T>>,
    previous: ConnectionState,
    finished: bool,
}

impl<'a, T> ConnectAttempt<'a, T> {
    fn begin(slot: &'a RwLock<Slot<T>>) -> Self {
        let mut guard = slot.write();
        let previous = guard.state;
        guard.state = ConnectionState::Connecting;
        Self {
            slot,
            previous,
            finished: false,
        }
    }

    fn succeed(mut self, handle: Arc<ConnectionHandle<T>>) {
        let mut guard = self.slot.write();
        guard.state = ConnectionState::Connected;
        guard.handle = Some(handle);
        self.finished = true;
    }
}

impl<T> Drop for ConnectAttempt<'_, T> {
    fn drop(&mut self) {
        if !self.finished {
            self.slot.write().state = self.previous;
        }
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Process-wide owner of the shared client
pub struct ConnectionResolver<C: Connector = MongoConnector> {
    connector: C,
    descriptor: RwLock<Arc<ConnectionDescriptor>>,
    slot: RwLock<Slot<C::Client>>,
    connect_lock: Mutex<()>,
    generation: AtomicU64,
}

impl ConnectionResolver<MongoConnector> {
    pub fn from_descriptor(descriptor: ConnectionDescriptor) -> Self {
        Self::new(MongoConnector, descriptor)
    }
}

impl<C: Connector> ConnectionResolver<C> {
    pub fn new(connector: C, descriptor: ConnectionDescriptor) -> Self {
        Self {
            connector,
            descriptor: RwLock::new(Arc::new(descriptor)),
            slot: RwLock::new(Slot {
                state: ConnectionState::Uninitialized,
                handle: None,
            }),
            connect_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Descriptor currently in effect
    pub fn descriptor(&self) -> Arc<ConnectionDescriptor> {
        self.descriptor.read().clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.slot.read().state
    }

    fn cached(&self) -> Option<Arc<ConnectionHandle<C::Client>>> {
        let slot = self.slot.read();
        match slot.state {
            ConnectionState::Connected => slot.handle.clone(),
            _ => None,
        }
    }

    /// Return the shared handle, connecting on first use.
    ///
    /// Concurrent first callers share one connect sequence. A failed connect
    /// leaves the resolver in its prior state and is not retried.
    pub async fn get_handle(&self) -> Result<Arc<ConnectionHandle<C::Client>>> {
        if let Some(handle) = self.cached() {
            return Ok(handle);
        }

        let _lock = self.connect_lock.lock().await;
        if let Some(handle) = self.cached() {
            return Ok(handle);
        }

        let attempt = ConnectAttempt::begin(&self.slot);
        let descriptor = self.descriptor();
        match self.connect(&descriptor).await {
            Ok(handle) => {
                let handle = Arc::new(handle);
                attempt.succeed(handle.clone());
                Ok(handle)
            }
            Err(e) => {
                error!(uri = %descriptor.redacted_uri(), error = %e, "Failed to connect to MongoDB");
                drop(attempt);
                Err(e)
            }
        }
    }

    #[instrument(skip(self, descriptor), fields(uri = %descriptor.redacted_uri()))]
    async fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<ConnectionHandle<C::Client>> {
        info!("Connecting to MongoDB");
        descriptor.log_summary();

        let client = self.connector.open(descriptor).await.map_err(as_connection_error)?;

        let budget = descriptor.liveness_timeout();
        match tokio::time::timeout(budget, self.connector.ping(&client)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(as_connection_error(e)),
            Err(_) => {
                return Err(MongoMcpError::Connection(format!(
                    "Liveness check timed out after {}ms",
                    budget.as_millis()
                )))
            }
        }

        let topology = match tokio::time::timeout(budget, self.connector.probe(&client)).await {
            Ok(topology) => topology,
            Err(_) => {
                warn!("Topology probe timed out");
                Topology::default()
            }
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(generation, "Connected to MongoDB");

        Ok(ConnectionHandle {
            client,
            topology,
            generation,
            connected_at: Utc::now(),
        })
    }

    /// Release the cached handle and shut its client down.
    /// No-op unless a handle was ever opened.
    pub async fn close(&self) {
        let _lock = self.connect_lock.lock().await;
        self.close_locked().await;
    }

    async fn close_locked(&self) {
        let released = {
            let mut slot = self.slot.write();
            if matches!(
                slot.state,
                ConnectionState::Uninitialized | ConnectionState::Closed
            ) {
                return;
            }
            slot.state = ConnectionState::Closed;
            slot.handle.take()
        };

        if let Some(handle) = released {
            info!(generation = handle.generation, "Closing MongoDB connection");
            self.connector.close(&handle.client).await;
            info!(generation = handle.generation, "MongoDB connection closed");
        }
    }

    /// Install a new descriptor; the next `get_handle` reconnects with it
    pub async fn reconfigure(&self, descriptor: ConnectionDescriptor) {
        let _lock = self.connect_lock.lock().await;
        self.close_locked().await;
        info!(uri = %descriptor.redacted_uri(), "Connection reconfigured");
        *self.descriptor.write() = Arc::new(descriptor);
    }

    pub fn describe(&self) -> ConnectionReport {
        let configuration = self.descriptor().summary();
        let slot = self.slot.read();
        match (&slot.state, &slot.handle) {
            (ConnectionState::Connected, Some(handle)) => ConnectionReport::Connected {
                generation: handle.generation,
                connected_at: handle.connected_at.to_rfc3339(),
                topology: handle.topology.clone(),
                configuration,
            },
            (state, _) => ConnectionReport::NotConnected {
                state: *state,
                configuration,
            },
        }
    }
}

fn as_connection_error(err: MongoMcpError) -> MongoMcpError {
    match err {
        MongoMcpError::Connection(_) | MongoMcpError::Config(_) => err,
        other => MongoMcpError::Connection(other.message().to_string()),
    }
}

// ---------------------------------------------------------------------------
// Per-call views
// ---------------------------------------------------------------------------

/// Database options carrying the descriptor's consistency settings
pub fn database_options(descriptor: &ConnectionDescriptor) -> DatabaseOptions {
    DatabaseOptions::builder()
        .selection_criteria(Some(descriptor.read_preference.to_selection_criteria()))
        .write_concern(Some(descriptor.write_concern.to_write_concern()))
        .read_concern(Some(descriptor.read_concern.to_read_concern()))
        .build()
}

/// A database handle with consistency settings layered on the shared client.
///
/// Cheap to build; the shared client is never mutated.
#[derive(Debug, Clone)]
pub struct View {
    client: Client,
    database: Database,
}

impl View {
    pub fn new(client: &Client, descriptor: &ConnectionDescriptor, name: &ValidatedDatabaseName) -> Self {
        Self {
            client: client.clone(),
            database: client.database_with_options(name.as_str(), database_options(descriptor)),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn name(&self) -> &str {
        self.database.name()
    }

    pub fn collection(&self, name: &ValidatedCollectionName) -> Collection<Document> {
        self.database.collection(name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topology_standalone() {
        let t = Topology::from_hello(&doc! { "isWritablePrimary": true, "maxWireVersion": 21 });
        assert_eq!(t.role, TopologyRole::Standalone);
        assert!(t.set_name.is_none());
    }

    #[test]
    fn test_topology_replica_set_primary() {
        let t = Topology::from_hello(&doc! {
            "isWritablePrimary": true,
            "setName": "rs0",
            "primary": "a:27017",
            "hosts": ["a:27017", "b:27017"],
            "passives": ["c:27017"],
            "arbiters": ["d:27017"],
        });
        assert_eq!(t.role, TopologyRole::ReplicaSetPrimary);
        assert_eq!(t.set_name.as_deref(), Some("rs0"));
        assert_eq!(t.primary.as_deref(), Some("a:27017"));
        assert_eq!(t.secondaries, vec!["b:27017", "c:27017"]);
        assert_eq!(t.arbiters, vec!["d:27017"]);
    }

    #[test]
    fn test_topology_secondary_and_mongos() {
        let t = Topology::from_hello(&doc! { "setName": "rs0", "secondary": true });
        assert_eq!(t.role, TopologyRole::ReplicaSetSecondary);

        let t = Topology::from_hello(&doc! { "msg": "isdbgrid", "isWritablePrimary": true });
        assert_eq!(t.role, TopologyRole::Mongos);
    }

    #[test]
    fn test_database_options_layering() {
        use crate::config::{ReadConcernLevel, ReadPreferenceMode, WriteAcknowledgement, WriteConcernSpec};
        use mongodb::options::{Acknowledgment, ReadPreference, SelectionCriteria};

        let descriptor = ConnectionDescriptor {
            read_preference: ReadPreferenceMode::Nearest,
            write_concern: WriteConcernSpec {
                w: WriteAcknowledgement::Nodes(2),
                journal: true,
            },
            read_concern: ReadConcernLevel::Majority,
            ..Default::default()
        };
        let options = database_options(&descriptor);
        assert!(matches!(
            options.selection_criteria,
            Some(SelectionCriteria::ReadPreference(ReadPreference::Nearest { .. }))
        ));
        let wc = options.write_concern.unwrap();
        assert_eq!(wc.w, Some(Acknowledgment::Nodes(2)));
        assert_eq!(wc.journal, Some(true));
        assert!(options.read_concern.is_some());
    }

    #[test]
    fn test_as_connection_error() {
        let err = as_connection_error(MongoMcpError::Operation("boom".into()));
        assert!(matches!(err, MongoMcpError::Connection(ref m) if m == "boom"));
        let err = as_connection_error(MongoMcpError::Config("bad uri".into()));
        assert!(matches!(err, MongoMcpError::Config(_)));
    }
}
