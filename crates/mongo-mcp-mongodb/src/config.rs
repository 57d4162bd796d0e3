//! Layered configuration resolved into an immutable [`ConnectionDescriptor`].
//!
//! Precedence, lowest first: built-in defaults, environment variables,
//! explicit overrides. The environment is captured into a map up front so
//! resolution is a pure function of its inputs.

use mongo_mcp_common::{MongoMcpError, Result};
use mongodb::options::{
    Acknowledgment, ReadConcern, ReadPreference, SelectionCriteria, WriteConcern,
};
use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_URI: &str = "mongodb://localhost:27017";
pub const DEFAULT_AUTH_SOURCE: &str = "admin";

const DEFAULT_MIN_POOL_SIZE: u32 = 0;
const DEFAULT_MAX_POOL_SIZE: u32 = 100;
const DEFAULT_MAX_IDLE_TIME_MS: u64 = 30_000;
const DEFAULT_SERVER_SELECTION_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 20_000;
const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_MAX_DOCUMENTS: u64 = 1_000;
const DEFAULT_BATCH_SIZE: u32 = 100;

/// Environment variables consulted during resolution
pub mod env {
    pub const URI: &str = "MONGODB_URI";
    pub const DEFAULT_DB: &str = "MONGODB_DEFAULT_DB";
    pub const MIN_POOL_SIZE: &str = "MONGODB_MIN_POOL_SIZE";
    pub const MAX_POOL_SIZE: &str = "MONGODB_MAX_POOL_SIZE";
    pub const MAX_IDLE_TIME_MS: &str = "MONGODB_MAX_IDLE_TIME_MS";
    pub const SERVER_SELECTION_TIMEOUT_MS: &str = "MONGODB_SERVER_SELECTION_TIMEOUT_MS";
    pub const CONNECT_TIMEOUT_MS: &str = "MONGODB_CONNECT_TIMEOUT_MS";
    pub const OPERATION_TIMEOUT_MS: &str = "MONGODB_OPERATION_TIMEOUT_MS";
    pub const MAX_DOCUMENTS_LIMIT: &str = "MONGODB_MAX_DOCUMENTS_LIMIT";
    pub const DEFAULT_BATCH_SIZE: &str = "MONGODB_DEFAULT_BATCH_SIZE";
    pub const TLS_ENABLED: &str = "MONGODB_TLS_ENABLED";
    pub const TLS_CA_FILE: &str = "MONGODB_TLS_CA_FILE";
    pub const TLS_CERT_FILE: &str = "MONGODB_TLS_CERT_FILE";
    pub const AUTH_SOURCE: &str = "MONGODB_AUTH_SOURCE";
    pub const AUTH_MECHANISM: &str = "MONGODB_AUTH_MECHANISM";
    pub const READ_PREFERENCE: &str = "MONGODB_READ_PREFERENCE";
    pub const WRITE_CONCERN_W: &str = "MONGODB_WRITE_CONCERN_W";
    pub const WRITE_CONCERN_J: &str = "MONGODB_WRITE_CONCERN_J";
    pub const READ_CONCERN_LEVEL: &str = "MONGODB_READ_CONCERN_LEVEL";
    pub const ENABLE_DANGEROUS_OPERATIONS: &str = "ENABLE_DANGEROUS_OPERATIONS";
    pub const ENABLE_ADMIN_OPERATIONS: &str = "ENABLE_ADMIN_OPERATIONS";
    pub const ENABLE_INDEX_OPERATIONS: &str = "ENABLE_INDEX_OPERATIONS";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
}

const AUTH_MECHANISMS: &[&str] = &[
    "SCRAM-SHA-1",
    "SCRAM-SHA-256",
    "MONGODB-X509",
    "MONGODB-AWS",
    "MONGODB-OIDC",
    "GSSAPI",
    "PLAIN",
];

// ---------------------------------------------------------------------------
// Read preference / write concern / read concern
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadPreferenceMode {
    #[default]
    Primary,
    PrimaryPreferred,
    Secondary,
    SecondaryPreferred,
    Nearest,
}

impl ReadPreferenceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::PrimaryPreferred => "primaryPreferred",
            Self::Secondary => "secondary",
            Self::SecondaryPreferred => "secondaryPreferred",
            Self::Nearest => "nearest",
        }
    }

    /// Driver selection criteria for this mode
    pub fn to_selection_criteria(&self) -> SelectionCriteria {
        let preference = match self {
            Self::Primary => ReadPreference::Primary,
            Self::PrimaryPreferred => ReadPreference::PrimaryPreferred {
                options: Default::default(),
            },
            Self::Secondary => ReadPreference::Secondary {
                options: Default::default(),
            },
            Self::SecondaryPreferred => ReadPreference::SecondaryPreferred {
                options: Default::default(),
            },
            Self::Nearest => ReadPreference::Nearest {
                options: Default::default(),
            },
        };
        SelectionCriteria::ReadPreference(preference)
    }
}

impl FromStr for ReadPreferenceMode {
    type Err = MongoMcpError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "primary" => Ok(Self::Primary),
            "primaryPreferred" => Ok(Self::PrimaryPreferred),
            "secondary" => Ok(Self::Secondary),
            "secondaryPreferred" => Ok(Self::SecondaryPreferred),
            "nearest" => Ok(Self::Nearest),
            other => Err(MongoMcpError::Config(format!(
                "Invalid read preference '{}': expected one of primary, primaryPreferred, secondary, secondaryPreferred, nearest",
                other
            ))),
        }
    }
}

impl fmt::Display for ReadPreferenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `w` component of a write concern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteAcknowledgement {
    Nodes(u32),
    Majority,
    /// Custom tag-set name configured on the replica set
    Tag(String),
}

impl FromStr for WriteAcknowledgement {
    type Err = MongoMcpError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(n) = s.parse::<i64>() {
            return u32::try_from(n).map(Self::Nodes).map_err(|_| {
                MongoMcpError::Config(format!(
                    "Invalid write concern w={}: node count must be a non-negative integer",
                    n
                ))
            });
        }
        if s == "majority" {
            return Ok(Self::Majority);
        }
        if is_tag_name(s) {
            return Ok(Self::Tag(s.to_string()));
        }
        Err(MongoMcpError::Config(format!(
            "Invalid write concern w='{}': expected a non-negative integer, 'majority' or a tag set name",
            s
        )))
    }
}

impl fmt::Display for WriteAcknowledgement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nodes(n) => write!(f, "{}", n),
            Self::Majority => f.write_str("majority"),
            Self::Tag(tag) => f.write_str(tag),
        }
    }
}

/// Tag names start with a letter; anything numeric-looking is rejected.
fn is_tag_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteConcernSpec {
    pub w: WriteAcknowledgement,
    pub journal: bool,
}

impl Default for WriteConcernSpec {
    fn default() -> Self {
        Self {
            w: WriteAcknowledgement::Nodes(1),
            journal: false,
        }
    }
}

impl WriteConcernSpec {
    pub fn to_write_concern(&self) -> WriteConcern {
        let w = match &self.w {
            WriteAcknowledgement::Nodes(n) => Acknowledgment::Nodes(*n),
            WriteAcknowledgement::Majority => Acknowledgment::Majority,
            WriteAcknowledgement::Tag(tag) => Acknowledgment::Custom(tag.clone()),
        };
        WriteConcern::builder()
            .w(Some(w))
            .journal(Some(self.journal))
            .build()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadConcernLevel {
    #[default]
    Local,
    Majority,
    Linearizable,
    Available,
    Snapshot,
}

impl ReadConcernLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Majority => "majority",
            Self::Linearizable => "linearizable",
            Self::Available => "available",
            Self::Snapshot => "snapshot",
        }
    }

    pub fn to_read_concern(&self) -> ReadConcern {
        match self {
            Self::Local => ReadConcern::local(),
            Self::Majority => ReadConcern::majority(),
            Self::Linearizable => ReadConcern::linearizable(),
            Self::Available => ReadConcern::available(),
            Self::Snapshot => ReadConcern::snapshot(),
        }
    }
}

impl FromStr for ReadConcernLevel {
    type Err = MongoMcpError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local" => Ok(Self::Local),
            "majority" => Ok(Self::Majority),
            "linearizable" => Ok(Self::Linearizable),
            "available" => Ok(Self::Available),
            "snapshot" => Ok(Self::Snapshot),
            other => Err(MongoMcpError::Config(format!(
                "Invalid read concern level '{}': expected one of local, majority, linearizable, available, snapshot",
                other
            ))),
        }
    }
}

impl fmt::Display for ReadConcernLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Feature flags
// ---------------------------------------------------------------------------

/// Classification of every façade operation for gating purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationClass {
    Read,
    Write,
    Destructive,
    Admin,
    Index,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    pub dangerous_operations: bool,
    pub admin_operations: bool,
    pub index_operations: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            dangerous_operations: false,
            admin_operations: true,
            index_operations: true,
        }
    }
}

impl FeatureFlags {
    /// Refuse `operation` if its class is switched off
    pub fn check(&self, class: OperationClass, operation: &str) -> Result<()> {
        let (enabled, flag) = match class {
            OperationClass::Read | OperationClass::Write => return Ok(()),
            OperationClass::Destructive => {
                (self.dangerous_operations, env::ENABLE_DANGEROUS_OPERATIONS)
            }
            OperationClass::Admin => (self.admin_operations, env::ENABLE_ADMIN_OPERATIONS),
            OperationClass::Index => (self.index_operations, env::ENABLE_INDEX_OPERATIONS),
        };

        if enabled {
            Ok(())
        } else {
            Err(MongoMcpError::Permission(format!(
                "{} is disabled; set {}=true to allow it",
                operation, flag
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Explicit overrides, typically from command-line flags
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub uri: Option<String>,
    pub default_database: Option<String>,
    pub min_pool_size: Option<u32>,
    pub max_pool_size: Option<u32>,
    pub connect_timeout_ms: Option<u64>,
    pub server_selection_timeout_ms: Option<u64>,
    pub operation_timeout_ms: Option<u64>,
    pub max_documents: Option<u64>,
    pub read_preference: Option<String>,
    pub write_concern_w: Option<String>,
    pub journal: Option<bool>,
    pub read_concern_level: Option<String>,
    pub enable_dangerous_operations: Option<bool>,
    pub enable_admin_operations: Option<bool>,
    pub enable_index_operations: Option<bool>,
}

/// Everything resolution reads from
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub env: HashMap<String, String>,
    pub overrides: ConfigOverrides,
}

impl ConfigSources {
    /// Capture the relevant process environment
    pub fn from_process_env() -> Self {
        let env = std::env::vars()
            .filter(|(key, _)| {
                key.starts_with("MONGODB_") || key.starts_with("ENABLE_") || key == env::LOG_LEVEL
            })
            .collect();
        Self {
            env,
            overrides: ConfigOverrides::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Environment value, with blank strings treated as unset
    fn var(&self, key: &str) -> Option<&str> {
        self.env
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn layered<T: FromStr>(&self, explicit: Option<T>, key: &str, default: T) -> Result<T>
    where
        T::Err: fmt::Display,
    {
        if let Some(value) = explicit {
            return Ok(value);
        }
        match self.var(key) {
            Some(raw) => raw.parse::<T>().map_err(|e| {
                MongoMcpError::Config(format!("Invalid value for {}: '{}' ({})", key, raw, e))
            }),
            None => Ok(default),
        }
    }

    fn layered_flag(&self, explicit: Option<bool>, key: &str, default: bool) -> Result<bool> {
        if let Some(value) = explicit {
            return Ok(value);
        }
        match self.var(key) {
            Some(raw) => parse_flag(raw).ok_or_else(|| {
                MongoMcpError::Config(format!(
                    "Invalid value for {}: '{}' (expected true/false)",
                    key, raw
                ))
            }),
            None => Ok(default),
        }
    }

    fn layered_str(&self, explicit: Option<&String>, key: &str) -> Option<String> {
        explicit
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| self.var(key).map(str::to_string))
    }
}

/// Parse a boolean flag value (true/false/1/0/yes/no/on/off)
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsSettings {
    pub enabled: bool,
    pub ca_file: Option<PathBuf>,
    pub cert_key_file: Option<PathBuf>,
}

/// Immutable, fully-resolved connection configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionDescriptor {
    pub uri: String,
    pub default_database: Option<String>,
    pub min_pool_size: u32,
    pub max_pool_size: u32,
    pub max_idle_time: Duration,
    pub connect_timeout: Duration,
    pub server_selection_timeout: Duration,
    pub operation_timeout: Duration,
    pub read_preference: ReadPreferenceMode,
    pub write_concern: WriteConcernSpec,
    pub read_concern: ReadConcernLevel,
    pub tls: TlsSettings,
    pub auth_source: String,
    pub auth_mechanism: Option<String>,
    pub max_documents: u64,
    pub batch_size: u32,
    pub features: FeatureFlags,
}

impl Default for ConnectionDescriptor {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            default_database: None,
            min_pool_size: DEFAULT_MIN_POOL_SIZE,
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            max_idle_time: Duration::from_millis(DEFAULT_MAX_IDLE_TIME_MS),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            server_selection_timeout: Duration::from_millis(DEFAULT_SERVER_SELECTION_TIMEOUT_MS),
            operation_timeout: Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS),
            read_preference: ReadPreferenceMode::default(),
            write_concern: WriteConcernSpec::default(),
            read_concern: ReadConcernLevel::default(),
            tls: TlsSettings::default(),
            auth_source: DEFAULT_AUTH_SOURCE.to_string(),
            auth_mechanism: None,
            max_documents: DEFAULT_MAX_DOCUMENTS,
            batch_size: DEFAULT_BATCH_SIZE,
            features: FeatureFlags::default(),
        }
    }
}

impl ConnectionDescriptor {
    /// Merge defaults, environment and overrides into a descriptor.
    pub fn resolve(sources: &ConfigSources) -> Result<Self> {
        let o = &sources.overrides;

        let uri = sources
            .layered_str(o.uri.as_ref(), env::URI)
            .unwrap_or_else(|| DEFAULT_URI.to_string());
        validate_uri(&uri)?;

        let min_pool_size =
            sources.layered(o.min_pool_size, env::MIN_POOL_SIZE, DEFAULT_MIN_POOL_SIZE)?;
        let max_pool_size =
            sources.layered(o.max_pool_size, env::MAX_POOL_SIZE, DEFAULT_MAX_POOL_SIZE)?;
        if min_pool_size > max_pool_size {
            return Err(MongoMcpError::Config(format!(
                "{} ({}) is greater than {} ({})",
                env::MIN_POOL_SIZE,
                min_pool_size,
                env::MAX_POOL_SIZE,
                max_pool_size
            )));
        }
        if max_pool_size == 0 {
            return Err(MongoMcpError::Config(format!(
                "{} must be at least 1",
                env::MAX_POOL_SIZE
            )));
        }

        let max_idle_ms = sources.layered(None, env::MAX_IDLE_TIME_MS, DEFAULT_MAX_IDLE_TIME_MS)?;
        let connect_ms = sources.layered(
            o.connect_timeout_ms,
            env::CONNECT_TIMEOUT_MS,
            DEFAULT_CONNECT_TIMEOUT_MS,
        )?;
        let selection_ms = sources.layered(
            o.server_selection_timeout_ms,
            env::SERVER_SELECTION_TIMEOUT_MS,
            DEFAULT_SERVER_SELECTION_TIMEOUT_MS,
        )?;
        let operation_ms = sources.layered(
            o.operation_timeout_ms,
            env::OPERATION_TIMEOUT_MS,
            DEFAULT_OPERATION_TIMEOUT_MS,
        )?;
        for (key, ms) in [
            (env::CONNECT_TIMEOUT_MS, connect_ms),
            (env::SERVER_SELECTION_TIMEOUT_MS, selection_ms),
            (env::OPERATION_TIMEOUT_MS, operation_ms),
        ] {
            if ms == 0 {
                return Err(MongoMcpError::Config(format!("{} must be positive", key)));
            }
        }

        let read_preference = match o.read_preference.as_deref() {
            Some(raw) => raw.parse()?,
            None => match sources.var(env::READ_PREFERENCE) {
                Some(raw) => raw.parse()?,
                None => ReadPreferenceMode::default(),
            },
        };

        let w = match o.write_concern_w.as_deref() {
            Some(raw) => raw.parse()?,
            None => match sources.var(env::WRITE_CONCERN_W) {
                Some(raw) => raw.parse()?,
                None => WriteAcknowledgement::Nodes(1),
            },
        };
        let journal = sources.layered_flag(o.journal, env::WRITE_CONCERN_J, false)?;

        let read_concern = match o.read_concern_level.as_deref() {
            Some(raw) => raw.parse()?,
            None => match sources.var(env::READ_CONCERN_LEVEL) {
                Some(raw) => raw.parse()?,
                None => ReadConcernLevel::default(),
            },
        };

        let tls = TlsSettings {
            enabled: sources.layered_flag(None, env::TLS_ENABLED, false)?,
            ca_file: sources.var(env::TLS_CA_FILE).map(PathBuf::from),
            cert_key_file: sources.var(env::TLS_CERT_FILE).map(PathBuf::from),
        };

        let auth_mechanism = sources.var(env::AUTH_MECHANISM).map(str::to_string);
        if let Some(mechanism) = &auth_mechanism {
            if !AUTH_MECHANISMS.contains(&mechanism.as_str()) {
                return Err(MongoMcpError::Config(format!(
                    "Unsupported auth mechanism '{}': expected one of {}",
                    mechanism,
                    AUTH_MECHANISMS.join(", ")
                )));
            }
        }

        let max_documents =
            sources.layered(o.max_documents, env::MAX_DOCUMENTS_LIMIT, DEFAULT_MAX_DOCUMENTS)?;
        if max_documents == 0 {
            return Err(MongoMcpError::Config(format!(
                "{} must be positive",
                env::MAX_DOCUMENTS_LIMIT
            )));
        }

        let features = FeatureFlags {
            dangerous_operations: sources.layered_flag(
                o.enable_dangerous_operations,
                env::ENABLE_DANGEROUS_OPERATIONS,
                false,
            )?,
            admin_operations: sources.layered_flag(
                o.enable_admin_operations,
                env::ENABLE_ADMIN_OPERATIONS,
                true,
            )?,
            index_operations: sources.layered_flag(
                o.enable_index_operations,
                env::ENABLE_INDEX_OPERATIONS,
                true,
            )?,
        };

        Ok(Self {
            uri,
            default_database: sources.layered_str(o.default_database.as_ref(), env::DEFAULT_DB),
            min_pool_size,
            max_pool_size,
            max_idle_time: Duration::from_millis(max_idle_ms),
            connect_timeout: Duration::from_millis(connect_ms),
            server_selection_timeout: Duration::from_millis(selection_ms),
            operation_timeout: Duration::from_millis(operation_ms),
            read_preference,
            write_concern: WriteConcernSpec { w, journal },
            read_concern,
            tls,
            auth_source: sources
                .var(env::AUTH_SOURCE)
                .unwrap_or(DEFAULT_AUTH_SOURCE)
                .to_string(),
            auth_mechanism,
            max_documents,
            batch_size: sources.layered(None, env::DEFAULT_BATCH_SIZE, DEFAULT_BATCH_SIZE)?,
            features,
        })
    }

    /// Budget for the connect-time liveness check
    pub fn liveness_timeout(&self) -> Duration {
        self.connect_timeout + self.server_selection_timeout
    }

    pub fn redacted_uri(&self) -> String {
        redact_uri(&self.uri)
    }

    /// Redacted echo of the descriptor, safe to hand to callers
    pub fn summary(&self) -> Value {
        json!({
            "uri": self.redacted_uri(),
            "default_database": self.default_database,
            "pool": {
                "min_size": self.min_pool_size,
                "max_size": self.max_pool_size,
                "max_idle_time_ms": self.max_idle_time.as_millis() as u64,
            },
            "timeouts_ms": {
                "connect": self.connect_timeout.as_millis() as u64,
                "server_selection": self.server_selection_timeout.as_millis() as u64,
                "operation": self.operation_timeout.as_millis() as u64,
            },
            "read_preference": self.read_preference.as_str(),
            "write_concern": {
                "w": self.write_concern.w.to_string(),
                "j": self.write_concern.journal,
            },
            "read_concern": self.read_concern.as_str(),
            "tls_enabled": self.tls.enabled,
            "auth_source": self.auth_source,
            "auth_mechanism": self.auth_mechanism,
            "max_documents": self.max_documents,
            "batch_size": self.batch_size,
            "features": {
                "dangerous_operations": self.features.dangerous_operations,
                "admin_operations": self.features.admin_operations,
                "index_operations": self.features.index_operations,
            },
        })
    }

    /// Log the effective configuration at `info`, credentials redacted
    pub fn log_summary(&self) {
        info!(uri = %self.redacted_uri(), "MongoDB URI");
        info!(
            default_database = self.default_database.as_deref().unwrap_or("<none>"),
            min_pool_size = self.min_pool_size,
            max_pool_size = self.max_pool_size,
            "Connection pool"
        );
        info!(
            read_preference = %self.read_preference,
            write_concern = %self.write_concern.w,
            journal = self.write_concern.journal,
            read_concern = %self.read_concern,
            "Consistency settings"
        );
        info!(
            dangerous = self.features.dangerous_operations,
            admin = self.features.admin_operations,
            index = self.features.index_operations,
            "Operation classes enabled"
        );
    }
}

fn validate_uri(uri: &str) -> Result<()> {
    if uri.starts_with("mongodb://") || uri.starts_with("mongodb+srv://") {
        Ok(())
    } else {
        Err(MongoMcpError::Config(format!(
            "Invalid {}: must start with mongodb:// or mongodb+srv:// (got '{}')",
            env::URI,
            redact_uri(uri)
        )))
    }
}

/// Replace the userinfo part of a connection string
pub fn redact_uri(uri: &str) -> String {
    static USERINFO_RE: OnceLock<Regex> = OnceLock::new();
    let re = USERINFO_RE.get_or_init(|| Regex::new(r"://[^@/]+@").expect("valid regex"));
    re.replace(uri, "://[REDACTED]@").to_string()
}
