//! Operation façade.
//!
//! Each operation validates its input, checks the feature flags, borrows the
//! shared client from the resolver, runs one or more driver calls under the
//! operation timeout, and returns JSON produced by the sanitizer.

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use bson::{Bson, Document};
use mongo_mcp_common::{MongoMcpError, Result};
use mongodb::Client;
use serde_json::Value;
use tracing::error;

use crate::config::{ConnectionDescriptor, OperationClass};
use crate::connection::{ConnectionResolver, View, SYSTEM_DATABASES};
use crate::sanitize;
use crate::validation::{ValidatedCollectionName, ValidatedDatabaseName};

pub mod admin;
pub mod aggregation;
pub mod database;
pub mod document;
pub mod index;

pub use admin::{ReplicaSetStatus, REPLICATION_DISABLED_CODES};

/// Entry point for every MongoDB operation exposed as a tool
#[derive(Clone)]
pub struct Operations {
    resolver: Arc<ConnectionResolver>,
}

impl Operations {
    pub fn new(resolver: Arc<ConnectionResolver>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &Arc<ConnectionResolver> {
        &self.resolver
    }

    fn descriptor(&self) -> Arc<ConnectionDescriptor> {
        self.resolver.descriptor()
    }

    fn authorize(&self, class: OperationClass, operation: &str) -> Result<()> {
        self.descriptor().features.check(class, operation)
    }

    /// Resolve the requested database, falling back to the configured default
    fn database_name(&self, requested: Option<&str>) -> Result<ValidatedDatabaseName> {
        let requested = requested.map(str::trim).filter(|s| !s.is_empty());
        match requested {
            Some(name) => ValidatedDatabaseName::new(name),
            None => match self.descriptor().default_database.as_deref() {
                Some(name) => ValidatedDatabaseName::new(name),
                None => Err(MongoMcpError::Validation(
                    "database_name is required (no default database configured)".to_string(),
                )),
            },
        }
    }

    async fn client(&self) -> Result<Client> {
        let handle = self.resolver.get_handle().await?;
        Ok(handle.client().clone())
    }

    async fn view(&self, database: &ValidatedDatabaseName) -> Result<View> {
        let handle = self.resolver.get_handle().await?;
        Ok(View::new(handle.client(), &self.descriptor(), database))
    }

    fn call<'a>(
        &self,
        operation: &'static str,
        database: &'a str,
        collection: Option<&'a str>,
    ) -> Call<'a> {
        Call {
            operation,
            database,
            collection,
            timeout: self.descriptor().operation_timeout,
        }
    }
}

/// Identity and time budget of one driver call, used for error reporting
pub(crate) struct Call<'a> {
    operation: &'static str,
    database: &'a str,
    collection: Option<&'a str>,
    timeout: Duration,
}

impl Call<'_> {
    /// Run a driver future under the operation timeout.
    ///
    /// Failures are logged with the call identity and returned unchanged in kind.
    pub(crate) async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: IntoFuture<Output = mongodb::error::Result<T>>,
    {
        match self.run_raw(fut).await? {
            Ok(value) => Ok(value),
            Err(e) => Err(self.fail(MongoMcpError::from(e))),
        }
    }

    /// Like [`Call::run`], but hands driver errors back for inspection.
    /// Only the timeout is converted and logged.
    pub(crate) async fn run_raw<T, F>(&self, fut: F) -> Result<mongodb::error::Result<T>>
    where
        F: IntoFuture<Output = mongodb::error::Result<T>>,
    {
        tokio::time::timeout(self.timeout, fut.into_future())
            .await
            .map_err(|_| {
                self.fail(MongoMcpError::Operation(format!(
                    "{} timed out after {}ms",
                    self.operation,
                    self.timeout.as_millis()
                )))
            })
    }

    pub(crate) fn fail(&self, err: MongoMcpError) -> MongoMcpError {
        error!(
            operation = self.operation,
            database = self.database,
            collection = self.collection.unwrap_or("-"),
            error = %err,
            "MongoDB operation failed"
        );
        err
    }
}

/// Resolve a collection name argument
pub(crate) fn collection_name(name: &str) -> Result<ValidatedCollectionName> {
    ValidatedCollectionName::new(name.trim())
}

/// Encoded value of `key`, or `default` when absent
pub(crate) fn stat(doc: &Document, key: &str, default: Value) -> Value {
    doc.get(key).map(sanitize::encode).unwrap_or(default)
}

/// Encoded value of `key`, or null
pub(crate) fn field(doc: &Document, key: &str) -> Value {
    stat(doc, key, Value::Null)
}

/// Sub-document at `key`, or an empty one
pub(crate) fn section<'a>(doc: &'a Document, key: &str) -> std::borrow::Cow<'a, Document> {
    match doc.get(key) {
        Some(Bson::Document(inner)) => std::borrow::Cow::Borrowed(inner),
        _ => std::borrow::Cow::Owned(Document::new()),
    }
}
