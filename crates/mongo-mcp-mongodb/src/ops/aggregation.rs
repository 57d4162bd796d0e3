//! Aggregation pipelines and distinct values

use std::time::Duration;

use bson::Document;
use futures::TryStreamExt;
use mongo_mcp_common::{MongoMcpError, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::{collection_name, Operations};
use crate::codec;
use crate::config::OperationClass;
use crate::sanitize;
use crate::validation::require_field_name;

/// Options accepted by `aggregate_documents`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggregateSettings {
    #[serde(rename = "allowDiskUse", alias = "allow_disk_use")]
    pub allow_disk_use: Option<bool>,
    #[serde(rename = "maxTimeMS", alias = "max_time_ms")]
    pub max_time_ms: Option<u64>,
    #[serde(rename = "batchSize", alias = "batch_size")]
    pub batch_size: Option<u32>,
}

impl AggregateSettings {
    pub fn from_value(options: Option<&Value>) -> Result<Self> {
        match options {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(v) => serde_json::from_value(v.clone()).map_err(|e| {
                MongoMcpError::Validation(format!("Invalid aggregation options: {}", e))
            }),
        }
    }
}

/// Stages that write their output to a collection
const WRITE_STAGES: &[&str] = &["$out", "$merge"];

/// Whether any stage of the pipeline writes to a collection
pub fn writes_output(stages: &[Document]) -> bool {
    stages
        .iter()
        .any(|stage| WRITE_STAGES.iter().any(|name| stage.contains_key(name)))
}

impl Operations {
    /// Run a pipeline; `$out` and `$merge` need destructive operations enabled
    pub async fn aggregate_documents(
        &self,
        database: Option<&str>,
        collection: &str,
        pipeline: &Value,
        options: Option<&Value>,
    ) -> Result<Value> {
        let db = self.database_name(database)?;
        let coll = collection_name(collection)?;
        let stages = codec::decode_documents(pipeline, "pipeline")?;
        let settings = AggregateSettings::from_value(options)?;
        if writes_output(&stages) {
            self.authorize(
                OperationClass::Destructive,
                "aggregate_documents with $out/$merge",
            )?;
        }

        let view = self.view(&db).await?;
        let handle = view.collection(&coll);
        let mut aggregate = handle.aggregate(stages);
        if let Some(allow) = settings.allow_disk_use {
            aggregate = aggregate.allow_disk_use(allow);
        }
        if let Some(ms) = settings.max_time_ms {
            aggregate = aggregate.max_time(Duration::from_millis(ms));
        }
        if let Some(size) = settings.batch_size {
            aggregate = aggregate.batch_size(size);
        }

        let results: Vec<Document> = self
            .call("aggregate_documents", db.as_str(), Some(coll.as_str()))
            .run(async move { aggregate.await?.try_collect::<Vec<Document>>().await })
            .await?;

        info!(database = %db, collection = %coll, count = results.len(), "Executed aggregation pipeline");
        Ok(sanitize::encode_all(&results))
    }

    pub async fn distinct_values(
        &self,
        database: Option<&str>,
        collection: &str,
        field: &str,
        query: Option<&Value>,
    ) -> Result<Value> {
        let db = self.database_name(database)?;
        let coll = collection_name(collection)?;
        require_field_name(field, "field")?;
        let filter = codec::decode_optional_document(query, "query")?.unwrap_or_default();

        let view = self.view(&db).await?;
        let values = self
            .call("distinct_values", db.as_str(), Some(coll.as_str()))
            .run(view.collection(&coll).distinct(field, filter))
            .await?;

        info!(database = %db, collection = %coll, field, count = values.len(), "Found distinct values");
        Ok(sanitize::encode_values(&values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_settings_driver_spelling() {
        let s = AggregateSettings::from_value(Some(&json!({
            "allowDiskUse": true,
            "maxTimeMS": 5000,
            "batchSize": 50,
        })))
        .unwrap();
        assert_eq!(s.allow_disk_use, Some(true));
        assert_eq!(s.max_time_ms, Some(5000));
        assert_eq!(s.batch_size, Some(50));
    }

    #[test]
    fn test_settings_snake_case() {
        let s = AggregateSettings::from_value(Some(&json!({ "allow_disk_use": false }))).unwrap();
        assert_eq!(s.allow_disk_use, Some(false));
    }

    #[test]
    fn test_writes_output() {
        let read = codec::decode_documents(
            &json!([{ "$match": { "status": "open" } }, { "$group": { "_id": "$owner" } }]),
            "pipeline",
        )
        .unwrap();
        assert!(!writes_output(&read));

        let out = codec::decode_documents(&json!([{ "$match": {} }, { "$out": "archive" }]), "pipeline")
            .unwrap();
        assert!(writes_output(&out));

        let merge = codec::decode_documents(&json!([{ "$merge": { "into": "totals" } }]), "pipeline")
            .unwrap();
        assert!(writes_output(&merge));
    }

    #[test]
    fn test_settings_defaults_and_errors() {
        assert_eq!(AggregateSettings::from_value(None).unwrap(), AggregateSettings::default());
        assert!(AggregateSettings::from_value(Some(&json!({ "collation": {} }))).is_err());
        assert!(AggregateSettings::from_value(Some(&json!({ "maxTimeMS": "soon" }))).is_err());
    }
}
