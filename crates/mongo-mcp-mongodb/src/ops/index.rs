//! Index management

use bson::{doc, Bson, Document};
use mongo_mcp_common::{MongoMcpError, Result};
use mongodb::options::IndexOptions;
use mongodb::IndexModel;
use serde_json::{json, Map, Value};
use tracing::info;

use super::{collection_name, field, stat, Operations};
use crate::codec;
use crate::config::OperationClass;
use crate::sanitize;
use crate::validation::{require_field_name, ValidatedCollectionName, ValidatedDatabaseName};

/// The mandatory primary key index
const ID_INDEX: &str = "_id_";

/// Option keys the server spells in snake_case
const SNAKE_CASE_OPTIONS: &[&str] = &["default_language", "language_override"];

/// The one index option that holds a query filter
const PARTIAL_FILTER: &str = "partialFilterExpression";

impl Operations {
    pub async fn list_indexes(&self, database: Option<&str>, collection: &str) -> Result<Value> {
        let db = self.database_name(database)?;
        let coll = collection_name(collection)?;

        let view = self.view(&db).await?;
        let reply = self
            .call("list_indexes", db.as_str(), Some(coll.as_str()))
            .run(view.database().run_command(doc! { "listIndexes": coll.as_str() }))
            .await?;

        let specs: Vec<Document> = reply
            .get_document("cursor")
            .and_then(|cursor| cursor.get_array("firstBatch"))
            .map(|batch| {
                batch
                    .iter()
                    .filter_map(|spec| spec.as_document().cloned())
                    .collect()
            })
            .unwrap_or_default();

        info!(database = %db, collection = %coll, count = specs.len(), "Listed indexes");
        Ok(Value::Array(specs.iter().map(curate_index).collect()))
    }

    /// Create an index from a `{field: direction}` specification
    pub async fn create_index(
        &self,
        database: Option<&str>,
        collection: &str,
        keys: &Value,
        options: Option<&Value>,
    ) -> Result<Value> {
        self.authorize(OperationClass::Index, "create_index")?;
        let db = self.database_name(database)?;
        let coll = collection_name(collection)?;

        let spec = keys.as_object().filter(|m| !m.is_empty()).ok_or_else(|| {
            MongoMcpError::Validation("keys must be a non-empty object".to_string())
        })?;
        let mut index_keys = Document::new();
        for (name, direction) in spec {
            require_field_name(name, "index field")?;
            index_keys.insert(name.clone(), index_direction(direction));
        }

        let index_name = self
            .build_index(&db, &coll, "create_index", index_keys, options)
            .await?;
        Ok(json!({
            "index_name": index_name,
            "keys": keys,
            "options": options.cloned().unwrap_or_else(|| json!({})),
            "success": true,
        }))
    }

    pub async fn create_text_index(
        &self,
        database: Option<&str>,
        collection: &str,
        fields: &[String],
        options: Option<&Value>,
    ) -> Result<Value> {
        self.authorize(OperationClass::Index, "create_text_index")?;
        let db = self.database_name(database)?;
        let coll = collection_name(collection)?;
        if fields.is_empty() {
            return Err(MongoMcpError::Validation(
                "fields must be a non-empty list".to_string(),
            ));
        }

        let mut index_keys = Document::new();
        for name in fields {
            require_field_name(name, "text index field")?;
            index_keys.insert(name.clone(), "text");
        }

        let index_name = self
            .build_index(&db, &coll, "create_text_index", index_keys, options)
            .await?;
        Ok(json!({
            "index_name": index_name,
            "fields": fields,
            "type": "text",
            "options": options.cloned().unwrap_or_else(|| json!({})),
            "success": true,
        }))
    }

    /// `field_specs` is an ordered list of `[field, direction]` pairs
    pub async fn create_compound_index(
        &self,
        database: Option<&str>,
        collection: &str,
        field_specs: &Value,
        options: Option<&Value>,
    ) -> Result<Value> {
        self.authorize(OperationClass::Index, "create_compound_index")?;
        let db = self.database_name(database)?;
        let coll = collection_name(collection)?;
        let index_keys = compound_keys(field_specs)?;

        let index_name = self
            .build_index(&db, &coll, "create_compound_index", index_keys, options)
            .await?;
        Ok(json!({
            "index_name": index_name,
            "field_specs": field_specs,
            "type": "compound",
            "options": options.cloned().unwrap_or_else(|| json!({})),
            "success": true,
        }))
    }

    async fn build_index(
        &self,
        db: &ValidatedDatabaseName,
        coll: &ValidatedCollectionName,
        operation: &'static str,
        keys: Document,
        options: Option<&Value>,
    ) -> Result<String> {
        let options = index_options(options)?;
        let model = IndexModel::builder().keys(keys).options(options).build();

        let view = self.view(db).await?;
        let result = self
            .call(operation, db.as_str(), Some(coll.as_str()))
            .run(view.collection(coll).create_index(model))
            .await?;

        info!(database = %db, collection = %coll, index = %result.index_name, "Created index");
        Ok(result.index_name)
    }

    pub async fn drop_index(&self, database: Option<&str>, collection: &str, index_name: &str) -> Result<Value> {
        self.authorize(OperationClass::Index, "drop_index")?;
        let db = self.database_name(database)?;
        let coll = collection_name(collection)?;
        let index_name = index_name.trim();
        if index_name.is_empty() {
            return Err(MongoMcpError::Validation("index_name cannot be empty".to_string()));
        }
        if index_name == ID_INDEX {
            return Err(MongoMcpError::Validation(
                "Cannot drop the _id_ index".to_string(),
            ));
        }

        let view = self.view(&db).await?;
        self.call("drop_index", db.as_str(), Some(coll.as_str()))
            .run(view.collection(&coll).drop_index(index_name))
            .await?;

        info!(database = %db, collection = %coll, index = index_name, "Dropped index");
        Ok(json!({
            "index_name": index_name,
            "success": true,
            "message": format!("Index '{}' has been dropped", index_name),
        }))
    }

    pub async fn reindex_collection(&self, database: Option<&str>, collection: &str) -> Result<Value> {
        self.authorize(OperationClass::Index, "reindex_collection")?;
        let db = self.database_name(database)?;
        let coll = collection_name(collection)?;

        let view = self.view(&db).await?;
        let reply = self
            .call("reindex_collection", db.as_str(), Some(coll.as_str()))
            .run(view.database().run_command(doc! { "reIndex": coll.as_str() }))
            .await?;

        info!(database = %db, collection = %coll, "Rebuilt indexes");
        Ok(json!({
            "collection": coll.as_str(),
            "success": true,
            "result": sanitize::encode_document(&reply),
            "message": format!("All indexes for collection '{}' have been rebuilt", coll),
        }))
    }
}

/// Map a direction argument onto an index key value
fn index_direction(direction: &Value) -> Bson {
    match direction {
        Value::Number(n) if n.as_i64() == Some(1) => Bson::Int32(1),
        Value::Number(n) if n.as_i64() == Some(-1) => Bson::Int32(-1),
        Value::String(s) => match s.as_str() {
            "asc" | "ascending" => Bson::Int32(1),
            "desc" | "descending" => Bson::Int32(-1),
            "text" => Bson::String("text".to_string()),
            _ => codec::decode(direction),
        },
        other => codec::decode(other),
    }
}

fn compound_keys(field_specs: &Value) -> Result<Document> {
    let invalid = || {
        MongoMcpError::Validation(
            "field_specs must be a non-empty list of [field_name, direction] pairs".to_string(),
        )
    };

    let specs = field_specs.as_array().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
    let mut keys = Document::new();
    for spec in specs {
        match spec.as_array().map(Vec::as_slice) {
            Some([Value::String(name), direction]) => {
                require_field_name(name, "index field")?;
                keys.insert(name.clone(), index_direction(direction));
            }
            _ => return Err(invalid()),
        }
    }
    Ok(keys)
}

/// Parse index options, accepting both driver spellings and snake_case
fn index_options(options: Option<&Value>) -> Result<Option<IndexOptions>> {
    let raw = match options {
        None | Some(Value::Null) => return Ok(None),
        Some(v) => v.as_object().ok_or_else(|| {
            MongoMcpError::Validation("options must be an object".to_string())
        })?,
    };
    if raw.is_empty() {
        return Ok(None);
    }

    let normalized: Map<String, Value> = raw
        .iter()
        .map(|(k, v)| (normalize_option_key(k), v.clone()))
        .collect();
    let mut document = codec::lift_document(&Value::Object(normalized.clone()), "options")?;
    if let Some(filter) = normalized.get(PARTIAL_FILTER) {
        document.insert(PARTIAL_FILTER, codec::decode(filter));
    }
    bson::from_document::<IndexOptions>(document)
        .map(Some)
        .map_err(|e| MongoMcpError::Validation(format!("Invalid index options: {}", e)))
}

fn normalize_option_key(key: &str) -> String {
    if SNAKE_CASE_OPTIONS.contains(&key) || !key.contains('_') {
        return key.to_string();
    }
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for c in key.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn curate_index(spec: &Document) -> Value {
    let mut out = Map::new();
    out.insert("name".to_string(), field(spec, "name"));
    out.insert("key".to_string(), stat(spec, "key", json!({})));
    out.insert("unique".to_string(), stat(spec, "unique", json!(false)));
    out.insert("sparse".to_string(), stat(spec, "sparse", json!(false)));
    out.insert("background".to_string(), stat(spec, "background", json!(false)));
    for (from, to) in [
        ("textIndexVersion", "text_index_version"),
        ("2dsphereIndexVersion", "2dsphere_index_version"),
        ("expireAfterSeconds", "expire_after_seconds"),
        ("weights", "weights"),
        ("default_language", "default_language"),
        ("language_override", "language_override"),
    ] {
        let value = field(spec, from);
        if !value.is_null() {
            out.insert(to.to_string(), value);
        }
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_index_direction() {
        assert_eq!(index_direction(&json!(1)), Bson::Int32(1));
        assert_eq!(index_direction(&json!("asc")), Bson::Int32(1));
        assert_eq!(index_direction(&json!("ascending")), Bson::Int32(1));
        assert_eq!(index_direction(&json!(-1)), Bson::Int32(-1));
        assert_eq!(index_direction(&json!("desc")), Bson::Int32(-1));
        assert_eq!(index_direction(&json!("descending")), Bson::Int32(-1));
        assert_eq!(index_direction(&json!("text")), Bson::String("text".into()));
        assert_eq!(index_direction(&json!("2dsphere")), Bson::String("2dsphere".into()));
        assert_eq!(index_direction(&json!("hashed")), Bson::String("hashed".into()));
    }

    #[test]
    fn test_compound_keys_keep_order() {
        let keys = compound_keys(&json!([["status", 1], ["created", "desc"], ["body", "text"]])).unwrap();
        let names: Vec<&String> = keys.keys().collect();
        assert_eq!(names, vec!["status", "created", "body"]);
        assert_eq!(keys.get("created"), Some(&Bson::Int32(-1)));
    }

    #[test]
    fn test_compound_keys_reject_bad_pairs() {
        assert!(compound_keys(&json!([])).is_err());
        assert!(compound_keys(&json!([["status"]])).is_err());
        assert!(compound_keys(&json!([[1, 1]])).is_err());
        assert!(compound_keys(&json!({ "status": 1 })).is_err());
    }

    #[test]
    fn test_index_options_parsing() {
        assert!(index_options(None).unwrap().is_none());
        assert!(index_options(Some(&json!({}))).unwrap().is_none());

        let opts = index_options(Some(&json!({
            "name": "by_email",
            "unique": true,
            "expire_after_seconds": 3600,
            "default_language": "english",
        })))
        .unwrap()
        .unwrap();
        assert_eq!(opts.name.as_deref(), Some("by_email"));
        assert_eq!(opts.unique, Some(true));
        assert_eq!(opts.expire_after, Some(Duration::from_secs(3600)));
        assert_eq!(opts.default_language.as_deref(), Some("english"));

        assert!(index_options(Some(&json!([1]))).is_err());

        let err = index_options(Some(&json!({ "unique": "yes" }))).unwrap_err();
        assert!(matches!(err, MongoMcpError::Validation(_)), "got {err:?}");
    }

    #[test]
    fn test_partial_filter_decodes_identifiers() {
        let owner = "507f1f77bcf86cd799439011";
        let opts = index_options(Some(&json!({
            "name": "by_owner",
            "partial_filter_expression": { "owner": owner, "status": "open" },
        })))
        .unwrap()
        .unwrap();

        let filter = opts.partial_filter_expression.unwrap();
        assert_eq!(
            filter.get("owner"),
            Some(&Bson::ObjectId(bson::oid::ObjectId::parse_str(owner).unwrap()))
        );
        assert_eq!(filter.get_str("status").unwrap(), "open");
        // Other options keep 24-hex strings as they are
        let named = index_options(Some(&json!({ "name": owner }))).unwrap().unwrap();
        assert_eq!(named.name.as_deref(), Some(owner));
    }

    #[test]
    fn test_normalize_option_key() {
        assert_eq!(normalize_option_key("expire_after_seconds"), "expireAfterSeconds");
        assert_eq!(normalize_option_key("partial_filter_expression"), "partialFilterExpression");
        assert_eq!(normalize_option_key("unique"), "unique");
        assert_eq!(normalize_option_key("expireAfterSeconds"), "expireAfterSeconds");
        assert_eq!(normalize_option_key("language_override"), "language_override");
    }

    #[test]
    fn test_curate_index() {
        let spec = doc! {
            "v": 2,
            "key": { "email": 1 },
            "name": "email_1",
            "unique": true,
        };
        let curated = curate_index(&spec);
        assert_eq!(curated["name"], json!("email_1"));
        assert_eq!(curated["key"], json!({ "email": 1 }));
        assert_eq!(curated["unique"], json!(true));
        assert_eq!(curated["sparse"], json!(false));
        assert!(curated.get("expire_after_seconds").is_none());
    }
}
