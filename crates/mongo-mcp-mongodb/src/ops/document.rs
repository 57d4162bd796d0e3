//! Document CRUD operations

use bson::{doc, Bson, Document};
use futures::TryStreamExt;
use mongo_mcp_common::{MongoMcpError, Result};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{collection_name, Operations};
use crate::codec;
use crate::config::OperationClass;
use crate::sanitize;

impl Operations {
    pub async fn insert_document(
        &self,
        database: Option<&str>,
        collection: &str,
        document: &Value,
    ) -> Result<Value> {
        let db = self.database_name(database)?;
        let coll = collection_name(collection)?;
        let document = codec::decode_document(document, "document")?;
        if document.is_empty() {
            return Err(MongoMcpError::Validation(
                "document must be a non-empty object".to_string(),
            ));
        }

        let view = self.view(&db).await?;
        let result = self
            .call("insert_document", db.as_str(), Some(coll.as_str()))
            .run(view.collection(&coll).insert_one(document))
            .await?;

        let inserted_id = sanitize::encode(&result.inserted_id);
        info!(database = %db, collection = %coll, id = %inserted_id, "Inserted document");
        Ok(json!({ "inserted_id": inserted_id, "success": true }))
    }

    pub async fn insert_many_documents(
        &self,
        database: Option<&str>,
        collection: &str,
        documents: &Value,
        ordered: bool,
    ) -> Result<Value> {
        let db = self.database_name(database)?;
        let coll = collection_name(collection)?;
        let documents = codec::decode_documents(documents, "documents")?;
        if documents.is_empty() {
            return Err(MongoMcpError::Validation(
                "documents must be a non-empty list".to_string(),
            ));
        }

        let view = self.view(&db).await?;
        let result = self
            .call("insert_many_documents", db.as_str(), Some(coll.as_str()))
            .run(view.collection(&coll).insert_many(documents).ordered(ordered))
            .await?;

        let mut ids: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
        ids.sort_by_key(|(index, _)| *index);
        let inserted_ids: Vec<Value> = ids.iter().map(|(_, id)| sanitize::encode(id)).collect();

        info!(database = %db, collection = %coll, count = inserted_ids.len(), "Inserted documents");
        Ok(json!({
            "inserted_count": inserted_ids.len(),
            "inserted_ids": inserted_ids,
            "success": true,
        }))
    }

    /// Find matching documents.
    ///
    /// `limit <= 0` means "as many as allowed": the result is always capped by
    /// the configured document limit.
    pub async fn find_documents(
        &self,
        database: Option<&str>,
        collection: &str,
        query: &Value,
        projection: Option<&Value>,
        limit: i64,
        sort: Option<&Value>,
    ) -> Result<Value> {
        let db = self.database_name(database)?;
        let coll = collection_name(collection)?;
        let filter = codec::decode_document(query, "query")?;
        let projection = optional_options(projection, "projection")?;
        let sort = optional_options(sort, "sort")?;

        let descriptor = self.descriptor();
        let limit = effective_limit(limit, descriptor.max_documents);

        let view = self.view(&db).await?;
        let handle = view.collection(&coll);
        let mut find = handle
            .find(filter)
            .limit(limit)
            .batch_size(descriptor.batch_size);
        if let Some(projection) = projection {
            find = find.projection(projection);
        }
        if let Some(sort) = sort {
            find = find.sort(sort);
        }

        let documents: Vec<Document> = self
            .call("find_documents", db.as_str(), Some(coll.as_str()))
            .run(async move { find.await?.try_collect::<Vec<Document>>().await })
            .await?;

        info!(database = %db, collection = %coll, count = documents.len(), "Found documents");
        Ok(sanitize::encode_all(&documents))
    }

    pub async fn find_one_document(
        &self,
        database: Option<&str>,
        collection: &str,
        query: &Value,
        projection: Option<&Value>,
    ) -> Result<Value> {
        let db = self.database_name(database)?;
        let coll = collection_name(collection)?;
        let filter = codec::decode_document(query, "query")?;
        let projection = optional_options(projection, "projection")?;

        let view = self.view(&db).await?;
        let handle = view.collection(&coll);
        let mut find_one = handle.find_one(filter);
        if let Some(projection) = projection {
            find_one = find_one.projection(projection);
        }

        let found = self
            .call("find_one_document", db.as_str(), Some(coll.as_str()))
            .run(find_one)
            .await?;

        match found {
            Some(document) => Ok(sanitize::encode_document(&document)),
            None => {
                info!(database = %db, collection = %coll, "No document found");
                Ok(Value::Null)
            }
        }
    }

    pub async fn count_documents(
        &self,
        database: Option<&str>,
        collection: &str,
        query: &Value,
    ) -> Result<Value> {
        let db = self.database_name(database)?;
        let coll = collection_name(collection)?;
        let filter = codec::decode_document(query, "query")?;

        let view = self.view(&db).await?;
        let count = self
            .call("count_documents", db.as_str(), Some(coll.as_str()))
            .run(view.collection(&coll).count_documents(filter))
            .await?;

        info!(database = %db, collection = %coll, count, "Counted documents");
        Ok(json!(count))
    }

    pub async fn update_document(
        &self,
        database: Option<&str>,
        collection: &str,
        query: &Value,
        update: &Value,
        upsert: bool,
        update_many: bool,
    ) -> Result<Value> {
        let db = self.database_name(database)?;
        let coll = collection_name(collection)?;
        let filter = codec::decode_document(query, "query")?;
        let update = prepare_update(codec::decode_document(update, "update")?)?;

        let view = self.view(&db).await?;
        let handle = view.collection(&coll);
        let call = self.call("update_document", db.as_str(), Some(coll.as_str()));
        let result = if update_many {
            call.run(handle.update_many(filter, update).upsert(upsert)).await?
        } else {
            call.run(handle.update_one(filter, update).upsert(upsert)).await?
        };

        info!(
            database = %db,
            collection = %coll,
            matched = result.matched_count,
            modified = result.modified_count,
            "Updated documents"
        );
        Ok(json!({
            "matched_count": result.matched_count,
            "modified_count": result.modified_count,
            "upserted_id": result.upserted_id.as_ref().map(sanitize::encode),
        }))
    }

    pub async fn replace_document(
        &self,
        database: Option<&str>,
        collection: &str,
        query: &Value,
        replacement: &Value,
        upsert: bool,
    ) -> Result<Value> {
        let db = self.database_name(database)?;
        let coll = collection_name(collection)?;
        let filter = codec::decode_document(query, "query")?;
        let replacement = codec::decode_document(replacement, "replacement")?;
        check_replacement(&replacement)?;

        let view = self.view(&db).await?;
        let result = self
            .call("replace_document", db.as_str(), Some(coll.as_str()))
            .run(view.collection(&coll).replace_one(filter, replacement).upsert(upsert))
            .await?;

        info!(database = %db, collection = %coll, matched = result.matched_count, "Replaced document");
        Ok(json!({
            "matched_count": result.matched_count,
            "modified_count": result.modified_count,
            "upserted_id": result.upserted_id.as_ref().map(sanitize::encode),
        }))
    }

    /// Delete one document, or every match when `delete_many` is set
    pub async fn delete_document(
        &self,
        database: Option<&str>,
        collection: &str,
        query: &Value,
        delete_many: bool,
    ) -> Result<Value> {
        if delete_many {
            self.authorize(OperationClass::Destructive, "delete_document with delete_many")?;
        }
        let db = self.database_name(database)?;
        let coll = collection_name(collection)?;
        let filter = codec::decode_document(query, "query")?;

        let view = self.view(&db).await?;
        let handle = view.collection(&coll);
        let call = self.call("delete_document", db.as_str(), Some(coll.as_str()));
        let result = if delete_many {
            call.run(handle.delete_many(filter)).await?
        } else {
            call.run(handle.delete_one(filter)).await?
        };

        info!(database = %db, collection = %coll, deleted = result.deleted_count, "Deleted documents");
        Ok(json!({ "deleted_count": result.deleted_count }))
    }
}

/// Projection and sort documents keep their strings verbatim
fn optional_options(value: Option<&Value>, what: &str) -> Result<Option<Document>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => {
            let doc = codec::lift_document(v, what)?;
            Ok((!doc.is_empty()).then_some(doc))
        }
    }
}

/// Clamp a requested limit to the configured maximum
pub(crate) fn effective_limit(requested: i64, max_documents: u64) -> i64 {
    let cap = i64::try_from(max_documents).unwrap_or(i64::MAX);
    if requested <= 0 {
        cap
    } else if requested > cap {
        warn!(requested, cap, "Requested limit exceeds the configured maximum");
        cap
    } else {
        requested
    }
}

/// Wrap a plain field document in `$set`
pub(crate) fn prepare_update(update: Document) -> Result<Document> {
    if update.is_empty() {
        return Err(MongoMcpError::Validation(
            "update must be a non-empty object".to_string(),
        ));
    }
    if update.keys().any(|k| k.starts_with('$')) {
        Ok(update)
    } else {
        Ok(doc! { "$set": update })
    }
}

pub(crate) fn check_replacement(replacement: &Document) -> Result<()> {
    match replacement.keys().find(|k| k.starts_with('$')) {
        Some(key) => Err(MongoMcpError::Validation(format!(
            "replacement must not contain update operators (found '{}')",
            key
        ))),
        None => Ok(()),
    }
}
