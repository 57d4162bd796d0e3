//! Database and collection level operations

use bson::{doc, Document};
use mongo_mcp_common::{MongoMcpError, Result};
use serde_json::{json, Value};
use tracing::info;

use super::{collection_name, field, stat, Operations, SYSTEM_DATABASES};
use crate::codec;
use crate::config::OperationClass;
use crate::sanitize;
use crate::validation::ValidatedDatabaseName;

const DEFAULT_INITIAL_COLLECTION: &str = "init";

impl Operations {
    /// Names of all user databases
    pub async fn list_databases(&self) -> Result<Value> {
        let client = self.client().await?;
        let names = self
            .call("list_databases", "admin", None)
            .run(client.list_database_names())
            .await?;

        let user: Vec<String> = names
            .into_iter()
            .filter(|n| is_user_database(n))
            .collect();
        info!(count = user.len(), "Listed databases");
        Ok(json!(user))
    }

    pub async fn list_collections(&self, database: Option<&str>) -> Result<Value> {
        let db = self.database_name(database)?;
        let view = self.view(&db).await?;
        let names = self
            .call("list_collections", db.as_str(), None)
            .run(view.database().list_collection_names())
            .await?;
        info!(database = %db, count = names.len(), "Listed collections");
        Ok(json!(names))
    }

    /// Databases are created implicitly by their first write
    pub async fn create_database(
        &self,
        database: Option<&str>,
        initial_collection: Option<&str>,
        initial_document: Option<&Value>,
    ) -> Result<Value> {
        self.authorize(OperationClass::Admin, "create_database")?;
        let db = self.database_name(database)?;
        let coll = collection_name(initial_collection.unwrap_or(DEFAULT_INITIAL_COLLECTION))?;
        let document = match initial_document {
            None | Some(Value::Null) => doc! { "_created": "Database initialization document" },
            Some(v) => codec::decode_document(v, "initial_document")?,
        };

        let view = self.view(&db).await?;
        let result = self
            .call("create_database", db.as_str(), Some(coll.as_str()))
            .run(view.collection(&coll).insert_one(document))
            .await?;

        info!(database = %db, collection = %coll, "Created database");
        Ok(json!({
            "database_name": db.as_str(),
            "initial_collection": coll.as_str(),
            "inserted_id": sanitize::encode(&result.inserted_id),
            "success": true,
        }))
    }

    /// Drop a whole database. The name is never defaulted.
    pub async fn drop_database(&self, database: &str) -> Result<Value> {
        self.authorize(OperationClass::Destructive, "drop_database")?;
        let db = ValidatedDatabaseName::new(database.trim())?;

        let view = self.view(&db).await?;
        self.call("drop_database", db.as_str(), None)
            .run(view.database().drop())
            .await?;

        info!(database = %db, "Dropped database");
        Ok(json!({
            "database_name": db.as_str(),
            "success": true,
            "message": format!("Database '{}' has been deleted", db),
        }))
    }

    pub async fn get_database_stats(&self, database: Option<&str>) -> Result<Value> {
        let db = self.database_name(database)?;
        let view = self.view(&db).await?;
        let stats = self
            .call("get_database_stats", db.as_str(), None)
            .run(view.database().run_command(doc! { "dbStats": 1 }))
            .await?;

        Ok(json!({
            "database": field(&stats, "db"),
            "collections": stat(&stats, "collections", json!(0)),
            "views": stat(&stats, "views", json!(0)),
            "objects": stat(&stats, "objects", json!(0)),
            "avg_obj_size": stat(&stats, "avgObjSize", json!(0)),
            "data_size": stat(&stats, "dataSize", json!(0)),
            "storage_size": stat(&stats, "storageSize", json!(0)),
            "indexes": stat(&stats, "indexes", json!(0)),
            "index_size": stat(&stats, "indexSize", json!(0)),
            "file_size": stat(&stats, "fileSize", json!(0)),
        }))
    }

    /// Create a collection; `options` are passed to the `create` command verbatim
    pub async fn create_collection(
        &self,
        database: Option<&str>,
        collection: &str,
        options: Option<&Value>,
    ) -> Result<Value> {
        self.authorize(OperationClass::Admin, "create_collection")?;
        let db = self.database_name(database)?;
        let coll = collection_name(collection)?;
        let options = match options {
            None | Some(Value::Null) => Document::new(),
            Some(v) => codec::lift_document(v, "options")?,
        };

        let mut command = doc! { "create": coll.as_str() };
        for (key, value) in &options {
            if key == "create" {
                continue;
            }
            command.insert(key.clone(), value.clone());
        }

        let view = self.view(&db).await?;
        self.call("create_collection", db.as_str(), Some(coll.as_str()))
            .run(view.database().run_command(command))
            .await?;

        info!(database = %db, collection = %coll, "Created collection");
        Ok(json!({
            "database_name": db.as_str(),
            "collection_name": coll.as_str(),
            "options": sanitize::encode_document(&options),
            "success": true,
        }))
    }

    pub async fn drop_collection(&self, database: Option<&str>, collection: &str) -> Result<Value> {
        self.authorize(OperationClass::Destructive, "drop_collection")?;
        let db = self.database_name(database)?;
        let coll = collection_name(collection)?;

        let view = self.view(&db).await?;
        self.call("drop_collection", db.as_str(), Some(coll.as_str()))
            .run(view.collection(&coll).drop())
            .await?;

        info!(database = %db, collection = %coll, "Dropped collection");
        Ok(json!({
            "database_name": db.as_str(),
            "collection_name": coll.as_str(),
            "success": true,
            "message": format!("Collection '{}' has been deleted", coll),
        }))
    }

    pub async fn rename_collection(
        &self,
        database: Option<&str>,
        old_name: &str,
        new_name: &str,
    ) -> Result<Value> {
        self.authorize(OperationClass::Admin, "rename_collection")?;
        let db = self.database_name(database)?;
        let from = collection_name(old_name)?;
        let to = collection_name(new_name)?;
        if from == to {
            return Err(MongoMcpError::Validation(
                "old_name and new_name must differ".to_string(),
            ));
        }

        let view = self.view(&db).await?;
        let command = doc! {
            "renameCollection": format!("{}.{}", db, from),
            "to": format!("{}.{}", db, to),
        };
        self.call("rename_collection", db.as_str(), Some(from.as_str()))
            .run(view.client().database("admin").run_command(command))
            .await?;

        info!(database = %db, from = %from, to = %to, "Renamed collection");
        Ok(json!({
            "database_name": db.as_str(),
            "old_name": from.as_str(),
            "new_name": to.as_str(),
            "success": true,
        }))
    }

    pub async fn get_collection_stats(&self, database: Option<&str>, collection: &str) -> Result<Value> {
        let db = self.database_name(database)?;
        let coll = collection_name(collection)?;

        let view = self.view(&db).await?;
        let stats = self
            .call("get_collection_stats", db.as_str(), Some(coll.as_str()))
            .run(view.database().run_command(doc! { "collStats": coll.as_str() }))
            .await?;

        Ok(json!({
            "ns": field(&stats, "ns"),
            "count": stat(&stats, "count", json!(0)),
            "size": stat(&stats, "size", json!(0)),
            "avg_obj_size": stat(&stats, "avgObjSize", json!(0)),
            "storage_size": stat(&stats, "storageSize", json!(0)),
            "capped": stat(&stats, "capped", json!(false)),
            "nindexes": stat(&stats, "nindexes", json!(0)),
            "total_index_size": stat(&stats, "totalIndexSize", json!(0)),
            "index_sizes": stat(&stats, "indexSizes", json!({})),
        }))
    }
}

/// True when `name` would be listed by [`Operations::list_databases`]
pub fn is_user_database(name: &str) -> bool {
    !SYSTEM_DATABASES.contains(&name)
}
