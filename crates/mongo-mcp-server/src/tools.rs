//! MCP tool definitions for MongoDB
//!
//! Each tool pairs a JSON Schema with a typed argument struct; [`MongoTools::call`]
//! deserializes the arguments and forwards them to [`Operations`].

use mongo_mcp_common::{MongoMcpError, Result};
use mongo_mcp_mongodb::Operations;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Tool schema for MCP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl ToolSchema {
    fn new(name: &str, description: &str, properties: Value, required: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema: json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DatabaseArgs {
    database_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DropDatabaseArgs {
    database_name: String,
}

#[derive(Debug, Deserialize)]
struct CreateDatabaseArgs {
    database_name: Option<String>,
    initial_collection: Option<String>,
    initial_document: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CollectionArgs {
    database_name: Option<String>,
    collection_name: String,
}

#[derive(Debug, Deserialize)]
struct CollectionOptionsArgs {
    database_name: Option<String>,
    collection_name: String,
    options: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RenameArgs {
    database_name: Option<String>,
    old_name: String,
    new_name: String,
}

#[derive(Debug, Deserialize)]
struct InsertArgs {
    database_name: Option<String>,
    collection_name: String,
    document: Value,
}

fn yes() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct InsertManyArgs {
    database_name: Option<String>,
    collection_name: String,
    documents: Value,
    #[serde(default = "yes")]
    ordered: bool,
}

fn empty_query() -> Value {
    Value::Object(Map::new())
}

#[derive(Debug, Deserialize)]
struct FindArgs {
    database_name: Option<String>,
    collection_name: String,
    #[serde(default = "empty_query")]
    query: Value,
    projection: Option<Value>,
    #[serde(default)]
    limit: i64,
    sort: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct FindOneArgs {
    database_name: Option<String>,
    collection_name: String,
    #[serde(default = "empty_query")]
    query: Value,
    projection: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct QueryArgs {
    database_name: Option<String>,
    collection_name: String,
    #[serde(default = "empty_query")]
    query: Value,
}

#[derive(Debug, Deserialize)]
struct UpdateArgs {
    database_name: Option<String>,
    collection_name: String,
    query: Value,
    #[serde(alias = "update")]
    update_data: Value,
    #[serde(default)]
    upsert: bool,
    #[serde(default)]
    update_many: bool,
}

#[derive(Debug, Deserialize)]
struct ReplaceArgs {
    database_name: Option<String>,
    collection_name: String,
    query: Value,
    replacement: Value,
    #[serde(default)]
    upsert: bool,
}

#[derive(Debug, Deserialize)]
struct DeleteArgs {
    database_name: Option<String>,
    collection_name: String,
    query: Value,
    #[serde(default)]
    delete_many: bool,
}

#[derive(Debug, Deserialize)]
struct IndexArgs {
    database_name: Option<String>,
    collection_name: String,
    keys: Value,
    options: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct TextIndexArgs {
    database_name: Option<String>,
    collection_name: String,
    fields: Vec<String>,
    options: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CompoundIndexArgs {
    database_name: Option<String>,
    collection_name: String,
    field_specs: Value,
    options: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct DropIndexArgs {
    database_name: Option<String>,
    collection_name: String,
    index_name: String,
}

#[derive(Debug, Deserialize)]
struct AggregateArgs {
    database_name: Option<String>,
    collection_name: String,
    pipeline: Value,
    options: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct DistinctArgs {
    database_name: Option<String>,
    collection_name: String,
    field: String,
    query: Option<Value>,
}

/// Deserialize tool arguments; a missing or null object counts as `{}`
fn parse<T: DeserializeOwned>(tool: &str, arguments: Option<Value>) -> Result<T> {
    let arguments = match arguments {
        None | Some(Value::Null) => empty_query(),
        Some(v) => v,
    };
    serde_json::from_value(arguments)
        .map_err(|e| MongoMcpError::Validation(format!("Invalid arguments for {}: {}", tool, e)))
}

// ---------------------------------------------------------------------------
// Catalogue and dispatch
// ---------------------------------------------------------------------------

/// MongoDB MCP tools
pub struct MongoTools;

impl MongoTools {
    /// Get all available tools
    pub fn list() -> Vec<ToolSchema> {
        let db = || json!({ "type": "string", "description": "Name of the database (defaults to MONGODB_DEFAULT_DB)" });
        let coll = || json!({ "type": "string", "description": "Name of the collection" });
        let object = |what: &str| json!({ "type": "object", "description": what });

        vec![
            // Databases and collections
            ToolSchema::new(
                "list_databases",
                "List all user databases (admin, local and config are hidden)",
                json!({}),
                &[],
            ),
            ToolSchema::new(
                "list_collections",
                "List all collections in a database",
                json!({ "database_name": db() }),
                &[],
            ),
            ToolSchema::new(
                "create_database",
                "Create a database by inserting an initial document (requires admin operations)",
                json!({
                    "database_name": db(),
                    "initial_collection": { "type": "string", "description": "Initial collection name", "default": "init" },
                    "initial_document": object("Initial document to insert"),
                }),
                &[],
            ),
            ToolSchema::new(
                "drop_database",
                "Delete an entire database and all its collections (requires dangerous operations)",
                json!({ "database_name": { "type": "string", "description": "Name of the database to delete" } }),
                &["database_name"],
            ),
            ToolSchema::new(
                "get_database_stats",
                "Get statistics for a database",
                json!({ "database_name": db() }),
                &[],
            ),
            ToolSchema::new(
                "create_collection",
                "Create a collection with optional settings such as capped, size or max (requires admin operations)",
                json!({
                    "database_name": db(),
                    "collection_name": coll(),
                    "options": object("Collection options"),
                }),
                &["collection_name"],
            ),
            ToolSchema::new(
                "drop_collection",
                "Delete a collection (requires dangerous operations)",
                json!({ "database_name": db(), "collection_name": coll() }),
                &["collection_name"],
            ),
            ToolSchema::new(
                "rename_collection",
                "Rename a collection (requires admin operations)",
                json!({
                    "database_name": db(),
                    "old_name": { "type": "string", "description": "Current name of the collection" },
                    "new_name": { "type": "string", "description": "New name for the collection" },
                }),
                &["old_name", "new_name"],
            ),
            ToolSchema::new(
                "get_collection_stats",
                "Get statistics for a collection",
                json!({ "database_name": db(), "collection_name": coll() }),
                &["collection_name"],
            ),
            // Documents
            ToolSchema::new(
                "insert_document",
                "Insert a document into a collection",
                json!({
                    "database_name": db(),
                    "collection_name": coll(),
                    "document": object("Document to insert"),
                }),
                &["collection_name", "document"],
            ),
            ToolSchema::new(
                "insert_many_documents",
                "Insert multiple documents into a collection",
                json!({
                    "database_name": db(),
                    "collection_name": coll(),
                    "documents": { "type": "array", "items": { "type": "object" }, "description": "Documents to insert" },
                    "ordered": { "type": "boolean", "description": "Stop at the first failed insert", "default": true },
                }),
                &["collection_name", "documents"],
            ),
            ToolSchema::new(
                "find_documents",
                "Find documents matching a query",
                json!({
                    "database_name": db(),
                    "collection_name": coll(),
                    "query": object("Query filter"),
                    "projection": object("Fields to include or exclude"),
                    "limit": { "type": "integer", "description": "Maximum number of documents (0 for the configured maximum)", "default": 0 },
                    "sort": object("Sort specification"),
                }),
                &["collection_name"],
            ),
            ToolSchema::new(
                "find_one_document",
                "Find a single document matching a query",
                json!({
                    "database_name": db(),
                    "collection_name": coll(),
                    "query": object("Query filter"),
                    "projection": object("Fields to include or exclude"),
                }),
                &["collection_name"],
            ),
            ToolSchema::new(
                "count_documents",
                "Count documents matching a query",
                json!({ "database_name": db(), "collection_name": coll(), "query": object("Query filter") }),
                &["collection_name"],
            ),
            ToolSchema::new(
                "update_document",
                "Update documents matching a query; plain fields are wrapped in $set",
                json!({
                    "database_name": db(),
                    "collection_name": coll(),
                    "query": object("Query filter"),
                    "update_data": object("Update document or update operators"),
                    "upsert": { "type": "boolean", "default": false },
                    "update_many": { "type": "boolean", "default": false },
                }),
                &["collection_name", "query", "update_data"],
            ),
            ToolSchema::new(
                "replace_document",
                "Replace a single document matching a query",
                json!({
                    "database_name": db(),
                    "collection_name": coll(),
                    "query": object("Query filter"),
                    "replacement": object("Replacement document (no update operators)"),
                    "upsert": { "type": "boolean", "default": false },
                }),
                &["collection_name", "query", "replacement"],
            ),
            ToolSchema::new(
                "delete_document",
                "Delete one document, or all matches with delete_many (requires dangerous operations)",
                json!({
                    "database_name": db(),
                    "collection_name": coll(),
                    "query": object("Query filter"),
                    "delete_many": { "type": "boolean", "default": false },
                }),
                &["collection_name", "query"],
            ),
            // Indexes
            ToolSchema::new(
                "list_indexes",
                "List the indexes of a collection",
                json!({ "database_name": db(), "collection_name": coll() }),
                &["collection_name"],
            ),
            ToolSchema::new(
                "create_index",
                "Create an index; directions are 1/-1, asc/desc, text or any index type",
                json!({
                    "database_name": db(),
                    "collection_name": coll(),
                    "keys": object("Index keys, e.g. {\"email\": 1}"),
                    "options": object("Index options such as unique, name, sparse"),
                }),
                &["collection_name", "keys"],
            ),
            ToolSchema::new(
                "create_text_index",
                "Create a text index over one or more fields",
                json!({
                    "database_name": db(),
                    "collection_name": coll(),
                    "fields": { "type": "array", "items": { "type": "string" }, "description": "Fields to index" },
                    "options": object("Index options such as weights, default_language"),
                }),
                &["collection_name", "fields"],
            ),
            ToolSchema::new(
                "create_compound_index",
                "Create a compound index from ordered [field, direction] pairs",
                json!({
                    "database_name": db(),
                    "collection_name": coll(),
                    "field_specs": {
                        "type": "array",
                        "items": { "type": "array", "minItems": 2, "maxItems": 2 },
                        "description": "Ordered [field, direction] pairs",
                    },
                    "options": object("Index options"),
                }),
                &["collection_name", "field_specs"],
            ),
            ToolSchema::new(
                "drop_index",
                "Drop an index by name (the _id_ index cannot be dropped)",
                json!({
                    "database_name": db(),
                    "collection_name": coll(),
                    "index_name": { "type": "string", "description": "Name of the index to drop" },
                }),
                &["collection_name", "index_name"],
            ),
            ToolSchema::new(
                "reindex_collection",
                "Rebuild all indexes of a collection",
                json!({ "database_name": db(), "collection_name": coll() }),
                &["collection_name"],
            ),
            // Aggregation
            ToolSchema::new(
                "aggregate_documents",
                "Run an aggregation pipeline",
                json!({
                    "database_name": db(),
                    "collection_name": coll(),
                    "pipeline": { "type": "array", "items": { "type": "object" }, "description": "Pipeline stages" },
                    "options": object("allowDiskUse, maxTimeMS, batchSize"),
                }),
                &["collection_name", "pipeline"],
            ),
            ToolSchema::new(
                "distinct_values",
                "Get the distinct values of a field",
                json!({
                    "database_name": db(),
                    "collection_name": coll(),
                    "field": { "type": "string", "description": "Field path" },
                    "query": object("Optional query filter"),
                }),
                &["collection_name", "field"],
            ),
            // Administration
            ToolSchema::new(
                "get_server_status",
                "Get server status: connections, network, opcounters, memory",
                json!({}),
                &[],
            ),
            ToolSchema::new(
                "get_replica_set_status",
                "Get replica set status, or null when not part of a replica set",
                json!({}),
                &[],
            ),
            ToolSchema::new(
                "ping_database",
                "Check connectivity, optionally for a specific database",
                json!({ "database_name": { "type": "string", "description": "Optional database to ping" } }),
                &[],
            ),
            ToolSchema::new(
                "test_connection",
                "Run a connection test and report server and database details",
                json!({}),
                &[],
            ),
            ToolSchema::new(
                "get_connection_details",
                "Describe the current connection and effective configuration",
                json!({}),
                &[],
            ),
        ]
    }

    /// Whether `name` is a known tool
    pub fn contains(name: &str) -> bool {
        Self::list().iter().any(|t| t.name == name)
    }

    /// Run tool `name` with raw JSON `arguments`
    pub async fn call(ops: &Operations, name: &str, arguments: Option<Value>) -> Result<Value> {
        match name {
            "list_databases" => ops.list_databases().await,
            "list_collections" => {
                let a: DatabaseArgs = parse(name, arguments)?;
                ops.list_collections(a.database_name.as_deref()).await
            }
            "create_database" => {
                let a: CreateDatabaseArgs = parse(name, arguments)?;
                ops.create_database(
                    a.database_name.as_deref(),
                    a.initial_collection.as_deref(),
                    a.initial_document.as_ref(),
                )
                .await
            }
            "drop_database" => {
                let a: DropDatabaseArgs = parse(name, arguments)?;
                ops.drop_database(&a.database_name).await
            }
            "get_database_stats" => {
                let a: DatabaseArgs = parse(name, arguments)?;
                ops.get_database_stats(a.database_name.as_deref()).await
            }
            "create_collection" => {
                let a: CollectionOptionsArgs = parse(name, arguments)?;
                ops.create_collection(a.database_name.as_deref(), &a.collection_name, a.options.as_ref())
                    .await
            }
            "drop_collection" => {
                let a: CollectionArgs = parse(name, arguments)?;
                ops.drop_collection(a.database_name.as_deref(), &a.collection_name).await
            }
            "rename_collection" => {
                let a: RenameArgs = parse(name, arguments)?;
                ops.rename_collection(a.database_name.as_deref(), &a.old_name, &a.new_name)
                    .await
            }
            "get_collection_stats" => {
                let a: CollectionArgs = parse(name, arguments)?;
                ops.get_collection_stats(a.database_name.as_deref(), &a.collection_name).await
            }
            "insert_document" => {
                let a: InsertArgs = parse(name, arguments)?;
                ops.insert_document(a.database_name.as_deref(), &a.collection_name, &a.document)
                    .await
            }
            "insert_many_documents" => {
                let a: InsertManyArgs = parse(name, arguments)?;
                ops.insert_many_documents(
                    a.database_name.as_deref(),
                    &a.collection_name,
                    &a.documents,
                    a.ordered,
                )
                .await
            }
            "find_documents" => {
                let a: FindArgs = parse(name, arguments)?;
                ops.find_documents(
                    a.database_name.as_deref(),
                    &a.collection_name,
                    &a.query,
                    a.projection.as_ref(),
                    a.limit,
                    a.sort.as_ref(),
                )
                .await
            }
            "find_one_document" => {
                let a: FindOneArgs = parse(name, arguments)?;
                ops.find_one_document(
                    a.database_name.as_deref(),
                    &a.collection_name,
                    &a.query,
                    a.projection.as_ref(),
                )
                .await
            }
            "count_documents" => {
                let a: QueryArgs = parse(name, arguments)?;
                ops.count_documents(a.database_name.as_deref(), &a.collection_name, &a.query)
                    .await
            }
            "update_document" => {
                let a: UpdateArgs = parse(name, arguments)?;
                ops.update_document(
                    a.database_name.as_deref(),
                    &a.collection_name,
                    &a.query,
                    &a.update_data,
                    a.upsert,
                    a.update_many,
                )
                .await
            }
            "replace_document" => {
                let a: ReplaceArgs = parse(name, arguments)?;
                ops.replace_document(
                    a.database_name.as_deref(),
                    &a.collection_name,
                    &a.query,
                    &a.replacement,
                    a.upsert,
                )
                .await
            }
            "delete_document" => {
                let a: DeleteArgs = parse(name, arguments)?;
                ops.delete_document(
                    a.database_name.as_deref(),
                    &a.collection_name,
                    &a.query,
                    a.delete_many,
                )
                .await
            }
            "list_indexes" => {
                let a: CollectionArgs = parse(name, arguments)?;
                ops.list_indexes(a.database_name.as_deref(), &a.collection_name).await
            }
            "create_index" => {
                let a: IndexArgs = parse(name, arguments)?;
                ops.create_index(
                    a.database_name.as_deref(),
                    &a.collection_name,
                    &a.keys,
                    a.options.as_ref(),
                )
                .await
            }
            "create_text_index" => {
                let a: TextIndexArgs = parse(name, arguments)?;
                ops.create_text_index(
                    a.database_name.as_deref(),
                    &a.collection_name,
                    &a.fields,
                    a.options.as_ref(),
                )
                .await
            }
            "create_compound_index" => {
                let a: CompoundIndexArgs = parse(name, arguments)?;
                ops.create_compound_index(
                    a.database_name.as_deref(),
                    &a.collection_name,
                    &a.field_specs,
                    a.options.as_ref(),
                )
                .await
            }
            "drop_index" => {
                let a: DropIndexArgs = parse(name, arguments)?;
                ops.drop_index(a.database_name.as_deref(), &a.collection_name, &a.index_name)
                    .await
            }
            "reindex_collection" => {
                let a: CollectionArgs = parse(name, arguments)?;
                ops.reindex_collection(a.database_name.as_deref(), &a.collection_name).await
            }
            "aggregate_documents" => {
                let a: AggregateArgs = parse(name, arguments)?;
                ops.aggregate_documents(
                    a.database_name.as_deref(),
                    &a.collection_name,
                    &a.pipeline,
                    a.options.as_ref(),
                )
                .await
            }
            "distinct_values" => {
                let a: DistinctArgs = parse(name, arguments)?;
                ops.distinct_values(
                    a.database_name.as_deref(),
                    &a.collection_name,
                    &a.field,
                    a.query.as_ref(),
                )
                .await
            }
            "get_server_status" => ops.get_server_status().await,
            "get_replica_set_status" => ops.get_replica_set_status().await,
            "ping_database" => {
                let a: DatabaseArgs = parse(name, arguments)?;
                ops.ping_database(a.database_name.as_deref()).await
            }
            "test_connection" => ops.test_connection().await,
            "get_connection_details" => ops.get_connection_details(),
            _ => Err(MongoMcpError::Validation(format!("Unknown tool: {}", name))),
        }
    }
}
