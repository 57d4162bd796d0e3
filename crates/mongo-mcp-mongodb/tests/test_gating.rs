//! Refusals that must happen before any driver call.
//!
//! Every resolver here points at an unroutable address; the assertions on
//! `ConnectionState::Uninitialized` prove no connect was attempted.

use std::sync::Arc;

use mongo_mcp_mongodb::config::env;
use mongo_mcp_mongodb::{
    ConfigOverrides, ConfigSources, ConnectionDescriptor, ConnectionResolver, ConnectionState,
    MongoMcpError, Operations,
};
use serde_json::json;

fn operations(overrides: ConfigOverrides) -> Operations {
    let overrides = ConfigOverrides {
        uri: Some("mongodb://192.0.2.1:27017".to_string()),
        default_database: Some("shop".to_string()),
        server_selection_timeout_ms: Some(200),
        connect_timeout_ms: Some(200),
        ..overrides
    };
    let sources = ConfigSources::default().with_overrides(overrides);
    let descriptor = ConnectionDescriptor::resolve(&sources).unwrap();
    Operations::new(Arc::new(ConnectionResolver::from_descriptor(descriptor)))
}

fn assert_untouched(ops: &Operations) {
    assert_eq!(ops.resolver().state(), ConnectionState::Uninitialized);
}

#[tokio::test]
async fn test_destructive_operations_disabled_by_default() {
    let ops = operations(ConfigOverrides::default());

    let err = ops.drop_database("shop").await.unwrap_err();
    assert!(matches!(err, MongoMcpError::Permission(_)));
    assert!(err.to_string().contains(env::ENABLE_DANGEROUS_OPERATIONS));

    let err = ops.drop_collection(None, "orders").await.unwrap_err();
    assert!(matches!(err, MongoMcpError::Permission(_)));

    let err = ops
        .delete_document(None, "orders", &json!({ "status": "void" }), true)
        .await
        .unwrap_err();
    assert!(matches!(err, MongoMcpError::Permission(_)));

    let err = ops
        .aggregate_documents(None, "orders", &json!([{ "$match": {} }, { "$out": "orders" }]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, MongoMcpError::Permission(_)));
    assert!(err.to_string().contains(env::ENABLE_DANGEROUS_OPERATIONS));

    let merge = json!([{ "$merge": { "into": "totals", "whenMatched": "replace" } }]);
    let err = ops.aggregate_documents(None, "orders", &merge, None).await.unwrap_err();
    assert!(matches!(err, MongoMcpError::Permission(_)));

    assert_untouched(&ops);
}

#[tokio::test]
async fn test_admin_operations_gate() {
    let ops = operations(ConfigOverrides {
        enable_admin_operations: Some(false),
        ..Default::default()
    });

    let err = ops.create_database(Some("crm"), None, None).await.unwrap_err();
    assert!(matches!(err, MongoMcpError::Permission(_)));

    let err = ops.create_collection(None, "orders", None).await.unwrap_err();
    assert!(matches!(err, MongoMcpError::Permission(_)));

    let err = ops.rename_collection(None, "orders", "archive").await.unwrap_err();
    assert!(matches!(err, MongoMcpError::Permission(_)));
    assert!(err.to_string().contains(env::ENABLE_ADMIN_OPERATIONS));

    assert_untouched(&ops);
}

#[tokio::test]
async fn test_index_operations_gate() {
    let ops = operations(ConfigOverrides {
        enable_index_operations: Some(false),
        ..Default::default()
    });

    let refusals = vec![
        ops.create_index(None, "orders", &json!({ "email": 1 }), None).await,
        ops.create_text_index(None, "orders", &["body".to_string()], None).await,
        ops.create_compound_index(None, "orders", &json!([["a", 1]]), None).await,
        ops.drop_index(None, "orders", "email_1").await,
        ops.reindex_collection(None, "orders").await,
    ];
    for refusal in refusals {
        assert!(matches!(refusal, Err(MongoMcpError::Permission(_))));
    }

    assert_untouched(&ops);
}

#[tokio::test]
async fn test_validation_precedes_io() {
    let ops = operations(ConfigOverrides {
        enable_dangerous_operations: Some(true),
        ..Default::default()
    });

    let cases = vec![
        ops.find_documents(None, "system.users", &json!({}), None, 10, None).await,
        ops.find_documents(None, "orders", &json!([1, 2]), None, 10, None).await,
        ops.insert_document(None, "orders", &json!({})).await,
        ops.insert_many_documents(None, "orders", &json!([]), true).await,
        ops.update_document(None, "orders", &json!({}), &json!({}), false, false).await,
        ops.replace_document(None, "orders", &json!({}), &json!({ "$set": { "a": 1 } }), false).await,
        ops.aggregate_documents(None, "orders", &json!({ "$match": {} }), None).await,
        ops.distinct_values(None, "orders", "", None).await,
        ops.drop_index(None, "orders", "_id_").await,
        ops.rename_collection(None, "orders", "orders").await,
        ops.list_collections(Some("bad/name")).await,
        ops.drop_database("").await,
    ];
    for (i, result) in cases.into_iter().enumerate() {
        match result {
            Err(MongoMcpError::Validation(_)) => {}
            other => panic!("case {i}: expected a validation error, got {other:?}"),
        }
    }

    assert_untouched(&ops);
}

#[tokio::test]
async fn test_database_required_without_default() {
    let sources = ConfigSources::default();
    let descriptor = ConnectionDescriptor::resolve(&sources).unwrap();
    let ops = Operations::new(Arc::new(ConnectionResolver::from_descriptor(descriptor)));

    let err = ops.list_collections(None).await.unwrap_err();
    assert!(matches!(err, MongoMcpError::Validation(_)));
    assert_untouched(&ops);
}

#[tokio::test]
async fn test_connection_details_do_not_connect() {
    let ops = operations(ConfigOverrides::default());
    let details = tokio_test::assert_ok!(ops.get_connection_details());
    assert_eq!(details["status"], "not_connected");
    assert_eq!(details["state"], "uninitialized");
    assert_eq!(details["configuration"]["default_database"], "shop");
    assert_untouched(&ops);
}
