//! Wire-to-native value conversion.
//!
//! Tool arguments arrive as JSON, which can only carry identifiers as strings.
//! [`decode`] rebuilds a JSON tree as BSON and turns every string in canonical
//! ObjectId form (exactly 24 lowercase hex characters) into a real `ObjectId`.
//! Uppercase hex stays a string, so `encode(decode(s)) == s` for every input.
//!
//! The heuristic is lossy on purpose: a plain string that happens to be 24 hex
//! characters is converted as well, whatever field it sits in.

use bson::{oid::ObjectId, Bson, Document};
use mongo_mcp_common::{MongoMcpError, Result};
use serde_json::{Number, Value};

/// Length of the canonical hex encoding of an ObjectId
pub const OBJECT_ID_HEX_LEN: usize = 24;

/// Checks if a string is the canonical ObjectId encoding (24 lowercase hex characters)
pub fn is_object_id(value: &str) -> bool {
    value.len() == OBJECT_ID_HEX_LEN
        && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Convert a JSON value to BSON, decoding identifier-looking strings.
///
/// Never fails: anything that is not an identifier is carried over unchanged.
pub fn decode(value: &Value) -> Bson {
    convert(value, true)
}

/// Convert a JSON value to BSON without touching strings.
///
/// Used for option documents, where a 24-hex string is never an identifier.
pub fn lift(value: &Value) -> Bson {
    convert(value, false)
}

/// Decode a JSON object into a BSON document.
///
/// `what` names the argument in the validation error ("query", "update", ...).
pub fn decode_document(value: &Value, what: &str) -> Result<Document> {
    into_document(decode(value), what)
}

/// Decode an optional JSON object; `null` and absent are both `None`.
pub fn decode_optional_document(value: Option<&Value>, what: &str) -> Result<Option<Document>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => decode_document(v, what).map(Some),
    }
}

/// Convert a JSON object into a BSON document without identifier decoding
pub fn lift_document(value: &Value, what: &str) -> Result<Document> {
    into_document(lift(value), what)
}

/// Decode a JSON array whose items must all be objects.
pub fn decode_documents(value: &Value, what: &str) -> Result<Vec<Document>> {
    let items = value.as_array().ok_or_else(|| {
        MongoMcpError::Validation(format!("{} must be a list of objects", what))
    })?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| decode_document(item, &format!("{}[{}]", what, i)))
        .collect()
}

fn into_document(bson: Bson, what: &str) -> Result<Document> {
    match bson {
        Bson::Document(doc) => Ok(doc),
        other => Err(MongoMcpError::Validation(format!(
            "{} must be an object, got {}",
            what,
            type_name(&other)
        ))),
    }
}

fn convert(value: &Value, identifiers: bool) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => number_to_bson(n),
        Value::String(s) => {
            if identifiers && is_object_id(s) {
                if let Ok(oid) = ObjectId::parse_str(s) {
                    return Bson::ObjectId(oid);
                }
            }
            Bson::String(s.clone())
        }
        Value::Array(items) => Bson::Array(items.iter().map(|v| convert(v, identifiers)).collect()),
        Value::Object(map) => Bson::Document(
            map.iter()
                .map(|(k, v)| (k.clone(), convert(v, identifiers)))
                .collect(),
        ),
    }
}

/// Integers become Int32 when they fit, Int64 otherwise; everything else is a double
fn number_to_bson(n: &Number) -> Bson {
    if let Some(i) = n.as_i64() {
        return match i32::try_from(i) {
            Ok(small) => Bson::Int32(small),
            Err(_) => Bson::Int64(i),
        };
    }
    // u64 beyond i64::MAX and real numbers
    Bson::Double(n.as_f64().unwrap_or(f64::NAN))
}

fn type_name(bson: &Bson) -> &'static str {
    match bson {
        Bson::Null => "null",
        Bson::Boolean(_) => "bool",
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => "number",
        Bson::String(_) => "string",
        Bson::ObjectId(_) => "identifier",
        Bson::Array(_) => "list",
        Bson::Document(_) => "object",
        _ => "value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const OID: &str = "507f1f77bcf86cd799439011";

    #[test]
    fn test_is_object_id() {
        assert!(is_object_id(OID));
        assert!(!is_object_id("507F1F77BCF86CD799439011"));
        assert!(!is_object_id("507f1f77bcf86cd79943901"));
        assert!(!is_object_id("507f1f77bcf86cd7994390111"));
        assert!(!is_object_id("507f1f77bcf86cd79943901g"));
        assert!(!is_object_id(""));
    }

    #[test]
    fn test_decode_id_field() {
        let decoded = decode(&json!({ "_id": OID }));
        let expected = bson::doc! { "_id": ObjectId::parse_str(OID).unwrap() };
        assert_eq!(decoded, Bson::Document(expected));
    }

    #[test]
    fn test_decode_converts_any_field() {
        // field name does not matter
        let decoded = decode(&json!({ "name": OID }));
        let doc = decoded.as_document().unwrap();
        assert!(matches!(doc.get("name"), Some(Bson::ObjectId(_))));
    }

    #[test]
    fn test_decode_nested_operators_and_lists() {
        let decoded = decode(&json!({
            "$or": [
                { "owner": { "$in": [OID, "plain"] } },
                { "tags": ["a", OID] }
            ]
        }));
        let doc = decoded.as_document().unwrap();
        let or = doc.get_array("$or").unwrap();
        let owner_in = or[0]
            .as_document()
            .unwrap()
            .get_document("owner")
            .unwrap()
            .get_array("$in")
            .unwrap();
        assert!(matches!(owner_in[0], Bson::ObjectId(_)));
        assert_eq!(owner_in[1], Bson::String("plain".to_string()));

        let tags = or[1].as_document().unwrap().get_array("tags").unwrap();
        assert_eq!(tags[0], Bson::String("a".to_string()));
        assert!(matches!(tags[1], Bson::ObjectId(_)));
    }

    #[test]
    fn test_decode_leaves_near_misses() {
        let decoded = decode(&json!({ "a": "507f1f77bcf86cd79943901", "b": "zzzzzzzzzzzzzzzzzzzzzzzz" }));
        let doc = decoded.as_document().unwrap();
        assert_eq!(doc.get_str("a").unwrap(), "507f1f77bcf86cd79943901");
        assert_eq!(doc.get_str("b").unwrap(), "zzzzzzzzzzzzzzzzzzzzzzzz");
    }

    #[test]
    fn test_decode_numbers() {
        let decoded = decode(&json!({ "small": 42, "big": 5_000_000_000i64, "real": 1.5, "neg": -7 }));
        let doc = decoded.as_document().unwrap();
        assert_eq!(doc.get("small"), Some(&Bson::Int32(42)));
        assert_eq!(doc.get("big"), Some(&Bson::Int64(5_000_000_000)));
        assert_eq!(doc.get("real"), Some(&Bson::Double(1.5)));
        assert_eq!(doc.get("neg"), Some(&Bson::Int32(-7)));
    }

    #[test]
    fn test_decode_preserves_field_order() {
        let decoded = decode(&json!({ "z": 1, "a": 2, "m": { "y": 1, "b": 2 } }));
        let doc = decoded.as_document().unwrap();
        let keys: Vec<&str> = doc.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
        let inner: Vec<&str> = doc.get_document("m").unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(inner, vec!["y", "b"]);
    }

    #[test]
    fn test_decode_scalars_pass_through() {
        assert_eq!(decode(&json!(null)), Bson::Null);
        assert_eq!(decode(&json!(true)), Bson::Boolean(true));
        assert_eq!(decode(&json!("hello")), Bson::String("hello".to_string()));
    }

    #[test]
    fn test_lift_keeps_strings() {
        let lifted = lift(&json!({ "name": OID }));
        assert_eq!(lifted.as_document().unwrap().get_str("name").unwrap(), OID);
    }

    #[test]
    fn test_decode_document_requires_object() {
        let err = decode_document(&json!([1, 2]), "query").unwrap_err();
        assert!(matches!(err, MongoMcpError::Validation(_)));
        assert!(err.to_string().contains("query must be an object"));
    }

    #[test]
    fn test_decode_optional_document() {
        assert!(decode_optional_document(None, "projection").unwrap().is_none());
        assert!(decode_optional_document(Some(&json!(null)), "projection").unwrap().is_none());
        let doc = decode_optional_document(Some(&json!({ "a": 1 })), "projection")
            .unwrap()
            .unwrap();
        assert_eq!(doc.get_i32("a").unwrap(), 1);
    }

    #[test]
    fn test_decode_documents() {
        let docs = decode_documents(&json!([{ "a": 1 }, { "b": OID }]), "documents").unwrap();
        assert_eq!(docs.len(), 2);
        assert!(matches!(docs[1].get("b"), Some(Bson::ObjectId(_))));

        let err = decode_documents(&json!([{ "a": 1 }, 3]), "pipeline").unwrap_err();
        assert!(err.to_string().contains("pipeline[1]"));

        let err = decode_documents(&json!({ "a": 1 }), "pipeline").unwrap_err();
        assert!(matches!(err, MongoMcpError::Validation(_)));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn hex_strings_always_decode_to_identifiers(s in "[0-9a-f]{24}") {
                prop_assert!(matches!(decode(&json!(s)), Bson::ObjectId(_)));
            }

            #[test]
            fn uppercase_hex_stays_a_string(s in "[0-9a-fA-F]{23}[A-F]") {
                prop_assert_eq!(decode(&json!(s.clone())), Bson::String(s));
            }

            #[test]
            fn other_lengths_stay_strings(s in "[0-9a-f]{0,23}|[0-9a-f]{25,40}") {
                prop_assert_eq!(decode(&json!(s.clone())), Bson::String(s));
            }

            #[test]
            fn lift_never_produces_identifiers(s in "[0-9a-f]{24}") {
                prop_assert_eq!(lift(&json!(s.clone())), Bson::String(s));
            }

            #[test]
            fn integers_keep_their_value(i in any::<i64>()) {
                match decode(&json!(i)) {
                    Bson::Int32(v) => prop_assert_eq!(i64::from(v), i),
                    Bson::Int64(v) => prop_assert_eq!(v, i),
                    other => prop_assert!(false, "unexpected {:?}", other),
                }
            }
        }
    }
}
