//! Native-to-wire value conversion.
//!
//! Everything a driver call returns passes through [`encode`] before it is
//! handed back to a caller. The output contains only JSON-native values;
//! types JSON cannot carry are rendered as strings.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bson::{Bson, Document};
use chrono::SecondsFormat;
use serde_json::{Map, Number, Value};

/// Convert a BSON value into a JSON-native value.
///
/// Total and idempotent: feeding the output back through the codec and
/// encoding again yields the same JSON.
pub fn encode(value: &Bson) -> Value {
    match value {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Int32(i) => Value::from(*i),
        Bson::Int64(i) => Value::from(*i),
        Bson::Double(f) => encode_double(*f),
        Bson::String(s) => Value::String(s.clone()),
        Bson::Document(doc) => Value::Object(encode_map(doc)),
        Bson::Array(items) => Value::Array(items.iter().map(encode).collect()),
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => Value::String(
            dt.to_chrono()
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        ),
        Bson::Timestamp(ts) => Value::String(format!("Timestamp({}, {})", ts.time, ts.increment)),
        Bson::Binary(bin) => Value::String(BASE64.encode(&bin.bytes)),
        Bson::Decimal128(d) => Value::String(d.to_string()),
        Bson::RegularExpression(re) => Value::String(format!("/{}/{}", re.pattern, re.options)),
        Bson::JavaScriptCode(code) => Value::String(code.clone()),
        Bson::Symbol(sym) => Value::String(sym.clone()),
        Bson::JavaScriptCodeWithScope(_)
        | Bson::DbPointer(_)
        | Bson::MaxKey
        | Bson::MinKey => Value::String(value.to_string()),
    }
}

/// Encode a whole document, preserving field order
pub fn encode_document(doc: &Document) -> Value {
    Value::Object(encode_map(doc))
}

/// Encode a batch of documents into a JSON array
pub fn encode_all(docs: &[Document]) -> Value {
    Value::Array(docs.iter().map(encode_document).collect())
}

/// Encode a list of loose values (e.g. `distinct` output)
pub fn encode_values(values: &[Bson]) -> Value {
    Value::Array(values.iter().map(encode).collect())
}

fn encode_map(doc: &Document) -> Map<String, Value> {
    doc.iter().map(|(k, v)| (k.clone(), encode(v))).collect()
}

fn encode_double(f: f64) -> Value {
    match Number::from_f64(f) {
        Some(n) => Value::Number(n),
        // NaN, inf, -inf
        None => Value::String(f.to_string()),
    }
}
