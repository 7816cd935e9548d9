//! JSON <-> Firestore typed value conversion
//!
//! Firestore documents carry `fields` as tagged values (`stringValue`,
//! `integerValue`, `mapValue`, ...). Deals are serialized to plain JSON first
//! and then encoded here, so the persisted document keeps the same flat shape
//! as the file store and the HTTP API.

use crate::error::{Error, Result};
use serde_json::{json, Map, Number, Value};

/// Encode a JSON object into a Firestore `fields` map
pub fn encode_fields(object: &Map<String, Value>) -> Map<String, Value> {
    object
        .iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect()
}

/// Encode one JSON value as a Firestore value
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({ "integerValue": i.to_string() })
            } else if let Some(u) = n.as_u64() {
                json!({ "integerValue": u.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64().unwrap_or_default() })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Decode a Firestore `fields` map into a JSON object
pub fn decode_fields(fields: &Map<String, Value>) -> Result<Map<String, Value>> {
    fields
        .iter()
        .map(|(k, v)| Ok((k.clone(), decode_value(v)?)))
        .collect()
}

/// Decode one Firestore value
pub fn decode_value(value: &Value) -> Result<Value> {
    let tagged = value
        .as_object()
        .and_then(|m| m.iter().next())
        .ok_or_else(|| malformed("expected a tagged value", value))?;

    match (tagged.0.as_str(), tagged.1) {
        ("nullValue", _) => Ok(Value::Null),
        ("booleanValue", Value::Bool(b)) => Ok(Value::Bool(*b)),
        ("integerValue", raw) => {
            let parsed = match raw {
                Value::String(s) => s.parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            };
            parsed
                .map(|i| Value::Number(i.into()))
                .ok_or_else(|| malformed("bad integerValue", value))
        }
        ("doubleValue", raw) => raw
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| malformed("bad doubleValue", value)),
        ("stringValue", Value::String(s))
        | ("timestampValue", Value::String(s))
        | ("bytesValue", Value::String(s))
        | ("referenceValue", Value::String(s)) => Ok(Value::String(s.clone())),
        ("arrayValue", inner) => {
            let values = match inner.get("values") {
                Some(Value::Array(items)) => items
                    .iter()
                    .map(decode_value)
                    .collect::<Result<Vec<_>>>()?,
                _ => Vec::new(),
            };
            Ok(Value::Array(values))
        }
        ("mapValue", inner) => {
            let fields = match inner.get("fields") {
                Some(Value::Object(fields)) => decode_fields(fields)?,
                _ => Map::new(),
            };
            Ok(Value::Object(fields))
        }
        _ => Err(malformed("unsupported value type", value)),
    }
}

fn malformed(reason: &str, value: &Value) -> Error {
    Error::Storage(format!("Malformed Firestore value ({}): {}", reason, value))
}
