//! Conversion between JSON documents and inference results.
//!
//! JSON numbers map to unsigned, signed or double MessagePack values in that
//! order of preference. Reserved keys take plain number arrays on the JSON
//! side.

use std::collections::BTreeMap;

use rmpv::Value;
use serde_json::{Map, Number, Value as Json};

use crate::error::{CodecError, Result};
use crate::result::{Field, InferenceResult, BBOXES_KEY, IDENTITY_KEY};

/// Build an inference result from a JSON object.
pub fn from_json(doc: Json) -> Result<InferenceResult> {
    let Json::Object(object) = doc else {
        return Err(CodecError::NotAMap);
    };

    let mut result = InferenceResult::new();
    for (key, value) in object {
        match key.as_str() {
            BBOXES_KEY => {
                let Json::Object(labels) = value else {
                    return Err(CodecError::Json(format!(
                        "{BBOXES_KEY} must be an object of label to number array"
                    )));
                };
                let mut boxes = BTreeMap::new();
                for (label, coords) in labels {
                    let values = json_floats(&format!("{BBOXES_KEY}.{label}"), coords)?;
                    boxes.insert(label, values);
                }
                result.set_bboxes(boxes);
            }
            IDENTITY_KEY => {
                result.set_identity(json_floats(IDENTITY_KEY, value)?);
            }
            _ => {
                result.insert(key, json_to_value(value))?;
            }
        }
    }
    Ok(result)
}

/// Render an inference result as JSON.
///
/// Binary values become arrays of byte values; non-finite floats become `null`.
pub fn to_json(result: &InferenceResult) -> Json {
    let mut object = Map::new();
    for (key, field) in result.iter() {
        let rendered = match field {
            Field::Opaque(value) => value_to_json(value),
            Field::Floats(values) => floats_to_json(values),
            Field::LabeledFloats(boxes) => Json::Object(
                boxes
                    .iter()
                    .map(|(label, values)| (label.clone(), floats_to_json(values)))
                    .collect(),
            ),
        };
        object.insert(key.to_string(), rendered);
    }
    Json::Object(object)
}

/// Convert a JSON value into a MessagePack value.
pub fn json_to_value(json: Json) -> Value {
    match json {
        Json::Null => Value::Nil,
        Json::Bool(b) => Value::Boolean(b),
        Json::Number(n) => {
            if let Some(u) = n.as_u64() {
                Value::from(u)
            } else if let Some(i) = n.as_i64() {
                Value::from(i)
            } else {
                Value::F64(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Json::String(s) => Value::from(s),
        Json::Array(items) => Value::Array(items.into_iter().map(json_to_value).collect()),
        Json::Object(object) => Value::Map(
            object
                .into_iter()
                .map(|(k, v)| (Value::from(k), json_to_value(v)))
                .collect(),
        ),
    }
}

/// Convert a MessagePack value into JSON for display.
pub fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Nil => Json::Null,
        Value::Boolean(b) => Json::Bool(*b),
        Value::Integer(i) => {
            if let Some(u) = i.as_u64() {
                Json::from(u)
            } else if let Some(s) = i.as_i64() {
                Json::from(s)
            } else {
                Json::Null
            }
        }
        Value::F32(f) => float_json(f64::from(*f)),
        Value::F64(f) => float_json(*f),
        Value::String(s) => match s.as_str() {
            Some(text) => Json::String(text.to_string()),
            None => Json::String(String::from_utf8_lossy(s.as_bytes()).into_owned()),
        },
        Value::Binary(bytes) => bytes_json(bytes),
        Value::Array(items) => Json::Array(items.iter().map(value_to_json).collect()),
        Value::Map(pairs) => Json::Object(
            pairs
                .iter()
                .map(|(k, v)| {
                    let key = match k.as_str() {
                        Some(text) => text.to_string(),
                        None => k.to_string(),
                    };
                    (key, value_to_json(v))
                })
                .collect(),
        ),
        Value::Ext(tag, data) => serde_json::json!({ "ext": tag, "data": bytes_json(data) }),
    }
}

fn json_floats(field: &str, json: Json) -> Result<Vec<f32>> {
    let Json::Array(items) = json else {
        return Err(CodecError::Json(format!("{field} must be an array of numbers")));
    };
    items
        .into_iter()
        .map(|item| {
            item.as_f64()
                .map(|v| v as f32)
                .ok_or_else(|| CodecError::Json(format!("{field} contains a non-number")))
        })
        .collect()
}

fn floats_to_json(values: &[f32]) -> Json {
    Json::Array(values.iter().map(|v| float_json(f64::from(*v))).collect())
}

fn float_json(value: f64) -> Json {
    Number::from_f64(value).map(Json::Number).unwrap_or(Json::Null)
}

fn bytes_json(bytes: &[u8]) -> Json {
    Json::Array(bytes.iter().map(|b| Json::from(*b)).collect())
}
