//! General string-keyed MessagePack map encoding.
//!
//! This layer knows nothing about reserved keys: values pass through as
//! [`rmpv::Value`] in the order they appear on the wire.

use rmpv::Value;

use crate::error::{CodecError, Result};

/// Parse a MessagePack document whose root is a string-keyed map.
pub fn decode_map(bytes: &[u8]) -> Result<Vec<(String, Value)>> {
    let mut cursor = bytes;
    let root = rmpv::decode::read_value(&mut cursor)?;
    if !cursor.is_empty() {
        return Err(CodecError::TrailingBytes(cursor.len()));
    }

    let Value::Map(pairs) = root else {
        return Err(CodecError::NotAMap);
    };

    pairs
        .into_iter()
        .map(|(key, value)| match key {
            Value::String(s) if s.is_str() => Ok((s.into_str().unwrap_or_default(), value)),
            other => Err(CodecError::NonStringKey(other.to_string())),
        })
        .collect()
}

/// Serialize string-keyed entries as a MessagePack map.
pub fn encode_map(entries: Vec<(String, Value)>) -> Result<Vec<u8>> {
    let root = Value::Map(
        entries
            .into_iter()
            .map(|(key, value)| (Value::from(key), value))
            .collect(),
    );
    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, &root)?;
    Ok(buf)
}
