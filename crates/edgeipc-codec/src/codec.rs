use tracing::trace;

use crate::error::Result;
use crate::map::{decode_map, encode_map};
use crate::result::{pack_field, resolve_field, InferenceResult};

/// Decode a MessagePack inference result.
///
/// `BBoxes_xyxy` and `Identity` buffers are unpacked into float32 arrays;
/// every other key is kept exactly as decoded.
pub fn decode(message: &[u8]) -> Result<InferenceResult> {
    let entries = decode_map(message)?
        .into_iter()
        .map(|(key, value)| {
            let field = resolve_field(&key, value)?;
            Ok((key, field))
        })
        .collect::<Result<Vec<_>>>()?;

    trace!(bytes = message.len(), fields = entries.len(), "decoded inference result");
    Ok(InferenceResult::from_resolved(entries))
}

/// Encode an inference result, packing reserved float fields back into buffers.
pub fn encode(result: &InferenceResult) -> Result<Vec<u8>> {
    let entries = result
        .clone()
        .into_entries()
        .into_iter()
        .map(|(key, field)| (key, pack_field(field)))
        .collect();
    encode_map(entries)
}
