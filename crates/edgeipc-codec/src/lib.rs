//! MessagePack codec for edge inference results.
//!
//! An inference result is a string-keyed MessagePack map. Two keys are
//! reserved and carry packed little-endian float32 buffers:
//!
//! - `BBoxes_xyxy`: a map of class label to `x1,y1,x2,y2` box coordinates
//! - `Identity`: a single embedding vector
//!
//! [`decode`] unpacks those buffers into float arrays and [`encode`] packs
//! them back. Every other key passes through unchanged.

pub mod codec;
pub mod error;
pub mod floats;
pub mod json;
pub mod map;
pub mod result;

pub use codec::{decode, encode};
pub use error::{CodecError, Result};
pub use floats::{pack_floats, unpack_floats};
pub use json::{from_json, json_to_value, to_json, value_to_json};
pub use map::{decode_map, encode_map};
pub use result::{BoundingBox, Field, InferenceResult, BBOXES_KEY, IDENTITY_KEY};

pub use rmpv::Value;
