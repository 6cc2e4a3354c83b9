//! Length-prefixed message framing for edge inference IPC.
//!
//! Every message on a connection is framed as a 4-byte little-endian payload
//! length followed by exactly that many payload bytes. A request frame may be
//! followed by one raw trailer whose size both ends know by convention.
//!
//! Readers never hand out short payloads: a peer that disconnects mid-frame
//! yields [`FrameError::Truncated`].

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{decode_frame, encode_frame, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
