//! Local transport primitives for the edge inference IPC stack.
//!
//! Mechanisms provided here:
//! - Unix domain sockets for control messages ([`UnixDomainSocket`], [`IpcStream`])
//! - System V shared-memory segments for bulk payloads ([`SharedSegment`])
//! - one-byte pipe signals announcing a written segment ([`signal_pipe`])
//!
//! This is the lowest layer of edgeipc. Framing, the inference-result codec and
//! the producer/consumer flow all build on the types provided here.

pub mod error;
pub mod shm;
pub mod signal;
pub mod traits;
pub mod uds;

pub use error::{Result, TransportError};
pub use shm::{
    key_for_path, read_by_key, remove_by_key, segment_capacity, SharedSegment, HEADER_BYTES,
};
pub use signal::{signal_pipe, SignalReceiver, SignalSender};
pub use traits::IpcStream;
pub use uds::UnixDomainSocket;
