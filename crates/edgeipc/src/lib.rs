//! Transport between an edge inference runtime and local consumer processes.
//!
//! # Crate Structure
//!
//! - [`transport`]: Unix domain sockets and System V shared-memory segments
//! - [`frame`]: 4-byte little-endian length-prefixed framing
//! - [`codec`]: MessagePack inference results with packed float32 fields
//! - [`channel`]: socket server/client, shared-memory registry, producer/consumer
//! - [`control`]: blocking HTTP client for the runtime's control plane

/// Re-export transport types.
pub mod transport {
    pub use edgeipc_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use edgeipc_frame::*;
}

/// Re-export codec types.
pub mod codec {
    pub use edgeipc_codec::*;
}

/// Re-export channel types.
pub mod channel {
    pub use edgeipc_channel::*;
}

/// Re-export control-plane types.
pub mod control {
    pub use edgeipc_control::*;
}
