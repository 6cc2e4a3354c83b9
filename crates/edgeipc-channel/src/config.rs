use std::time::Duration;

use edgeipc_frame::{FrameConfig, DEFAULT_MAX_PAYLOAD};
use edgeipc_transport::UnixDomainSocket;

/// Default deadline for accepting, reading and writing.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Encoded results up to this size travel inside the notification frame.
pub const DEFAULT_INLINE_THRESHOLD: usize = 64 * 1024;

/// Channel behavior shared by servers, clients and the producer/consumer pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Deadline for each accept, frame read and frame write.
    pub timeout: Duration,
    /// Largest frame payload accepted from a peer.
    pub max_payload_size: usize,
    /// Permission bits applied to a newly bound socket file.
    ///
    /// Defaults to owner-only (`0o600`). A producer running as a different
    /// user cannot connect unless this is widened, e.g. to `0o666`.
    pub socket_mode: u32,
    /// Encoded results larger than this go through shared memory.
    pub inline_threshold: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            socket_mode: UnixDomainSocket::DEFAULT_SOCKET_MODE,
            inline_threshold: DEFAULT_INLINE_THRESHOLD,
        }
    }
}

impl ChannelConfig {
    /// Copy of the default config with a different timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    pub(crate) fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_payload_size: self.max_payload_size,
            read_timeout: Some(clamp_timeout(self.timeout)),
            write_timeout: Some(clamp_timeout(self.timeout)),
        }
    }
}

/// Options for [`serve`](crate::socket::serve).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeOptions {
    /// How long each accept waits before re-checking the running flag.
    pub accept_timeout: Duration,
    /// Deadline for reading a request frame from an accepted client.
    pub receive_timeout: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            accept_timeout: Duration::from_millis(500),
            receive_timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Sockets reject a zero timeout; use the smallest nonzero deadline instead.
pub(crate) fn clamp_timeout(timeout: Duration) -> Duration {
    timeout.max(Duration::from_millis(1))
}
