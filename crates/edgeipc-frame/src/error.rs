/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the connection before any byte of a frame arrived.
    #[error("connection closed")]
    ConnectionClosed,

    /// The peer closed the connection before the declared length arrived.
    #[error("truncated frame: expected {expected} bytes, received {received}")]
    Truncated { expected: usize, received: usize },

    /// The stream's read or write timeout elapsed.
    #[error("frame I/O timed out")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, FrameError>;
