use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur in socket and shared-memory operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The socket path is occupied by an entry that could not be removed.
    #[error("socket path {path} is occupied: {source}")]
    PathConflict {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// No connection arrived within the deadline.
    #[error("no connection within {0:?}")]
    Timeout(Duration),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// A shared-memory segment already exists for the requested key.
    #[error("shared-memory segment with key {key} already exists")]
    SegmentExists { key: i32 },

    /// No shared-memory segment exists for the key.
    #[error("no shared-memory segment with key {key}")]
    SegmentNotFound { key: i32 },

    /// A size header or payload does not fit the segment.
    #[error("segment {key}: {size} bytes do not fit capacity {capacity}")]
    SegmentSize {
        key: i32,
        size: usize,
        capacity: usize,
    },

    /// No segment key could be derived from a path (`ftok(3)`).
    #[error("cannot derive segment key from {path}: {source}")]
    KeyPath {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A System V shared-memory call failed.
    #[error("{op} failed for segment {key}: {source}")]
    Shm {
        op: &'static str,
        key: i32,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, TransportError>;
