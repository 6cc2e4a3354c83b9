use edgeipc_codec::CodecError;
use edgeipc_frame::FrameError;
use edgeipc_transport::TransportError;

/// Errors that can occur in channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Inference result could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A notification frame is not a valid inline or shared reference.
    #[error("malformed notification: {0}")]
    MalformedNotification(String),

    /// A shared segment holds a different number of bytes than announced.
    #[error("segment {key} holds {actual} bytes, notification announced {expected}")]
    PayloadMismatch {
        key: i32,
        expected: usize,
        actual: usize,
    },
}

/// Coarse classification callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An accept, read or write deadline elapsed.
    Timeout,
    /// The peer closed the stream before a frame was complete.
    Truncated,
    /// The socket path is occupied by something that could not be removed.
    PathConflict,
    /// A shared-memory key is already taken.
    AlreadyExists,
    /// No shared-memory segment exists for a key.
    NotFound,
    /// A payload is structurally invalid.
    MalformedBuffer,
    /// A size header, payload or frame does not fit its container.
    SizeMismatch,
    /// Any other operating-system or stream failure.
    Io,
}

impl ChannelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(err) => transport_kind(err),
            Self::Frame(err) => frame_kind(err),
            Self::Codec(_) | Self::MalformedNotification(_) => ErrorKind::MalformedBuffer,
            Self::PayloadMismatch { .. } => ErrorKind::SizeMismatch,
        }
    }
}

fn transport_kind(err: &TransportError) -> ErrorKind {
    match err {
        TransportError::Timeout(_) => ErrorKind::Timeout,
        TransportError::PathConflict { .. } => ErrorKind::PathConflict,
        TransportError::SegmentExists { .. } => ErrorKind::AlreadyExists,
        TransportError::SegmentNotFound { .. } => ErrorKind::NotFound,
        TransportError::SegmentSize { .. } => ErrorKind::SizeMismatch,
        TransportError::KeyPath { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
            ErrorKind::NotFound
        }
        TransportError::Io(io) if is_timeout(io) => ErrorKind::Timeout,
        _ => ErrorKind::Io,
    }
}

fn frame_kind(err: &FrameError) -> ErrorKind {
    match err {
        FrameError::Timeout => ErrorKind::Timeout,
        FrameError::Truncated { .. } => ErrorKind::Truncated,
        FrameError::PayloadTooLarge { .. } => ErrorKind::SizeMismatch,
        FrameError::Io(io) if is_timeout(io) => ErrorKind::Timeout,
        FrameError::Io(_) | FrameError::ConnectionClosed => ErrorKind::Io,
    }
}

fn is_timeout(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

pub type Result<T> = std::result::Result<T, ChannelError>;

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;

    #[test]
    fn transport_errors_classify() {
        let cases = [
            (
                TransportError::Timeout(Duration::from_secs(1)),
                ErrorKind::Timeout,
            ),
            (
                TransportError::PathConflict {
                    path: PathBuf::from("/tmp/x"),
                    source: std::io::Error::other("busy"),
                },
                ErrorKind::PathConflict,
            ),
            (TransportError::SegmentExists { key: 7 }, ErrorKind::AlreadyExists),
            (TransportError::SegmentNotFound { key: 7 }, ErrorKind::NotFound),
            (
                TransportError::SegmentSize {
                    key: 7,
                    size: 20,
                    capacity: 10,
                },
                ErrorKind::SizeMismatch,
            ),
            (
                TransportError::KeyPath {
                    path: PathBuf::from("/tmp/missing"),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                },
                ErrorKind::NotFound,
            ),
            (
                TransportError::PathTooLong {
                    path: PathBuf::from("/tmp/x"),
                    len: 200,
                    max: 108,
                },
                ErrorKind::Io,
            ),
        ];

        for (err, kind) in cases {
            assert_eq!(ChannelError::from(err).kind(), kind);
        }
    }

    #[test]
    fn frame_errors_classify() {
        assert_eq!(
            ChannelError::from(FrameError::Truncated {
                expected: 10,
                received: 3
            })
            .kind(),
            ErrorKind::Truncated
        );
        assert_eq!(
            ChannelError::from(FrameError::Timeout).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(
            ChannelError::from(FrameError::ConnectionClosed).kind(),
            ErrorKind::Io
        );
        assert_eq!(
            ChannelError::from(FrameError::Io(std::io::Error::from(
                std::io::ErrorKind::WouldBlock
            )))
            .kind(),
            ErrorKind::Timeout
        );
    }

    #[test]
    fn payload_errors_classify() {
        let codec = CodecError::MalformedBuffer {
            key: "Identity".to_string(),
            len: 3,
        };
        assert_eq!(ChannelError::from(codec).kind(), ErrorKind::MalformedBuffer);
        assert_eq!(
            ChannelError::PayloadMismatch {
                key: 1,
                expected: 4,
                actual: 2
            }
            .kind(),
            ErrorKind::SizeMismatch
        );
    }
}
