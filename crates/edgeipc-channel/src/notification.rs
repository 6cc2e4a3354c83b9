//! The control frame a producer sends to announce a result.
//!
//! Small results travel inline: the frame payload is the encoded MessagePack
//! map itself. Larger ones are written to a shared segment and announced by a
//! 9-byte reference:
//!
//! ```text
//! +------+-----------+------------+
//! | 0x01 | key i32LE | size u32LE |
//! +------+-----------+------------+
//! ```
//!
//! A MessagePack map never starts with `0x01`, so the first byte tells the
//! two forms apart.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{ChannelError, Result};
use crate::shared::read_by_key;

/// First byte of a shared-segment reference.
pub const SHARED_MARKER: u8 = 0x01;

/// Wire length of a shared-segment reference.
pub const SHARED_REFERENCE_LEN: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The encoded result itself.
    Inline(Bytes),
    /// The encoded result lives in the shared segment `key`.
    Shared { key: i32, size: u32 },
}

impl Notification {
    /// Serialize for use as a frame payload.
    pub fn encode(&self) -> Bytes {
        match self {
            Self::Inline(payload) => payload.clone(),
            Self::Shared { key, size } => {
                let mut buf = BytesMut::with_capacity(SHARED_REFERENCE_LEN);
                buf.put_u8(SHARED_MARKER);
                buf.put_i32_le(*key);
                buf.put_u32_le(*size);
                buf.freeze()
            }
        }
    }

    /// Parse a received frame payload.
    pub fn parse(payload: Bytes) -> Result<Self> {
        if payload.first() != Some(&SHARED_MARKER) {
            return Ok(Self::Inline(payload));
        }
        if payload.len() != SHARED_REFERENCE_LEN {
            return Err(ChannelError::MalformedNotification(format!(
                "shared reference is {} bytes, expected {SHARED_REFERENCE_LEN}",
                payload.len()
            )));
        }

        let mut buf = &payload[1..];
        let key = buf.get_i32_le();
        let size = buf.get_u32_le();
        Ok(Self::Shared { key, size })
    }

    /// Fetch the encoded result, reading the shared segment if referenced.
    pub fn resolve(&self) -> Result<Bytes> {
        match self {
            Self::Inline(payload) => Ok(payload.clone()),
            Self::Shared { key, size } => {
                let payload = read_by_key(*key)?;
                if payload.len() != *size as usize {
                    return Err(ChannelError::PayloadMismatch {
                        key: *key,
                        expected: *size as usize,
                        actual: payload.len(),
                    });
                }
                Ok(payload)
            }
        }
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, Self::Shared { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::shared::SharedMemoryChannel;

    #[test]
    fn shared_reference_layout() {
        let encoded = Notification::Shared {
            key: 0x0102_0304,
            size: 10,
        }
        .encode();
        assert_eq!(
            encoded.as_ref(),
            [0x01, 0x04, 0x03, 0x02, 0x01, 0x0a, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            Notification::parse(encoded).unwrap(),
            Notification::Shared {
                key: 0x0102_0304,
                size: 10
            }
        );
    }

    #[test]
    fn negative_keys_survive() {
        let note = Notification::Shared { key: -42, size: 0 };
        assert_eq!(Notification::parse(note.encode()).unwrap(), note);
    }

    #[test]
    fn map_payload_is_inline() {
        let payload = Bytes::from_static(&[0x81, 0xa1, b'a', 0x01]);
        let note = Notification::parse(payload.clone()).unwrap();
        assert_eq!(note, Notification::Inline(payload.clone()));
        assert!(!note.is_shared());
        assert_eq!(note.resolve().unwrap(), payload);
    }

    #[test]
    fn empty_payload_is_inline() {
        assert_eq!(
            Notification::parse(Bytes::new()).unwrap(),
            Notification::Inline(Bytes::new())
        );
    }

    #[test]
    fn short_reference_is_malformed() {
        let err = Notification::parse(Bytes::from_static(&[0x01, 0x02, 0x03])).unwrap_err();
        assert!(matches!(err, ChannelError::MalformedNotification(_)));
        assert_eq!(err.kind(), ErrorKind::MalformedBuffer);
    }

    #[test]
    fn resolves_shared_segment() {
        let mut channel = SharedMemoryChannel::new();
        let key = channel.allocate(16).unwrap();
        channel.write(key, b"result").unwrap();

        let note = Notification::Shared { key, size: 6 };
        assert_eq!(note.resolve().unwrap().as_ref(), b"result");

        let wrong = Notification::Shared { key, size: 7 };
        let err = wrong.resolve().unwrap_err();
        assert!(matches!(
            err,
            ChannelError::PayloadMismatch {
                expected: 7,
                actual: 6,
                ..
            }
        ));
    }
}
