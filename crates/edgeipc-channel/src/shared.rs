use std::collections::HashMap;

use bytes::Bytes;
use edgeipc_transport::{SharedSegment, TransportError};
use tracing::debug;

use crate::error::Result;

/// Producer-side registry of shared segments.
///
/// Every segment allocated here is destroyed by [`release`](Self::release) or
/// when the registry is dropped.
#[derive(Debug, Default)]
pub struct SharedMemoryChannel {
    segments: HashMap<i32, SharedSegment>,
}

impl SharedMemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a segment for `size` payload bytes under a fresh key.
    pub fn allocate(&mut self, size: usize) -> Result<i32> {
        let segment = SharedSegment::create(size)?;
        Ok(self.track(segment))
    }

    /// Create a segment under `key`; fails if the key is taken.
    pub fn allocate_with_key(&mut self, key: i32, size: usize) -> Result<i32> {
        let segment = SharedSegment::create_with_key(key, size)?;
        Ok(self.track(segment))
    }

    /// Write `data` into the tracked segment `key`.
    pub fn write(&self, key: i32, data: &[u8]) -> Result<()> {
        self.segment(key)?.write(data)?;
        Ok(())
    }

    /// Payload capacity of the tracked segment `key`.
    pub fn capacity(&self, key: i32) -> Result<usize> {
        Ok(self.segment(key)?.capacity())
    }

    /// Destroy the tracked segment `key`.
    pub fn release(&mut self, key: i32) -> Result<()> {
        let segment = self
            .segments
            .remove(&key)
            .ok_or(TransportError::SegmentNotFound { key })?;
        segment.destroy()?;
        Ok(())
    }

    /// Stop tracking `key` without destroying it.
    pub fn persist(&mut self, key: i32) -> Result<i32> {
        let segment = self
            .segments
            .remove(&key)
            .ok_or(TransportError::SegmentNotFound { key })?;
        Ok(segment.into_key())
    }

    /// Keys currently owned by this registry, ascending.
    pub fn live_keys(&self) -> Vec<i32> {
        let mut keys: Vec<i32> = self.segments.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    fn track(&mut self, segment: SharedSegment) -> i32 {
        let key = segment.key();
        self.segments.insert(key, segment);
        key
    }

    fn segment(&self, key: i32) -> Result<&SharedSegment> {
        Ok(self
            .segments
            .get(&key)
            .ok_or(TransportError::SegmentNotFound { key })?)
    }
}

impl Drop for SharedMemoryChannel {
    fn drop(&mut self) {
        for (key, segment) in self.segments.drain() {
            if let Err(err) = segment.destroy() {
                debug!(key, error = %err, "failed to release shared segment");
            }
        }
    }
}

/// Consumer side: copy the payload out of segment `key`.
pub fn read_by_key(key: i32) -> Result<Bytes> {
    Ok(Bytes::from(edgeipc_transport::read_by_key(key)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn write_then_read_exact() {
        let mut channel = SharedMemoryChannel::new();
        let key = channel.allocate(10).unwrap();
        channel.write(key, b"0123456789").unwrap();

        assert_eq!(read_by_key(key).unwrap().as_ref(), b"0123456789");
        assert_eq!(channel.capacity(key).unwrap(), 10);
    }

    #[test]
    fn oversize_write_rejected() {
        let mut channel = SharedMemoryChannel::new();
        let key = channel.allocate(4).unwrap();
        let err = channel.write(key, b"too long").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SizeMismatch);
    }

    #[test]
    fn unknown_key_is_not_found() {
        let mut channel = SharedMemoryChannel::new();
        assert_eq!(channel.write(12345, b"x").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(channel.release(12345).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn release_destroys_segment() {
        let mut channel = SharedMemoryChannel::new();
        let key = channel.allocate(8).unwrap();
        assert_eq!(channel.live_keys(), vec![key]);

        channel.release(key).unwrap();
        assert!(channel.live_keys().is_empty());
        assert_eq!(read_by_key(key).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn duplicate_key_already_exists() {
        let mut channel = SharedMemoryChannel::new();
        let key = channel.allocate(8).unwrap();
        let err = channel.allocate_with_key(key, 8).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn drop_releases_everything() {
        let mut channel = SharedMemoryChannel::new();
        let first = channel.allocate(8).unwrap();
        let second = channel.allocate(8).unwrap();
        drop(channel);

        assert_eq!(read_by_key(first).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(read_by_key(second).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn persisted_segment_outlives_registry() {
        let mut channel = SharedMemoryChannel::new();
        let key = channel.allocate(8).unwrap();
        channel.write(key, b"kept").unwrap();
        channel.persist(key).unwrap();
        drop(channel);

        assert_eq!(read_by_key(key).unwrap().as_ref(), b"kept");
        edgeipc_transport::remove_by_key(key).unwrap();
    }
}
