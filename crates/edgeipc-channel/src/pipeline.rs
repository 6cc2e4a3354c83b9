//! Producer/consumer flow for inference results.
//!
//! Publishing is one request/response pair: the producer sends a
//! [`Notification`] and waits for an empty acknowledgement frame. A shared
//! segment stays alive until that acknowledgement arrives (or the wait
//! fails) and is released afterwards.

use std::path::Path;

use bytes::Bytes;
use edgeipc_codec::InferenceResult;
use tracing::debug;

use crate::config::ChannelConfig;
use crate::error::{ChannelError, Result};
use crate::notification::Notification;
use crate::shared::SharedMemoryChannel;
use crate::socket::{Connection, SocketServer};

/// Sends inference results to a consumer socket.
#[derive(Debug, Default)]
pub struct Producer {
    config: ChannelConfig,
    segments: SharedMemoryChannel,
}

impl Producer {
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            config,
            segments: SharedMemoryChannel::new(),
        }
    }

    /// Encode `result` and deliver it to the consumer at `path`.
    ///
    /// Returns the notification that was sent.
    pub fn publish(
        &mut self,
        path: impl AsRef<Path>,
        result: &InferenceResult,
    ) -> Result<Notification> {
        let encoded = edgeipc_codec::encode(result)?;
        self.publish_encoded(path, Bytes::from(encoded))
    }

    /// Deliver an already encoded result.
    pub fn publish_encoded(
        &mut self,
        path: impl AsRef<Path>,
        encoded: Bytes,
    ) -> Result<Notification> {
        if encoded.len() <= self.config.inline_threshold {
            let notification = Notification::Inline(encoded);
            self.exchange(path.as_ref(), &notification)?;
            return Ok(notification);
        }

        let size = u32::try_from(encoded.len()).map_err(|_| {
            ChannelError::Frame(edgeipc_frame::FrameError::PayloadTooLarge {
                size: encoded.len(),
                max: u32::MAX as usize,
            })
        })?;
        let key = self.segments.allocate(encoded.len())?;
        let notification = Notification::Shared { key, size };

        let delivered = self
            .segments
            .write(key, &encoded)
            .and_then(|()| self.exchange(path.as_ref(), &notification));
        let released = self.segments.release(key);
        delivered?;
        released?;
        Ok(notification)
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    fn exchange(&self, path: &Path, notification: &Notification) -> Result<()> {
        let mut conn = Connection::connect(path, &self.config)?;
        conn.send_frame(&notification.encode())?;

        let ack = conn.receive_frame(self.config.timeout)?;
        if !ack.is_empty() {
            return Err(ChannelError::MalformedNotification(format!(
                "acknowledgement carries {} bytes",
                ack.len()
            )));
        }
        debug!(shared = notification.is_shared(), "result acknowledged");
        conn.close()
    }
}

/// A notification and the encoded result it resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    pub notification: Notification,
    pub payload: Bytes,
}

impl Received {
    /// Decode the payload as an inference result.
    pub fn decode(&self) -> Result<InferenceResult> {
        Ok(edgeipc_codec::decode(&self.payload)?)
    }
}

/// Receives inference results on a [`SocketServer`].
#[derive(Debug, Default)]
pub struct Consumer {
    config: ChannelConfig,
}

impl Consumer {
    pub fn new(config: ChannelConfig) -> Self {
        Self { config }
    }

    /// Accept one producer, decode its result and acknowledge it.
    pub fn receive(&self, server: &SocketServer) -> Result<InferenceResult> {
        let mut conn = server.accept_one(self.config.timeout)?;
        let received = self.receive_from(&mut conn)?;
        let result = received.decode()?;
        Self::acknowledge(&mut conn)?;
        Ok(result)
    }

    /// Read one notification from `conn` and resolve its payload.
    ///
    /// Does not acknowledge.
    pub fn receive_from(&self, conn: &mut Connection) -> Result<Received> {
        let frame = conn.receive_frame(self.config.timeout)?;
        let notification = Notification::parse(frame)?;
        let payload = notification.resolve()?;
        debug!(
            shared = notification.is_shared(),
            len = payload.len(),
            "resolved notification"
        );
        Ok(Received {
            notification,
            payload,
        })
    }

    /// Tell the producer its result was received.
    pub fn acknowledge(conn: &mut Connection) -> Result<()> {
        conn.send_frame(&[])
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::thread;
    use std::time::Duration;

    use edgeipc_codec::Value;

    use super::*;
    use crate::error::ErrorKind;
    use crate::shared::read_by_key;
    use crate::socket::create_server;

    fn make_sock_path(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "edgeipc-pipe-{}-{}-{}",
            tag,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir.join("consumer.sock")
    }

    fn sample() -> InferenceResult {
        let mut result = InferenceResult::new();
        result.insert("Frame", Value::from(42u64)).unwrap();
        result.set_bboxes(BTreeMap::from([(
            "cat".to_string(),
            vec![1.0, 2.0, 3.0, 4.0],
        )]));
        result.set_identity(vec![0.5; 128]);
        result
    }

    fn roundtrip(tag: &str, config: ChannelConfig) -> (Notification, InferenceResult) {
        let sock_path = make_sock_path(tag);
        let server = create_server(&sock_path).expect("server should bind");

        let consumer_config = config.clone();
        let handle = thread::spawn(move || {
            Consumer::new(consumer_config)
                .receive(&server)
                .expect("consumer should receive")
        });

        let mut producer = Producer::new(config);
        let notification = producer
            .publish(&sock_path, &sample())
            .expect("publish should succeed");
        let received = handle.join().expect("consumer thread should finish");

        if let Some(parent) = sock_path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
        (notification, received)
    }

    #[test]
    fn small_result_travels_inline() {
        let (notification, received) = roundtrip("inline", ChannelConfig::default());
        assert!(!notification.is_shared());
        assert_eq!(received, sample());
    }

    #[test]
    fn large_result_travels_through_shared_memory() {
        let config = ChannelConfig {
            inline_threshold: 0,
            ..ChannelConfig::default()
        };
        let (notification, received) = roundtrip("shared", config);

        let Notification::Shared { key, .. } = notification else {
            panic!("expected shared notification");
        };
        assert_eq!(received, sample());
        assert_eq!(read_by_key(key).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn segment_released_when_consumer_never_acks() {
        let sock_path = make_sock_path("noack");
        let server = create_server(&sock_path).expect("server should bind");

        let handle = thread::spawn(move || {
            let mut conn = server.accept_one(Duration::from_secs(5)).unwrap();
            let frame = conn.receive_frame(Duration::from_secs(5)).unwrap();
            Notification::parse(frame).unwrap()
        });

        let mut producer = Producer::new(ChannelConfig {
            inline_threshold: 0,
            timeout: Duration::from_secs(2),
            ..ChannelConfig::default()
        });
        let err = producer.publish(&sock_path, &sample()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Io | ErrorKind::Timeout));

        let Notification::Shared { key, .. } = handle.join().unwrap() else {
            panic!("expected shared notification");
        };
        assert_eq!(read_by_key(key).unwrap_err().kind(), ErrorKind::NotFound);
        assert!(producer.segments.live_keys().is_empty());

        if let Some(parent) = sock_path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn consumer_rejects_malformed_payload() {
        let sock_path = make_sock_path("garbage");
        let server = create_server(&sock_path).expect("server should bind");

        let handle = thread::spawn(move || {
            Consumer::new(ChannelConfig::with_timeout(Duration::from_secs(5)))
                .receive(&server)
                .unwrap_err()
        });

        crate::socket::connect_and_send(&sock_path, &[0xc1], Duration::from_secs(5)).unwrap();
        let err = handle.join().unwrap();
        assert_eq!(err.kind(), ErrorKind::MalformedBuffer);

        if let Some(parent) = sock_path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }
}
