//! Channels for delivering edge inference results to a local consumer.
//!
//! This is the layer integrators use. A [`SocketServer`] accepts one
//! [`Connection`] at a time and exchanges length-prefixed frames with it.
//! Results too large to send inline go through a [`SharedMemoryChannel`]
//! segment and are announced with a [`Notification`]. [`Producer`] and
//! [`Consumer`] wire the two together.

pub mod config;
pub mod error;
pub mod notification;
pub mod pipeline;
pub mod shared;
pub mod socket;

pub use config::{ChannelConfig, ServeOptions, DEFAULT_INLINE_THRESHOLD, DEFAULT_TIMEOUT};
pub use error::{ChannelError, ErrorKind, Result};
pub use notification::{Notification, SHARED_MARKER, SHARED_REFERENCE_LEN};
pub use pipeline::{Consumer, Producer, Received};
pub use shared::{read_by_key, SharedMemoryChannel};
pub use socket::{
    connect_and_send, connect_send_with_trailer, create_server, request, serve,
    serve_connections, Connection, SocketServer,
};
