//! Control-plane client for the edge inference runtime.
//!
//! The runtime's settings provider exposes a small HTTP surface next to the
//! socket transport: patch settings, start and stop inference, and poll the
//! current settings and status. [`ControlClient`] wraps those endpoints with
//! one blocking request per call.

pub mod client;
pub mod error;

pub use client::{ControlClient, ControlConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
pub use error::{ControlError, Result};
