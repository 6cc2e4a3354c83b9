use std::time::Duration;

/// Errors that can occur when talking to the control plane.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// No response arrived within the configured timeout.
    #[error("no response from {url} after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    /// The request could not be sent or its body could not be read.
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    /// The response body is not valid JSON.
    #[error("invalid JSON from {url}: {source}")]
    Json {
        url: String,
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ControlError>;
