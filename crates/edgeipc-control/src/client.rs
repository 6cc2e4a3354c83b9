use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use tracing::{debug, warn};

use crate::error::{ControlError, Result};

/// Base URL the runtime's settings provider listens on by default.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8081";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlConfig {
    /// Scheme, host and port, without a trailing path.
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Blocking client for the runtime's settings and lifecycle endpoints.
///
/// Every call is a single request with the configured timeout and no retry.
#[derive(Debug, Clone)]
pub struct ControlClient {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl ControlClient {
    pub fn new(config: ControlConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|source| ControlError::Request {
                url: base_url.clone(),
                source,
            })?;
        Ok(Self {
            http,
            base_url,
            timeout: config.timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Form-encode `settings` and `PATCH` them to `/settings`.
    ///
    /// Returns `false` (after logging) on timeout, transport failure or a
    /// non-success status.
    pub fn patch_settings(&self, settings: &BTreeMap<String, String>) -> bool {
        let url = self.url("settings");
        let outcome = self
            .http
            .patch(&url)
            .form(settings)
            .send()
            .map_err(|source| self.request_error(&url, source))
            .and_then(|response| check_status(&url, response));

        match outcome {
            Ok(_) => {
                debug!(%url, fields = settings.len(), "settings patched");
                true
            }
            Err(err) => {
                warn!(error = %err, "settings patch failed");
                false
            }
        }
    }

    /// Ask the runtime to start.
    pub fn start(&self) -> Result<()> {
        self.get("start").map(drop)
    }

    /// Ask the runtime to stop.
    pub fn stop(&self) -> Result<()> {
        self.get("stop").map(drop)
    }

    /// Current runtime settings.
    pub fn settings(&self) -> Result<serde_json::Value> {
        self.get_json("settings")
    }

    /// Current runtime status.
    pub fn status(&self) -> Result<serde_json::Value> {
        self.get_json("status")
    }

    fn get(&self, endpoint: &str) -> Result<Response> {
        let url = self.url(endpoint);
        let response = self
            .http
            .get(&url)
            .send()
            .map_err(|source| self.request_error(&url, source))?;
        check_status(&url, response)
    }

    fn get_json(&self, endpoint: &str) -> Result<serde_json::Value> {
        let url = self.url(endpoint);
        let body = self
            .get(endpoint)?
            .bytes()
            .map_err(|source| self.request_error(&url, source))?;
        serde_json::from_slice(&body).map_err(|source| ControlError::Json { url, source })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base_url)
    }

    fn request_error(&self, url: &str, source: reqwest::Error) -> ControlError {
        if source.is_timeout() {
            ControlError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            }
        } else {
            ControlError::Request {
                url: url.to_string(),
                source,
            }
        }
    }
}

fn check_status(url: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ControlError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}
