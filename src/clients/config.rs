//! Provider client configuration.
//!
//! Each client receives an explicit configuration at construction time;
//! there is no process-global provider state. Retry behavior is a bounded
//! attempt count with a fixed base delay, applied uniformly by
//! [`super::retry::with_retries`].

use std::time::Duration;

use crate::error::Result;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default maximum attempts per provider call (1 initial + 9 retries).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default fixed delay between retry attempts.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Configuration for a provider API client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the provider API, without a trailing slash.
    pub base_url: String,
    /// Bearer token presented on every request.
    pub api_token: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum attempts per call before the transport error surfaces.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub retry_base_delay: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> ClientConfig {
        ClientConfig {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: api_token.into(),
            timeout: DEFAULT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> ClientConfig {
        self.timeout = timeout;
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> ClientConfig {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn retry_base_delay(mut self, delay: Duration) -> ClientConfig {
        self.retry_base_delay = delay;
        self
    }

    /// Build the underlying HTTP client.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        Ok(reqwest::Client::builder().timeout(self.timeout).build()?)
    }
}
