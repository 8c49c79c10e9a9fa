//! Provider API clients.
//!
//! One trait per provider surface, so handlers can be exercised against
//! in-memory fakes, plus a reqwest-backed implementation per trait. The
//! HTTP implementations all speak the same bearer-token JSON envelope:
//! `{ "success": bool, "errors": [..], "result": .. }`.

pub mod certs;
pub mod config;
pub mod dns;
pub mod email;
pub mod iam;
pub mod images;
pub mod retry;
pub mod secrets;

pub use config::ClientConfig;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<ApiError>,
    pub result: Option<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiError {
    #[serde(default)]
    pub code: i32,
    pub message: String,
}

impl<T> ApiResponse<T> {
    fn failure(&self, what: &str) -> Error {
        let messages: Vec<String> = self.errors.iter().map(|e| e.message.clone()).collect();
        let joined = messages.join(", ");
        let not_found = self
            .errors
            .iter()
            .any(|e| e.code == 404 || e.message.to_ascii_lowercase().contains("not found"));
        if not_found {
            Error::NotFound(format!("{what}: {joined}"))
        } else {
            Error::ExternalState(format!("{what}: {joined}"))
        }
    }

    /// Unwrap a result-bearing envelope.
    pub fn into_result(self, what: &str) -> Result<T> {
        if !self.success {
            return Err(self.failure(what));
        }
        self.result
            .ok_or_else(|| Error::ExternalState(format!("{what}: response carried no result")))
    }

    /// Check success on an envelope whose result is irrelevant.
    pub fn ack(self, what: &str) -> Result<()> {
        if !self.success {
            return Err(self.failure(what));
        }
        Ok(())
    }
}

/// Read a provider response: map HTTP-level failures first, then decode
/// the envelope. An undecodable body is an unexpected provider state, not
/// a retryable transport fault.
pub(crate) async fn read_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
    what: &str,
) -> Result<ApiResponse<T>> {
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(Error::NotFound(format!("{what}: provider returned 404")));
    }
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(Error::ExternalState(format!(
            "{what}: provider returned {status}: {text}"
        )));
    }
    response
        .json::<ApiResponse<T>>()
        .await
        .map_err(|e| Error::ExternalState(format!("{what}: undecodable response: {e}")))
}
