//! Error taxonomy shared by the core tree, the provider clients, and the
//! lifecycle handlers.
//!
//! Every variant is fatal: the invocation fails and the provisioning engine
//! is left to report the failure and retain prior physical state. Transient
//! provider faults are absorbed only by the bounded retry in the client
//! layer; once that is exhausted they surface here as `Transport`.

use thiserror::Error;

/// Errors produced while synthesizing constructs or handling lifecycle
/// events.
#[derive(Debug, Error)]
pub enum Error {
    /// A scope has no enclosing stack to attach singletons to.
    #[error("no enclosing Stack found for scope '{0}'")]
    Scope(String),

    /// Malformed request properties, invalid domain, disallowed rename.
    #[error("validation error: {0}")]
    Validation(String),

    /// No hosted zone or machine image matched the search.
    #[error("not found: {0}")]
    NotFound(String),

    /// The provider returned a response shape we cannot act on.
    #[error("unexpected provider state: {0}")]
    ExternalState(String),

    /// HTTP transport failure after client-level retries were exhausted.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Event envelope or property serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for errors a retried Delete may ignore (the resource is
    /// already gone).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
