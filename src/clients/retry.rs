//! Bounded fixed-delay retry for provider calls.
//!
//! Only transport-level failures are retried; validation, not-found, and
//! unexpected-state errors surface immediately. Exhaustion surfaces the
//! last transport error to the invocation.

use std::future::Future;

use tracing::warn;

use crate::clients::config::ClientConfig;
use crate::error::{Error, Result};

fn is_retryable(error: &Error) -> bool {
    matches!(error, Error::Transport(_))
}

/// Run `op` up to `config.max_attempts` times, sleeping the fixed base
/// delay between attempts.
pub async fn with_retries<T, F, Fut>(config: &ClientConfig, op_name: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < config.max_attempts && is_retryable(&error) => {
                warn!(
                    op = op_name,
                    attempt,
                    error = %error,
                    "provider call failed, retrying"
                );
                tokio::time::sleep(config.retry_base_delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
