//! Fixed-interval polling against eventually-consistent provider state.
//!
//! Each poll loop is an explicit policy (interval plus iteration budget)
//! and an injectable sleeper, so tests drive convergence with a fake
//! clock and a finite response script. The default budget is unbounded:
//! in production the invocation's own execution-time ceiling is the only
//! cancellation mechanism.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Error, Result};

/// How a convergence loop waits.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    /// Fixed delay between checks.
    pub interval: Duration,
    /// Maximum number of checks; `None` means unbounded.
    pub budget: Option<u32>,
}

impl PollPolicy {
    /// Unbounded polling at a fixed interval.
    pub fn fixed(interval: Duration) -> PollPolicy {
        PollPolicy {
            interval,
            budget: None,
        }
    }

    /// Bounded polling, for tests and cautious callers.
    pub fn bounded(interval: Duration, budget: u32) -> PollPolicy {
        PollPolicy {
            interval,
            budget: Some(budget),
        }
    }
}

/// Suspension point between poll iterations.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the runtime timer.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Run `check` until it yields a value, sleeping the policy interval
/// between iterations. Budget exhaustion means the external system never
/// converged within the allowed checks.
pub async fn poll_until<T, F, Fut>(
    policy: &PollPolicy,
    sleeper: &dyn Sleeper,
    what: &str,
    mut check: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let mut iterations = 0u32;
    loop {
        if let Some(value) = check().await? {
            return Ok(value);
        }
        iterations += 1;
        if let Some(budget) = policy.budget {
            if iterations >= budget {
                return Err(Error::ExternalState(format!(
                    "{what}: not converged after {budget} checks"
                )));
            }
        }
        debug!(what, iterations, "still pending");
        sleeper.sleep(policy.interval).await;
    }
}
