use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::error::{LedgerError, LedgerResult, StorageError};

/// Upper bound on attempts for one write-and-reconcile cycle.
pub const MAX_ATTEMPTS: u32 = 3;

/// Re-runs a whole write-and-reconcile cycle when storage reports a conflict,
/// with exponential backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(MAX_ATTEMPTS, Duration::from_millis(25))
    }
}

impl RetryPolicy {
    /// `max_attempts` is clamped to `1..=3`.
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.clamp(1, MAX_ATTEMPTS),
            initial_backoff,
            max_backoff: initial_backoff * 8,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Runs `cycle` until it succeeds, fails with something other than a
    /// conflict, or the attempts run out.
    pub async fn run<F, Fut, T>(&self, scope: &str, mut cycle: F) -> LedgerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        let mut attempt = 0;
        let mut backoff = self.initial_backoff;

        loop {
            attempt += 1;

            match cycle().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_conflict() => {
                    if attempt >= self.max_attempts {
                        tracing::error!(
                            "{}: giving up after {} conflicting attempt(s): {}",
                            scope,
                            attempt,
                            error
                        );
                        return Err(LedgerError::ConcurrencyConflict { attempts: attempt });
                    }

                    tracing::warn!(
                        "{}: attempt {} conflicted, retrying in {:?}: {}",
                        scope,
                        attempt,
                        backoff,
                        error
                    );

                    sleep(backoff).await;
                    backoff = (backoff * 2).min(self.max_backoff);
                }
                Err(error) => return Err(error.into()),
            }
        }
    }
}
