use cadence_core::HostSettings;
use cadence_host::HostError;
use std::future::Future;
use std::time::Duration;

/// Bounded exponential backoff for read-only host calls.
///
/// Mutations are never passed through here: a create whose response was lost
/// may already have happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&HostSettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &HostSettings) -> Self {
        Self {
            attempts: settings.read_retries.max(1),
            backoff: Duration::from_millis(settings.retry_backoff_ms),
        }
    }

    /// Single attempt, no sleeping.
    pub fn none() -> Self {
        Self {
            attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }

    /// Run `call` until it succeeds, fails with a non-retryable error, fails
    /// on a non-read operation, or runs out of attempts.
    pub async fn run<T, F, Fut>(&self, mut call: F) -> Result<T, HostError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, HostError>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(v) => return Ok(v),
                Err(e) if attempt < self.attempts && e.op().is_read() && e.is_retryable() => {
                    let delay = self.delay(attempt);
                    tracing::warn!(
                        op = %e.op(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying read"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
