use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

// ============================================================================
// Exponential Backoff Retry
// ============================================================================
//
// Used at startup while the backend may still be coming up. Request-path
// store calls are never retried: a failed conditional write is a result,
// not a transient fault.
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    fn next_delay(&self, delay: Duration) -> Duration {
        let next = Duration::from_millis((delay.as_millis() as f64 * self.multiplier) as u64);
        next.min(self.max_delay)
    }
}

/// Run `operation` until it succeeds or `max_attempts` is reached.
/// The closure receives the 1-based attempt number.
pub async fn retry_with_backoff<F, Fut, T, E>(
    name: &str,
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(operation = name, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) if attempt >= config.max_attempts => {
                tracing::error!(
                    operation = name,
                    attempt,
                    error = %error,
                    "Giving up after all attempts"
                );
                return Err(error);
            }
            Err(error) => {
                tracing::warn!(
                    operation = name,
                    attempt,
                    error = %error,
                    delay_ms = delay.as_millis() as u64,
                    "Attempt failed, backing off"
                );
                sleep(delay).await;
                delay = config.next_delay(delay);
            }
        }
    }
}
