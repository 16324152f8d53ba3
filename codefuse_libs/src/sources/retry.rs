use std::{fmt::Display, future::Future, time::Duration};
use tokio::time;

/// Upper bound of retries a source may be configured with.
pub const MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    None,
    /// Wait the same delay before every retry.
    Fixed { retries: u32, delay: Duration },
    /// Double the delay after every retry, starting from `base_delay`.
    Exponential { retries: u32, base_delay: Duration },
}

impl RetryPolicy {
    pub fn retries(&self) -> u32 {
        match self {
            RetryPolicy::None => 0,
            RetryPolicy::Fixed { retries, .. } | RetryPolicy::Exponential { retries, .. } => {
                (*retries).min(MAX_RETRIES)
            }
        }
    }

    /// Delay before the `retry`-th retry (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        match self {
            RetryPolicy::None => Duration::ZERO,
            RetryPolicy::Fixed { delay, .. } => *delay,
            RetryPolicy::Exponential { base_delay, .. } => {
                base_delay.saturating_mul(1 << retry.saturating_sub(1).min(16))
            }
        }
    }

    /// Run `operation` until it succeeds or the retries are exhausted.
    ///
    /// `operation` receives the 1-based attempt number. The last error is returned when every
    /// attempt failed.
    pub async fn run<F, Fut, T, E>(&self, label: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let retries = self.retries();
        let mut attempt: u32 = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt <= retries => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        "{} attempt {} failed cause [{}], retry in {}ms",
                        label,
                        attempt,
                        e,
                        delay.as_millis()
                    );
                    time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::None
    }
}
