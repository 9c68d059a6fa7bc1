use crate::config::RetryConfig;
use crate::Result;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Fixed-delay retry of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// Policy for navigation steps.
    pub fn steps(config: &RetryConfig) -> Self {
        Self::new(config.attempts, Duration::from_millis(config.delay_ms))
    }

    /// Policy for returning to the result list.
    pub fn back(config: &RetryConfig) -> Self {
        Self::new(config.back_attempts, Duration::from_millis(config.delay_ms))
    }

    /// Run `operation` until it succeeds or the attempts are used up.
    /// Returns the last error.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.attempts => {
                    warn!("{} failed after {} attempts: {}", label, attempt, e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("{} attempt {}/{} failed: {}", label, attempt, self.attempts, e);
                    attempt += 1;
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                    info!("Retry attempt {}/{} of {}", attempt, self.attempts, label);
                }
            }
        }
    }
}
