use std::future::Future;

use tracing::warn;

/// Bounded immediate retries for a single operation.
///
/// Every failure is retried until `max_attempts` invocations have been made,
/// with no delay in between. The last failure is returned as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl RetryPolicy {
    /// A bound of zero is treated as a single attempt
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub async fn run<T, E, F, Fut>(&self, operation_name: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut remaining = self.max_attempts;
        loop {
            remaining -= 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if remaining > 0 => {
                    warn!(
                        "{} failed, retrying ({} attempts left): {}",
                        operation_name, remaining, error
                    );
                }
                Err(error) => return Err(error),
            }
        }
    }
}
