//! Chat transport port
//!
//! The transport delivers replies to users. Delivery can fail transiently
//! (network hiccups); [`deliver_with_retry`] retries those with exponential
//! backoff and gives up after a bounded number of attempts.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::exporter::ChartArtifact;
use crate::domain::UserId;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 2000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Worth retrying (timeouts, dropped connections)
    #[error("Transient delivery failure: {0}")]
    Transient(String),

    #[error("Delivery failed: {0}")]
    Fatal(String),
}

/// Outbound side of the chat channel
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_text(&self, user: UserId, text: &str) -> Result<(), TransportError>;

    async fn send_image(
        &self,
        user: UserId,
        artifact: &ChartArtifact,
        caption: &str,
    ) -> Result<(), TransportError>;
}

/// Bounded exponential backoff for deliveries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
        }
    }

    /// Delay after the given zero-based failed attempt (doubles each time,
    /// saturating at `Duration::MAX`)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.initial_delay
            .checked_mul(2u32.saturating_pow(attempt))
            .unwrap_or(Duration::MAX)
    }
}

/// Run `op` until it succeeds, fails fatally, or attempts run out
pub async fn deliver_with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 0..attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(TransportError::Transient(msg)) if attempt + 1 < attempts => {
                let delay = policy.delay_for(attempt);
                eprintln!(
                    "[pocket] Delivery failed, retrying in {}ms (attempt {}/{}): {}",
                    delay.as_millis(),
                    attempt + 1,
                    attempts,
                    msg
                );
                tokio::time::sleep(delay).await;
                last_error = Some(TransportError::Transient(msg));
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| TransportError::Fatal("no delivery attempted".to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(2));
        assert_eq!(policy.delay_for(1), Duration::from_secs(4));
        assert_eq!(policy.delay_for(2), Duration::from_secs(8));
    }

    #[test]
    fn test_delay_saturates_instead_of_overflowing() {
        let policy = RetryPolicy::new(5, Duration::from_millis(u64::MAX));
        assert_eq!(policy.delay_for(0), Duration::from_millis(u64::MAX));
        assert!(policy.delay_for(1) > policy.delay_for(0));
        assert_eq!(policy.delay_for(40), Duration::MAX);
        assert_eq!(policy.delay_for(u32::MAX), Duration::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = tokio::time::Instant::now();

        let result = deliver_with_retry(&RetryPolicy::default(), || {
            let calls = Arc::clone(&calls);
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TransportError::Transient("timeout".into()))
                } else {
                    Ok("sent")
                }
            }
        })
        .await;

        assert_eq!(result, Ok("sent"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 2s after the first failure, 4s after the second
        assert!(start.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_return_last_error() {
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = deliver_with_retry(&RetryPolicy::default(), || {
            let calls = Arc::clone(&calls);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::Transient(format!("attempt {}", n)))
            }
        })
        .await;

        assert_eq!(result, Err(TransportError::Transient("attempt 2".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = deliver_with_retry(&RetryPolicy::default(), || {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::Fatal("chat not found".into()))
            }
        })
        .await;

        assert!(matches!(result, Err(TransportError::Fatal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
