use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{error, warn};

use super::{Embedder, EmbeddingError};

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Sleep after the zero-based failed `attempt`: `base * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2_u32.saturating_pow(attempt))
    }
}

/// Retries the wrapped embedder on rate limiting only; every other error is
/// returned as soon as it happens.
pub struct RetryingEmbedder<E> {
    inner: E,
    policy: RetryPolicy,
}

impl<E> RetryingEmbedder<E> {
    pub fn new(inner: E) -> Self {
        Self::with_policy(inner, RetryPolicy::default())
    }

    pub fn with_policy(inner: E, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }
}

#[async_trait]
impl<E: Embedder> Embedder for RetryingEmbedder<E> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match self.inner.embed(text).await {
                Err(EmbeddingError::RateLimited(message)) => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        error!(attempts = attempt, %message, "embedding rate limit retries exhausted");
                        return Err(EmbeddingError::RateLimitExceeded {
                            attempts: attempt,
                            message,
                        });
                    }

                    let delay = self.policy.delay_for(attempt - 1);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %message,
                        "embedding rate limited; backing off"
                    );
                    sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}
