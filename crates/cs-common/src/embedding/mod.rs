//! Text embedding: the [`Embedder`] seam, an OpenAI-compatible HTTP backend and
//! a rate-limit retry wrapper.

mod openai;
mod retry;

pub use openai::{OpenAiConfig, OpenAiEmbedder, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use retry::{RetryPolicy, RetryingEmbedder};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// A single 429 from the provider. Retried by [`RetryingEmbedder`].
    #[error("embedding rate limit hit: {0}")]
    RateLimited(String),
    #[error("Rate limit exceeded after {attempts} attempts: {message}")]
    RateLimitExceeded { attempts: u32, message: String },
    #[error("embedding API rejected the credentials: {0}")]
    Unauthorized(String),
    #[error("embedding request rejected: {0}")]
    InvalidRequest(String),
    #[error("embedding API returned {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("embedding API request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("embedding API returned an unusable response: {0}")]
    InvalidResponse(String),
}

impl EmbeddingError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, EmbeddingError::RateLimited(_))
    }
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}
