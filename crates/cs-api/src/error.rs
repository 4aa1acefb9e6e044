use std::{borrow::Cow, future::Future};

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use cs_common::blob::StorageError;
use cs_common::embedding::EmbeddingError;
use cs_common::extraction::ParseError;
use cs_common::files::UploadValidationError;
use cs_common::reference::ReferenceError;
use cs_common::similarity::SimilarityError;

tokio::task_local! {
    static REQUEST_ID: String;
}

const MAX_MESSAGE_LEN: usize = 240;

fn sanitize_message(message: &str) -> String {
    let cleaned = message
        .replace(['\n', '\r'], " ")
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>();

    let mut cleaned = cleaned
        .split_whitespace()
        .map(|token| {
            if token.contains("://") {
                "[redacted-url]".to_string()
            } else if let Some((base, _)) = token.split_once('?') {
                if base.is_empty() {
                    "[redacted-query]".to_string()
                } else {
                    format!("{base}?[redacted]")
                }
            } else if token.starts_with('/') || token.contains('\\') {
                "[redacted-path]".to_string()
            } else {
                token.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    if cleaned.chars().count() > MAX_MESSAGE_LEN {
        cleaned = cleaned.chars().take(MAX_MESSAGE_LEN).collect();
        cleaned.push('…');
    }

    if cleaned.trim().is_empty() {
        "unexpected error".to_string()
    } else {
        cleaned
    }
}

pub async fn with_request_id<Fut, T>(request_id: Option<String>, fut: Fut) -> T
where
    Fut: Future<Output = T>,
{
    match request_id {
        Some(request_id) => REQUEST_ID.scope(request_id, fut).await,
        None => fut.await,
    }
}

pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(|value| value.clone()).ok()
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Storage(String),
    #[error("{0}")]
    Parse(String),
    #[error("{0}")]
    RateLimitExceeded(String),
    #[error("{0}")]
    Embedding(String),
    #[error("{0}")]
    Similarity(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
    request_id: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let code = self.code();
        let request_id = current_request_id();

        error!(
            code,
            status = %status,
            request_id = request_id.as_deref().unwrap_or(""),
            error = %self,
            "api_error"
        );

        let body = Json(ErrorResponse {
            error: self.public_message().into_owned(),
            code,
            request_id,
        });

        (status, body).into_response()
    }
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::Storage(_) => "storage_error",
            ApiError::Parse(_) => "parse_error",
            ApiError::RateLimitExceeded(_) => "rate_limit_exceeded",
            ApiError::Embedding(_) => "embedding_error",
            ApiError::Similarity(_) => "similarity_error",
            ApiError::Configuration(_) => "configuration_error",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
            ApiError::Internal(_) => "internal_error",
        }
    }

    fn public_message(&self) -> Cow<'static, str> {
        match self {
            ApiError::Validation(msg)
            | ApiError::Storage(msg)
            | ApiError::Parse(msg)
            | ApiError::RateLimitExceeded(msg)
            | ApiError::Embedding(msg)
            | ApiError::Similarity(msg) => Cow::Owned(sanitize_message(msg)),
            ApiError::ServiceUnavailable(_) => Cow::Borrowed("service unavailable"),
            ApiError::Configuration(_) | ApiError::Internal(_) => {
                Cow::Borrowed("internal server error")
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Storage(_)
            | ApiError::Parse(_)
            | ApiError::RateLimitExceeded(_)
            | ApiError::Embedding(_)
            | ApiError::Similarity(_)
            | ApiError::Configuration(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<UploadValidationError> for ApiError {
    fn from(value: UploadValidationError) -> Self {
        ApiError::Validation(value.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::Configuration(msg) => ApiError::Configuration(msg),
            other => ApiError::Storage(other.to_string()),
        }
    }
}

impl From<ParseError> for ApiError {
    fn from(value: ParseError) -> Self {
        ApiError::Parse(value.to_string())
    }
}

impl From<EmbeddingError> for ApiError {
    fn from(value: EmbeddingError) -> Self {
        match value {
            EmbeddingError::RateLimitExceeded { .. } => ApiError::RateLimitExceeded(value.to_string()),
            other => ApiError::Embedding(other.to_string()),
        }
    }
}

impl From<SimilarityError> for ApiError {
    fn from(value: SimilarityError) -> Self {
        ApiError::Similarity(value.to_string())
    }
}

impl From<ReferenceError> for ApiError {
    fn from(value: ReferenceError) -> Self {
        match value {
            ReferenceError::Embedding { .. } => ApiError::Embedding(value.to_string()),
            other => ApiError::Configuration(other.to_string()),
        }
    }
}
