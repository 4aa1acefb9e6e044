//! Blob storage: the [`BlobStore`] seam plus an Azure REST backend and an
//! in-memory store.

mod azure;
mod connection_string;
mod memory;

pub use azure::AzureBlobStore;
pub use connection_string::{ConnectionString, ConnectionStringError, Credentials};
pub use memory::InMemoryBlobStore;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("blob {blob} not found in container {container}")]
    NotFound { container: String, blob: String },
    #[error("storage returned {status} ({code}): {message}")]
    Status {
        status: u16,
        code: String,
        message: String,
    },
    #[error("storage request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("storage misconfigured: {0}")]
    Configuration(String),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `container/name`, replacing any existing blob, and
    /// return its URL.
    async fn put(&self, container: &str, name: &str, bytes: Vec<u8>) -> Result<String, StorageError>;

    async fn get(&self, container: &str, name: &str) -> Result<Vec<u8>, StorageError>;
}
