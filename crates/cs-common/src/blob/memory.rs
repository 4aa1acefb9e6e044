use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{BlobStore, StorageError};

/// Process-local blob store used by tests and local runs.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url_for(container: &str, name: &str) -> String {
        format!("memory://{container}/{name}")
    }

    pub fn contains(&self, container: &str, name: &str) -> bool {
        self.blobs
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(&(container.to_string(), name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.blobs
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, container: &str, name: &str, bytes: Vec<u8>) -> Result<String, StorageError> {
        self.blobs
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert((container.to_string(), name.to_string()), bytes);
        Ok(Self::url_for(container, name))
    }

    async fn get(&self, container: &str, name: &str) -> Result<Vec<u8>, StorageError> {
        self.blobs
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&(container.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                container: container.to_string(),
                blob: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_overwrites_and_get_returns_latest() {
        let store = InMemoryBlobStore::new();

        store.put("one", "a.xlsx", b"first".to_vec()).await.unwrap();
        let url = store.put("one", "a.xlsx", b"second".to_vec()).await.unwrap();

        assert_eq!(url, "memory://one/a.xlsx");
        assert_eq!(store.get("one", "a.xlsx").await.unwrap(), b"second");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn containers_are_separate_namespaces() {
        let store = InMemoryBlobStore::new();
        store.put("one", "a.xlsx", b"x".to_vec()).await.unwrap();

        let err = store.get("two", "a.xlsx").await.unwrap_err();

        assert!(matches!(err, StorageError::NotFound { .. }));
        assert!(store.contains("one", "a.xlsx"));
    }
}
