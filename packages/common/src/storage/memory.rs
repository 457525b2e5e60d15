use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::error::StorageError;
use super::traits::{BlobStore, ListPage, page_from_sorted, validate_key};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
}

/// In-process blob store backed by an ordered map.
///
/// Used by tests and by local runs with `storage.backend = "memory"`.
pub struct MemoryBlobStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    page_size: usize,
}

impl MemoryBlobStore {
    pub fn new(page_size: usize) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
        }
    }

    /// Content type recorded for `key`, if present.
    pub async fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|obj| obj.content_type.clone())
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        validate_key(key)?;
        self.objects
            .read()
            .await
            .get(key)
            .map(|obj| obj.data.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn list(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        continuation: Option<&str>,
    ) -> Result<ListPage, StorageError> {
        if let Some(token) = continuation
            && !token.starts_with(prefix)
        {
            return Err(StorageError::InvalidContinuationToken(format!(
                "token does not belong to prefix {prefix}"
            )));
        }

        let objects = self.objects.read().await;
        Ok(page_from_sorted(
            objects
                .range(prefix.to_string()..)
                .map(|(k, _)| k.as_str())
                .take_while(|k| k.starts_with(prefix)),
            prefix,
            delimiter,
            continuation,
            self.page_size,
        ))
    }
}
