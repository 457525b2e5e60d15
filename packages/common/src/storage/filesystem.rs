use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::error::StorageError;
use super::traits::{BlobStore, ListPage, page_from_sorted, validate_key};

const TEMP_DIR: &str = ".tmp";

/// Filesystem-backed blob store.
///
/// Each key maps to the relative path `{base_path}/{key}`. Content types are
/// not persisted. Listing walks the directory that contains the prefix and
/// pages through the sorted result.
pub struct FilesystemBlobStore {
    base_path: PathBuf,
    max_size: u64,
    page_size: usize,
}

impl FilesystemBlobStore {
    /// Create a new filesystem blob store.
    pub async fn new(
        base_path: PathBuf,
        max_size: u64,
        page_size: usize,
    ) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path).await?;
        fs::create_dir_all(base_path.join(TEMP_DIR)).await?;
        Ok(Self {
            base_path,
            max_size,
            page_size: page_size.max(1),
        })
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        if key == TEMP_DIR || key.starts_with(".tmp/") {
            return Err(StorageError::InvalidKey(format!("reserved key: {key}")));
        }
        Ok(self.base_path.join(key))
    }

    /// Path for a temporary file during writes.
    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(TEMP_DIR)
            .join(uuid::Uuid::new_v4().to_string())
    }

    /// Collect every stored key below the directory holding `prefix`.
    async fn keys_under(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let dir_part = match prefix.rfind('/') {
            Some(idx) => &prefix[..idx],
            None => "",
        };
        let start_dir = if dir_part.is_empty() {
            self.base_path.clone()
        } else {
            validate_key(dir_part)?;
            self.base_path.join(dir_part)
        };

        let mut keys = Vec::new();
        let mut pending = vec![start_dir];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    if path != self.base_path.join(TEMP_DIR) {
                        pending.push(path);
                    }
                } else if file_type.is_file()
                    && let Some(key) = relative_key(&self.base_path, &path)
                {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

/// Render `path` relative to `base` as a `/`-separated key.
fn relative_key(base: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let segments: Option<Vec<&str>> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect();
    Some(segments?.join("/"))
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, data: &[u8], _content_type: &str) -> Result<(), StorageError> {
        if data.len() as u64 > self.max_size {
            return Err(StorageError::SizeLimitExceeded {
                actual: data.len() as u64,
                limit: self.max_size,
            });
        }

        let object_path = self.object_path(key)?;

        let temp_path = self.temp_path();
        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        if let Some(parent) = object_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        if let Err(e) = fs::rename(&temp_path, &object_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

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

        let keys = self.keys_under(prefix).await?;
        Ok(page_from_sorted(
            keys.iter().map(String::as_str),
            prefix,
            delimiter,
            continuation,
            self.page_size,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store(page_size: usize) -> (FilesystemBlobStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemBlobStore::new(dir.path().join("blobs"), 10 * 1024 * 1024, page_size)
            .await
            .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn put_get_round_trip() {
        let (store, _dir) = temp_store(100).await;
        store
            .put("users/u1/session.json", b"{}", "application/json")
            .await
            .unwrap();
        let retrieved = store.get("users/u1/session.json").await.unwrap();
        assert_eq!(retrieved, b"{}");
    }

    #[tokio::test]
    async fn put_overwrites_existing_object() {
        let (store, _dir) = temp_store(100).await;
        store.put("a/b.json", b"first", "application/json").await.unwrap();
        store.put("a/b.json", b"second", "application/json").await.unwrap();
        assert_eq!(store.get("a/b.json").await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn get_not_found() {
        let (store, _dir) = temp_store(100).await;
        let result = store.get("missing/key.json").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
        assert!(store.try_get("missing/key.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let (store, _dir) = temp_store(100).await;
        let result = store.put("../escape.txt", b"x", "text/plain").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = store.put(".tmp/sneaky", b"x", "text/plain").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn size_limit_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemBlobStore::new(dir.path().join("blobs"), 10, 100)
            .await
            .unwrap();

        let result = store
            .put("big.bin", b"this is more than 10 bytes", "application/octet-stream")
            .await;
        assert!(matches!(
            result,
            Err(StorageError::SizeLimitExceeded { .. })
        ));

        // Temp file should be cleaned up.
        let tmp_entries: Vec<_> = std::fs::read_dir(dir.path().join("blobs/.tmp"))
            .unwrap()
            .collect();
        assert_eq!(tmp_entries.len(), 0);
    }

    #[tokio::test]
    async fn list_skips_temp_dir_and_other_prefixes() {
        let (store, _dir) = temp_store(100).await;
        store.put("users/u1/a.json", b"1", "application/json").await.unwrap();
        store.put("users/u1/b/c.json", b"2", "application/json").await.unwrap();
        store.put("users/u2/a.json", b"3", "application/json").await.unwrap();

        let page = store.list("users/u1/", None, None).await.unwrap();
        assert_eq!(page.keys, vec!["users/u1/a.json", "users/u1/b/c.json"]);

        let page = store.list("users/u1/", Some("/"), None).await.unwrap();
        assert_eq!(page.keys, vec!["users/u1/a.json"]);
        assert_eq!(page.common_prefixes, vec!["users/u1/b/"]);
    }

    #[tokio::test]
    async fn list_of_missing_directory_is_empty() {
        let (store, _dir) = temp_store(100).await;
        let page = store.list("users/nobody/chunks/", None, None).await.unwrap();
        assert!(page.keys.is_empty());
        assert!(page.next_token.is_none());
    }

    #[tokio::test]
    async fn list_all_drains_pages() {
        let (store, _dir) = temp_store(2).await;
        for i in 0..5 {
            store
                .put(&format!("chunks/{i:05}.webm"), b"audio", "audio/webm")
                .await
                .unwrap();
        }

        let first = store.list("chunks/", None, None).await.unwrap();
        assert_eq!(first.keys.len(), 2);
        assert!(first.next_token.is_some());

        let all = store.list_all("chunks/", None).await.unwrap();
        assert_eq!(all.keys.len(), 5);
        assert_eq!(all.keys[4], "chunks/00004.webm");
    }

    #[tokio::test]
    async fn foreign_continuation_token_is_rejected() {
        let (store, _dir) = temp_store(2).await;
        let result = store.list("users/u1/", None, Some("users/u2/x")).await;
        assert!(matches!(
            result,
            Err(StorageError::InvalidContinuationToken(_))
        ));
    }

    #[tokio::test]
    async fn constructor_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("deep/nested/blobs");
        assert!(!base.exists());

        let _store = FilesystemBlobStore::new(base.clone(), 1024, 100).await.unwrap();

        assert!(base.exists());
        assert!(base.join(".tmp").exists());
    }
}
