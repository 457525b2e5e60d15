use async_trait::async_trait;
use ::s3::creds::Credentials;
use ::s3::{Bucket, Region};
use tracing::debug;

use super::error::StorageError;
use super::traits::{BlobStore, ListPage, validate_key};
use crate::config::S3Config;

/// S3-compatible blob store built on `rust-s3`.
///
/// Requests are issued once. The SDK is built without `fail-on-err`, so HTTP
/// status codes are inspected here.
pub struct S3BlobStore {
    bucket: Box<Bucket>,
    max_size: u64,
    page_size: usize,
}

impl S3BlobStore {
    pub fn new(config: &S3Config, max_size: u64, page_size: usize) -> Result<Self, StorageError> {
        if config.bucket.trim().is_empty() {
            return Err(StorageError::Config("storage.s3.bucket must be set".into()));
        }

        let region = match &config.endpoint {
            Some(endpoint) => Region::Custom {
                region: config.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config
                .region
                .parse()
                .map_err(|e| StorageError::Config(format!("invalid S3 region: {e}")))?,
        };

        let credentials = Credentials::new(
            config.access_key_id.as_deref(),
            config.secret_access_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Config(format!("S3 credentials: {e}")))?;

        let mut bucket = Bucket::new(&config.bucket, region, credentials)
            .map_err(|e| StorageError::Config(format!("S3 bucket: {e}")))?;
        if config.path_style {
            bucket = bucket.with_path_style();
        }

        Ok(Self {
            bucket,
            max_size,
            page_size: page_size.clamp(1, 1000),
        })
    }
}

fn backend_error(context: &str, err: impl std::fmt::Display) -> StorageError {
    StorageError::Backend(format!("{context}: {err}"))
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        validate_key(key)?;
        let response = self
            .bucket
            .get_object(key)
            .await
            .map_err(|e| backend_error("GetObject", e))?;

        match response.status_code() {
            200..=299 => Ok(response.bytes().to_vec()),
            404 => Err(StorageError::NotFound(key.to_string())),
            status => Err(StorageError::Backend(format!(
                "GetObject {key} returned HTTP {status}"
            ))),
        }
    }

    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        if data.len() as u64 > self.max_size {
            return Err(StorageError::SizeLimitExceeded {
                actual: data.len() as u64,
                limit: self.max_size,
            });
        }

        let response = self
            .bucket
            .put_object_with_content_type(key, data, content_type)
            .await
            .map_err(|e| backend_error("PutObject", e))?;

        match response.status_code() {
            200..=299 => Ok(()),
            status => Err(StorageError::Backend(format!(
                "PutObject {key} returned HTTP {status}"
            ))),
        }
    }

    async fn list(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        continuation: Option<&str>,
    ) -> Result<ListPage, StorageError> {
        let (result, status) = self
            .bucket
            .list_page(
                prefix.to_string(),
                delimiter.map(str::to_string),
                continuation.map(str::to_string),
                None,
                Some(self.page_size),
            )
            .await
            .map_err(|e| backend_error("ListObjectsV2", e))?;

        if status == 400 && continuation.is_some() {
            return Err(StorageError::InvalidContinuationToken(
                "S3 rejected continuation token".into(),
            ));
        }
        if !(200..300).contains(&status) {
            return Err(StorageError::Backend(format!(
                "ListObjectsV2 {prefix} returned HTTP {status}"
            )));
        }

        debug!(
            prefix,
            keys = result.contents.len(),
            truncated = result.is_truncated,
            "listed S3 page"
        );

        Ok(ListPage {
            keys: result.contents.into_iter().map(|obj| obj.key).collect(),
            common_prefixes: result
                .common_prefixes
                .unwrap_or_default()
                .into_iter()
                .map(|p| p.prefix)
                .collect(),
            next_token: result.next_continuation_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> S3Config {
        S3Config {
            bucket: "recordings".into(),
            region: "us-east-1".into(),
            endpoint: Some("http://minio:9000".into()),
            access_key_id: Some("access".into()),
            secret_access_key: Some("secret".into()),
            path_style: true,
        }
    }

    #[test]
    fn builds_with_custom_endpoint() {
        let store = S3BlobStore::new(&config(), 1024, 5000).unwrap();
        assert_eq!(store.page_size, 1000);
    }

    #[test]
    fn rejects_blank_bucket() {
        let mut config = config();
        config.bucket = "  ".into();
        assert!(matches!(
            S3BlobStore::new(&config, 1024, 100),
            Err(StorageError::Config(_))
        ));
    }
}
