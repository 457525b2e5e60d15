mod error;
mod traits;

pub mod filesystem;
pub mod memory;
#[cfg(feature = "object-storage")]
pub mod s3;

use std::sync::Arc;

pub use error::StorageError;
pub use traits::{BlobStore, ListPage, Listing, validate_key};

use crate::config::{StorageAppConfig, StorageBackendKind};

/// Build the blob store selected by `config`.
pub async fn open(config: &StorageAppConfig) -> Result<Arc<dyn BlobStore>, StorageError> {
    match config.backend {
        StorageBackendKind::Filesystem => {
            let store = filesystem::FilesystemBlobStore::new(
                config.path.clone(),
                config.max_object_size,
                config.page_size,
            )
            .await?;
            tracing::info!(path = %config.path.display(), "Using filesystem blob store");
            Ok(Arc::new(store))
        }
        StorageBackendKind::Memory => {
            tracing::warn!("Using in-memory blob store; data is lost on restart");
            Ok(Arc::new(memory::MemoryBlobStore::new(config.page_size)))
        }
        #[cfg(feature = "object-storage")]
        StorageBackendKind::S3 => {
            let store =
                s3::S3BlobStore::new(&config.s3, config.max_object_size, config.page_size)?;
            tracing::info!(bucket = %config.s3.bucket, "Using S3 blob store");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "object-storage"))]
        StorageBackendKind::S3 => Err(StorageError::Config(
            "S3 backend requires the `object-storage` feature".into(),
        )),
    }
}
