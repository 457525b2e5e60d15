use serde::Serialize;
use serde::de::DeserializeOwned;

use super::error::{Result, SessionError};
use crate::storage::BlobStore;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Read and decode the JSON document at `key`, `None` when absent.
pub(crate) async fn read_json<T: DeserializeOwned>(
    store: &dyn BlobStore,
    key: &str,
) -> Result<Option<T>> {
    let Some(bytes) = store.try_get(key).await? else {
        return Ok(None);
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| SessionError::Serialization {
            key: key.to_string(),
            source,
        })
}

/// Encode `doc` as pretty-printed JSON and overwrite `key` with it.
pub(crate) async fn write_json<T: Serialize>(
    store: &dyn BlobStore,
    key: &str,
    doc: &T,
) -> Result<()> {
    let body = serde_json::to_vec_pretty(doc).map_err(|source| SessionError::Serialization {
        key: key.to_string(),
        source,
    })?;
    store.put(key, &body, JSON_CONTENT_TYPE).await?;
    Ok(())
}
