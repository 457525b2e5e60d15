use async_trait::async_trait;

use super::error::StorageError;

/// One page of a prefix listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Full object keys in this page, in lexicographic order.
    pub keys: Vec<String>,
    /// Key prefixes rolled up at the delimiter, each ending with the delimiter.
    pub common_prefixes: Vec<String>,
    /// Opaque token to pass back for the next page. `None` on the last page.
    pub next_token: Option<String>,
}

/// A fully drained listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub keys: Vec<String>,
    pub common_prefixes: Vec<String>,
}

/// Key-addressed blob storage.
///
/// Keys are `/`-separated relative paths. Backends do not retry; callers put
/// their own timeout around each call.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Retrieve all bytes stored under `key`.
    ///
    /// Returns [`StorageError::NotFound`] when nothing is stored there.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Store `data` under `key`, replacing any previous object.
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<(), StorageError>;

    /// List one page of keys starting with `prefix`.
    ///
    /// With a delimiter, keys containing the delimiter after the prefix are
    /// rolled up into `common_prefixes` instead of being returned.
    async fn list(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        continuation: Option<&str>,
    ) -> Result<ListPage, StorageError>;

    /// Like [`get`](Self::get), but maps a missing object to `None`.
    async fn try_get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match self.get(key).await {
            Ok(data) => Ok(Some(data)),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// List every key under `prefix`, following continuation tokens until
    /// the backend reports the last page.
    async fn list_all(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> Result<Listing, StorageError> {
        let mut listing = Listing::default();
        let mut token: Option<String> = None;

        loop {
            let page = self.list(prefix, delimiter, token.as_deref()).await?;
            listing.keys.extend(page.keys);
            listing.common_prefixes.extend(page.common_prefixes);

            match page.next_token {
                Some(next) if token.as_deref() == Some(next.as_str()) => {
                    return Err(StorageError::InvalidContinuationToken(format!(
                        "backend repeated token {next} for prefix {prefix}"
                    )));
                }
                Some(next) => token = Some(next),
                None => break,
            }
        }

        Ok(listing)
    }
}

/// Reject keys that could address anything outside the store namespace.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("key must not be empty".into()));
    }
    if key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::InvalidKey(format!(
            "key must be a relative '/'-separated path: {key}"
        )));
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StorageError::InvalidKey(format!(
            "key contains an empty or relative segment: {key}"
        )));
    }
    Ok(())
}

/// Build one page from keys already sorted lexicographically.
///
/// Shared by the backends that list from a local index. The continuation
/// token is the last entry (key or common prefix) emitted.
pub(crate) fn page_from_sorted<'a>(
    sorted_keys: impl IntoIterator<Item = &'a str>,
    prefix: &str,
    delimiter: Option<&str>,
    start_after: Option<&str>,
    page_size: usize,
) -> ListPage {
    let mut page = ListPage::default();
    let mut last_entry: Option<String> = None;
    let mut emitted = 0usize;

    for key in sorted_keys {
        if !key.starts_with(prefix) {
            continue;
        }

        let rolled_up = delimiter
            .filter(|d| !d.is_empty())
            .and_then(|d| {
                key[prefix.len()..]
                    .find(d)
                    .map(|idx| key[..prefix.len() + idx + d.len()].to_string())
            });
        let entry = rolled_up.clone().unwrap_or_else(|| key.to_string());

        if start_after.is_some_and(|after| entry.as_str() <= after) {
            continue;
        }
        if last_entry.as_deref() == Some(entry.as_str()) {
            continue;
        }

        if emitted == page_size {
            page.next_token = last_entry;
            return page;
        }

        match rolled_up {
            Some(common) => page.common_prefixes.push(common),
            None => page.keys.push(key.to_string()),
        }
        last_entry = Some(entry);
        emitted += 1;
    }

    page
}
