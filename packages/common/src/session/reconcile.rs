use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument, warn};

use super::error::{Result, SessionError};
use super::metadata::SessionMetadataStore;
use super::paths::{AUDIO_EXTENSION, SessionRef, check_chunk_count, parse_chunk_key};
use crate::storage::BlobStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkDiff {
    pub uploaded: Vec<u32>,
    pub missing: Vec<u32>,
}

/// How many chunks a session is expected to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "count", rename_all = "lowercase")]
pub enum Expected {
    Known(u32),
    /// The session document could not be read.
    Unknown,
}

impl Expected {
    pub fn count(&self) -> Option<u32> {
        match self {
            Expected::Known(n) => Some(*n),
            Expected::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub uploaded: Vec<u32>,
    pub expected: Expected,
    pub missing: Vec<u32>,
}

/// `missing = {1..=expected} \ uploaded`. Ordinals above `expected` are
/// reported as uploaded but never make anything missing.
pub fn diff_against_expected(expected: u32, uploaded: &[u32]) -> ChunkDiff {
    let present: BTreeSet<u32> = uploaded.iter().copied().collect();
    let missing = (1..=expected).filter(|n| !present.contains(n)).collect();
    ChunkDiff {
        uploaded: present.into_iter().collect(),
        missing,
    }
}

/// Works out which chunks of a session have not been stored yet.
#[derive(Clone)]
pub struct ChunkReconciler {
    store: Arc<dyn BlobStore>,
    sessions: SessionMetadataStore,
}

impl ChunkReconciler {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            sessions: SessionMetadataStore::new(store.clone()),
            store,
        }
    }

    /// Ordinals of every stored chunk, sorted and de-duplicated.
    ///
    /// Objects that are not `.webm` or whose name does not parse as a chunk
    /// range are ignored.
    #[instrument(skip(self))]
    pub async fn list_uploaded_ordinals(&self, user_id: &str, session_id: &str) -> Result<Vec<u32>> {
        let session = SessionRef::new(user_id, session_id)?;
        let prefix = session.paths().chunks_path;
        let listing = self.store.list_all(&prefix, None).await?;

        let suffix = format!(".{AUDIO_EXTENSION}");
        let ordinals: BTreeSet<u32> = listing
            .keys
            .iter()
            .filter(|key| key.ends_with(&suffix))
            .filter_map(|key| parse_chunk_key(key)?.ordinal())
            .collect();

        debug!(
            objects = listing.keys.len(),
            chunks = ordinals.len(),
            "Listed uploaded chunks"
        );
        Ok(ordinals.into_iter().collect())
    }

    /// Compare stored chunks with the session's recorded `chunkCount`.
    ///
    /// A session whose document cannot be resolved still gets its uploaded
    /// list, with [`Expected::Unknown`] and nothing missing. A recorded count
    /// beyond what chunk keys can encode is rejected.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, user_id: &str, session_id: &str) -> Result<Reconciliation> {
        let uploaded = self.list_uploaded_ordinals(user_id, session_id).await?;

        let resolved = match self.sessions.resolve(user_id, session_id).await {
            Ok(resolved) => resolved.into_session(),
            Err(SessionError::Serialization { key, source }) => {
                warn!(%key, error = %source, "Session document unreadable, expected count unknown");
                None
            }
            Err(e) => return Err(e),
        };
        let Some(session) = resolved else {
            return Ok(Reconciliation {
                uploaded,
                expected: Expected::Unknown,
                missing: Vec::new(),
            });
        };

        let expected = session.audio.chunk_count;
        check_chunk_count(expected, session.audio.chunk_duration)?;
        let diff = diff_against_expected(expected, &uploaded);
        Ok(Reconciliation {
            uploaded: diff.uploaded,
            expected: Expected::Known(expected),
            missing: diff.missing,
        })
    }
}
