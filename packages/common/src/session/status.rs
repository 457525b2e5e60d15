use std::sync::Arc;

use chrono::Utc;
use tracing::{instrument, warn};

use super::document::{read_json, write_json};
use super::error::{Result, SessionError};
use super::model::ProcessingStatus;
use super::paths::SessionRef;
use super::update::{StatusUpdate, apply_status_update};
use crate::storage::BlobStore;

/// Reads and writes `processing/status.json`.
///
/// The document is a projection that can always be rebuilt, so a missing
/// or unreadable copy is replaced by defaults instead of failing the caller.
#[derive(Clone)]
pub struct ProcessingStatusStore {
    store: Arc<dyn BlobStore>,
}

impl ProcessingStatusStore {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn load_or_default(&self, user_id: &str, session_id: &str) -> Result<ProcessingStatus> {
        let session = SessionRef::new(user_id, session_id)?;
        match self.read(&session).await {
            Ok(status) => Ok(status),
            Err(SessionError::InconsistentState(reason)) => {
                warn!(%session, %reason, "Using default processing status");
                Ok(ProcessingStatus::new_default(session.session_id(), Utc::now()))
            }
            Err(e) => Err(e),
        }
    }

    /// Merge `update` into the current status, stamp `timestamp`, rewrite.
    #[instrument(skip(self, update))]
    pub async fn update(
        &self,
        user_id: &str,
        session_id: &str,
        update: StatusUpdate,
    ) -> Result<ProcessingStatus> {
        let session = SessionRef::new(user_id, session_id)?;
        let existing = self.load_or_default(user_id, session_id).await?;
        let merged = apply_status_update(existing, update, Utc::now());
        write_json(
            self.store.as_ref(),
            &session.paths().processing_status,
            &merged,
        )
        .await?;
        Ok(merged)
    }

    /// Missing and malformed documents both come back as `InconsistentState`.
    /// Store failures pass through.
    async fn read(&self, session: &SessionRef) -> Result<ProcessingStatus> {
        let key = session.paths().processing_status;
        match read_json::<ProcessingStatus>(self.store.as_ref(), &key).await {
            Ok(Some(status)) => Ok(status),
            Ok(None) => Err(SessionError::InconsistentState(format!(
                "no processing status at {key}"
            ))),
            Err(SessionError::Serialization { key, source }) => Err(
                SessionError::InconsistentState(format!("unreadable status at {key}: {source}")),
            ),
            Err(e) => Err(e),
        }
    }
}
