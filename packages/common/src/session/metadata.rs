use std::cmp::Reverse;
use std::sync::Arc;

use chrono::{NaiveDate, SecondsFormat, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::document::{read_json, write_json};
use super::error::{Result, SessionError};
use super::model::{ProcessingStatus, RollingTranscript, Session, SessionOptions};
use super::paths::{SessionPaths, SessionRef, check_chunk_count, sessions_prefix};
use super::update::{SessionUpdate, apply_update};
use crate::storage::BlobStore;

/// Which storage layout a session document was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    Canonical,
    Legacy,
}

/// Outcome of looking a session up in both layouts.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Canonical(Session),
    Legacy(Session),
    NotFound,
}

impl Resolved {
    pub fn layout(&self) -> Option<Layout> {
        match self {
            Resolved::Canonical(_) => Some(Layout::Canonical),
            Resolved::Legacy(_) => Some(Layout::Legacy),
            Resolved::NotFound => None,
        }
    }

    pub fn into_session(self) -> Option<Session> {
        match self {
            Resolved::Canonical(session) | Resolved::Legacy(session) => Some(session),
            Resolved::NotFound => None,
        }
    }
}

/// Documents written by [`SessionMetadataStore::create`].
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedSession {
    pub session: Session,
    pub status: ProcessingStatus,
    pub paths: SessionPaths,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Upserted {
    Updated(Session),
    Created(CreatedSession),
}

impl Upserted {
    pub fn session(&self) -> &Session {
        match self {
            Upserted::Updated(session) => session,
            Upserted::Created(created) => &created.session,
        }
    }
}

/// One folder found under a user's sessions prefix.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub folder: String,
    /// `None` when the folder holds no readable session document.
    pub session: Option<Session>,
}

impl SessionSummary {
    fn sort_key(&self) -> String {
        match &self.session {
            Some(session) => session
                .created_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            None => self.folder.clone(),
        }
    }
}

/// Reads and writes the session document.
///
/// Every write replaces the whole document; concurrent writers to one
/// session race and the last one wins.
#[derive(Clone)]
pub struct SessionMetadataStore {
    store: Arc<dyn BlobStore>,
}

impl SessionMetadataStore {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Look the session up, falling back to the legacy key for today's date.
    pub async fn resolve(&self, user_id: &str, session_id: &str) -> Result<Resolved> {
        self.resolve_on(user_id, session_id, Utc::now().date_naive())
            .await
    }

    /// [`resolve`](Self::resolve) with the legacy key built from `today`.
    #[instrument(skip(self))]
    pub async fn resolve_on(
        &self,
        user_id: &str,
        session_id: &str,
        today: NaiveDate,
    ) -> Result<Resolved> {
        let session = SessionRef::new(user_id, session_id)?;
        let paths = session.paths();

        if let Some(doc) = read_json::<Session>(self.store.as_ref(), &paths.session_file).await? {
            return Ok(Resolved::Canonical(doc));
        }

        let legacy_key = session.legacy_metadata_key(today);
        match read_json::<Session>(self.store.as_ref(), &legacy_key).await? {
            Some(doc) => {
                info!(key = %legacy_key, "Loaded session from legacy layout");
                Ok(Resolved::Legacy(doc))
            }
            None => Ok(Resolved::NotFound),
        }
    }

    pub async fn load(&self, user_id: &str, session_id: &str) -> Result<Session> {
        self.resolve(user_id, session_id)
            .await?
            .into_session()
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    /// Write the default session document, processing status and empty
    /// rolling transcript.
    ///
    /// The three writes are independent. If one fails, earlier ones stay in
    /// place and the error is returned. Calling this again overwrites all
    /// three.
    #[instrument(skip(self, options))]
    pub async fn create(
        &self,
        user_id: &str,
        session_id: &str,
        options: SessionOptions,
    ) -> Result<CreatedSession> {
        let session_ref = SessionRef::new(user_id, session_id)?;
        let paths = session_ref.paths();
        let now = Utc::now();

        let session = Session::new_default(
            session_ref.session_id(),
            session_ref.user_id(),
            options,
            now,
        );
        let status = ProcessingStatus::new_default(session_ref.session_id(), now);
        let transcript = RollingTranscript::empty(session_ref.session_id(), now);

        let store = self.store.as_ref();
        write_json(store, &paths.session_file, &session).await?;
        write_json(store, &paths.processing_status, &status).await?;
        write_json(store, &paths.rolling_transcript, &transcript).await?;

        info!(session = %session_ref, "Created session structure");
        Ok(CreatedSession {
            session,
            status,
            paths,
        })
    }

    /// Merge `update` into the stored document and rewrite it at the
    /// canonical key, whichever layout it was read from.
    #[instrument(skip(self, update))]
    pub async fn update(
        &self,
        user_id: &str,
        session_id: &str,
        update: SessionUpdate,
    ) -> Result<Session> {
        let session_ref = SessionRef::new(user_id, session_id)?;
        let existing = self.load(user_id, session_id).await?;
        self.write_merged(&session_ref, existing, update).await
    }

    /// Update the session if it exists, otherwise create it with options
    /// taken from `update`.
    #[instrument(skip(self, update))]
    pub async fn upsert(
        &self,
        user_id: &str,
        session_id: &str,
        user_email: Option<&str>,
        update: SessionUpdate,
    ) -> Result<Upserted> {
        let session_ref = SessionRef::new(user_id, session_id)?;
        match self.resolve(user_id, session_id).await?.into_session() {
            Some(existing) => {
                let session = self.write_merged(&session_ref, existing, update).await?;
                Ok(Upserted::Updated(session))
            }
            None => {
                info!(session = %session_ref, "Session missing on update, creating it");
                let options = update.to_options(user_email);
                let created = self.create(user_id, session_id, options).await?;
                Ok(Upserted::Created(created))
            }
        }
    }

    async fn write_merged(
        &self,
        session_ref: &SessionRef,
        existing: Session,
        update: SessionUpdate,
    ) -> Result<Session> {
        let merged = apply_update(existing, update, Utc::now());
        check_chunk_count(merged.audio.chunk_count, merged.audio.chunk_duration)?;
        write_json(
            self.store.as_ref(),
            &session_ref.paths().session_file,
            &merged,
        )
        .await?;
        Ok(merged)
    }

    /// Every session folder of `user_id`, newest first.
    #[instrument(skip(self))]
    pub async fn list(&self, user_id: &str) -> Result<Vec<SessionSummary>> {
        let prefix = sessions_prefix(user_id)?;
        let listing = self.store.list_all(&prefix, Some("/")).await?;
        let today = Utc::now().date_naive();

        let mut summaries = Vec::with_capacity(listing.common_prefixes.len());
        for folder_prefix in listing.common_prefixes {
            let folder = folder_prefix[prefix.len()..]
                .trim_end_matches('/')
                .to_string();

            let session = match self.resolve_on(user_id, &folder, today).await {
                Ok(resolved) => resolved.into_session(),
                Err(SessionError::Serialization { key, source }) => {
                    warn!(%key, error = %source, "Skipping unreadable session document");
                    None
                }
                Err(SessionError::InvalidArgument(_)) => None,
                Err(e) => return Err(e),
            };

            let session_id = session
                .as_ref()
                .map(|s| s.session_id.clone())
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| folder.clone());

            summaries.push(SessionSummary {
                session_id,
                folder,
                session,
            });
        }

        summaries.sort_by_cached_key(|summary| Reverse(summary.sort_key()));
        Ok(summaries)
    }
}
