//! Chunked recording sessions: key layout, session documents and chunk
//! reconciliation on top of a [`BlobStore`](crate::storage::BlobStore).

mod document;
mod error;
pub mod metadata;
pub mod model;
pub mod paths;
pub mod reconcile;
pub mod status;
pub mod update;

pub use document::JSON_CONTENT_TYPE;
pub use error::{Result, SessionError};
pub use metadata::{CreatedSession, Layout, Resolved, SessionMetadataStore, SessionSummary, Upserted};
pub use model::{ProcessingStatus, RollingTranscript, Session, SessionOptions};
pub use paths::{ChunkRange, SessionPaths, SessionRef};
pub use reconcile::{ChunkDiff, ChunkReconciler, Expected, Reconciliation, diff_against_expected};
pub use status::ProcessingStatusStore;
pub use update::{SessionUpdate, StatusUpdate, apply_status_update, apply_update};
