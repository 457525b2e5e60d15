use common::session::{
    Layout, ProcessingStatus, Reconciliation, Session, SessionOptions, SessionSummary,
};
use serde::{Deserialize, Serialize};

/// Request body for explicitly creating a session.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateSessionRequest {
    /// Client-chosen session id. Characters outside `[A-Za-z0-9_-]` are dropped.
    #[schema(example = "meeting-2024-01-15-1430")]
    pub session_id: String,
    /// Seconds of audio per chunk. Default: 5.
    #[schema(example = 5)]
    pub chunk_duration: Option<u32>,
    #[schema(example = 44100)]
    pub sample_rate: Option<u32>,
    #[schema(example = "en")]
    pub language: Option<String>,
    #[schema(example = "Weekly sync")]
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    #[schema(example = json!(["Alice", "Bob"]))]
    pub participants: Option<Vec<String>>,
    pub location: Option<String>,
    pub previous_session: Option<String>,
}

impl CreateSessionRequest {
    pub fn into_options(self, user_email: &str) -> SessionOptions {
        SessionOptions {
            user_email: Some(user_email.to_string()),
            chunk_duration: self.chunk_duration,
            sample_rate: self.sample_rate,
            language: self.language,
            title: self.title,
            description: self.description,
            tags: self.tags,
            participants: self.participants,
            location: self.location,
            previous_session: self.previous_session,
            ..Default::default()
        }
    }
}

/// Response DTO for a newly created session.
#[derive(Serialize, utoipa::ToSchema)]
pub struct CreateSessionResponse {
    /// Session id after sanitizing.
    #[schema(example = "meeting-2024-01-15-1430")]
    pub session_id: String,
    /// Key of the session document.
    #[schema(example = "users/u1/audio/sessions/meeting-2024-01-15-1430/session.json")]
    pub session_key: String,
    #[schema(value_type = Object)]
    pub session: Session,
    #[schema(value_type = Object)]
    pub status: ProcessingStatus,
}

/// Response DTO for a session lookup.
#[derive(Serialize, utoipa::ToSchema)]
pub struct SessionResponse {
    /// Storage layout the document was read from: `canonical` or `legacy`.
    #[schema(value_type = String, example = "canonical")]
    pub layout: Layout,
    /// The camelCase session document.
    #[schema(value_type = Object)]
    pub session: Session,
}

/// Response DTO for listing a user's sessions.
#[derive(Serialize, utoipa::ToSchema)]
pub struct SessionListResponse {
    pub user_id: String,
    /// Newest first.
    #[schema(value_type = Vec<Object>)]
    pub sessions: Vec<SessionSummary>,
    pub count: usize,
}

/// Response DTO for a metadata write.
#[derive(Serialize, utoipa::ToSchema)]
pub struct UpdateMetadataResponse {
    pub session_id: String,
    pub session_key: String,
    /// `true` when the session did not exist and was created by this call.
    pub created: bool,
    #[schema(value_type = Object)]
    pub session: Session,
}

/// Query parameters for chunk uploads.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ChunkUploadQuery {
    /// Seconds of audio per chunk. Default: the session's `chunkDuration`, or
    /// `upload.default_chunk_duration` for unknown sessions.
    pub duration: Option<u32>,
}

/// Response DTO for a stored chunk.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ChunkUploadResponse {
    #[schema(example = "meeting-2024-01-15-1430")]
    pub session_id: String,
    #[schema(example = 12)]
    pub chunk_number: u32,
    #[schema(example = "users/u1/audio/sessions/meeting-2024-01-15-1430/chunks/00055-00060.webm")]
    pub chunk_key: String,
    /// Bytes written.
    pub size: usize,
    /// Largest accepted chunk in bytes.
    #[schema(example = 26214400)]
    pub max_chunk_size: usize,
}

/// Response DTO for chunk reconciliation.
#[derive(Serialize, utoipa::ToSchema)]
pub struct MissingChunksResponse {
    pub session_id: String,
    /// Ordinals found in storage, ascending.
    #[schema(example = json!([1, 2, 4]))]
    pub uploaded: Vec<u32>,
    /// Recorded `chunkCount`, or `null` when the session document is unreadable.
    #[schema(example = 5)]
    pub expected: Option<u32>,
    #[schema(example = json!([3, 5]))]
    pub missing: Vec<u32>,
    /// `true` when the expected count is known and nothing is missing.
    pub complete: bool,
}

impl MissingChunksResponse {
    pub fn new(session_id: String, reconciliation: Reconciliation) -> Self {
        let expected = reconciliation.expected.count();
        Self {
            session_id,
            complete: expected.is_some() && reconciliation.missing.is_empty(),
            uploaded: reconciliation.uploaded,
            expected,
            missing: reconciliation.missing,
        }
    }
}
