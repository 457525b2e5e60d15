use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use common::session::{SessionError, SessionRef};
use common::session::paths::{AUDIO_EXTENSION, ChunkRange};
use tracing::{info, instrument, warn};

use crate::error::{AppError, ErrorBody};
use crate::extractors::identity::CallerIdentity;
use crate::models::session::{ChunkUploadQuery, ChunkUploadResponse, MissingChunksResponse};
use crate::state::AppState;

/// Body limit for chunk uploads. Larger bodies are answered with 413.
pub fn chunk_upload_body_limit(max_chunk_size: usize) -> DefaultBodyLimit {
    DefaultBodyLimit::max(max_chunk_size)
}

fn chunk_content_type(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("audio/{AUDIO_EXTENSION}"))
}

/// The session's stored `chunkDuration`, if its document can be read.
async fn recorded_chunk_duration(
    state: &AppState,
    session: &SessionRef,
) -> Result<Option<u32>, AppError> {
    match state
        .sessions
        .resolve(session.user_id(), session.session_id())
        .await
    {
        Ok(resolved) => Ok(resolved
            .into_session()
            .map(|s| s.audio.chunk_duration)
            .filter(|d| *d > 0)),
        Err(SessionError::Serialization { key, source }) => {
            warn!(%key, error = %source, "Session document unreadable, using default chunk duration");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

#[utoipa::path(
    put,
    path = "/{session_id}/chunks/{chunk_number}",
    tag = "Chunks",
    operation_id = "uploadChunk",
    summary = "Store one audio chunk",
    description = "Writes the request body under the key derived from the chunk number and \
        duration. Without `duration` the session's recorded `chunkDuration` is used, falling back \
        to `upload.default_chunk_duration` when the session is unknown. Re-uploading a chunk \
        replaces it. The content type defaults to `audio/webm`.",
    params(
        ("session_id" = String, Path, description = "Session id"),
        ("chunk_number" = u32, Path, description = "1-based chunk ordinal"),
        ChunkUploadQuery,
        ("X-User-Id" = String, Header, description = "Caller id set by the gateway"),
    ),
    request_body(content = Vec<u8>, content_type = "audio/webm", description = "Chunk bytes"),
    responses(
        (status = 201, description = "Chunk stored", body = ChunkUploadResponse),
        (status = 400, description = "Invalid chunk number or duration (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Missing identity (IDENTITY_MISSING)", body = ErrorBody),
        (status = 413, description = "Chunk too large (PAYLOAD_TOO_LARGE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, identity, headers, body), fields(user_id = %identity.user_id))]
pub async fn upload_chunk(
    identity: CallerIdentity,
    State(state): State<AppState>,
    Path((session_id, chunk_number)): Path<(String, u32)>,
    Query(query): Query<ChunkUploadQuery>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<impl IntoResponse, AppError> {
    let max_chunk_size = state.config.upload.max_chunk_size;
    let body = body.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(max_chunk_size as u64)
        } else {
            AppError::Validation(e.body_text())
        }
    })?;
    if body.len() > max_chunk_size {
        return Err(AppError::PayloadTooLarge(max_chunk_size as u64));
    }

    let session = SessionRef::new(&identity.user_id, &session_id)?;
    let duration = match query.duration {
        Some(duration) => duration,
        None => recorded_chunk_duration(&state, &session)
            .await?
            .unwrap_or(state.config.upload.default_chunk_duration),
    };
    let range = ChunkRange::for_chunk(chunk_number, duration)?;
    let key = session.paths().chunk(&range);

    state
        .store
        .put(&key, &body, &chunk_content_type(&headers))
        .await?;
    info!(%key, chunk_number, size = body.len(), "Stored chunk");

    Ok((
        StatusCode::CREATED,
        Json(ChunkUploadResponse {
            session_id: session.session_id().to_string(),
            chunk_number,
            chunk_key: key,
            size: body.len(),
            max_chunk_size,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/{session_id}/missing-chunks",
    tag = "Chunks",
    operation_id = "getMissingChunks",
    summary = "Report which chunks have not been stored",
    description = "Lists stored chunks and compares them with the session's recorded chunk \
        count. When the session document cannot be read, `expected` is null and nothing is \
        reported missing.",
    params(
        ("session_id" = String, Path, description = "Session id"),
        ("X-User-Id" = String, Header, description = "Caller id set by the gateway"),
    ),
    responses(
        (status = 200, description = "Reconciliation result", body = MissingChunksResponse),
        (status = 400, description = "Unusable session id (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Missing identity (IDENTITY_MISSING)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, identity), fields(user_id = %identity.user_id))]
pub async fn missing_chunks(
    identity: CallerIdentity,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<MissingChunksResponse>, AppError> {
    let session = SessionRef::new(&identity.user_id, &session_id)?;
    let reconciliation = state
        .reconciler
        .reconcile(&identity.user_id, &session_id)
        .await?;

    Ok(Json(MissingChunksResponse::new(
        session.session_id().to_string(),
        reconciliation,
    )))
}
