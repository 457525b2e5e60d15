use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use common::session::{
    Layout, ProcessingStatus, Resolved, SessionRef, SessionUpdate, StatusUpdate, Upserted,
};
use tracing::{info, instrument};

use crate::error::{AppError, ErrorBody};
use crate::extractors::identity::CallerIdentity;
use crate::extractors::json::AppJson;
use crate::models::session::{
    CreateSessionRequest, CreateSessionResponse, SessionListResponse, SessionResponse,
    UpdateMetadataResponse,
};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/",
    tag = "Sessions",
    operation_id = "listSessions",
    summary = "List the caller's sessions",
    description = "Returns every session folder of the caller, newest first. Folders without a \
        readable session document are included with `session: null`.",
    params(("X-User-Id" = String, Header, description = "Caller id set by the gateway")),
    responses(
        (status = 200, description = "Sessions", body = SessionListResponse),
        (status = 400, description = "Unusable user id (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Missing identity (IDENTITY_MISSING)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, identity), fields(user_id = %identity.user_id))]
pub async fn list_sessions(
    identity: CallerIdentity,
    State(state): State<AppState>,
) -> Result<Json<SessionListResponse>, AppError> {
    let sessions = state.sessions.list(&identity.user_id).await?;
    Ok(Json(SessionListResponse {
        user_id: identity.user_id,
        count: sessions.len(),
        sessions,
    }))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Sessions",
    operation_id = "createSession",
    summary = "Create a session",
    description = "Writes the default session document, processing status and an empty rolling \
        transcript. Creating an existing session overwrites all three.",
    params(("X-User-Id" = String, Header, description = "Caller id set by the gateway")),
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created", body = CreateSessionResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Missing identity (IDENTITY_MISSING)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, identity, payload), fields(user_id = %identity.user_id, session_id))]
pub async fn create_session(
    identity: CallerIdentity,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    tracing::Span::current().record("session_id", payload.session_id.as_str());

    let session_id = payload.session_id.clone();
    let created = state
        .sessions
        .create(
            &identity.user_id,
            &session_id,
            payload.into_options(&identity.email),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: created.session.session_id.clone(),
            session_key: created.paths.session_file,
            session: created.session,
            status: created.status,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/{session_id}",
    tag = "Sessions",
    operation_id = "getSession",
    summary = "Get a session document",
    description = "Reads the canonical document, falling back to the legacy layout keyed by \
        today's date.",
    params(
        ("session_id" = String, Path, description = "Session id"),
        ("X-User-Id" = String, Header, description = "Caller id set by the gateway"),
    ),
    responses(
        (status = 200, description = "Session found", body = SessionResponse),
        (status = 401, description = "Missing identity (IDENTITY_MISSING)", body = ErrorBody),
        (status = 404, description = "Session not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, identity), fields(user_id = %identity.user_id))]
pub async fn get_session(
    identity: CallerIdentity,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let response = match state.sessions.resolve(&identity.user_id, &session_id).await? {
        Resolved::Canonical(session) => SessionResponse {
            layout: Layout::Canonical,
            session,
        },
        Resolved::Legacy(session) => SessionResponse {
            layout: Layout::Legacy,
            session,
        },
        Resolved::NotFound => {
            return Err(AppError::NotFound(format!(
                "Session metadata not found for {session_id}"
            )));
        }
    };
    Ok(Json(response))
}

#[utoipa::path(
    put,
    path = "/{session_id}/metadata",
    tag = "Sessions",
    operation_id = "updateSessionMetadata",
    summary = "Merge a partial update into the session document",
    description = "Fields that are absent, empty, zero or false keep their stored value. \
        When the session does not exist it is created from the update.",
    params(
        ("session_id" = String, Path, description = "Session id"),
        ("X-User-Id" = String, Header, description = "Caller id set by the gateway"),
        ("X-User-Email" = Option<String>, Header, description = "Caller email"),
    ),
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Session updated", body = UpdateMetadataResponse),
        (status = 201, description = "Session created", body = UpdateMetadataResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Missing identity (IDENTITY_MISSING)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, identity, update), fields(user_id = %identity.user_id))]
pub async fn update_metadata(
    identity: CallerIdentity,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    AppJson(update): AppJson<SessionUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let session_ref = SessionRef::new(&identity.user_id, &session_id)?;
    let outcome = state
        .sessions
        .upsert(&identity.user_id, &session_id, Some(identity.email.as_str()), update)
        .await?;

    let (status, created, session) = match outcome {
        Upserted::Updated(session) => (StatusCode::OK, false, session),
        Upserted::Created(created) => (StatusCode::CREATED, true, created.session),
    };
    info!(session = %session_ref, created, "Updated session metadata");

    Ok((
        status,
        Json(UpdateMetadataResponse {
            session_id: session_ref.session_id().to_string(),
            session_key: session_ref.paths().session_file,
            created,
            session,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/{session_id}/status",
    tag = "Sessions",
    operation_id = "getProcessingStatus",
    summary = "Get the processing status",
    description = "Returns the stored status document, or a zeroed one when it is missing.",
    params(
        ("session_id" = String, Path, description = "Session id"),
        ("X-User-Id" = String, Header, description = "Caller id set by the gateway"),
    ),
    responses(
        (status = 200, description = "Processing status", body = serde_json::Value),
        (status = 401, description = "Missing identity (IDENTITY_MISSING)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, identity), fields(user_id = %identity.user_id))]
pub async fn get_status(
    identity: CallerIdentity,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ProcessingStatus>, AppError> {
    let status = state
        .status
        .load_or_default(&identity.user_id, &session_id)
        .await?;
    Ok(Json(status))
}

#[utoipa::path(
    patch,
    path = "/{session_id}/status",
    tag = "Sessions",
    operation_id = "updateProcessingStatus",
    summary = "Merge a partial update into the processing status",
    params(
        ("session_id" = String, Path, description = "Session id"),
        ("X-User-Id" = String, Header, description = "Caller id set by the gateway"),
    ),
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Updated status", body = serde_json::Value),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Missing identity (IDENTITY_MISSING)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, identity, update), fields(user_id = %identity.user_id))]
pub async fn update_status(
    identity: CallerIdentity,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    AppJson(update): AppJson<StatusUpdate>,
) -> Result<Json<ProcessingStatus>, AppError> {
    let status = state
        .status
        .update(&identity.user_id, &session_id, update)
        .await?;
    Ok(Json(status))
}
