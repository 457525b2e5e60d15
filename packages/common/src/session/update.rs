//! Partial updates and the field-level merge rule.
//!
//! Recorder-owned fields (top-level `status`/`userEmail`, `audio`,
//! `metadata`) take the incoming value only when it is present and not
//! blank (empty string, empty list, zero, `false`). Pipeline-owned groups
//! (`transcription`, `analysis`, `processing` and the whole processing
//! status) take any present value, so counters can drop back to zero and
//! flags can be cleared. Groups are merged field by field, never replaced
//! wholesale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::model::{
    AnalysisInfo, AudioInfo, ProcessingInfo, ProcessingStatus, RealtimeProgress, Session,
    SessionDetails, SessionOptions, StageProgress, TranscriptionInfo, UploadProgress,
};

/// Values that count as "not provided" when merging.
pub trait Blank {
    fn is_blank(&self) -> bool;
}

impl Blank for String {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl<T> Blank for Vec<T> {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl Blank for u32 {
    fn is_blank(&self) -> bool {
        *self == 0
    }
}

impl Blank for f64 {
    fn is_blank(&self) -> bool {
        *self == 0.0 || self.is_nan()
    }
}

impl Blank for bool {
    fn is_blank(&self) -> bool {
        !*self
    }
}

fn merge<T: Blank>(slot: &mut T, incoming: Option<T>) {
    if let Some(value) = incoming
        && !value.is_blank()
    {
        *slot = value;
    }
}

fn merge_opt<T: Blank>(slot: &mut Option<T>, incoming: Option<T>) {
    if let Some(value) = incoming
        && !value.is_blank()
    {
        *slot = Some(value);
    }
}

fn set<T>(slot: &mut T, incoming: Option<T>) {
    if let Some(value) = incoming {
        *slot = value;
    }
}

fn set_opt<T>(slot: &mut Option<T>, incoming: Option<T>) {
    if incoming.is_some() {
        *slot = incoming;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioUpdate {
    pub duration: Option<f64>,
    pub chunk_count: Option<u32>,
    pub chunk_duration: Option<u32>,
    pub sample_rate: Option<u32>,
    pub format: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranscriptionUpdate {
    pub status: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub language: Option<String>,
    pub confidence: Option<f64>,
    pub processed_chunks: Option<u32>,
    pub total_chunks: Option<u32>,
    pub last_processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisUpdate {
    pub status: Option<String>,
    pub topics_detected: Option<Vec<String>>,
    pub speaker_count: Option<u32>,
    pub decisions_count: Option<u32>,
    pub action_items_count: Option<u32>,
    pub last_analyzed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessingUpdate {
    pub transcription_queue: Option<u32>,
    pub analysis_queue: Option<u32>,
    pub error_count: Option<u32>,
    pub last_heartbeat: Option<DateTime<Utc>>,
}

/// Changes to the descriptive `metadata` group.
///
/// Unknown keys land in `extra`; a non-null value there replaces or adds
/// the key in the stored document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetailsUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub participants: Option<Vec<String>>,
    pub location: Option<String>,
    pub previous_session: Option<String>,
    pub next_session: Option<String>,
    pub summary: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub conversation_context: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A partial change to a [`Session`]. Absent groups are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionUpdate {
    pub status: Option<String>,
    pub user_email: Option<String>,
    pub audio: Option<AudioUpdate>,
    pub transcription: Option<TranscriptionUpdate>,
    pub analysis: Option<AnalysisUpdate>,
    pub processing: Option<ProcessingUpdate>,
    pub metadata: Option<DetailsUpdate>,
}

impl AudioInfo {
    fn apply(&mut self, update: AudioUpdate) {
        merge(&mut self.duration, update.duration);
        merge(&mut self.chunk_count, update.chunk_count);
        merge(&mut self.chunk_duration, update.chunk_duration);
        merge(&mut self.sample_rate, update.sample_rate);
        merge(&mut self.format, update.format);
    }
}

impl TranscriptionInfo {
    fn apply(&mut self, update: TranscriptionUpdate) {
        set(&mut self.status, update.status);
        set(&mut self.provider, update.provider);
        set(&mut self.model, update.model);
        set(&mut self.language, update.language);
        set(&mut self.confidence, update.confidence);
        set(&mut self.processed_chunks, update.processed_chunks);
        set(&mut self.total_chunks, update.total_chunks);
        set_opt(&mut self.last_processed_at, update.last_processed_at);
    }
}

impl AnalysisInfo {
    fn apply(&mut self, update: AnalysisUpdate) {
        set(&mut self.status, update.status);
        set(&mut self.topics_detected, update.topics_detected);
        set(&mut self.speaker_count, update.speaker_count);
        set(&mut self.decisions_count, update.decisions_count);
        set(&mut self.action_items_count, update.action_items_count);
        set_opt(&mut self.last_analyzed_at, update.last_analyzed_at);
    }
}

impl ProcessingInfo {
    fn apply(&mut self, update: ProcessingUpdate) {
        set(&mut self.transcription_queue, update.transcription_queue);
        set(&mut self.analysis_queue, update.analysis_queue);
        set(&mut self.error_count, update.error_count);
        set_opt(&mut self.last_heartbeat, update.last_heartbeat);
    }
}

impl SessionDetails {
    fn apply(&mut self, update: DetailsUpdate) {
        merge(&mut self.title, update.title);
        merge(&mut self.description, update.description);
        merge(&mut self.tags, update.tags);
        merge(&mut self.participants, update.participants);
        merge(&mut self.location, update.location);
        merge_opt(&mut self.previous_session, update.previous_session);
        merge_opt(&mut self.next_session, update.next_session);
        merge_opt(&mut self.summary, update.summary);
        merge_opt(&mut self.keywords, update.keywords);
        merge_opt(&mut self.conversation_context, update.conversation_context);

        for (key, value) in update.extra {
            if !value.is_null() {
                self.extra.insert(key, value);
            }
        }
    }
}

/// Merge `update` into `existing` and stamp `updated_at`.
///
/// `updated_at` never moves backwards, even if `now` is behind the stored
/// value.
pub fn apply_update(mut existing: Session, update: SessionUpdate, now: DateTime<Utc>) -> Session {
    merge(&mut existing.status, update.status);
    merge(&mut existing.user_email, update.user_email);
    if let Some(audio) = update.audio {
        existing.audio.apply(audio);
    }
    if let Some(transcription) = update.transcription {
        existing.transcription.apply(transcription);
    }
    if let Some(analysis) = update.analysis {
        existing.analysis.apply(analysis);
    }
    if let Some(processing) = update.processing {
        existing.processing.apply(processing);
    }
    if let Some(metadata) = update.metadata {
        existing.metadata.apply(metadata);
    }
    existing.updated_at = now.max(existing.updated_at);
    existing
}

impl SessionUpdate {
    /// Options for creating the session this update was aimed at.
    pub fn to_options(&self, user_email: Option<&str>) -> SessionOptions {
        let audio = self.audio.clone().unwrap_or_default();
        let details = self.metadata.clone().unwrap_or_default();
        SessionOptions {
            user_email: user_email
                .map(str::to_string)
                .or_else(|| self.user_email.clone()),
            chunk_duration: audio.chunk_duration,
            sample_rate: audio.sample_rate,
            language: self
                .transcription
                .as_ref()
                .and_then(|t| t.language.clone()),
            title: details.title,
            description: details.description,
            tags: details.tags,
            participants: details.participants,
            location: details.location,
            previous_session: details.previous_session,
            summary: details.summary,
            keywords: details.keywords,
            conversation_context: details.conversation_context,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadProgressUpdate {
    pub chunks_uploaded: Option<u32>,
    pub chunks_expected: Option<u32>,
    pub upload_complete: Option<bool>,
    pub last_chunk_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StageProgressUpdate {
    pub chunks_queued: Option<u32>,
    pub chunks_processing: Option<u32>,
    pub chunks_completed: Option<u32>,
    pub chunks_failed: Option<u32>,
    pub estimated_completion: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RealtimeUpdate {
    pub connected_clients: Option<u32>,
    pub last_broadcast: Option<DateTime<Utc>>,
    pub queue_depth: Option<u32>,
}

/// A partial change to a [`ProcessingStatus`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusUpdate {
    pub audio: Option<UploadProgressUpdate>,
    pub transcription: Option<StageProgressUpdate>,
    pub analysis: Option<StageProgressUpdate>,
    pub realtime: Option<RealtimeUpdate>,
}

impl UploadProgress {
    fn apply(&mut self, update: UploadProgressUpdate) {
        set(&mut self.chunks_uploaded, update.chunks_uploaded);
        set(&mut self.chunks_expected, update.chunks_expected);
        set(&mut self.upload_complete, update.upload_complete);
        set_opt(&mut self.last_chunk_at, update.last_chunk_at);
    }
}

impl StageProgress {
    fn apply(&mut self, update: StageProgressUpdate) {
        set(&mut self.chunks_queued, update.chunks_queued);
        set(&mut self.chunks_processing, update.chunks_processing);
        set(&mut self.chunks_completed, update.chunks_completed);
        set(&mut self.chunks_failed, update.chunks_failed);
        set_opt(&mut self.estimated_completion, update.estimated_completion);
    }
}

impl RealtimeProgress {
    fn apply(&mut self, update: RealtimeUpdate) {
        set(&mut self.connected_clients, update.connected_clients);
        set_opt(&mut self.last_broadcast, update.last_broadcast);
        set(&mut self.queue_depth, update.queue_depth);
    }
}

/// Merge `update` into `existing` and stamp `timestamp`.
pub fn apply_status_update(
    mut existing: ProcessingStatus,
    update: StatusUpdate,
    now: DateTime<Utc>,
) -> ProcessingStatus {
    if let Some(audio) = update.audio {
        existing.audio.apply(audio);
    }
    if let Some(transcription) = update.transcription {
        existing.transcription.apply(transcription);
    }
    if let Some(analysis) = update.analysis {
        existing.analysis.apply(analysis);
    }
    if let Some(realtime) = update.realtime {
        existing.realtime.apply(realtime);
    }
    existing.timestamp = now.max(existing.timestamp);
    existing
}
