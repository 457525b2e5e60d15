use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::paths::DEFAULT_CHUNK_DURATION;

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_PENDING: &str = "pending";
pub const UNKNOWN_EMAIL: &str = "unknown";

fn default_status() -> String {
    STATUS_PENDING.into()
}
fn default_chunk_duration() -> u32 {
    DEFAULT_CHUNK_DURATION
}
fn default_sample_rate() -> u32 {
    44_100
}
fn default_format() -> String {
    "webm".into()
}
fn default_provider() -> String {
    "whisper".into()
}
fn default_model() -> String {
    "whisper-1".into()
}
fn default_language() -> String {
    "en".into()
}

/// Session document stored at `session.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default = "unknown_email")]
    pub user_email: String,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub audio: AudioInfo,
    #[serde(default)]
    pub transcription: TranscriptionInfo,
    #[serde(default)]
    pub analysis: AnalysisInfo,
    #[serde(default)]
    pub processing: ProcessingInfo,
    #[serde(default)]
    pub metadata: SessionDetails,
}

fn unknown_email() -> String {
    UNKNOWN_EMAIL.into()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioInfo {
    /// Total recorded seconds.
    #[serde(default)]
    pub duration: f64,
    /// Number of chunks the recorder reports having produced.
    #[serde(default)]
    pub chunk_count: u32,
    #[serde(default = "default_chunk_duration")]
    pub chunk_duration: u32,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for AudioInfo {
    fn default() -> Self {
        Self {
            duration: 0.0,
            chunk_count: 0,
            chunk_duration: default_chunk_duration(),
            sample_rate: default_sample_rate(),
            format: default_format(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionInfo {
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub processed_chunks: u32,
    #[serde(default)]
    pub total_chunks: u32,
    #[serde(default)]
    pub last_processed_at: Option<DateTime<Utc>>,
}

impl Default for TranscriptionInfo {
    fn default() -> Self {
        Self {
            status: default_status(),
            provider: default_provider(),
            model: default_model(),
            language: default_language(),
            confidence: 0.0,
            processed_chunks: 0,
            total_chunks: 0,
            last_processed_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisInfo {
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub topics_detected: Vec<String>,
    #[serde(default)]
    pub speaker_count: u32,
    #[serde(default)]
    pub decisions_count: u32,
    #[serde(default)]
    pub action_items_count: u32,
    #[serde(default)]
    pub last_analyzed_at: Option<DateTime<Utc>>,
}

impl Default for AnalysisInfo {
    fn default() -> Self {
        Self {
            status: default_status(),
            topics_detected: Vec::new(),
            speaker_count: 0,
            decisions_count: 0,
            action_items_count: 0,
            last_analyzed_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessingInfo {
    pub transcription_queue: u32,
    pub analysis_queue: u32,
    pub error_count: u32,
    pub last_heartbeat: Option<DateTime<Utc>>,
}

/// Free-form descriptive fields.
///
/// Keys this type does not know are kept in `extra` and written back
/// unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionDetails {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub participants: Vec<String>,
    pub location: String,
    pub previous_session: Option<String>,
    pub next_session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_context: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Caller-supplied settings for a new session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionOptions {
    pub user_email: Option<String>,
    pub chunk_duration: Option<u32>,
    pub sample_rate: Option<u32>,
    pub language: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub participants: Option<Vec<String>>,
    pub location: Option<String>,
    pub previous_session: Option<String>,
    pub summary: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub conversation_context: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

impl Session {
    /// Build the document a brand new session starts with.
    pub fn new_default(
        session_id: &str,
        user_id: &str,
        options: SessionOptions,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            user_email: non_empty(options.user_email).unwrap_or_else(unknown_email),
            created_at: now,
            updated_at: now,
            status: STATUS_ACTIVE.into(),
            audio: AudioInfo {
                chunk_duration: options
                    .chunk_duration
                    .filter(|d| *d > 0)
                    .unwrap_or(DEFAULT_CHUNK_DURATION),
                sample_rate: options
                    .sample_rate
                    .filter(|r| *r > 0)
                    .unwrap_or_else(default_sample_rate),
                ..AudioInfo::default()
            },
            transcription: TranscriptionInfo {
                language: non_empty(options.language).unwrap_or_else(default_language),
                ..TranscriptionInfo::default()
            },
            analysis: AnalysisInfo::default(),
            processing: ProcessingInfo {
                last_heartbeat: Some(now),
                ..ProcessingInfo::default()
            },
            metadata: SessionDetails {
                title: options.title.unwrap_or_default(),
                description: options.description.unwrap_or_default(),
                tags: options.tags.unwrap_or_default(),
                participants: options.participants.unwrap_or_default(),
                location: options.location.unwrap_or_default(),
                previous_session: non_empty(options.previous_session),
                next_session: None,
                summary: non_empty(options.summary),
                keywords: options.keywords.filter(|k| !k.is_empty()),
                conversation_context: non_empty(options.conversation_context),
                extra: Map::new(),
            },
        }
    }
}

/// Denormalized progress document stored at `processing/status.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStatus {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub audio: UploadProgress,
    #[serde(default)]
    pub transcription: StageProgress,
    #[serde(default)]
    pub analysis: StageProgress,
    #[serde(default)]
    pub realtime: RealtimeProgress,
}

impl ProcessingStatus {
    pub fn new_default(session_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.to_string(),
            timestamp: now,
            audio: UploadProgress::default(),
            transcription: StageProgress::default(),
            analysis: StageProgress::default(),
            realtime: RealtimeProgress::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadProgress {
    pub chunks_uploaded: u32,
    pub chunks_expected: u32,
    pub upload_complete: bool,
    pub last_chunk_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StageProgress {
    pub chunks_queued: u32,
    pub chunks_processing: u32,
    pub chunks_completed: u32,
    pub chunks_failed: u32,
    pub estimated_completion: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RealtimeProgress {
    pub connected_clients: u32,
    pub last_broadcast: Option<DateTime<Utc>>,
    pub queue_depth: u32,
}

/// Empty rolling transcript written when a session is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollingTranscript {
    pub session_id: String,
    pub last_updated: DateTime<Utc>,
    pub total_duration: f64,
    pub segments: Vec<Value>,
    pub stats: TranscriptStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranscriptStats {
    pub total_words: u32,
    pub avg_confidence: f64,
    pub speaker_changes: u32,
    pub processing_latency: f64,
}

impl RollingTranscript {
    pub fn empty(session_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.to_string(),
            last_updated: now,
            total_duration: 0.0,
            segments: Vec::new(),
            stats: TranscriptStats::default(),
        }
    }
}
