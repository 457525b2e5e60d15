//! Storage key derivation for session documents and chunk objects.
//!
//! Every key lives under `users/{user_id}/audio/sessions/{session_id}/`.
//! Chunk identity is encoded as the time range the chunk covers,
//! `{start:05}-{end:05}`, so the ordinal can be recovered from a listing.

use std::fmt;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use super::error::{Result, SessionError};

/// Extension of stored audio chunks.
pub const AUDIO_EXTENSION: &str = "webm";

/// Chunk length in seconds assumed when the caller gives none.
pub const DEFAULT_CHUNK_DURATION: u32 = 5;

/// Largest range bound, in seconds, that fits the five-digit key encoding.
pub const MAX_ENCODED_SECONDS: u64 = 99_999;

static CHUNK_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|/)(\d{5,})-(\d{5,})\.webm$").expect("chunk key pattern is valid")
});

/// Strip every character outside `[A-Za-z0-9_-]`.
pub fn sanitize_id(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

fn sanitize_required(raw: &str, what: &str) -> Result<String> {
    let clean = sanitize_id(raw);
    if clean.is_empty() {
        return Err(SessionError::InvalidArgument(format!(
            "{what} {raw:?} contains no usable characters"
        )));
    }
    Ok(clean)
}

/// Prefix under which every session folder of `user_id` lives.
pub fn sessions_prefix(user_id: &str) -> Result<String> {
    let user_id = sanitize_required(user_id, "user id")?;
    Ok(format!("users/{user_id}/audio/sessions/"))
}

/// The `[start, end)` range, in seconds, covered by one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub start: u64,
    pub end: u64,
}

impl ChunkRange {
    pub fn for_chunk(chunk_number: u32, chunk_duration: u32) -> Result<Self> {
        if chunk_number < 1 {
            return Err(SessionError::InvalidArgument(format!(
                "chunk number must be >= 1, got {chunk_number}"
            )));
        }
        if chunk_duration == 0 {
            return Err(SessionError::InvalidArgument(
                "chunk duration must be > 0".into(),
            ));
        }

        let duration = u64::from(chunk_duration);
        Ok(Self {
            start: (u64::from(chunk_number) - 1) * duration,
            end: u64::from(chunk_number) * duration,
        })
    }

    /// Zero-padded `(start, end)` as used in keys.
    pub fn render(&self) -> (String, String) {
        (format!("{:05}", self.start), format!("{:05}", self.end))
    }

    /// Recover the 1-based ordinal, assuming every chunk of the session
    /// has this range's duration.
    pub fn ordinal(&self) -> Option<u32> {
        let duration = self.end.checked_sub(self.start).filter(|d| *d > 0)?;
        u32::try_from(self.start / duration + 1).ok()
    }
}

impl fmt::Display for ChunkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:05}-{:05}", self.start, self.end)
    }
}

/// Largest chunk count a session with `chunk_duration` can record while
/// every chunk key stays within [`MAX_ENCODED_SECONDS`].
pub fn max_chunk_count(chunk_duration: u32) -> u32 {
    let limit = MAX_ENCODED_SECONDS / u64::from(chunk_duration.max(1));
    u32::try_from(limit).unwrap_or(u32::MAX)
}

/// Reject chunk counts beyond [`max_chunk_count`].
pub fn check_chunk_count(chunk_count: u32, chunk_duration: u32) -> Result<()> {
    let limit = max_chunk_count(chunk_duration);
    if chunk_count > limit {
        return Err(SessionError::InvalidArgument(format!(
            "chunk count {chunk_count} exceeds {limit} for {chunk_duration}s chunks"
        )));
    }
    Ok(())
}

/// Render the key range for a chunk, e.g. `(12, 5)` gives `("00055", "00060")`.
pub fn derive_timestamp_range(chunk_number: u32, chunk_duration: u32) -> Result<(String, String)> {
    Ok(ChunkRange::for_chunk(chunk_number, chunk_duration)?.render())
}

/// Parse the trailing `{start}-{end}.webm` of a chunk key.
pub fn parse_chunk_key(key: &str) -> Option<ChunkRange> {
    let caps = CHUNK_KEY_RE.captures(key)?;
    Some(ChunkRange {
        start: caps[1].parse().ok()?,
        end: caps[2].parse().ok()?,
    })
}

/// Sanitized identifiers of one session.
///
/// Holding a `SessionRef` means both ids passed sanitization and are
/// non-empty, so any key derived from it stays inside the user's folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionRef {
    user_id: String,
    session_id: String,
}

impl SessionRef {
    pub fn new(user_id: &str, session_id: &str) -> Result<Self> {
        Ok(Self {
            user_id: sanitize_required(user_id, "user id")?,
            session_id: sanitize_required(session_id, "session id")?,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn paths(&self) -> SessionPaths {
        SessionPaths::new(&self.user_id, &self.session_id)
    }

    /// Key of the v1 layout document for a session created on `date`.
    pub fn legacy_metadata_key(&self, date: NaiveDate) -> String {
        format!(
            "users/{}/audio/sessions/{}-{}/metadata.json",
            self.user_id,
            date.format("%Y-%m-%d"),
            self.session_id
        )
    }
}

impl fmt::Display for SessionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user_id, self.session_id)
    }
}

/// Every fixed key of one session in the v2 layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    pub base_path: String,
    pub session_file: String,
    pub chunks_path: String,
    pub transcripts_path: String,
    pub analysis_path: String,
    pub processing_path: String,
    pub exports_path: String,

    pub rolling_transcript: String,
    pub final_transcript: String,
    pub timeline_analysis: String,
    pub speaker_analysis: String,
    pub processing_status: String,
    pub transcription_queue: String,
    pub analysis_queue: String,
}

impl SessionPaths {
    fn new(user_id: &str, session_id: &str) -> Self {
        let base = format!("users/{user_id}/audio/sessions/{session_id}");
        Self {
            session_file: format!("{base}/session.json"),
            chunks_path: format!("{base}/chunks/"),
            transcripts_path: format!("{base}/transcripts/"),
            analysis_path: format!("{base}/analysis/"),
            processing_path: format!("{base}/processing/"),
            exports_path: format!("{base}/exports/"),
            rolling_transcript: format!("{base}/transcripts/rolling.json"),
            final_transcript: format!("{base}/transcripts/final.json"),
            timeline_analysis: format!("{base}/analysis/timeline.json"),
            speaker_analysis: format!("{base}/analysis/speakers.json"),
            processing_status: format!("{base}/processing/status.json"),
            transcription_queue: format!("{base}/processing/transcription-queue.json"),
            analysis_queue: format!("{base}/processing/analysis-queue.json"),
            base_path: base,
        }
    }

    pub fn chunk(&self, range: &ChunkRange) -> String {
        format!("{}{range}.{AUDIO_EXTENSION}", self.chunks_path)
    }

    pub fn transcript(&self, range: &ChunkRange) -> String {
        format!("{}{range}.json", self.transcripts_path)
    }
}

pub fn derive_session_paths(user_id: &str, session_id: &str) -> Result<SessionPaths> {
    Ok(SessionRef::new(user_id, session_id)?.paths())
}

pub fn derive_chunk_path(
    user_id: &str,
    session_id: &str,
    chunk_number: u32,
    chunk_duration: u32,
) -> Result<String> {
    let range = ChunkRange::for_chunk(chunk_number, chunk_duration)?;
    Ok(derive_session_paths(user_id, session_id)?.chunk(&range))
}

pub fn derive_transcript_path(
    user_id: &str,
    session_id: &str,
    chunk_number: u32,
    chunk_duration: u32,
) -> Result<String> {
    let range = ChunkRange::for_chunk(chunk_number, chunk_duration)?;
    Ok(derive_session_paths(user_id, session_id)?.transcript(&range))
}
