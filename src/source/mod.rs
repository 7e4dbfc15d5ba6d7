use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod resolver;
pub mod simulated;

/// A single timed line of a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Caption text
    pub text: String,

    /// Offset from the start of the video, in seconds
    pub start: f64,

    /// How long the line stays on screen, in seconds
    pub duration: f64,
}

/// Content-level outcome of one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    Success,
    NoTranscript,
    Error,
}

/// The result of fetching one video's transcript.
///
/// Constructed fresh per call and immutable once returned, except for
/// `processing_time`, which the orchestrator back-fills with the elapsed
/// wall time of the whole call (cache hits included).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult {
    /// Video this result belongs to
    pub video_id: String,

    /// Content-level outcome
    pub status: FetchStatus,

    /// Display name of the delivered language, if any
    pub language: Option<String>,

    /// Language code of the delivered transcript, if any
    pub language_code: Option<String>,

    /// Whether the transcript was machine-generated
    pub is_generated: bool,

    /// Whether the source offers translation for this transcript
    pub is_translatable: bool,

    /// Transcript lines, present only on `Success`
    pub entries: Option<Vec<TranscriptEntry>>,

    /// Error message on `Error`/`NoTranscript`; may annotate a `Success`
    /// that went through a fallback path
    pub error: Option<String>,

    /// Wall-clock seconds spent producing this result
    pub processing_time: f64,
}

impl FetchResult {
    /// Build a `Success` result for a fetched transcript.
    pub fn success(
        video_id: impl Into<String>,
        language: impl Into<String>,
        language_code: impl Into<String>,
        entries: Vec<TranscriptEntry>,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            status: FetchStatus::Success,
            language: Some(language.into()),
            language_code: Some(language_code.into()),
            is_generated: false,
            is_translatable: false,
            entries: Some(entries),
            error: None,
            processing_time: 0.0,
        }
    }

    /// Build an `Error` result carrying a human-readable message.
    pub fn error(video_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            status: FetchStatus::Error,
            language: None,
            language_code: None,
            is_generated: false,
            is_translatable: false,
            entries: None,
            error: Some(message.into()),
            processing_time: 0.0,
        }
    }

    /// Build a `NoTranscript` result.
    pub fn no_transcript(video_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: FetchStatus::NoTranscript,
            ..Self::error(video_id, message)
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Success
    }

    /// True when the error message matches a pattern the remote source is
    /// known to produce intermittently (malformed or empty payloads). These
    /// are the only content errors worth retrying.
    pub fn is_transient_error(&self) -> bool {
        if self.status != FetchStatus::Error {
            return false;
        }
        self.error.as_deref().is_some_and(|msg| {
            let msg = msg.to_lowercase();
            msg.contains("no element found")
                || msg.contains("malformed")
                || msg.contains("empty transcript")
        })
    }
}

/// One transcript track a video offers.
///
/// Plain data: fetching and translating a track go through the
/// [`TranscriptSource`] that produced the descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptDescriptor {
    /// Display name, e.g. "English"
    pub language: String,

    /// BCP-47-ish code, e.g. "en"
    pub language_code: String,

    /// Machine-generated rather than uploaded captions
    pub is_generated: bool,

    /// Whether the source can translate this track
    pub is_translatable: bool,
}

/// Errors signaled by a transcript source.
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("Transcripts are disabled for this video.")]
    Disabled,

    #[error("no transcript found for language {0}")]
    NotFound(String),

    #[error("malformed transcript payload: {0}")]
    Malformed(String),

    #[error("{0}")]
    Unavailable(String),
}

/// Blocking access to the remote transcript service.
///
/// Implementations talk to the outside world and may block; the worker pool
/// exists to keep that blocking off the cooperative scheduler. This crate
/// ships only the in-process [`simulated::SimulatedSource`].
pub trait TranscriptSource: Send + Sync + 'static {
    /// Fetch the transcript in exactly `language_code`, if one exists.
    fn fetch_direct(
        &self,
        video_id: &str,
        language_code: &str,
    ) -> Result<Vec<TranscriptEntry>, SourceError>;

    /// Enumerate every transcript track the video offers.
    fn list_available(&self, video_id: &str) -> Result<Vec<TranscriptDescriptor>, SourceError>;

    /// Fetch the track described by `descriptor`.
    fn fetch_track(
        &self,
        video_id: &str,
        descriptor: &TranscriptDescriptor,
    ) -> Result<Vec<TranscriptEntry>, SourceError>;

    /// Translate the track described by `descriptor` into `target_language`.
    fn translate_track(
        &self,
        video_id: &str,
        descriptor: &TranscriptDescriptor,
        target_language: &str,
    ) -> Result<Vec<TranscriptEntry>, SourceError>;
}

/// The blocking unit of work the orchestrator dispatches through the pool.
///
/// Implementations never fail at the type level: every outcome, including
/// source faults, is folded into the returned [`FetchResult`].
#[cfg_attr(test, mockall::automock)]
pub trait TranscriptFetcher: Send + Sync + 'static {
    fn fetch(&self, video_id: &str, target_language: &str) -> FetchResult;
}

/// Adapter that runs the language-selection ladder over a concrete source.
pub struct SourceFetcher<S: TranscriptSource> {
    source: Arc<S>,
}

impl<S: TranscriptSource> SourceFetcher<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self { source }
    }
}

impl<S: TranscriptSource> TranscriptFetcher for SourceFetcher<S> {
    fn fetch(&self, video_id: &str, target_language: &str) -> FetchResult {
        resolver::resolve_transcript(self.source.as_ref(), video_id, target_language)
    }
}
