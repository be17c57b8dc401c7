//! Speech-to-text for lecture media.
//!
//! The pipeline only sees the [`Transcoder`] trait; [`WhisperTranscoder`]
//! is the production implementation (ffmpeg extraction + OpenAI Whisper).

mod whisper;

pub use whisper::WhisperTranscoder;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Converts a media file into a transcript.
///
/// Implementations may block for a long time; callers wrap them in a
/// deadline and race them against cancellation.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Extract audio from `source` and transcribe it.
    async fn transcribe(&self, source: &Path) -> Result<Transcript>;
}

/// A complete transcript with segments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    /// Full transcript text (segments joined by a space).
    pub text: String,
    /// Individual segments with timestamps.
    pub segments: Vec<TranscriptSegment>,
    /// Total duration in seconds.
    pub duration_seconds: f64,
}

impl Transcript {
    /// Create a transcript from ordered segments.
    pub fn new(segments: Vec<TranscriptSegment>) -> Self {
        let text = segments
            .iter()
            .map(|s| s.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let duration_seconds = segments.last().map(|s| s.end_seconds).unwrap_or(0.0);

        Self {
            text,
            segments,
            duration_seconds,
        }
    }

    /// Build a single-segment transcript from plain text.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(vec![TranscriptSegment::new(0.0, 0.0, text.into())])
    }
}

/// A single segment of a transcript with timestamp information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds.
    pub start_seconds: f64,
    /// End time in seconds.
    pub end_seconds: f64,
    /// Transcribed text content.
    pub text: String,
}

impl TranscriptSegment {
    /// Create a new transcript segment.
    pub fn new(start_seconds: f64, end_seconds: f64, text: String) -> Self {
        Self {
            start_seconds,
            end_seconds,
            text,
        }
    }
}
