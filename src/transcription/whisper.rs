//! OpenAI Whisper transcription implementation.

use super::{Transcoder, Transcript, TranscriptSegment};
use crate::audio::{extract_audio, split_audio};
use crate::config::TranscriptionSettings;
use crate::error::{LecternError, Result};
use crate::openai::create_client;
use async_openai::types::{AudioInput, AudioResponseFormat, CreateTranscriptionRequestArgs};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Whisper-based transcoder: ffmpeg audio extraction, segmenting, then the
/// Whisper API per segment.
pub struct WhisperTranscoder {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    language: Option<String>,
    chunk_duration_seconds: u32,
    max_concurrent_chunks: usize,
    temp_dir: PathBuf,
}

impl WhisperTranscoder {
    /// Create a transcoder from settings. Scratch files go under `temp_dir`.
    pub fn new(settings: &TranscriptionSettings, temp_dir: PathBuf) -> Self {
        Self {
            client: create_client(),
            model: settings.model.clone(),
            language: settings.language.clone().filter(|l| !l.is_empty()),
            chunk_duration_seconds: settings.chunk_duration_seconds,
            max_concurrent_chunks: settings.max_concurrent_chunks.max(1),
            temp_dir,
        }
    }

    /// Transcribe a single audio file (no splitting).
    #[instrument(skip(self), fields(audio_path = %audio_path.display()))]
    async fn transcribe_single(&self, audio_path: &Path) -> Result<Vec<TranscriptSegment>> {
        debug!("Transcribing audio file");

        let file_bytes = tokio::fs::read(audio_path).await?;

        let mut request_builder = CreateTranscriptionRequestArgs::default();
        request_builder
            .file(AudioInput::from_vec_u8(
                audio_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("audio.mp3")
                    .to_string(),
                file_bytes,
            ))
            .model(&self.model)
            .response_format(AudioResponseFormat::VerboseJson);

        if let Some(lang) = &self.language {
            request_builder.language(lang);
        }

        let request = request_builder
            .build()
            .map_err(|e| LecternError::Transcode(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .audio()
            .transcribe_verbose_json(request)
            .await
            .map_err(|e| LecternError::OpenAI(format!("Whisper API error: {}", e)))?;

        let segments: Vec<TranscriptSegment> = response
            .segments
            .map(|segs| {
                segs.iter()
                    .map(|s| {
                        TranscriptSegment::new(s.start as f64, s.end as f64, s.text.trim().to_string())
                    })
                    .collect()
            })
            .unwrap_or_else(|| {
                vec![TranscriptSegment::new(
                    0.0,
                    response.duration as f64,
                    response.text.trim().to_string(),
                )]
            });

        debug!("Transcribed {} segments", segments.len());
        Ok(segments)
    }
}

#[async_trait]
impl Transcoder for WhisperTranscoder {
    #[instrument(skip(self), fields(source = %source.display()))]
    async fn transcribe(&self, source: &Path) -> Result<Transcript> {
        // Dropping the TempDir (including on cancellation) removes every scratch file.
        let scratch = tempfile::Builder::new()
            .prefix("lectern-")
            .tempdir_in(ensure_dir(&self.temp_dir).await?)?;

        let audio_path = extract_audio(source, scratch.path(), &Uuid::new_v4().to_string()).await?;
        let chunks = split_audio(&audio_path, scratch.path(), self.chunk_duration_seconds).await?;

        if chunks.len() == 1 {
            let segments = self.transcribe_single(&audio_path).await?;
            return Ok(Transcript::new(segments));
        }

        info!("Transcribing {} audio segments with {}", chunks.len(), self.model);

        // Fail fast: the first segment error aborts the whole transcription.
        let mut results: Vec<(usize, f64, Vec<TranscriptSegment>)> = Vec::with_capacity(chunks.len());
        let mut stream = stream::iter(chunks.into_iter().enumerate())
            .map(|(idx, slice)| async move {
                let result = self.transcribe_single(&slice.path).await;
                (idx, slice.offset_seconds, result)
            })
            .buffer_unordered(self.max_concurrent_chunks);

        while let Some((idx, offset, result)) = stream.next().await {
            match result {
                Ok(segments) => results.push((idx, offset, segments)),
                Err(e) => {
                    return Err(LecternError::Transcode(format!(
                        "Segment {} at {:.0}s failed: {}",
                        idx, offset, e
                    )));
                }
            }
        }

        Ok(Transcript::new(merge_segments(results)))
    }
}

/// Orders per-segment results and shifts their timestamps by each segment's offset.
fn merge_segments(mut results: Vec<(usize, f64, Vec<TranscriptSegment>)>) -> Vec<TranscriptSegment> {
    results.sort_by_key(|(idx, _, _)| *idx);

    let mut all_segments = Vec::new();
    for (_, offset, mut segments) in results {
        for segment in &mut segments {
            segment.start_seconds += offset;
            segment.end_seconds += offset;
        }
        all_segments.extend(segments);
    }
    all_segments
}

async fn ensure_dir(dir: &Path) -> Result<&Path> {
    tokio::fs::create_dir_all(dir).await?;
    Ok(dir)
}
