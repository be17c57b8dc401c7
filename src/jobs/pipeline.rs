//! Staged ingestion: transcribe, tokenize, embed, index.

use super::{IngestRequest, JobHandle};
use crate::config::{EmbeddingSettings, JobSettings, TranscriptionSettings};
use crate::embedding::{mean_embedding, split_for_embedding, Embedder};
use crate::error::{LecternError, Result};
use crate::store::{
    ContentUpdate, DocumentId, DocumentPatch, DocumentStore, NewDocument, TitleUpdate, VideoId,
};
use crate::tokenizer::{TokenStream, Tokenizer};
use crate::transcription::Transcoder;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Which derived fields a job has to regenerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IndexPlan {
    target: Option<DocumentId>,
    title_changed: bool,
    content_changed: bool,
}

impl IndexPlan {
    fn describe(&self) -> String {
        match self.target {
            None => "Indexing as a new document".to_string(),
            Some(id) => {
                let mut changed = Vec::new();
                if self.title_changed {
                    changed.push("title");
                }
                if self.content_changed {
                    changed.push("content");
                }
                if changed.is_empty() {
                    format!("Updating document {}: no changes", id)
                } else {
                    format!("Updating document {}: {} changed", id, changed.join(" and "))
                }
            }
        }
    }
}

/// Which source files Prepare accepts.
#[derive(Debug, Clone)]
pub struct SourcePolicy {
    allowed_extensions: Vec<String>,
    max_bytes: u64,
}

impl SourcePolicy {
    pub fn new<I, S>(allowed_extensions: I, max_bytes: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
            max_bytes,
        }
    }

    pub fn from_settings(settings: &JobSettings) -> Self {
        Self::new(&settings.allowed_extensions, settings.max_source_bytes)
    }

    fn check_extension(&self, path: &Path) -> Result<()> {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if self.allowed_extensions.iter().any(|allowed| *allowed == extension) {
            return Ok(());
        }
        Err(LecternError::InvalidInput(format!(
            "Unsupported source type {:?} for {} (allowed: {})",
            extension,
            path.display(),
            self.allowed_extensions.join(", ")
        )))
    }

    fn check_size(&self, path: &Path, size: u64) -> Result<()> {
        if size > self.max_bytes {
            return Err(LecternError::InvalidInput(format!(
                "Source {} is {} bytes, above the {} byte limit",
                path.display(),
                size,
                self.max_bytes
            )));
        }
        Ok(())
    }
}

impl Default for SourcePolicy {
    fn default() -> Self {
        Self::from_settings(&JobSettings::default())
    }
}

/// Runs one ingestion job from source file to indexed document.
pub struct IngestionPipeline {
    transcoder: Arc<dyn Transcoder>,
    tokenizer: Tokenizer,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn DocumentStore>,
    sources: SourcePolicy,
    transcribe_timeout: Duration,
    embed_timeout: Duration,
    max_embed_chars: usize,
}

impl IngestionPipeline {
    pub fn new(
        transcoder: Arc<dyn Transcoder>,
        tokenizer: Tokenizer,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            transcoder,
            tokenizer,
            embedder,
            store,
            sources: SourcePolicy::default(),
            transcribe_timeout: Duration::from_secs(TranscriptionSettings::default().timeout_seconds),
            embed_timeout: Duration::from_secs(EmbeddingSettings::default().timeout_seconds),
            max_embed_chars: EmbeddingSettings::default().max_input_chars,
        }
    }

    pub fn with_source_policy(mut self, sources: SourcePolicy) -> Self {
        self.sources = sources;
        self
    }

    /// Longest text sent in a single embedding call.
    pub fn with_max_embed_chars(mut self, max_chars: usize) -> Self {
        self.max_embed_chars = max_chars;
        self
    }

    /// Override the deadlines on the external calls.
    pub fn with_timeouts(mut self, transcribe: Duration, embed: Duration) -> Self {
        self.transcribe_timeout = transcribe;
        self.embed_timeout = embed;
        self
    }

    /// Run the job to a terminal state. Errors are recorded on the job, never returned.
    #[instrument(skip(self, handle, request), fields(job_id = %handle.id(), title = %request.title))]
    pub async fn run(&self, handle: &JobHandle, request: IngestRequest, video_id: VideoId) {
        handle.start();

        match self.execute(handle, &request, video_id).await {
            Ok(document_id) => {
                info!("Indexed document {}", document_id);
                handle.complete(document_id, format!("Indexed document {}", document_id));
            }
            Err(LecternError::Cancelled(reason)) => {
                info!("Job cancelled: {}", reason);
                handle.fail(format!("cancelled: {}", reason));
            }
            Err(e) => {
                error!("Ingestion failed: {}", e);
                handle.fail(e.to_string());
            }
        }
    }

    async fn execute(
        &self,
        handle: &JobHandle,
        request: &IngestRequest,
        video_id: VideoId,
    ) -> Result<DocumentId> {
        handle.checkpoint("prepare")?;
        let size = prepare_source(&request.source_path, &self.sources).await?;
        handle.advance(
            10,
            format!("Prepared {} ({} bytes)", request.source_path.display(), size),
        );

        handle.checkpoint("transcribe")?;
        let transcript = handle
            .bounded(
                "transcription",
                self.transcribe_timeout,
                self.transcoder.transcribe(&request.source_path),
            )
            .await?;
        if transcript.text.trim().is_empty() {
            return Err(LecternError::Transcode("transcript is empty".to_string()));
        }
        handle.advance(
            50,
            format!(
                "Transcribed {} characters in {} segments",
                transcript.text.chars().count(),
                transcript.segments.len()
            ),
        );

        handle.checkpoint("persist transcript")?;
        self.store
            .update_video_transcript(video_id, &transcript.text)
            .await?;
        let plan = self.plan(request, &transcript.text).await?;
        handle.note(plan.describe());

        handle.checkpoint("tokenize")?;
        let tokenized_text = if plan.content_changed {
            let stream = self.tokenizer.tokenize(&transcript.text);
            if let TokenStream::Fallback { reason, .. } = &stream {
                warn!("Tokenization degraded: {}", reason);
                handle.note(format!(
                    "Tokenization degraded, using whitespace tokens: {}",
                    reason
                ));
            }
            let count = stream.tokens().len();
            handle.advance(60, format!("Tokenized content into {} tokens", count));
            Some(stream.to_text())
        } else {
            handle.advance(60, "Content unchanged, keeping existing tokens");
            None
        };

        handle.checkpoint("embed")?;
        let title_embedding = if plan.title_changed {
            Some(
                handle
                    .bounded(
                        "title embedding",
                        self.embed_timeout,
                        self.embedder.embed(&request.title),
                    )
                    .await?,
            )
        } else {
            None
        };
        let content_embedding = if tokenized_text.is_some() {
            Some(self.embed_content(handle, &transcript.text).await?)
        } else {
            None
        };
        let embedded = title_embedding.is_some() as usize + content_embedding.is_some() as usize;
        handle.advance(80, format!("Generated {} embedding(s)", embedded));

        handle.checkpoint("index")?;
        let title = title_embedding.map(|title_embedding| TitleUpdate {
            title: request.title.clone(),
            title_embedding,
        });
        let content = match (tokenized_text, content_embedding) {
            (Some(tokenized_text), Some(content_embedding)) => Some(ContentUpdate {
                content: transcript.text.clone(),
                tokenized_text,
                content_embedding,
            }),
            _ => None,
        };

        match plan.target {
            None => {
                let (title, content) = title.zip(content).ok_or_else(|| {
                    LecternError::Store("new document is missing derived fields".to_string())
                })?;
                let document = self
                    .store
                    .insert_document(NewDocument {
                        video_id: Some(video_id),
                        title,
                        content,
                    })
                    .await?;
                Ok(document.id)
            }
            Some(id) => {
                let patch = DocumentPatch {
                    video_id: Some(video_id),
                    title,
                    content,
                };
                let document = self.store.update_document(id, patch).await?;
                Ok(document.id)
            }
        }
    }

    /// Embed long content slice by slice and average the vectors.
    async fn embed_content(&self, handle: &JobHandle, text: &str) -> Result<Vec<f32>> {
        let slices = split_for_embedding(text, self.max_embed_chars);
        if slices.len() > 1 {
            handle.note(format!(
                "Content exceeds {} characters, embedding {} slices",
                self.max_embed_chars,
                slices.len()
            ));
        }

        let mut vectors = Vec::with_capacity(slices.len());
        for slice in slices {
            let vector = handle
                .bounded("content embedding", self.embed_timeout, self.embedder.embed(slice))
                .await?;
            vectors.push(vector);
        }
        mean_embedding(&vectors)
    }

    /// Decide which fields need regenerating. New documents need everything.
    async fn plan(&self, request: &IngestRequest, transcript: &str) -> Result<IndexPlan> {
        let Some(id) = request.document_id else {
            return Ok(IndexPlan {
                target: None,
                title_changed: true,
                content_changed: true,
            });
        };

        let existing = self
            .store
            .get_document(id)
            .await?
            .ok_or_else(|| LecternError::NotFound(format!("document {}", id)))?;

        Ok(IndexPlan {
            target: Some(id),
            title_changed: existing.title != request.title,
            content_changed: existing.content != transcript,
        })
    }
}

/// Check the source is an accepted, readable file and return its size.
async fn prepare_source(path: &Path, sources: &SourcePolicy) -> Result<u64> {
    sources.check_extension(path)?;

    let metadata = tokio::fs::metadata(path).await.map_err(|e| {
        LecternError::InvalidInput(format!("Cannot read source {}: {}", path.display(), e))
    })?;

    if !metadata.is_file() {
        return Err(LecternError::InvalidInput(format!(
            "Source is not a file: {}",
            path.display()
        )));
    }

    sources.check_size(path, metadata.len())?;
    Ok(metadata.len())
}
