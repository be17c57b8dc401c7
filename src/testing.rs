//! Fake collaborators shared by unit tests.

use crate::config::TokenizerSettings;
use crate::embedding::Embedder;
use crate::error::{LecternError, Result};
use crate::jobs::IngestionPipeline;
use crate::store::{
    Document, DocumentId, DocumentPatch, DocumentStore, MemoryDocumentStore, NewDocument, Video,
    VideoId,
};
use crate::tokenizer::{PartOfSpeech, Segmenter, Tokenizer};
use crate::transcription::{Transcoder, Transcript};
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Clone)]
enum Behavior {
    Text(String),
    Fail(String),
    Block,
}

/// Transcoder returning canned results.
#[derive(Clone)]
pub struct FakeTranscoder {
    behavior: Behavior,
    started: Arc<Notify>,
    calls: Arc<AtomicUsize>,
}

impl FakeTranscoder {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            started: Arc::new(Notify::new()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn text(text: &str) -> Self {
        Self::with_behavior(Behavior::Text(text.to_string()))
    }

    pub fn failing(message: &str) -> Self {
        Self::with_behavior(Behavior::Fail(message.to_string()))
    }

    /// Never finishes; only cancellation or a deadline ends the call.
    pub fn blocking() -> Self {
        Self::with_behavior(Behavior::Block)
    }

    /// Notified each time a transcription starts.
    pub fn started(&self) -> Arc<Notify> {
        Arc::clone(&self.started)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcribe(&self, _source: &Path) -> Result<Transcript> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();

        match &self.behavior {
            Behavior::Text(text) => Ok(Transcript::from_text(text.clone())),
            Behavior::Fail(message) => Err(LecternError::Transcode(message.clone())),
            Behavior::Block => std::future::pending().await,
        }
    }
}

/// Deterministic embedder: character histogram, or a fixed vector.
#[derive(Clone)]
pub struct FakeEmbedder {
    dimensions: usize,
    fixed: Option<Vec<f32>>,
    fail: bool,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            fixed: None,
            fail: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(dimensions: usize) -> Self {
        Self {
            fail: true,
            ..Self::new(dimensions)
        }
    }

    /// Always return `vector`.
    pub fn fixed(vector: Vec<f32>) -> Self {
        Self {
            fixed: Some(vector.clone()),
            ..Self::new(vector.len())
        }
    }

    /// Texts embedded so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.lock().unwrap().push(text.to_string());

        if self.fail {
            return Err(LecternError::Embedding("embedding service unavailable".to_string()));
        }
        if let Some(vector) = &self.fixed {
            return Ok(vector.clone());
        }

        let mut vector = vec![0.0; self.dimensions];
        for c in text.chars().filter(|c| !c.is_whitespace()) {
            vector[c as usize % self.dimensions] += 1.0;
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Segmenter whose dictionary is never available.
pub struct BrokenSegmenter;

impl Segmenter for BrokenSegmenter {
    fn segment(&self, _text: &str) -> Result<Vec<(String, PartOfSpeech)>> {
        Err(LecternError::TokenizationDegraded("dictionary unavailable".into()))
    }
}

/// Empty source file with an accepted video extension.
pub fn media_file() -> tempfile::NamedTempFile {
    tempfile::Builder::new()
        .prefix("lecture")
        .suffix(".mp4")
        .tempfile()
        .unwrap()
}

/// Memory store whose transcript write waits for the test to release it.
pub struct ParkedStore {
    inner: MemoryDocumentStore,
    parked: Arc<Notify>,
    release: Arc<Notify>,
}

impl ParkedStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryDocumentStore::new(),
            parked: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }

    /// Notified once a transcript write is waiting.
    pub fn parked(&self) -> Arc<Notify> {
        Arc::clone(&self.parked)
    }

    /// Let the waiting transcript write through.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl DocumentStore for ParkedStore {
    async fn create_video(&self, title: &str, file_path: &str) -> Result<Video> {
        self.inner.create_video(title, file_path).await
    }

    async fn update_video_transcript(&self, id: VideoId, transcript: &str) -> Result<()> {
        self.parked.notify_one();
        self.release.notified().await;
        self.inner.update_video_transcript(id, transcript).await
    }

    async fn get_video(&self, id: VideoId) -> Result<Option<Video>> {
        self.inner.get_video(id).await
    }

    async fn list_videos(&self) -> Result<Vec<Video>> {
        self.inner.list_videos().await
    }

    async fn insert_document(&self, document: NewDocument) -> Result<Document> {
        self.inner.insert_document(document).await
    }

    async fn update_document(&self, id: DocumentId, patch: DocumentPatch) -> Result<Document> {
        self.inner.update_document(id, patch).await
    }

    async fn get_document(&self, id: DocumentId) -> Result<Option<Document>> {
        self.inner.get_document(id).await
    }

    async fn get_all_documents(&self) -> Result<Vec<Document>> {
        self.inner.get_all_documents().await
    }

    async fn delete_document(&self, id: DocumentId) -> Result<bool> {
        self.inner.delete_document(id).await
    }

    async fn document_count(&self) -> Result<usize> {
        self.inner.document_count().await
    }
}

/// Pipeline over fakes with the default tokenizer.
pub fn pipeline_with(
    transcoder: FakeTranscoder,
    embedder: FakeEmbedder,
    store: Arc<dyn DocumentStore>,
) -> IngestionPipeline {
    IngestionPipeline::new(
        Arc::new(transcoder),
        Tokenizer::new(&TokenizerSettings::default()),
        Arc::new(embedder),
        store,
    )
}
