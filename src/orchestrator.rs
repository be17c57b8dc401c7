//! Wiring for Lectern.
//!
//! Builds the store, ingestion pipeline, job registry, scorer and answer
//! step from [`Settings`] so commands only deal with one handle.

use crate::config::{Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::Result;
use crate::jobs::{IngestionPipeline, JobRegistry, SourcePolicy};
use crate::rag::AnswerAssembler;
use crate::search::{FusionWeights, HybridScorer, LlmReranker};
use crate::store::{DocumentStore, SqliteDocumentStore};
use crate::tokenizer::Tokenizer;
use crate::transcription::{Transcoder, WhisperTranscoder};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Owns every long-lived component of the application.
pub struct Orchestrator {
    settings: Settings,
    store: Arc<dyn DocumentStore>,
    registry: JobRegistry,
    scorer: Arc<HybridScorer>,
    answers: AnswerAssembler,
}

impl Orchestrator {
    /// Build production components from settings.
    pub fn new(settings: Settings) -> Result<Self> {
        let temp_dir = settings.temp_dir();
        std::fs::create_dir_all(&temp_dir)?;

        let sqlite_path = settings.sqlite_path();
        if let Some(parent) = sqlite_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::new(&sqlite_path)?);

        let transcoder: Arc<dyn Transcoder> =
            Arc::new(WhisperTranscoder::new(&settings.transcription, temp_dir));
        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::new(&settings.embedding));

        Self::with_components(settings, store, transcoder, embedder)
    }

    /// Build around caller-supplied collaborators.
    pub fn with_components(
        settings: Settings,
        store: Arc<dyn DocumentStore>,
        transcoder: Arc<dyn Transcoder>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let prompts = Prompts::load(settings.prompts.custom_dir.as_deref())?;
        let weights = FusionWeights::from_settings(&settings.search)?;
        let embed_timeout = Duration::from_secs(settings.embedding.timeout_seconds);

        let pipeline = IngestionPipeline::new(
            transcoder,
            Tokenizer::new(&settings.tokenizer),
            Arc::clone(&embedder),
            Arc::clone(&store),
        )
        .with_timeouts(
            Duration::from_secs(settings.transcription.timeout_seconds),
            embed_timeout,
        )
        .with_source_policy(SourcePolicy::from_settings(&settings.jobs))
        .with_max_embed_chars(settings.embedding.max_input_chars);
        let registry = JobRegistry::new(Arc::new(pipeline), Arc::clone(&store), &settings.jobs);

        let mut scorer = HybridScorer::new(
            Arc::clone(&store),
            Tokenizer::new(&settings.tokenizer),
            embedder,
            weights,
        )
        .with_default_top_k(settings.search.default_top_k)
        .with_embed_timeout(embed_timeout);

        if settings.search.rerank_enabled {
            info!(
                "Reranking top {} results with {}",
                settings.search.rerank_candidates, settings.search.rerank_model
            );
            let reranker = LlmReranker::new(
                &settings.search.rerank_model,
                prompts.rerank.clone(),
                embed_timeout,
            );
            scorer = scorer.with_reranker(Arc::new(reranker), settings.search.rerank_candidates);
        }
        let scorer = Arc::new(scorer);

        let answers =
            AnswerAssembler::new(Arc::clone(&scorer), &settings.answer).with_prompts(prompts.answer);

        Ok(Self {
            settings,
            store,
            registry,
            scorer,
            answers,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.store)
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn scorer(&self) -> Arc<HybridScorer> {
        Arc::clone(&self.scorer)
    }

    pub fn answers(&self) -> &AnswerAssembler {
        &self.answers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{IngestRequest, JobStatus};
    use crate::store::MemoryDocumentStore;
    use crate::testing::{FakeEmbedder, FakeTranscoder};

    fn orchestrator(settings: Settings) -> Result<Orchestrator> {
        Orchestrator::with_components(
            settings,
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(FakeTranscoder::text("고유값 분해는 행렬을 대각화한다")),
            Arc::new(FakeEmbedder::new(8)),
        )
    }

    #[tokio::test]
    async fn test_ingested_document_is_searchable() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("lecture.mp4");
        std::fs::write(&source, b"media").unwrap();

        let orchestrator = orchestrator(Settings::default()).unwrap();
        let id = orchestrator
            .registry()
            .submit(IngestRequest::new("선형대수 3강", &source))
            .await
            .unwrap();
        let job = orchestrator.registry().wait(&id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);

        let outcome = orchestrator.scorer().search("고유값", None).await.unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].document.title, "선형대수 3강");
    }

    #[tokio::test]
    async fn test_configured_extensions_gate_ingestion() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("lecture.mp4");
        std::fs::write(&source, b"media").unwrap();

        let mut settings = Settings::default();
        settings.jobs.allowed_extensions = vec!["mkv".to_string()];
        let orchestrator = orchestrator(settings).unwrap();

        let id = orchestrator
            .registry()
            .submit(IngestRequest::new("선형대수 3강", &source))
            .await
            .unwrap();
        let job = orchestrator.registry().wait(&id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.unwrap().contains("allowed: mkv"));
    }

    #[test]
    fn test_invalid_weights_fail_construction() {
        let mut settings = Settings::default();
        settings.search.bm25_weight = 0.0;
        settings.search.content_vector_weight = 0.0;
        settings.search.title_vector_weight = 0.0;

        assert!(orchestrator(settings).is_err());
    }
}
