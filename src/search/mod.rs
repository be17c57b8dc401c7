//! Hybrid lexical + semantic retrieval.
//!
//! [`HybridScorer`] ranks every committed document against a query by fusing
//! three signals: BM25 over the tokenized text, and cosine similarity of the
//! query embedding with each document's content and title embeddings. Each
//! signal is min-max normalized across the candidate set before the weighted
//! sum, so the weights compare like with like.

mod fusion;
mod rerank;

pub use fusion::{min_max_normalize, rank_order, FusionWeights, RawSignals};
pub use rerank::{rerank, LlmReranker, Reranker};

use crate::embedding::Embedder;
use crate::error::{LecternError, Result};
use crate::store::{
    lexical_rank, vector_similarity, Bm25Params, Document, DocumentStore, EmbeddingField,
};
use crate::tokenizer::Tokenizer;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// One value per retrieval signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SignalScores {
    pub bm25: f64,
    pub content_sim: f64,
    pub title_sim: f64,
}

/// A ranked document with the scores that placed it.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredResult {
    pub document: Document,
    /// Score the ranking is sorted by: the fused score, blended with the
    /// rerank judgment when reranking ran.
    pub score: f64,
    /// Weighted sum of the normalized signals.
    pub fused_score: f64,
    pub rerank_score: Option<f64>,
    pub raw: SignalScores,
    pub normalized: SignalScores,
}

/// Ranked results and how long the query took.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub results: Vec<ScoredResult>,
    pub query_latency: Duration,
}

/// Fuses lexical and vector relevance over the current corpus.
pub struct HybridScorer {
    store: Arc<dyn DocumentStore>,
    tokenizer: Tokenizer,
    embedder: Arc<dyn Embedder>,
    weights: FusionWeights,
    bm25: Bm25Params,
    default_top_k: usize,
    embed_timeout: Duration,
    reranker: Option<(Arc<dyn Reranker>, usize)>,
}

impl HybridScorer {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        tokenizer: Tokenizer,
        embedder: Arc<dyn Embedder>,
        weights: FusionWeights,
    ) -> Self {
        Self {
            store,
            tokenizer,
            embedder,
            weights,
            bm25: Bm25Params::default(),
            default_top_k: 10,
            embed_timeout: Duration::from_secs(60),
            reranker: None,
        }
    }

    pub fn with_default_top_k(mut self, top_k: usize) -> Self {
        self.default_top_k = top_k.max(1);
        self
    }

    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    /// Re-score the first `candidates` fused results with `reranker`.
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>, candidates: usize) -> Self {
        self.reranker = Some((reranker, candidates));
        self
    }

    pub fn weights(&self) -> &FusionWeights {
        &self.weights
    }

    /// Rank the corpus against `query`, returning at most `top_k` results
    /// (the configured default when `None`). Never writes to the store.
    #[instrument(skip(self), fields(query = %query))]
    pub async fn search(&self, query: &str, top_k: Option<usize>) -> Result<SearchOutcome> {
        if query.trim().is_empty() {
            return Err(LecternError::InvalidInput("query is empty".to_string()));
        }

        let started = Instant::now();
        let top_k = top_k.unwrap_or(self.default_top_k);

        let documents = self.store.get_all_documents().await?;
        if documents.is_empty() {
            debug!("Corpus is empty");
            return Ok(SearchOutcome {
                results: Vec::new(),
                query_latency: Duration::ZERO,
            });
        }

        let query_tokens = self.tokenizer.tokenize(query).into_tokens();
        let query_embedding = self.embed_query(query).await?;

        let signals = RawSignals {
            bm25: lexical_rank(&documents, &query_tokens, self.bm25),
            content_sim: vector_similarity(&documents, &query_embedding, EmbeddingField::Content),
            title_sim: vector_similarity(&documents, &query_embedding, EmbeddingField::Title),
        };

        let mut results: Vec<ScoredResult> = documents
            .into_iter()
            .zip(signals.fuse(&self.weights))
            .map(|(document, (raw, normalized, fused))| ScoredResult {
                document,
                score: fused,
                fused_score: fused,
                rerank_score: None,
                raw,
                normalized,
            })
            .collect();
        results.sort_by(|a, b| rank_order((a.score, a.document.id), (b.score, b.document.id)));

        if let Some((reranker, candidates)) = &self.reranker {
            rerank(reranker.as_ref(), query, &mut results, *candidates).await;
        }

        results.truncate(top_k);

        let query_latency = started.elapsed();
        info!(
            "Ranked {} results in {:.1}ms",
            results.len(),
            query_latency.as_secs_f64() * 1000.0
        );

        Ok(SearchOutcome {
            results,
            query_latency,
        })
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let embedding = tokio::time::timeout(self.embed_timeout, self.embedder.embed(query))
            .await
            .map_err(|_| {
                LecternError::Embedding(format!(
                    "query embedding timed out after {:?}",
                    self.embed_timeout
                ))
            })??;
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenizerSettings;
    use crate::store::{ContentUpdate, MemoryDocumentStore, NewDocument, TitleUpdate};
    use crate::testing::FakeEmbedder;

    async fn insert(
        store: &MemoryDocumentStore,
        title: &str,
        tokens: &str,
        title_embedding: Vec<f32>,
        content_embedding: Vec<f32>,
    ) -> Document {
        store
            .insert_document(NewDocument {
                video_id: None,
                title: TitleUpdate {
                    title: title.to_string(),
                    title_embedding,
                },
                content: ContentUpdate {
                    content: tokens.to_string(),
                    tokenized_text: tokens.to_string(),
                    content_embedding,
                },
            })
            .await
            .unwrap()
    }

    fn scorer(store: Arc<MemoryDocumentStore>, embedder: FakeEmbedder) -> HybridScorer {
        HybridScorer::new(
            store,
            Tokenizer::new(&TokenizerSettings::default()),
            Arc::new(embedder),
            FusionWeights::new(0.4, 0.4, 0.2).unwrap(),
        )
    }

    /// Three documents: lexical match grows from doc1 to doc3, content
    /// similarity is identical, title similarity grows from doc1 to doc3.
    async fn scenario_store() -> Arc<MemoryDocumentStore> {
        let store = Arc::new(MemoryDocumentStore::new());
        let content = vec![1.0, 1.0, 0.0];
        insert(&store, "doc1", "확률 분포", vec![0.0, 1.0, 0.0], content.clone()).await;
        insert(&store, "doc2", "고유값 확률", vec![0.5, 1.0, 0.0], content.clone()).await;
        insert(&store, "doc3", "고유값 고유값 분해", vec![1.0, 0.2, 0.0], content).await;
        store
    }

    #[tokio::test]
    async fn test_fused_ranking_scenario() {
        let store = scenario_store().await;
        let scorer = scorer(store, FakeEmbedder::fixed(vec![1.0, 0.0, 0.0]));

        let outcome = scorer.search("고유값", None).await.unwrap();
        let titles: Vec<&str> = outcome.results.iter().map(|r| r.document.title.as_str()).collect();
        assert_eq!(titles, vec!["doc3", "doc2", "doc1"]);

        for result in &outcome.results {
            assert_eq!(result.normalized.content_sim, 0.0);
            assert!((0.0..=1.0).contains(&result.normalized.bm25));
            assert!((0.0..=1.0).contains(&result.normalized.title_sim));
        }
        assert_eq!(outcome.results[0].normalized.bm25, 1.0);
        assert_eq!(outcome.results[2].normalized.bm25, 0.0);
        assert_eq!(outcome.results[2].fused_score, 0.0);
    }

    #[tokio::test]
    async fn test_ranking_is_deterministic() {
        let store = scenario_store().await;
        let scorer = scorer(store, FakeEmbedder::fixed(vec![1.0, 0.0, 0.0]));

        let first = scorer.search("고유값 분해", Some(3)).await.unwrap();
        let second = scorer.search("고유값 분해", Some(3)).await.unwrap();

        let ids = |o: &SearchOutcome| o.results.iter().map(|r| r.document.id).collect::<Vec<_>>();
        let scores = |o: &SearchOutcome| o.results.iter().map(|r| r.score).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
        assert_eq!(scores(&first), scores(&second));
    }

    #[tokio::test]
    async fn test_ties_break_by_document_id() {
        let store = Arc::new(MemoryDocumentStore::new());
        for title in ["c", "a", "b"] {
            insert(&store, title, "같은 내용", vec![1.0, 0.0], vec![1.0, 0.0]).await;
        }
        let scorer = scorer(store, FakeEmbedder::fixed(vec![1.0, 0.0]));

        let outcome = scorer.search("내용", None).await.unwrap();
        let ids: Vec<i64> = outcome.results.iter().map(|r| r.document.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(outcome.results.iter().all(|r| r.fused_score == 0.0));
    }

    #[tokio::test]
    async fn test_empty_corpus_returns_nothing_without_embedding() {
        let store = Arc::new(MemoryDocumentStore::new());
        let embedder = FakeEmbedder::new(4);
        let scorer = scorer(store, embedder.clone());

        let outcome = scorer.search("아무거나", Some(5)).await.unwrap();
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.query_latency, Duration::ZERO);
        assert!(embedder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure_propagates() {
        let store = scenario_store().await;
        let scorer = scorer(store, FakeEmbedder::failing(3));

        let err = scorer.search("고유값", None).await.unwrap_err();
        assert!(matches!(err, LecternError::Embedding(_)));
    }

    #[tokio::test]
    async fn test_top_k_truncates() {
        let store = scenario_store().await;
        let scorer = scorer(store, FakeEmbedder::fixed(vec![1.0, 0.0, 0.0])).with_default_top_k(2);

        assert_eq!(scorer.search("고유값", None).await.unwrap().results.len(), 2);
        assert_eq!(scorer.search("고유값", Some(1)).await.unwrap().results.len(), 1);
        assert_eq!(scorer.search("고유값", Some(50)).await.unwrap().results.len(), 3);
    }

    #[tokio::test]
    async fn test_search_does_not_write() {
        let store = scenario_store().await;
        let before = store.get_all_documents().await.unwrap();
        let scorer = scorer(store.clone(), FakeEmbedder::fixed(vec![1.0, 0.0, 0.0]));

        scorer.search("고유값", None).await.unwrap();
        assert_eq!(store.get_all_documents().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_blank_query_is_rejected() {
        let store = scenario_store().await;
        let scorer = scorer(store, FakeEmbedder::fixed(vec![1.0, 0.0, 0.0]));
        assert!(matches!(
            scorer.search("  ", None).await,
            Err(LecternError::InvalidInput(_))
        ));
    }
}
