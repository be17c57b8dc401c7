//! Document store abstraction for Lectern.
//!
//! Persists lecture videos and their indexed documents. Every document carries
//! derived search fields (tokenized text and two embeddings) that must stay in
//! sync with its title and content; [`DocumentPatch`] only lets a caller change
//! a source field together with its regenerated derived fields.

mod lexical;
mod memory;
mod sqlite;

pub use lexical::{lexical_rank, Bm25Params};
pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Document identifier (row id).
pub type DocumentId = i64;

/// Video identifier (row id).
pub type VideoId = i64;

/// A submitted media file and its transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: VideoId,
    pub title: String,
    pub file_path: String,
    /// Filled in once transcription finishes.
    pub transcript: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An indexed, searchable document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    /// Video this document was produced from.
    pub video_id: Option<VideoId>,
    pub title: String,
    pub content: String,
    /// Space-joined search tokens derived from `content`.
    pub tokenized_text: String,
    /// Embedding of `title`.
    pub title_embedding: Vec<f32>,
    /// Embedding of `content`.
    pub content_embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Tokens of the lexical index for this document.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.tokenized_text.split_whitespace()
    }

    /// The embedding stored for `field`.
    pub fn embedding(&self, field: EmbeddingField) -> &[f32] {
        match field {
            EmbeddingField::Title => &self.title_embedding,
            EmbeddingField::Content => &self.content_embedding,
        }
    }

    /// Short preview of the content for display.
    pub fn excerpt(&self, max_chars: usize) -> String {
        let mut excerpt: String = self.content.chars().take(max_chars).collect();
        if self.content.chars().count() > max_chars {
            excerpt.push_str("...");
        }
        excerpt
    }
}

/// A fully derived document ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub video_id: Option<VideoId>,
    pub title: TitleUpdate,
    pub content: ContentUpdate,
}

/// New title together with its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct TitleUpdate {
    pub title: String,
    pub title_embedding: Vec<f32>,
}

/// New content together with its tokens and embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentUpdate {
    pub content: String,
    pub tokenized_text: String,
    pub content_embedding: Vec<f32>,
}

/// Partial update of an existing document.
#[derive(Debug, Clone, Default)]
pub struct DocumentPatch {
    pub video_id: Option<VideoId>,
    pub title: Option<TitleUpdate>,
    pub content: Option<ContentUpdate>,
}

impl DocumentPatch {
    pub fn is_empty(&self) -> bool {
        self.video_id.is_none() && self.title.is_none() && self.content.is_none()
    }

    /// Apply the patch in place, bumping `updated_at` when anything changed.
    pub fn apply(self, document: &mut Document) {
        if self.is_empty() {
            return;
        }
        if let Some(video_id) = self.video_id {
            document.video_id = Some(video_id);
        }
        if let Some(title) = self.title {
            document.title = title.title;
            document.title_embedding = title.title_embedding;
        }
        if let Some(content) = self.content {
            document.content = content.content;
            document.tokenized_text = content.tokenized_text;
            document.content_embedding = content.content_embedding;
        }
        document.updated_at = Utc::now();
    }
}

/// Which embedding of a document to compare against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingField {
    Title,
    Content,
}

/// Persistence for videos and documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Record a submitted media file.
    async fn create_video(&self, title: &str, file_path: &str) -> Result<Video>;

    /// Store the transcript of a video.
    async fn update_video_transcript(&self, id: VideoId, transcript: &str) -> Result<()>;

    async fn get_video(&self, id: VideoId) -> Result<Option<Video>>;

    /// All videos, oldest first.
    async fn list_videos(&self) -> Result<Vec<Video>>;

    /// Insert a document in one write.
    async fn insert_document(&self, document: NewDocument) -> Result<Document>;

    /// Patch an existing document in one write. Unknown ids are `NotFound`.
    async fn update_document(&self, id: DocumentId, patch: DocumentPatch) -> Result<Document>;

    async fn get_document(&self, id: DocumentId) -> Result<Option<Document>>;

    /// Snapshot of every committed document, ordered by id.
    async fn get_all_documents(&self) -> Result<Vec<Document>>;

    /// Delete a document. Returns whether it existed.
    async fn delete_document(&self, id: DocumentId) -> Result<bool>;

    async fn document_count(&self) -> Result<usize>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Cosine similarity of `query` against one embedding of each document, in
/// snapshot order.
pub fn vector_similarity(documents: &[Document], query: &[f32], field: EmbeddingField) -> Vec<f64> {
    documents
        .iter()
        .map(|doc| cosine_similarity(query, doc.embedding(field)) as f64)
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> Document {
        Document {
            id: 1,
            video_id: None,
            title: "선형대수".to_string(),
            content: "행렬과 벡터".to_string(),
            tokenized_text: "행렬 벡터".to_string(),
            title_embedding: vec![1.0, 0.0],
            content_embedding: vec![0.0, 1.0],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);

        assert_eq!(cosine_similarity(&a, &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_vector_similarity_picks_field() {
        let docs = vec![document()];
        let title = vector_similarity(&docs, &[1.0, 0.0], EmbeddingField::Title);
        let content = vector_similarity(&docs, &[1.0, 0.0], EmbeddingField::Content);
        assert!((title[0] - 1.0).abs() < 1e-6);
        assert!(content[0].abs() < 1e-6);
    }

    #[test]
    fn test_patch_updates_source_and_derived_fields_together() {
        let mut doc = document();
        let before = doc.updated_at;

        DocumentPatch {
            content: Some(ContentUpdate {
                content: "고유값 분해".to_string(),
                tokenized_text: "고유값 분해".to_string(),
                content_embedding: vec![0.5, 0.5],
            }),
            ..Default::default()
        }
        .apply(&mut doc);

        assert_eq!(doc.content, "고유값 분해");
        assert_eq!(doc.tokenized_text, "고유값 분해");
        assert_eq!(doc.content_embedding, vec![0.5, 0.5]);
        assert_eq!(doc.title, "선형대수");
        assert_eq!(doc.title_embedding, vec![1.0, 0.0]);
        assert!(doc.updated_at >= before);
    }

    #[test]
    fn test_empty_patch_is_a_no_op() {
        let mut doc = document();
        let before = doc.clone();
        DocumentPatch::default().apply(&mut doc);
        assert_eq!(doc, before);
    }

    #[test]
    fn test_excerpt() {
        let doc = document();
        assert_eq!(doc.excerpt(2), "행렬...");
        assert_eq!(doc.excerpt(100), "행렬과 벡터");
    }
}
