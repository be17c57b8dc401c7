//! In-memory document store implementation.
//!
//! Useful for testing and throwaway sessions.

use super::{
    Document, DocumentId, DocumentPatch, DocumentStore, NewDocument, Video, VideoId,
};
use crate::error::{LecternError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct State {
    videos: BTreeMap<VideoId, Video>,
    documents: BTreeMap<DocumentId, Document>,
    next_video_id: VideoId,
    next_document_id: DocumentId,
}

/// In-memory document store.
#[derive(Default)]
pub struct MemoryDocumentStore {
    state: RwLock<State>,
}

impl MemoryDocumentStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|e| LecternError::Store(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|e| LecternError::Store(format!("Failed to acquire lock: {}", e)))
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create_video(&self, title: &str, file_path: &str) -> Result<Video> {
        let mut state = self.write()?;
        state.next_video_id += 1;

        let now = Utc::now();
        let video = Video {
            id: state.next_video_id,
            title: title.to_string(),
            file_path: file_path.to_string(),
            transcript: None,
            created_at: now,
            updated_at: now,
        };
        state.videos.insert(video.id, video.clone());
        Ok(video)
    }

    async fn update_video_transcript(&self, id: VideoId, transcript: &str) -> Result<()> {
        let mut state = self.write()?;
        let video = state
            .videos
            .get_mut(&id)
            .ok_or_else(|| LecternError::NotFound(format!("video {}", id)))?;
        video.transcript = Some(transcript.to_string());
        video.updated_at = Utc::now();
        Ok(())
    }

    async fn get_video(&self, id: VideoId) -> Result<Option<Video>> {
        Ok(self.read()?.videos.get(&id).cloned())
    }

    async fn list_videos(&self) -> Result<Vec<Video>> {
        Ok(self.read()?.videos.values().cloned().collect())
    }

    async fn insert_document(&self, document: NewDocument) -> Result<Document> {
        let mut state = self.write()?;
        state.next_document_id += 1;

        let now = Utc::now();
        let document = Document {
            id: state.next_document_id,
            video_id: document.video_id,
            title: document.title.title,
            content: document.content.content,
            tokenized_text: document.content.tokenized_text,
            title_embedding: document.title.title_embedding,
            content_embedding: document.content.content_embedding,
            created_at: now,
            updated_at: now,
        };
        state.documents.insert(document.id, document.clone());
        Ok(document)
    }

    async fn update_document(&self, id: DocumentId, patch: DocumentPatch) -> Result<Document> {
        let mut state = self.write()?;
        let document = state
            .documents
            .get_mut(&id)
            .ok_or_else(|| LecternError::NotFound(format!("document {}", id)))?;
        patch.apply(document);
        Ok(document.clone())
    }

    async fn get_document(&self, id: DocumentId) -> Result<Option<Document>> {
        Ok(self.read()?.documents.get(&id).cloned())
    }

    async fn get_all_documents(&self) -> Result<Vec<Document>> {
        Ok(self.read()?.documents.values().cloned().collect())
    }

    async fn delete_document(&self, id: DocumentId) -> Result<bool> {
        Ok(self.write()?.documents.remove(&id).is_some())
    }

    async fn document_count(&self) -> Result<usize> {
        Ok(self.read()?.documents.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::new_document;
    use crate::store::TitleUpdate;

    #[tokio::test]
    async fn test_memory_document_store() {
        let store = MemoryDocumentStore::new();

        let video = store.create_video("강의 1", "/tmp/lecture1.mp4").await.unwrap();
        store.update_video_transcript(video.id, "안녕하세요").await.unwrap();
        let video = store.get_video(video.id).await.unwrap().unwrap();
        assert_eq!(video.transcript.as_deref(), Some("안녕하세요"));

        let first = store
            .insert_document(new_document("A", "alpha", "alpha", vec![1.0, 0.0]))
            .await
            .unwrap();
        let second = store
            .insert_document(new_document("B", "beta", "beta", vec![0.0, 1.0]))
            .await
            .unwrap();
        assert!(first.id < second.id);
        assert_eq!(store.document_count().await.unwrap(), 2);

        let ids: Vec<_> = store
            .get_all_documents()
            .await
            .unwrap()
            .iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec![first.id, second.id]);

        let updated = store
            .update_document(
                first.id,
                DocumentPatch {
                    title: Some(TitleUpdate {
                        title: "A2".to_string(),
                        title_embedding: vec![0.5, 0.5],
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "A2");
        assert_eq!(updated.content, "alpha");

        assert!(store.delete_document(first.id).await.unwrap());
        assert!(!store.delete_document(first.id).await.unwrap());
        assert_eq!(store.document_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_unknown_document_is_not_found() {
        let store = MemoryDocumentStore::new();
        let err = store
            .update_document(42, DocumentPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LecternError::NotFound(_)));
    }
}
