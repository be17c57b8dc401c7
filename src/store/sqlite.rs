//! SQLite-based document store implementation.
//!
//! Embeddings are stored as little-endian f32 blobs; similarity and lexical
//! scoring happen in Rust over a snapshot of the documents table.

use super::{
    Document, DocumentId, DocumentPatch, DocumentStore, NewDocument, Video, VideoId,
};
use crate::error::{LecternError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS videos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        file_path TEXT NOT NULL,
        transcript TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS documents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        video_id INTEGER REFERENCES videos(id) ON DELETE SET NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        tokenized_text TEXT NOT NULL,
        title_embedding BLOB NOT NULL,
        content_embedding BLOB NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_documents_video_id ON documents(video_id);
"#;

const DOCUMENT_COLUMNS: &str = "id, video_id, title, content, tokenized_text, \
     title_embedding, content_embedding, created_at, updated_at";

/// SQLite-based document store.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

impl SqliteDocumentStore {
    /// Open (or create) a store at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite document store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| LecternError::Store(format!("Failed to acquire lock: {}", e)))
    }

    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn parse_timestamp(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn row_to_video(row: &Row<'_>) -> rusqlite::Result<Video> {
        let created_at: String = row.get(4)?;
        let updated_at: String = row.get(5)?;
        Ok(Video {
            id: row.get(0)?,
            title: row.get(1)?,
            file_path: row.get(2)?,
            transcript: row.get(3)?,
            created_at: Self::parse_timestamp(&created_at),
            updated_at: Self::parse_timestamp(&updated_at),
        })
    }

    fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
        let title_embedding: Vec<u8> = row.get(5)?;
        let content_embedding: Vec<u8> = row.get(6)?;
        let created_at: String = row.get(7)?;
        let updated_at: String = row.get(8)?;
        Ok(Document {
            id: row.get(0)?,
            video_id: row.get(1)?,
            title: row.get(2)?,
            content: row.get(3)?,
            tokenized_text: row.get(4)?,
            title_embedding: Self::bytes_to_embedding(&title_embedding),
            content_embedding: Self::bytes_to_embedding(&content_embedding),
            created_at: Self::parse_timestamp(&created_at),
            updated_at: Self::parse_timestamp(&updated_at),
        })
    }

    fn fetch_document(conn: &Connection, id: DocumentId) -> Result<Option<Document>> {
        let sql = format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS);
        Ok(conn
            .query_row(&sql, params![id], Self::row_to_document)
            .optional()?)
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    #[instrument(skip(self))]
    async fn create_video(&self, title: &str, file_path: &str) -> Result<Video> {
        let conn = self.lock()?;
        let now = Utc::now();

        conn.execute(
            "INSERT INTO videos (title, file_path, transcript, created_at, updated_at)
             VALUES (?1, ?2, NULL, ?3, ?3)",
            params![title, file_path, now.to_rfc3339()],
        )?;

        let video = Video {
            id: conn.last_insert_rowid(),
            title: title.to_string(),
            file_path: file_path.to_string(),
            transcript: None,
            created_at: now,
            updated_at: now,
        };
        debug!("Created video {}", video.id);
        Ok(video)
    }

    #[instrument(skip(self, transcript), fields(chars = transcript.len()))]
    async fn update_video_transcript(&self, id: VideoId, transcript: &str) -> Result<()> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE videos SET transcript = ?1, updated_at = ?2 WHERE id = ?3",
            params![transcript, Utc::now().to_rfc3339(), id],
        )?;

        if updated == 0 {
            return Err(LecternError::NotFound(format!("video {}", id)));
        }
        Ok(())
    }

    async fn get_video(&self, id: VideoId) -> Result<Option<Video>> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT id, title, file_path, transcript, created_at, updated_at
                 FROM videos WHERE id = ?1",
                params![id],
                Self::row_to_video,
            )
            .optional()?)
    }

    async fn list_videos(&self) -> Result<Vec<Video>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, file_path, transcript, created_at, updated_at
             FROM videos ORDER BY id",
        )?;
        let videos = stmt
            .query_map([], Self::row_to_video)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(videos)
    }

    #[instrument(skip(self, document), fields(title = %document.title.title))]
    async fn insert_document(&self, document: NewDocument) -> Result<Document> {
        let conn = self.lock()?;
        let now = Utc::now();

        conn.execute(
            r#"
            INSERT INTO documents
            (video_id, title, content, tokenized_text, title_embedding, content_embedding,
             created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            "#,
            params![
                document.video_id,
                document.title.title,
                document.content.content,
                document.content.tokenized_text,
                Self::embedding_to_bytes(&document.title.title_embedding),
                Self::embedding_to_bytes(&document.content.content_embedding),
                now.to_rfc3339(),
            ],
        )?;

        let document = Document {
            id: conn.last_insert_rowid(),
            video_id: document.video_id,
            title: document.title.title,
            content: document.content.content,
            tokenized_text: document.content.tokenized_text,
            title_embedding: document.title.title_embedding,
            content_embedding: document.content.content_embedding,
            created_at: now,
            updated_at: now,
        };

        info!("Inserted document {}", document.id);
        Ok(document)
    }

    #[instrument(skip(self, patch))]
    async fn update_document(&self, id: DocumentId, patch: DocumentPatch) -> Result<Document> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        let mut document = Self::fetch_document(&tx, id)?
            .ok_or_else(|| LecternError::NotFound(format!("document {}", id)))?;
        patch.apply(&mut document);

        tx.execute(
            r#"
            UPDATE documents SET
                video_id = ?1, title = ?2, content = ?3, tokenized_text = ?4,
                title_embedding = ?5, content_embedding = ?6, updated_at = ?7
            WHERE id = ?8
            "#,
            params![
                document.video_id,
                document.title,
                document.content,
                document.tokenized_text,
                Self::embedding_to_bytes(&document.title_embedding),
                Self::embedding_to_bytes(&document.content_embedding),
                document.updated_at.to_rfc3339(),
                id,
            ],
        )?;
        tx.commit()?;

        info!("Updated document {}", id);
        Ok(document)
    }

    async fn get_document(&self, id: DocumentId) -> Result<Option<Document>> {
        let conn = self.lock()?;
        Self::fetch_document(&conn, id)
    }

    #[instrument(skip(self))]
    async fn get_all_documents(&self) -> Result<Vec<Document>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM documents ORDER BY id", DOCUMENT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let documents = stmt
            .query_map([], Self::row_to_document)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!("Loaded {} documents", documents.len());
        Ok(documents)
    }

    #[instrument(skip(self))]
    async fn delete_document(&self, id: DocumentId) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
        info!("Deleted {} document(s) with id {}", deleted, id);
        Ok(deleted > 0)
    }

    async fn document_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
