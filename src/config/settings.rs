//! Configuration settings for Lectern.

use crate::error::{LecternError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub transcription: TranscriptionSettings,
    pub embedding: EmbeddingSettings,
    pub tokenizer: TokenizerSettings,
    pub search: SearchSettings,
    pub jobs: JobSettings,
    pub store: StoreSettings,
    pub answer: AnswerSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Directory for temporary files (extracted audio, segments).
    pub temp_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.lectern".to_string(),
            temp_dir: "/tmp/lectern".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Speech-to-text settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    /// Whisper model to use.
    pub model: String,
    /// Language hint passed to Whisper (ISO-639-1).
    pub language: Option<String>,
    /// Duration in seconds for splitting long audio files.
    pub chunk_duration_seconds: u32,
    /// Maximum concurrent segment uploads.
    pub max_concurrent_chunks: usize,
    /// Deadline for the whole transcription call.
    pub timeout_seconds: u64,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            model: "whisper-1".to_string(),
            language: Some("ko".to_string()),
            chunk_duration_seconds: 600,
            max_concurrent_chunks: 3,
            timeout_seconds: 3600,
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions. Must match every vector already in the store.
    pub dimensions: u32,
    /// Deadline for a single embedding call.
    pub timeout_seconds: u64,
    /// Longest text sent in one embedding request. Longer transcripts are
    /// embedded in slices and averaged.
    pub max_input_chars: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-large".to_string(),
            dimensions: 3072,
            timeout_seconds: 60,
            max_input_chars: 6000,
        }
    }
}

/// Morphological tokenizer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerSettings {
    /// Keep adjectives and adverbs in addition to nouns and verbs.
    pub include_modifiers: bool,
    /// Tokens shorter than this (in characters) are dropped.
    pub min_token_chars: usize,
    /// Inputs longer than this are handed to the whitespace fallback.
    pub max_input_chars: usize,
}

impl Default for TokenizerSettings {
    fn default() -> Self {
        Self {
            include_modifiers: true,
            min_token_chars: 2,
            max_input_chars: 2_000_000,
        }
    }
}

/// Hybrid search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Weight of the normalized BM25 signal.
    pub bm25_weight: f32,
    /// Weight of the normalized content-embedding similarity.
    pub content_vector_weight: f32,
    /// Weight of the normalized title-embedding similarity.
    pub title_vector_weight: f32,
    /// Number of results returned when the caller does not ask for a count.
    pub default_top_k: usize,
    /// Re-score the head of the ranking with an LLM relevance judgment.
    pub rerank_enabled: bool,
    /// Chat model used for reranking.
    pub rerank_model: String,
    /// How many top results are sent to the reranker.
    pub rerank_candidates: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            bm25_weight: 0.4,
            content_vector_weight: 0.4,
            title_vector_weight: 0.2,
            default_top_k: 10,
            rerank_enabled: false,
            rerank_model: "gpt-4o-mini".to_string(),
            rerank_candidates: 20,
        }
    }
}

/// Background job settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    /// Maximum number of ingestion pipelines running at once.
    pub max_concurrent: usize,
    /// Terminal jobs are evicted from the registry after this many seconds.
    pub retention_seconds: u64,
    /// Source file extensions accepted for ingestion (case-insensitive).
    pub allowed_extensions: Vec<String>,
    /// Largest source file accepted, in bytes.
    pub max_source_bytes: u64,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            retention_seconds: 3600,
            allowed_extensions: ["mp4", "avi", "mov", "wmv"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            max_source_bytes: 2 * 1024 * 1024 * 1024,
        }
    }
}

/// Document store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Path to the SQLite database.
    pub sqlite_path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            sqlite_path: "~/.lectern/lectern.db".to_string(),
        }
    }
}

/// Answer generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerSettings {
    /// Chat model for answer generation.
    pub model: String,
    /// Number of top-ranked documents fed into the prompt.
    pub max_documents: usize,
    /// Language the answer should be written in.
    pub language: String,
}

impl Default for AnswerSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_documents: 5,
            language: "Korean".to_string(),
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| LecternError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lectern")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded temp directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.store.sqlite_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_deployment() {
        let settings = Settings::default();
        assert_eq!(settings.embedding.dimensions, 3072);
        assert_eq!(settings.embedding.model, "text-embedding-3-large");
        assert!((settings.search.bm25_weight - 0.4).abs() < f32::EPSILON);
        assert!((settings.search.content_vector_weight - 0.4).abs() < f32::EPSILON);
        assert!((settings.search.title_vector_weight - 0.2).abs() < f32::EPSILON);
        assert_eq!(settings.search.default_top_k, 10);
        assert!(!settings.search.rerank_enabled);
        assert_eq!(settings.jobs.allowed_extensions, vec!["mp4", "avi", "mov", "wmv"]);
        assert_eq!(settings.jobs.max_source_bytes, 2_147_483_648);
        assert_eq!(settings.embedding.max_input_chars, 6000);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [search]
            bm25_weight = 0.6
            default_top_k = 3

            [jobs]
            max_concurrent = 8
            "#,
        )
        .unwrap();

        assert!((settings.search.bm25_weight - 0.6).abs() < f32::EPSILON);
        assert_eq!(settings.search.default_top_k, 3);
        assert!((settings.search.title_vector_weight - 0.2).abs() < f32::EPSILON);
        assert_eq!(settings.jobs.max_concurrent, 8);
        assert_eq!(settings.jobs.retention_seconds, 3600);
        assert_eq!(settings.transcription.model, "whisper-1");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut settings = Settings::default();
        settings.search.rerank_enabled = true;
        settings.tokenizer.min_token_chars = 3;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert!(loaded.search.rerank_enabled);
        assert_eq!(loaded.tokenizer.min_token_chars, 3);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let settings = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(settings.store.sqlite_path, "~/.lectern/lectern.db");
    }
}
