//! Lectern - lecture video ingestion and hybrid retrieval
//!
//! A local-first CLI tool that turns recorded lectures into a searchable
//! library.
//!
//! # Overview
//!
//! Lectern allows you to:
//! - Ingest lecture videos in the background: transcribe, tokenize, embed, index
//! - Poll and cancel ingestion jobs while they run
//! - Search the library with BM25 fused with title and content embeddings
//! - Ask questions answered from the top-ranked lectures
//!
//! # Architecture
//!
//! - `config` - Configuration and prompt templates
//! - `audio` - Audio extraction and splitting via ffmpeg
//! - `transcription` - Speech-to-text behind the `Transcoder` trait
//! - `tokenizer` - Korean-aware morphological tokenization
//! - `embedding` - Embedding generation
//! - `store` - Document persistence and per-signal scoring primitives
//! - `jobs` - Job registry and the ingestion pipeline
//! - `search` - Hybrid scoring and optional reranking
//! - `rag` - Answer generation over search results
//! - `orchestrator` - Component wiring
//!
//! # Example
//!
//! ```rust,no_run
//! use lectern::config::Settings;
//! use lectern::jobs::IngestRequest;
//! use lectern::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let orchestrator = Orchestrator::new(Settings::load()?)?;
//!
//!     let job = orchestrator
//!         .registry()
//!         .submit(IngestRequest::new("Linear Algebra 3", "lecture3.mp4"))
//!         .await?;
//!     let job = orchestrator.registry().wait(&job).await?;
//!     println!("{} ({}%)", job.status, job.progress);
//!
//!     let outcome = orchestrator.scorer().search("eigenvalue", Some(5)).await?;
//!     for result in outcome.results {
//!         println!("{:.3} {}", result.score, result.document.title);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod jobs;
pub mod openai;
pub mod orchestrator;
pub mod rag;
pub mod search;
pub mod store;
pub mod tokenizer;
pub mod transcription;

#[cfg(test)]
mod testing;

pub use error::{LecternError, Result};
