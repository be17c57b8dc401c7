//! CLI module for Lectern.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Lectern - lecture video ingestion and hybrid retrieval
///
/// Transcribe recorded lectures into a local library, then search it with
/// BM25 fused with embedding similarity, or ask questions about it.
#[derive(Parser, Debug)]
#[command(name = "lectern")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transcribe and index lecture videos
    Ingest {
        /// Local video files, ingested concurrently
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Document title (defaults to the file name; single file only)
        #[arg(short, long)]
        title: Option<String>,

        /// Re-ingest into an existing document instead of creating one (single file only)
        #[arg(long, value_name = "DOC_ID")]
        update: Option<i64>,

        /// Request cancellation after this many seconds
        #[arg(long, value_name = "SECS")]
        cancel_after: Option<u64>,
    },

    /// Search the library
    Search {
        /// Search query
        query: String,

        /// Number of results (defaults to search.default_top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Ask a question answered from the library
    Ask {
        /// The question to ask
        question: String,

        /// Number of documents used as context
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Chat model for the answer
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List indexed documents
    List,

    /// Show one document
    Show {
        /// Document id
        id: i64,
    },

    /// Delete a document
    Delete {
        /// Document id
        id: i64,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the current configuration to the config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
