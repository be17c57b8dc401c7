//! Configuration module for Lectern.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AnswerPrompts, Prompts, RerankPrompts};
pub use settings::{
    AnswerSettings, EmbeddingSettings, GeneralSettings, JobSettings, PromptSettings,
    SearchSettings, Settings, StoreSettings, TokenizerSettings, TranscriptionSettings,
};
