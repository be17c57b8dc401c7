//! Question answering over retrieved lectures.
//!
//! A thin layer: the [`HybridScorer`](crate::search::HybridScorer) picks the
//! documents, a chat model writes the answer.

pub mod context;
mod response;

pub use context::{format_context_for_prompt, format_sources_for_display};
pub use response::{Answer, AnswerAssembler};
