//! Formatting retrieved documents for prompts and for display.

use crate::search::ScoredResult;

/// Characters of each document's content passed to the model.
pub const MAX_CONTEXT_CHARS: usize = 4000;

/// Format ranked documents as numbered context blocks for the answer prompt.
pub fn format_context_for_prompt(results: &[ScoredResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            format!(
                "---\n[{}] {} (document {})\n{}\n---",
                i + 1,
                result.document.title,
                result.document.id,
                result.document.excerpt(MAX_CONTEXT_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// One line per source, for the end of an answer.
pub fn format_sources_for_display(results: &[ScoredResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            format!(
                "[{}] {} (document {}, score: {:.3})",
                i + 1,
                result.document.title,
                result.document.id,
                result.score
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
