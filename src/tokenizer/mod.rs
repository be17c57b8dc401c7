//! Search tokenization.
//!
//! [`Tokenizer`] turns raw text into the token stream behind the lexical
//! index. A [`Segmenter`] backend does the morphological work; when it cannot,
//! the tokenizer degrades to whitespace splitting and says so in the returned
//! [`TokenStream`] so the index stays queryable.

mod heuristic;

pub use heuristic::HeuristicSegmenter;

use crate::config::TokenizerSettings;
use crate::error::{LecternError, Result};
use std::sync::Arc;
use tracing::warn;

/// Coarse part-of-speech classes produced by a [`Segmenter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartOfSpeech {
    Noun,
    Verb,
    Adjective,
    Adverb,
    Josa,
    Number,
    Punctuation,
}

impl PartOfSpeech {
    /// Whether tokens of this class carry searchable content.
    fn is_content(self, include_modifiers: bool) -> bool {
        match self {
            PartOfSpeech::Noun | PartOfSpeech::Verb => true,
            PartOfSpeech::Adjective | PartOfSpeech::Adverb => include_modifiers,
            _ => false,
        }
    }
}

/// Morphological segmentation backend.
pub trait Segmenter: Send + Sync {
    /// Split text into (token, part of speech) pairs, in order.
    fn segment(&self, text: &str) -> Result<Vec<(String, PartOfSpeech)>>;
}

/// Tokens for one input, tagged with how they were produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStream {
    /// Morphological segmentation succeeded.
    Primary(Vec<String>),
    /// The segmenter failed; tokens come from whitespace splitting.
    Fallback { tokens: Vec<String>, reason: String },
}

impl TokenStream {
    pub fn tokens(&self) -> &[String] {
        match self {
            TokenStream::Primary(tokens) => tokens,
            TokenStream::Fallback { tokens, .. } => tokens,
        }
    }

    pub fn into_tokens(self) -> Vec<String> {
        match self {
            TokenStream::Primary(tokens) => tokens,
            TokenStream::Fallback { tokens, .. } => tokens,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, TokenStream::Fallback { .. })
    }

    /// Space-joined form stored as a document's `tokenized_text`.
    pub fn to_text(&self) -> String {
        self.tokens().join(" ")
    }
}

/// Language-aware tokenizer with a whitespace fallback.
#[derive(Clone)]
pub struct Tokenizer {
    segmenter: Arc<dyn Segmenter>,
    include_modifiers: bool,
    min_token_chars: usize,
    max_input_chars: usize,
}

impl Tokenizer {
    /// Create a tokenizer backed by [`HeuristicSegmenter`].
    pub fn new(settings: &TokenizerSettings) -> Self {
        Self::with_segmenter(Arc::new(HeuristicSegmenter::new()), settings)
    }

    /// Create a tokenizer with a custom segmentation backend.
    pub fn with_segmenter(segmenter: Arc<dyn Segmenter>, settings: &TokenizerSettings) -> Self {
        Self {
            segmenter,
            include_modifiers: settings.include_modifiers,
            min_token_chars: settings.min_token_chars,
            max_input_chars: settings.max_input_chars,
        }
    }

    /// Tokenize text. Never fails: segmenter errors yield [`TokenStream::Fallback`].
    pub fn tokenize(&self, text: &str) -> TokenStream {
        match self.segment_content(text) {
            Ok(tokens) => TokenStream::Primary(tokens),
            Err(e) => {
                warn!("Tokenizer degraded to whitespace splitting: {}", e);
                TokenStream::Fallback {
                    tokens: whitespace_tokens(text),
                    reason: e.to_string(),
                }
            }
        }
    }

    fn segment_content(&self, text: &str) -> Result<Vec<String>> {
        let length = text.chars().count();
        if length > self.max_input_chars {
            return Err(LecternError::TokenizationDegraded(format!(
                "input of {} characters exceeds limit of {}",
                length, self.max_input_chars
            )));
        }

        let segments = self.segmenter.segment(text)?;

        Ok(segments
            .into_iter()
            .filter(|(_, pos)| pos.is_content(self.include_modifiers))
            .map(|(token, _)| token)
            .filter(|token| token.chars().count() >= self.min_token_chars)
            .collect())
    }
}

/// Lowercased whitespace split, used when segmentation is unavailable.
pub fn whitespace_tokens(text: &str) -> Vec<String> {
    text.split_whitespace().map(|t| t.to_lowercase()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::BrokenSegmenter;

    #[test]
    fn test_keeps_content_words_and_drops_particles() {
        let tokenizer = Tokenizer::new(&TokenizerSettings::default());
        let stream = tokenizer.tokenize("오늘은 선형대수를 배웁니다.");

        assert!(!stream.is_degraded());
        assert_eq!(stream.tokens(), ["오늘", "선형대수", "배웁니다"]);
    }

    #[test]
    fn test_drops_single_character_tokens() {
        let tokenizer = Tokenizer::new(&TokenizerSettings::default());
        let stream = tokenizer.tokenize("a matrix x 책");
        assert_eq!(stream.tokens(), ["matrix"]);
    }

    #[test]
    fn test_tokenization_is_deterministic() {
        let tokenizer = Tokenizer::new(&TokenizerSettings::default());
        let text = "고유값 분해는 행렬을 대각화하는 방법입니다. Eigen decomposition!";
        let first = tokenizer.tokenize(text).to_text();
        let second = tokenizer.tokenize(text).to_text();
        assert_eq!(first, second);
        assert!(first.contains("eigen"));
    }

    #[test]
    fn test_modifiers_can_be_excluded() {
        let settings = TokenizerSettings {
            include_modifiers: false,
            ..TokenizerSettings::default()
        };
        let with = Tokenizer::new(&TokenizerSettings::default()).tokenize("천천히 설명합니다");
        let without = Tokenizer::new(&settings).tokenize("천천히 설명합니다");

        assert!(with.tokens().contains(&"천천히".to_string()));
        assert!(!without.tokens().contains(&"천천히".to_string()));
        assert!(without.tokens().contains(&"설명합니다".to_string()));
    }

    #[test]
    fn test_segmenter_failure_falls_back_to_whitespace() {
        let tokenizer =
            Tokenizer::with_segmenter(Arc::new(BrokenSegmenter), &TokenizerSettings::default());
        let stream = tokenizer.tokenize("Linear  Algebra 강의");

        assert!(stream.is_degraded());
        assert_eq!(stream.tokens(), ["linear", "algebra", "강의"]);
        match stream {
            TokenStream::Fallback { reason, .. } => assert!(reason.contains("dictionary")),
            TokenStream::Primary(_) => unreachable!(),
        }
    }

    #[test]
    fn test_oversized_input_falls_back() {
        let settings = TokenizerSettings {
            max_input_chars: 5,
            ..TokenizerSettings::default()
        };
        let stream = Tokenizer::new(&settings).tokenize("linear algebra");
        assert!(stream.is_degraded());
        assert_eq!(stream.to_text(), "linear algebra");
    }
}
