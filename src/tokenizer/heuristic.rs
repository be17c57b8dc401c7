//! Rule-based Korean/Latin segmenter.
//!
//! Korean words (eojeol) carry their grammatical particles and endings
//! attached, so each Hangul run is classified by suffix: copulas and
//! particles are stripped to expose the noun stem, predicate endings mark
//! verbs and adjectives. Latin runs are lowercased and treated as nouns.

use super::{PartOfSpeech, Segmenter};
use crate::error::{LecternError, Result};
use regex::Regex;

/// Copula endings; the stem before them is a noun.
const COPULAS: &[&str] = &["이었습니다", "였습니다", "입니다", "이에요", "이다", "예요"];

/// Adjective endings.
const ADJECTIVE_ENDINGS: &[&str] = &["스럽다", "스러운", "롭다", "로운", "있다", "없다", "같다", "같은"];

/// Verb endings.
const VERB_ENDINGS: &[&str] = &[
    "했습니다", "합니다", "됩니다", "습니다", "니다", "해요", "어요", "아요", "세요", "었다",
    "았다", "였다", "한다", "된다", "하다", "되다", "하는", "되는", "하고", "해서", "하여", "하면",
];

/// Postpositional particles, longest first.
const PARTICLES: &[&str] = &[
    "에서는", "으로는", "에게서", "까지는", "부터는", "이라고", "에서", "에게", "으로", "까지",
    "부터", "처럼", "보다", "라고", "한테", "은", "는", "이", "가", "을", "를", "에", "의", "도",
    "로", "와", "과", "만",
];

/// Adverb endings, checked after particles.
const ADVERB_ENDINGS: &[&str] = &["게", "히"];

/// Regex-driven segmenter with suffix-based part-of-speech tagging.
pub struct HeuristicSegmenter {
    pattern: Regex,
}

impl HeuristicSegmenter {
    pub fn new() -> Self {
        let pattern = Regex::new(
            r"(?x)
            (?P<hangul>\p{Hangul}+)
            | (?P<latin>[\p{L}&&\P{Hangul}]+)
            | (?P<number>\p{N}+(?:[.,]\p{N}+)*)
            | (?P<punct>\p{P})
        ",
        )
        .expect("Invalid regex");

        Self { pattern }
    }

    fn classify_hangul(word: &str) -> Vec<(String, PartOfSpeech)> {
        if PARTICLES.contains(&word) {
            return vec![(word.to_string(), PartOfSpeech::Josa)];
        }

        if let Some(stem) = strip_any(word, COPULAS, 1) {
            return vec![(stem.to_string(), PartOfSpeech::Noun)];
        }
        if ends_with_any(word, ADJECTIVE_ENDINGS) {
            return vec![(word.to_string(), PartOfSpeech::Adjective)];
        }
        if ends_with_any(word, VERB_ENDINGS) {
            return vec![(word.to_string(), PartOfSpeech::Verb)];
        }

        for particle in PARTICLES {
            // Single-syllable particles only split words with at least a two-syllable stem.
            let min_stem = if particle.chars().count() == 1 { 2 } else { 1 };
            if let Some(stem) = strip_suffix_with_min(word, particle, min_stem) {
                return vec![
                    (stem.to_string(), PartOfSpeech::Noun),
                    (particle.to_string(), PartOfSpeech::Josa),
                ];
            }
        }

        if word.chars().count() >= 3 && ends_with_any(word, ADVERB_ENDINGS) {
            return vec![(word.to_string(), PartOfSpeech::Adverb)];
        }

        vec![(word.to_string(), PartOfSpeech::Noun)]
    }
}

impl Default for HeuristicSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Segmenter for HeuristicSegmenter {
    fn segment(&self, text: &str) -> Result<Vec<(String, PartOfSpeech)>> {
        let mut segments = Vec::new();

        for caps in self.pattern.captures_iter(text) {
            if let Some(m) = caps.name("hangul") {
                segments.extend(Self::classify_hangul(m.as_str()));
            } else if let Some(m) = caps.name("latin") {
                segments.push((m.as_str().to_lowercase(), PartOfSpeech::Noun));
            } else if let Some(m) = caps.name("number") {
                segments.push((m.as_str().to_string(), PartOfSpeech::Number));
            } else if let Some(m) = caps.name("punct") {
                segments.push((m.as_str().to_string(), PartOfSpeech::Punctuation));
            }
        }

        if segments.is_empty() && !text.trim().is_empty() {
            return Err(LecternError::TokenizationDegraded(
                "no segmentable characters in input".to_string(),
            ));
        }

        Ok(segments)
    }
}

fn ends_with_any(word: &str, endings: &[&str]) -> bool {
    endings
        .iter()
        .any(|ending| word.ends_with(ending) && word.chars().count() > ending.chars().count())
}

fn strip_any<'a>(word: &'a str, suffixes: &[&str], min_stem: usize) -> Option<&'a str> {
    suffixes
        .iter()
        .find_map(|suffix| strip_suffix_with_min(word, suffix, min_stem))
}

fn strip_suffix_with_min<'a>(word: &'a str, suffix: &str, min_stem: usize) -> Option<&'a str> {
    word.strip_suffix(suffix)
        .filter(|stem| stem.chars().count() >= min_stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(text: &str) -> Vec<(String, PartOfSpeech)> {
        HeuristicSegmenter::new().segment(text).unwrap()
    }

    #[test]
    fn test_particles_are_split_from_nouns() {
        let segments = tags("행렬을");
        assert_eq!(
            segments,
            vec![
                ("행렬".to_string(), PartOfSpeech::Noun),
                ("을".to_string(), PartOfSpeech::Josa),
            ]
        );
    }

    #[test]
    fn test_copula_exposes_noun_stem() {
        assert_eq!(tags("방법입니다"), vec![("방법".to_string(), PartOfSpeech::Noun)]);
    }

    #[test]
    fn test_predicates_are_tagged() {
        assert_eq!(tags("설명합니다")[0].1, PartOfSpeech::Verb);
        assert_eq!(tags("중요하다")[0].1, PartOfSpeech::Verb);
        assert_eq!(tags("의미있다")[0].1, PartOfSpeech::Adjective);
        assert_eq!(tags("빠르게")[0].1, PartOfSpeech::Adverb);
    }

    #[test]
    fn test_mixed_script_and_numbers() {
        let segments = tags("GPU는 3.5배 빠름!");
        assert_eq!(segments[0], ("gpu".to_string(), PartOfSpeech::Noun));
        assert_eq!(segments[1], ("는".to_string(), PartOfSpeech::Josa));
        assert_eq!(segments[2], ("3.5".to_string(), PartOfSpeech::Number));
        assert_eq!(segments.last().unwrap().1, PartOfSpeech::Punctuation);
    }

    #[test]
    fn test_symbol_only_input_is_an_error() {
        let err = HeuristicSegmenter::new().segment("★★★").unwrap_err();
        assert!(matches!(err, LecternError::TokenizationDegraded(_)));
    }

    #[test]
    fn test_blank_input_is_empty() {
        assert!(tags("   ").is_empty());
    }
}
