//! Embedding generation for semantic search.

mod openai;

pub use openai::OpenAIEmbedder;

use crate::error::{LecternError, Result};
use async_trait::async_trait;

/// Maps text to a fixed-dimension vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;
}

/// Reject vectors whose length differs from the configured dimension.
pub fn check_dimensions(embedding: &[f32], expected: usize) -> Result<()> {
    if embedding.len() != expected {
        return Err(LecternError::Embedding(format!(
            "expected {} dimensions, got {}",
            expected,
            embedding.len()
        )));
    }
    Ok(())
}

/// Split `text` into slices of at most `max_chars` characters.
///
/// Cuts fall on the last whitespace inside each window when there is one, so
/// words stay whole; a window without whitespace is cut at the character limit.
pub fn split_for_embedding(text: &str, max_chars: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    let mut slices = Vec::new();
    let mut rest = text.trim();

    while !rest.is_empty() {
        let limit = match rest.char_indices().nth(max_chars) {
            Some((byte, _)) => byte,
            None => {
                slices.push(rest);
                break;
            }
        };
        let window = &rest[..limit];
        let cut = if rest[limit..].starts_with(char::is_whitespace) {
            limit
        } else {
            match window.rfind(char::is_whitespace) {
                Some(byte) if byte > 0 => byte,
                _ => limit,
            }
        };
        slices.push(rest[..cut].trim_end());
        rest = rest[cut..].trim_start();
    }

    slices
}

/// Component-wise mean of equally sized vectors.
pub fn mean_embedding(vectors: &[Vec<f32>]) -> Result<Vec<f32>> {
    let first = vectors
        .first()
        .ok_or_else(|| LecternError::Embedding("no embeddings to combine".to_string()))?;

    let mut mean = vec![0.0f32; first.len()];
    for vector in vectors {
        check_dimensions(vector, first.len())?;
        for (total, value) in mean.iter_mut().zip(vector) {
            *total += value;
        }
    }
    let count = vectors.len() as f32;
    mean.iter_mut().for_each(|value| *value /= count);
    Ok(mean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_short_text_is_one_slice() {
        assert_eq!(split_for_embedding("  고유값 분해  ", 100), vec!["고유값 분해"]);
        assert!(split_for_embedding("   ", 100).is_empty());
    }

    #[test]
    fn test_split_respects_char_limit_and_word_boundaries() {
        let text = "고유값 고유벡터 대각화 행렬식 역행렬";
        let slices = split_for_embedding(text, 8);

        assert!(slices.len() > 1);
        for slice in &slices {
            assert!(slice.chars().count() <= 8, "slice too long: {:?}", slice);
            assert!(!slice.starts_with(' ') && !slice.ends_with(' '));
        }
        assert_eq!(slices.join(" "), text);
    }

    #[test]
    fn test_split_without_whitespace_cuts_at_limit() {
        let slices = split_for_embedding("가나다라마바사", 3);
        assert_eq!(slices, vec!["가나다", "라마바", "사"]);
    }

    #[test]
    fn test_mean_embedding() {
        let mean = mean_embedding(&[vec![1.0, 0.0], vec![3.0, 2.0]]).unwrap();
        assert_eq!(mean, vec![2.0, 1.0]);

        assert!(mean_embedding(&[]).is_err());
        assert!(mean_embedding(&[vec![1.0], vec![1.0, 2.0]]).is_err());
    }

    #[test]
    fn test_check_dimensions() {
        assert!(check_dimensions(&[0.0; 4], 4).is_ok());

        let err = check_dimensions(&[0.0; 3], 4).unwrap_err();
        assert!(matches!(err, LecternError::Embedding(_)));
        assert!(err.to_string().contains("expected 4"));
    }
}
