//! Okapi BM25 over the documents' tokenized text.

use super::Document;
use std::collections::HashMap;

/// BM25 tuning constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    pub k1: f64,
    /// Length normalization strength.
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

/// Score every document against the query tokens, in snapshot order.
///
/// IDF uses the non-negative variant `ln((N - df + 0.5) / (df + 0.5) + 1)`, so
/// a term present in every document still scores slightly above zero.
pub fn lexical_rank(documents: &[Document], query_tokens: &[String], params: Bm25Params) -> Vec<f64> {
    if documents.is_empty() {
        return Vec::new();
    }

    let term_counts: Vec<HashMap<&str, usize>> = documents
        .iter()
        .map(|doc| {
            let mut counts = HashMap::new();
            for token in doc.tokens() {
                *counts.entry(token).or_insert(0) += 1;
            }
            counts
        })
        .collect();

    let lengths: Vec<usize> = term_counts.iter().map(|c| c.values().sum()).collect();
    let n = documents.len() as f64;
    let avg_len = lengths.iter().sum::<usize>() as f64 / n;

    let idf: HashMap<&str, f64> = query_tokens
        .iter()
        .map(|term| {
            let df = term_counts
                .iter()
                .filter(|counts| counts.contains_key(term.as_str()))
                .count() as f64;
            (term.as_str(), ((n - df + 0.5) / (df + 0.5) + 1.0).ln())
        })
        .collect();

    term_counts
        .iter()
        .zip(&lengths)
        .map(|(counts, &len)| {
            let length_norm = if avg_len > 0.0 {
                1.0 - params.b + params.b * len as f64 / avg_len
            } else {
                1.0
            };

            query_tokens
                .iter()
                .map(|term| {
                    let tf = counts.get(term.as_str()).copied().unwrap_or(0) as f64;
                    if tf == 0.0 {
                        return 0.0;
                    }
                    idf[term.as_str()] * tf * (params.k1 + 1.0) / (tf + params.k1 * length_norm)
                })
                .sum()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn doc(id: i64, tokens: &str) -> Document {
        Document {
            id,
            video_id: None,
            title: format!("doc {}", id),
            content: tokens.to_string(),
            tokenized_text: tokens.to_string(),
            title_embedding: Vec::new(),
            content_embedding: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn query(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_matching_documents_outscore_others() {
        let docs = vec![
            doc(1, "행렬 곱셈 정의"),
            doc(2, "고유값 분해 행렬 대각화"),
            doc(3, "확률 분포 기댓값"),
        ];

        let scores = lexical_rank(&docs, &query(&["고유값", "행렬"]), Bm25Params::default());

        assert_eq!(scores.len(), 3);
        assert!(scores[1] > scores[0]);
        assert!(scores[0] > 0.0);
        assert_eq!(scores[2], 0.0);
    }

    #[test]
    fn test_rare_terms_weigh_more() {
        let docs = vec![doc(1, "벡터 공간"), doc(2, "벡터 내적"), doc(3, "벡터 노름")];
        let scores = lexical_rank(&docs, &query(&["벡터", "내적"]), Bm25Params::default());
        assert!(scores[1] > scores[0]);
        assert!((scores[0] - scores[2]).abs() < 1e-12);
    }

    #[test]
    fn test_shorter_documents_win_at_equal_frequency() {
        let docs = vec![doc(1, "행렬"), doc(2, "행렬 벡터 공간 기저 차원")];
        let scores = lexical_rank(&docs, &query(&["행렬"]), Bm25Params::default());
        assert!(scores[0] > scores[1]);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(lexical_rank(&[], &query(&["행렬"]), Bm25Params::default()).is_empty());

        let docs = vec![doc(1, ""), doc(2, "")];
        let scores = lexical_rank(&docs, &query(&["행렬"]), Bm25Params::default());
        assert_eq!(scores, vec![0.0, 0.0]);

        let scores = lexical_rank(&docs, &[], Bm25Params::default());
        assert_eq!(scores, vec![0.0, 0.0]);
    }
}
