//! Score normalization and weighted fusion.

use super::SignalScores;
use crate::config::SearchSettings;
use crate::error::{LecternError, Result};
use crate::store::DocumentId;
use std::cmp::Ordering;
use tracing::warn;

/// Weights of the three normalized signals. Always sum to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub bm25: f64,
    pub content: f64,
    pub title: f64,
}

impl FusionWeights {
    /// Validate and rescale weights so they sum to 1.
    ///
    /// Negative or non-finite weights, and an all-zero set, are rejected.
    pub fn new(bm25: f64, content: f64, title: f64) -> Result<Self> {
        let weights = [bm25, content, title];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(LecternError::Config(format!(
                "search weights must be finite and non-negative, got ({}, {}, {})",
                bm25, content, title
            )));
        }

        let sum: f64 = weights.iter().sum();
        if sum == 0.0 {
            return Err(LecternError::Config(
                "at least one search weight must be positive".to_string(),
            ));
        }

        if (sum - 1.0).abs() > 1e-6 {
            warn!(
                "Search weights sum to {:.4}, rescaling to ({:.4}, {:.4}, {:.4})",
                sum,
                bm25 / sum,
                content / sum,
                title / sum
            );
        }

        Ok(Self {
            bm25: bm25 / sum,
            content: content / sum,
            title: title / sum,
        })
    }

    pub fn from_settings(settings: &SearchSettings) -> Result<Self> {
        Self::new(
            settings.bm25_weight as f64,
            settings.content_vector_weight as f64,
            settings.title_vector_weight as f64,
        )
    }

    pub fn fuse(&self, normalized: &SignalScores) -> f64 {
        self.bm25 * normalized.bm25
            + self.content * normalized.content_sim
            + self.title * normalized.title_sim
    }
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            bm25: 0.4,
            content: 0.4,
            title: 0.2,
        }
    }
}

/// Min-max normalize into `[0, 1]`. All-equal input maps to all zeros.
pub fn min_max_normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    values
        .iter()
        .map(|v| if range > 0.0 { (v - min) / range } else { 0.0 })
        .collect()
}

/// Per-signal raw scores for every candidate, in the same order.
#[derive(Debug, Clone, Default)]
pub struct RawSignals {
    pub bm25: Vec<f64>,
    pub content_sim: Vec<f64>,
    pub title_sim: Vec<f64>,
}

impl RawSignals {
    /// Normalize each signal across the candidate set and fuse them.
    ///
    /// Returns `(raw, normalized, fused)` per candidate, in input order.
    pub fn fuse(&self, weights: &FusionWeights) -> Vec<(SignalScores, SignalScores, f64)> {
        let bm25 = min_max_normalize(&self.bm25);
        let content = min_max_normalize(&self.content_sim);
        let title = min_max_normalize(&self.title_sim);

        (0..self.bm25.len())
            .map(|i| {
                let raw = SignalScores {
                    bm25: self.bm25[i],
                    content_sim: self.content_sim[i],
                    title_sim: self.title_sim[i],
                };
                let normalized = SignalScores {
                    bm25: bm25[i],
                    content_sim: content[i],
                    title_sim: title[i],
                };
                let fused = weights.fuse(&normalized);
                (raw, normalized, fused)
            })
            .collect()
    }
}

/// Ranking order: higher score first, then lower document id.
pub fn rank_order(a: (f64, DocumentId), b: (f64, DocumentId)) -> Ordering {
    b.0.total_cmp(&a.0).then(a.1.cmp(&b.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_normalize_maps_extremes() {
        let normalized = min_max_normalize(&[2.0, 4.0, 3.0, 6.0]);
        assert_eq!(normalized[0], 0.0);
        assert_eq!(normalized[3], 1.0);
        assert!(approx(normalized[1], 0.5));
        assert!(normalized.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_normalize_all_equal_is_zero() {
        assert_eq!(min_max_normalize(&[0.2, 0.2, 0.2]), vec![0.0, 0.0, 0.0]);
        assert_eq!(min_max_normalize(&[0.7]), vec![0.0]);
        assert!(min_max_normalize(&[]).is_empty());
    }

    #[test]
    fn test_scenario_three_documents() {
        let signals = RawSignals {
            bm25: vec![0.0, 0.5, 1.0],
            content_sim: vec![0.2, 0.2, 0.2],
            title_sim: vec![0.1, 0.4, 0.9],
        };
        let weights = FusionWeights::new(0.4, 0.4, 0.2).unwrap();
        let fused = signals.fuse(&weights);

        assert!(fused.iter().all(|(_, normalized, _)| normalized.content_sim == 0.0));

        let scores: Vec<f64> = fused.iter().map(|(_, _, f)| *f).collect();
        assert!(approx(scores[0], 0.0));
        assert!(approx(scores[1], 0.4 * 0.5 + 0.2 * 0.375));
        assert!(approx(scores[2], 0.6));

        let mut ranked: Vec<(f64, DocumentId)> = scores.into_iter().zip([1, 2, 3]).collect();
        ranked.sort_by(|a, b| rank_order(*a, *b));
        let ids: Vec<DocumentId> = ranked.iter().map(|(_, id)| *id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_ties_break_by_ascending_id() {
        let mut ranked = vec![(0.5, 9), (0.5, 2), (0.9, 7), (0.5, 4)];
        ranked.sort_by(|a, b| rank_order(*a, *b));
        let ids: Vec<DocumentId> = ranked.iter().map(|(_, id)| *id).collect();
        assert_eq!(ids, vec![7, 2, 4, 9]);
    }

    #[test]
    fn test_weights_are_rescaled() {
        let weights = FusionWeights::new(2.0, 2.0, 1.0).unwrap();
        assert!(approx(weights.bm25, 0.4));
        assert!(approx(weights.content, 0.4));
        assert!(approx(weights.title, 0.2));

        let weights = FusionWeights::new(0.0, 1.0, 0.0).unwrap();
        assert_eq!(weights.content, 1.0);
    }

    #[test]
    fn test_invalid_weights_are_rejected() {
        assert!(matches!(FusionWeights::new(-0.1, 0.6, 0.5), Err(LecternError::Config(_))));
        assert!(matches!(FusionWeights::new(f64::NAN, 0.5, 0.5), Err(LecternError::Config(_))));
        assert!(matches!(FusionWeights::new(0.0, 0.0, 0.0), Err(LecternError::Config(_))));
    }

    #[test]
    fn test_weights_from_default_settings() {
        let weights = FusionWeights::from_settings(&SearchSettings::default()).unwrap();
        assert!((weights.bm25 - 0.4).abs() < 1e-6);
        assert!((weights.title - 0.2).abs() < 1e-6);
    }
}
