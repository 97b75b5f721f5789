//! Score fusion for hybrid search
//!
//! Blends max-normalized semantic and lexical scores with configured
//! weights, lets a full keyword match override the blend, and rescales the
//! result to a 0-100 match percentage.
//!
//! Fusion operates on one candidate list that has already been restricted
//! and truncated by the query service; it never adds or drops candidates.

use serde::{Deserialize, Serialize};

/// Blended value given to candidates whose keyword set contains every query token
pub const FULL_MATCH_SCORE: f32 = 1.0;

/// Order of fused results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOrder {
    /// Final score descending; ties keep semantic rank
    #[default]
    FinalScore,
    /// Semantic search rank, regardless of final score
    SemanticRank,
}

/// Weights for the score channels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub semantic: f32,
    pub keyword: f32,
    /// Reserved for caller-side filter boosts; never applied during fusion
    pub filter: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            semantic: 0.6,
            keyword: 0.25,
            filter: 0.15,
        }
    }
}

impl FusionWeights {
    pub fn new(semantic: f32, keyword: f32) -> Self {
        Self {
            semantic,
            keyword,
            ..Self::default()
        }
    }
}

/// One candidate entering fusion, aligned across the three signals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub row: usize,
    pub semantic: f32,
    pub lexical: f32,
    pub full_match: bool,
}

/// Fused scores for one candidate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusedScore {
    pub row: usize,
    /// Max-normalized semantic score, 0-1
    pub semantic: f32,
    /// Max-normalized lexical score, 0-1
    pub lexical: f32,
    /// Match percentage, 0-100 with one decimal
    pub final_score: f32,
    pub full_match: bool,
}

/// Fuse aligned candidate signals into final scores
pub fn fuse(candidates: &[Candidate], weights: &FusionWeights, order: ResultOrder) -> Vec<FusedScore> {
    if candidates.is_empty() {
        return vec![];
    }

    let semantic = normalize_by_max(candidates.iter().map(|c| c.semantic));
    let lexical = normalize_by_max(candidates.iter().map(|c| c.lexical));

    let blended: Vec<f32> = candidates
        .iter()
        .zip(semantic.iter().zip(&lexical))
        .map(|(candidate, (sem, kw))| {
            if candidate.full_match {
                FULL_MATCH_SCORE
            } else {
                weights.semantic * sem + weights.keyword * kw
            }
        })
        .collect();
    let finals = normalize_by_max(blended.iter().copied());

    let mut fused: Vec<FusedScore> = candidates
        .iter()
        .enumerate()
        .map(|(i, candidate)| FusedScore {
            row: candidate.row,
            semantic: semantic[i],
            lexical: lexical[i],
            final_score: round_to(finals[i] * 100.0, 1),
            full_match: candidate.full_match,
        })
        .collect();

    if order == ResultOrder::FinalScore {
        // stable: equal scores keep semantic rank
        fused.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
    }
    fused
}

/// Divide every score by the maximum; a maximum of zero or less yields all zeros
pub fn normalize_by_max(scores: impl Iterator<Item = f32> + Clone) -> Vec<f32> {
    let max = scores.clone().fold(f32::NEG_INFINITY, f32::max);
    if max > 0.0 {
        scores.map(|s| (s / max).clamp(0.0, 1.0)).collect()
    } else {
        scores.map(|_| 0.0).collect()
    }
}

/// Round to `decimals` places, ties to even
pub fn round_to(value: f32, decimals: i32) -> f32 {
    let factor = 10f64.powi(decimals);
    ((value as f64 * factor).round_ties_even() / factor) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(row: usize, semantic: f32, lexical: f32, full_match: bool) -> Candidate {
        Candidate {
            row,
            semantic,
            lexical,
            full_match,
        }
    }

    #[test]
    fn test_empty_candidates() {
        assert!(fuse(&[], &FusionWeights::default(), ResultOrder::FinalScore).is_empty());
    }

    #[test]
    fn test_weighted_combination() {
        let fused = fuse(
            &[candidate(0, 0.8, 0.0, false), candidate(1, 0.4, 0.5, false)],
            &FusionWeights::default(),
            ResultOrder::SemanticRank,
        );
        // sem norm [1.0, 0.5], kw norm [0.0, 1.0] -> raw [0.6, 0.55]
        assert_eq!(fused[0].semantic, 1.0);
        assert_eq!(fused[1].semantic, 0.5);
        assert_eq!(fused[1].lexical, 1.0);
        assert_eq!(fused[0].final_score, 100.0);
        assert_eq!(fused[1].final_score, 91.7);
    }

    #[test]
    fn test_full_match_overrides_blend() {
        let fused = fuse(
            &[candidate(0, 0.9, 0.9, false), candidate(1, 0.5, 0.1, true)],
            &FusionWeights::default(),
            ResultOrder::FinalScore,
        );
        assert_eq!(fused[0].row, 1);
        assert!(fused[0].full_match);
        assert_eq!(fused[0].final_score, 100.0);
        assert_eq!(fused[1].final_score, 85.0);
        assert!(!fused[1].full_match);
    }

    #[test]
    fn test_non_positive_semantic_scores_normalize_to_zero() {
        let fused = fuse(
            &[candidate(0, -0.2, 0.0, false), candidate(1, 0.0, 0.0, false)],
            &FusionWeights::default(),
            ResultOrder::FinalScore,
        );
        assert!(fused.iter().all(|f| f.semantic == 0.0));
        assert!(fused.iter().all(|f| f.final_score == 0.0));
    }

    #[test]
    fn test_semantic_rank_order_is_preserved() {
        let fused = fuse(
            &[candidate(4, 0.9, 0.0, false), candidate(2, 0.8, 0.0, true)],
            &FusionWeights::default(),
            ResultOrder::SemanticRank,
        );
        let rows: Vec<usize> = fused.iter().map(|f| f.row).collect();
        assert_eq!(rows, vec![4, 2]);
        assert_eq!(fused[1].final_score, 100.0);
    }

    #[test]
    fn test_ties_keep_semantic_rank() {
        let fused = fuse(
            &[
                candidate(7, 0.5, 0.0, true),
                candidate(3, 0.9, 0.0, true),
                candidate(5, 0.95, 0.0, false),
            ],
            &FusionWeights::default(),
            ResultOrder::FinalScore,
        );
        let rows: Vec<usize> = fused.iter().map(|f| f.row).collect();
        assert_eq!(rows, vec![7, 3, 5]);
    }

    #[test]
    fn test_filter_weight_is_not_applied() {
        let weights = FusionWeights {
            semantic: 0.5,
            keyword: 0.5,
            filter: 10.0,
        };
        let fused = fuse(
            &[candidate(0, 1.0, 0.0, false), candidate(1, 0.0, 1.0, false)],
            &weights,
            ResultOrder::SemanticRank,
        );
        assert_eq!(fused[0].final_score, 100.0);
        assert_eq!(fused[1].final_score, 100.0);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(91.66667, 1), 91.7);
        assert_eq!(round_to(0.123456, 4), 0.1235);
        assert_eq!(round_to(0.0, 1), 0.0);
        assert_eq!(round_to(12.25, 1), 12.2);
        assert_eq!(round_to(12.75, 1), 12.8);
        assert_eq!(round_to(0.125, 2), 0.12);
    }
}
