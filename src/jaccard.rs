//! # Overlap validation
//!
//! Jaccard similarity over icon sets and the pairwise scans built on it.
//! The full scan is the correctness check (every pair, zero tolerance);
//! the sampled variant feeds response statistics when `N² / 2` pairs are
//! too many to inspect.

use crate::sampler::GeneratedSet;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

/// Seed of the deterministic pair sample used for statistics.
const STATS_SAMPLE_SEED: u64 = 0x1c0_5e7;

/// Jaccard similarity `|A ∩ B| / |A ∪ B|` of two id slices.
///
/// Empty input yields 0.
pub fn jaccard(a: &[i64], b: &[i64]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let set_a: HashSet<i64> = a.iter().copied().collect();
    let set_b: HashSet<i64> = b.iter().copied().collect();
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.len() + set_b.len() - intersection;
    intersection as f64 / union as f64
}

/// One pair of sets exceeding the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlapViolation {
    pub set_a: usize,
    pub set_b: usize,
    pub jaccard: f64,
}

/// Result of a full pairwise overlap scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlapReport {
    /// True when no pair exceeds the threshold.
    pub valid: bool,
    /// The threshold the sets were checked against.
    pub threshold: f64,
    /// Number of pairs inspected (`N (N - 1) / 2`).
    pub total_comparisons: usize,
    /// Every offending pair.
    pub violations: Vec<OverlapViolation>,
    pub max_jaccard: f64,
    pub avg_jaccard: f64,
}

/// Inspect every pair of sets against `threshold`.
///
/// The scan parallelises over the first index; the report is assembled in
/// deterministic order regardless.
pub fn validate_overlap(sets: &[GeneratedSet], threshold: f64) -> OverlapReport {
    let rows: Vec<(f64, f64, Vec<OverlapViolation>)> = (0..sets.len())
        .into_par_iter()
        .map(|i| {
            let mut max = 0.0f64;
            let mut sum = 0.0f64;
            let mut violations = Vec::new();
            for j in (i + 1)..sets.len() {
                let similarity = jaccard(&sets[i].icon_ids, &sets[j].icon_ids);
                max = max.max(similarity);
                sum += similarity;
                if similarity > threshold {
                    violations.push(OverlapViolation {
                        set_a: sets[i].set_index,
                        set_b: sets[j].set_index,
                        jaccard: similarity,
                    });
                }
            }
            (max, sum, violations)
        })
        .collect();

    let total_comparisons = sets.len() * sets.len().saturating_sub(1) / 2;
    let mut max_jaccard = 0.0f64;
    let mut sum = 0.0f64;
    let mut violations = Vec::new();
    for (row_max, row_sum, row_violations) in rows {
        max_jaccard = max_jaccard.max(row_max);
        sum += row_sum;
        violations.extend(row_violations);
    }
    for v in &violations {
        warn!(
            set_a = v.set_a,
            set_b = v.set_b,
            jaccard = v.jaccard,
            threshold,
            "overlap violation"
        );
    }

    OverlapReport {
        valid: violations.is_empty(),
        threshold,
        total_comparisons,
        violations,
        max_jaccard,
        avg_jaccard: if total_comparisons > 0 {
            sum / total_comparisons as f64
        } else {
            0.0
        },
    }
}

/// Aggregate Jaccard statistics over generated sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JaccardStats {
    pub max_jaccard: f64,
    pub avg_jaccard: f64,
    /// Pairs actually inspected; below `N (N - 1) / 2` when sampled.
    pub pairs_inspected: usize,
}

/// Max and average Jaccard over at most `budget` pairs.
///
/// Under the budget (or with `budget == 0`, meaning no cap) every pair is
/// inspected. Above it a fixed-seed sample of pairs is drawn, so the
/// statistics stay reproducible run to run.
pub fn sampled_stats(sets: &[GeneratedSet], budget: usize) -> JaccardStats {
    let n = sets.len();
    let total_pairs = n * n.saturating_sub(1) / 2;
    if total_pairs == 0 {
        return JaccardStats {
            max_jaccard: 0.0,
            avg_jaccard: 0.0,
            pairs_inspected: 0,
        };
    }

    let mut max = 0.0f64;
    let mut sum = 0.0f64;
    let inspected = if budget == 0 || total_pairs <= budget {
        for i in 0..n {
            for j in (i + 1)..n {
                let s = jaccard(&sets[i].icon_ids, &sets[j].icon_ids);
                max = max.max(s);
                sum += s;
            }
        }
        total_pairs
    } else {
        let mut rng = ChaCha20Rng::seed_from_u64(STATS_SAMPLE_SEED);
        for _ in 0..budget {
            let i = rng.gen_range(0..n - 1);
            let j = rng.gen_range(i + 1..n);
            let s = jaccard(&sets[i].icon_ids, &sets[j].icon_ids);
            max = max.max(s);
            sum += s;
        }
        budget
    };

    JaccardStats {
        max_jaccard: max,
        avg_jaccard: sum / inspected as f64,
        pairs_inspected: inspected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(index: usize, ids: &[i64]) -> GeneratedSet {
        GeneratedSet {
            set_index: index,
            icon_ids: ids.to_vec(),
        }
    }

    #[test]
    fn identical_sets_score_one() {
        assert_eq!(jaccard(&[1, 2, 3], &[1, 2, 3]), 1.0);
    }

    #[test]
    fn disjoint_sets_score_zero() {
        assert_eq!(jaccard(&[1, 2, 3], &[4, 5, 6]), 0.0);
    }

    #[test]
    fn partial_overlap() {
        // |{3,4}| / |{1..6}|
        assert_eq!(jaccard(&[1, 2, 3, 4], &[3, 4, 5, 6]), 2.0 / 6.0);
    }

    #[test]
    fn empty_input_scores_zero() {
        assert_eq!(jaccard(&[], &[1, 2]), 0.0);
        assert_eq!(jaccard(&[], &[]), 0.0);
    }

    #[test]
    fn clean_batch_validates() {
        let sets = vec![set(0, &[1, 2, 3]), set(1, &[4, 5, 6]), set(2, &[7, 8, 9])];
        let report = validate_overlap(&sets, 0.0);
        assert!(report.valid);
        assert_eq!(report.total_comparisons, 3);
        assert_eq!(report.max_jaccard, 0.0);
        assert!(report.violations.is_empty());
    }

    #[test]
    fn violations_are_reported_with_indices() {
        let sets = vec![
            set(0, &[1, 2, 3, 4]),
            set(1, &[1, 2, 3, 4]),
            set(2, &[10, 11, 12, 13]),
        ];
        let report = validate_overlap(&sets, 0.5);
        assert!(!report.valid);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].set_a, 0);
        assert_eq!(report.violations[0].set_b, 1);
        assert_eq!(report.violations[0].jaccard, 1.0);
        assert_eq!(report.max_jaccard, 1.0);
    }

    #[test]
    fn sampled_stats_match_full_scan_under_budget() {
        let sets = vec![
            set(0, &[1, 2, 3, 4]),
            set(1, &[3, 4, 5, 6]),
            set(2, &[7, 8, 9, 10]),
        ];
        let report = validate_overlap(&sets, 1.0);
        let stats = sampled_stats(&sets, 100);
        assert_eq!(stats.pairs_inspected, 3);
        assert_eq!(stats.max_jaccard, report.max_jaccard);
        assert!((stats.avg_jaccard - report.avg_jaccard).abs() < 1e-12);
    }

    #[test]
    fn sampled_stats_are_deterministic_over_budget() {
        let sets: Vec<GeneratedSet> = (0..40)
            .map(|i| set(i, &[i as i64 * 3, i as i64 * 3 + 1, i as i64 * 3 + 2]))
            .collect();
        let a = sampled_stats(&sets, 50);
        let b = sampled_stats(&sets, 50);
        assert_eq!(a, b);
        assert_eq!(a.pairs_inspected, 50);
    }
}
