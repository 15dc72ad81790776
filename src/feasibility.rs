//! # Feasibility Oracle
//!
//! Answers, before any sampling runs, whether a request `(N, M, T)` can be
//! satisfied by a universe of a given size. The verdict is structured and
//! serialisable so callers can hand it straight back to a user together
//! with a remedy (add icons, reduce `num_sets` or `items_per_set`, raise
//! the threshold).
//!
//! There is no fourth state between feasible and infeasible: a request
//! whose verdict says `feasible = false` must never reach the sampling
//! engine.

use crate::partition::NUM_PARTITIONS;
use crate::planner::{plan, GenerationPlan, PlanError};
use serde::{Deserialize, Serialize};

/// Structured feasibility verdict.
///
/// Field names are part of the wire contract and serialise verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeasibilityVerdict {
    /// Whether generation may proceed.
    pub feasible: bool,
    /// Size of the universe the request was checked against.
    pub total_icons: u64,
    /// Minimum universe size the request needs (`P*`).
    pub required_pool: u64,
    /// Maximum permitted pairwise intersection (`o`).
    pub max_overlap: usize,
    /// `total_icons / required_pool`.
    pub safety_margin: f64,
    /// Number of partitions (`K`).
    pub num_partitions: usize,
    /// Partitions each set draws from (`L`).
    pub partitions_per_set: usize,
    /// `C(K, L)`.
    pub available_combinations: u64,
    /// `⌈N / 0.9⌉`.
    pub required_combinations: u64,
    /// `available_combinations / required_combinations`.
    pub collision_safety_factor: f64,
    /// Human-readable assessment, first matching rule wins.
    pub recommendation: String,
}

/// Check feasibility of `(num_sets, items_per_set, overlap_threshold)`
/// against a universe of `total_icons` identifiers.
///
/// Pure: the universe handle is not consulted, only its reported size.
pub fn check_feasibility(
    num_sets: usize,
    items_per_set: usize,
    overlap_threshold: f64,
    total_icons: u64,
) -> Result<FeasibilityVerdict, PlanError> {
    let plan = plan(num_sets, items_per_set, overlap_threshold)?;
    Ok(assess(&plan, total_icons))
}

/// Produce the verdict for an already-computed plan.
pub fn assess(plan: &GenerationPlan, total_icons: u64) -> FeasibilityVerdict {
    let safety_margin = total_icons as f64 / plan.required_pool as f64;
    let collision_safety_factor =
        plan.available_combinations as f64 / plan.required_combinations as f64;

    let pool_short = total_icons < plan.required_pool;
    let recommendation = if pool_short {
        format!(
            "INFEASIBLE: insufficient icons. Have {}, need {}. \
             Add icons, reduce num_sets or items_per_set, or raise the overlap threshold.",
            total_icons, plan.required_pool
        )
    } else if collision_safety_factor < 0.5 {
        format!(
            "INFEASIBLE: too many sets for the available partition combinations \
             ({} needed, {} available). Reduce num_sets.",
            plan.required_combinations, plan.available_combinations
        )
    } else if collision_safety_factor < 1.0 {
        format!(
            "RISKY: partition combinations are nearly exhausted \
             (safety factor {collision_safety_factor:.2}). Reduce num_sets."
        )
    } else if collision_safety_factor < 2.0 {
        format!(
            "CAUTION: limited combination headroom \
             (safety factor {collision_safety_factor:.2})."
        )
    } else {
        format!(
            "SAFE: pool margin {safety_margin:.1}x, \
             combination safety factor {collision_safety_factor:.1}x."
        )
    };

    FeasibilityVerdict {
        feasible: !pool_short && collision_safety_factor >= 1.0,
        total_icons,
        required_pool: plan.required_pool,
        max_overlap: plan.max_overlap,
        safety_margin,
        num_partitions: NUM_PARTITIONS,
        partitions_per_set: plan.depth,
        available_combinations: plan.available_combinations,
        required_combinations: plan.required_combinations,
        collision_safety_factor,
        recommendation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ample_universe_is_safe() {
        let v = check_feasibility(5, 10, 0.10, 100_000).unwrap();
        assert!(v.feasible);
        assert!(v.recommendation.starts_with("SAFE"));
        assert!(v.safety_margin > 1.0);
        assert!(v.collision_safety_factor > 2.0);
    }

    #[test]
    fn undersized_pool_is_infeasible() {
        let v = check_feasibility(1000, 100, 0.01, 100_000).unwrap();
        assert!(!v.feasible);
        assert!(v.required_pool > v.total_icons);
        assert!(v.recommendation.starts_with("INFEASIBLE: insufficient icons"));
    }

    #[test]
    fn insufficient_pool_wins_over_collision_verdict() {
        // Both rules fire; the pool rule is reported.
        let v = check_feasibility(20_000, 2, 0.0, 10).unwrap();
        assert!(!v.feasible);
        assert!(v.recommendation.starts_with("INFEASIBLE: insufficient icons"));
    }

    #[test]
    fn exhausted_combinations_are_infeasible() {
        // M = 2 caps the depth at 2, so C(128, 2) = 8128 combinations serve
        // ceil(20000 / 0.9) = 22223 required ones.
        let v = check_feasibility(20_000, 2, 0.0, 1_000_000).unwrap();
        assert!(!v.feasible);
        assert!(v.recommendation.starts_with("INFEASIBLE: too many sets"));
        assert!(v.collision_safety_factor < 0.5);
    }

    #[test]
    fn risky_band_is_not_feasible() {
        let v = check_feasibility(9_000, 2, 0.0, 100_000).unwrap();
        assert!(!v.feasible);
        assert!(v.recommendation.starts_with("RISKY"));
        assert!(v.collision_safety_factor >= 0.5 && v.collision_safety_factor < 1.0);
    }

    #[test]
    fn caution_band_is_feasible() {
        let v = check_feasibility(5_000, 2, 0.0, 50_000).unwrap();
        assert!(v.feasible);
        assert!(v.recommendation.starts_with("CAUTION"));
        assert!(v.collision_safety_factor >= 1.0 && v.collision_safety_factor < 2.0);
    }

    #[test]
    fn verdict_serialises_with_contract_field_names() {
        let v = check_feasibility(5, 10, 0.10, 100_000).unwrap();
        let json = serde_json::to_value(&v).unwrap();
        for field in [
            "feasible",
            "total_icons",
            "required_pool",
            "max_overlap",
            "safety_margin",
            "num_partitions",
            "partitions_per_set",
            "available_combinations",
            "required_combinations",
            "collision_safety_factor",
            "recommendation",
        ] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
        assert_eq!(json["num_partitions"], 128);
    }

    #[test]
    fn plan_errors_pass_through() {
        assert!(check_feasibility(0, 10, 0.1, 1000).is_err());
        assert!(check_feasibility(5, 10, 2.0, 1000).is_err());
    }
}
