//! # Parameter Planner
//!
//! Turns a generation request `(N, M, T)` into the fixed parameters the
//! sampling engine and the feasibility oracle consume:
//!
//! - **max_overlap** `o`: the largest intersection two M-item sets may share
//!   while keeping their Jaccard similarity at or below `T`.
//! - **depth** `L`: how many partitions each set draws from. The larger of
//!   the stratification bound `⌈M / (M - o)⌉` and a birthday-paradox floor
//!   that keeps the chance of two sets landing on the same partition
//!   combination under 1%.
//! - **required_pool** `P*`: the minimum universe size that leaves enough
//!   distinct icons for all N sets, with a 10% margin for the variance of
//!   hash-based partition choice.
//! - **available/required combinations**: `C(K, L)` versus `⌈N / 0.9⌉`.
//!
//! The plan is immutable for the duration of one generation call.
//!
//! ## Example
//!
//! ```rust
//! use iconset::planner::plan;
//!
//! let plan = plan(5, 10, 0.25).unwrap();
//! assert_eq!(plan.max_overlap, 4);
//! assert_eq!(plan.depth, 3);
//! assert_eq!(plan.required_pool, 38);
//! assert_eq!(plan.available_combinations, 341_376);
//! assert_eq!(plan.required_combinations, 6);
//! ```

use crate::partition::NUM_PARTITIONS;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest depth for which `C(K, L)` is computed.
pub const MAX_DEPTH: usize = 8;

/// Fraction of the combination space the request may consume.
const COMBINATION_HEADROOM: f64 = 0.9;

/// Margin applied to the required icon pool.
const POOL_MARGIN: f64 = 1.1;

/// Errors raised while planning a generation request.
#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    /// `num_sets` was zero.
    #[error("num_sets must be at least 1, got {0}")]
    InvalidNumSets(usize),
    /// `items_per_set` was zero.
    #[error("items_per_set must be at least 1, got {0}")]
    InvalidItemsPerSet(usize),
    /// The overlap threshold was outside `[0, 1]` (or not a number).
    #[error("overlap_threshold must lie in [0, 1], got {0}")]
    InvalidThreshold(f64),
    /// The request geometry needs a stratification depth beyond the
    /// supported envelope.
    #[error("stratification depth {depth} exceeds the supported maximum of {limit}")]
    DepthOutOfRange { depth: usize, limit: usize },
}

/// Fixed parameters for one generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationPlan {
    /// Number of sets to generate (`N`).
    pub num_sets: usize,
    /// Icons per set (`M`).
    pub items_per_set: usize,
    /// Maximum permitted pairwise Jaccard similarity (`T`).
    pub overlap_threshold: f64,
    /// Maximum permitted intersection between any two sets (`o`).
    pub max_overlap: usize,
    /// Partitions each set draws from (`L`).
    pub depth: usize,
    /// Minimum universe size for a feasible request (`P*`).
    pub required_pool: u64,
    /// `C(K, L)`: distinct partition combinations at the chosen depth.
    pub available_combinations: u64,
    /// `⌈N / 0.9⌉`: combinations the request needs with headroom.
    pub required_combinations: u64,
}

/// Build the plan for `(num_sets, items_per_set, overlap_threshold)`.
///
/// Fails on out-of-range arguments or when the implied depth exceeds
/// [`MAX_DEPTH`].
pub fn plan(
    num_sets: usize,
    items_per_set: usize,
    overlap_threshold: f64,
) -> Result<GenerationPlan, PlanError> {
    if num_sets < 1 {
        return Err(PlanError::InvalidNumSets(num_sets));
    }
    if items_per_set < 1 {
        return Err(PlanError::InvalidItemsPerSet(items_per_set));
    }
    if !(0.0..=1.0).contains(&overlap_threshold) {
        return Err(PlanError::InvalidThreshold(overlap_threshold));
    }

    let max_overlap = max_overlap(items_per_set, overlap_threshold);
    let depth = hpss_depth(items_per_set, max_overlap)
        .max(collision_floor(num_sets))
        .clamp(1, NUM_PARTITIONS.min(items_per_set));
    if depth > MAX_DEPTH {
        return Err(PlanError::DepthOutOfRange {
            depth,
            limit: MAX_DEPTH,
        });
    }

    Ok(GenerationPlan {
        num_sets,
        items_per_set,
        overlap_threshold,
        max_overlap,
        depth,
        required_pool: required_pool(num_sets, items_per_set, overlap_threshold),
        available_combinations: combinations(depth),
        required_combinations: required_combinations(num_sets),
    })
}

/// `o = ⌊2MT / (1 + T)⌋`.
///
/// From `J(A, B) ≤ T` and `|A ∪ B| = 2M - |A ∩ B|` it follows that
/// `|A ∩ B| ≤ 2MT / (1 + T)`.
pub fn max_overlap(items_per_set: usize, threshold: f64) -> usize {
    (2.0 * items_per_set as f64 * threshold / (1.0 + threshold)).floor() as usize
}

/// Stratification bound `⌈M / (M - o)⌉`; defined as 1 when `o ≥ M`.
///
/// Two sets that overlap in at most one of their `L` partitions cannot
/// share more than `M / L` icons, so `L ≥ M / (M - o)` meets the
/// intersection bound.
fn hpss_depth(items_per_set: usize, max_overlap: usize) -> usize {
    if max_overlap >= items_per_set {
        return 1;
    }
    let room = items_per_set - max_overlap;
    items_per_set.div_ceil(room)
}

/// Collision-avoidance floor on the depth.
///
/// Derived from `P(collision) ≈ N² / (2 C(K, L)) < 1%`, i.e.
/// `C(K, L) > 50 N²`.
fn collision_floor(num_sets: usize) -> usize {
    match num_sets {
        0..=80 => 3,
        81..=460 => 4,
        461..=2200 => 5,
        _ => 6,
    }
}

/// `P* = ⌈1.1 · (M + (N - 1) · M · (1 - 2T / (1 + T)))⌉`.
pub fn required_pool(num_sets: usize, items_per_set: usize, threshold: f64) -> u64 {
    let m = items_per_set as f64;
    let fresh_fraction = 1.0 - 2.0 * threshold / (1.0 + threshold);
    let pool = POOL_MARGIN * (m + (num_sets as f64 - 1.0) * m * fresh_fraction);
    pool.ceil() as u64
}

/// `⌈N / 0.9⌉`: the request must fit in 90% of the combination space.
pub fn required_combinations(num_sets: usize) -> u64 {
    (num_sets as f64 / COMBINATION_HEADROOM).ceil() as u64
}

/// `C(K, L)` for `L ∈ 1..=MAX_DEPTH`, exact in 64-bit arithmetic.
///
/// Running product form: each step holds `C(K, i + 1)`, so every division
/// is exact. The maximum, `C(128, 8)`, is about 1.4e12.
pub fn combinations(depth: usize) -> u64 {
    debug_assert!((1..=MAX_DEPTH).contains(&depth));
    let k = NUM_PARTITIONS as u64;
    let mut c = 1u64;
    for i in 0..depth as u64 {
        c = c * (k - i) / (i + 1);
    }
    c
}
