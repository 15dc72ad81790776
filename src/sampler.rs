//! # Sampling Engine
//!
//! Emits `N` icon sets whose pairwise Jaccard similarity stays within the
//! planned bound. For each set index `s`:
//!
//! 1. pick `L` partitions by hashing `(s, slot)` seeds,
//! 2. pull every icon of those partitions as candidates,
//! 3. rank each candidate with a set-specific hash,
//! 4. keep the `2M` lowest-ranked candidates (deterministic tie-breaks),
//! 5. dedup by identifier, sort ascending, take the first `M`.
//!
//! Because the rank function is seeded by the set index, two sets that land
//! on a shared partition still draw different icons from it, and two sets
//! sharing few partitions can share few icons at all. The feasibility
//! oracle runs first; an infeasible request never samples.
//!
//! Everything is a pure function of `(N, M, T)` and the universe contents.
//! Running the same request twice against the same universe yields
//! identical output, set by set, icon by icon.
//!
//! ## Example
//!
//! ```rust
//! use iconset::sampler::generate;
//! use iconset::universe::InMemoryUniverse;
//!
//! let universe = InMemoryUniverse::sequential(100_000);
//! let sets = generate(5, 10, 0.10, &universe).unwrap();
//! assert_eq!(sets.len(), 5);
//! assert!(sets.iter().all(|s| s.icon_ids.len() == 10));
//! ```

use crate::feasibility::{assess, FeasibilityVerdict};
use crate::partition::icon_hash;
use crate::planner::{plan, GenerationPlan, PlanError};
use crate::universe::{Universe, UniverseError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Multiplier decorrelating `(set, slot)` seeds for partition selection.
///
/// Frozen: changing it changes every generated set.
pub const SET_SEED_MULTIPLIER: i64 = 999_983;

/// Multiplier folding the icon id into the per-set rank seed. Frozen.
pub const RANK_MULTIPLIER: i64 = 31;

/// Modulus of the rank value. Frozen.
pub const RANK_MODULUS: i64 = 999_983;

/// Candidates kept per set before finalisation, as a multiple of `M`.
const PRETRUNCATION_FACTOR: usize = 2;

/// One generated set: `M` distinct icon identifiers in ascending order,
/// tagged with the set's ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedSet {
    /// Ordinal of this set in `[0, N)`.
    pub set_index: usize,
    /// Ascending, duplicate-free icon identifiers.
    pub icon_ids: Vec<i64>,
}

/// Cooperative cancellation flag.
///
/// Clones share the flag. The engine checks it between set indices and
/// between partition slots; on observation the call discards partial
/// output and returns [`GenerateError::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Errors of a generation call. Nothing is retried; partial output is
/// never returned.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The feasibility oracle rejected the request; the full verdict is
    /// attached so the caller can suggest a remedy.
    #[error("infeasible request: {}", .0.recommendation)]
    Infeasible(Box<FeasibilityVerdict>),
    /// Request parameters outside the supported envelope.
    #[error(transparent)]
    InvalidArguments(#[from] PlanError),
    /// The universe handle failed to answer.
    #[error(transparent)]
    Universe(#[from] UniverseError),
    /// A set ended with fewer than `M` distinct icons despite a feasible
    /// verdict. Indicates a universe smaller than declared or an
    /// inconsistent handle; fatal for the whole call.
    #[error("set {set_index} ended short: {have} of {need} icons")]
    Shortfall {
        set_index: usize,
        have: usize,
        need: usize,
    },
    /// Cooperative cancellation was observed.
    #[error("generation cancelled")]
    Cancelled,
}

/// Generate `num_sets` sets of `items_per_set` icons with pairwise Jaccard
/// similarity at most `overlap_threshold`.
///
/// Runs the feasibility oracle first and fails with the verdict attached
/// when the request cannot be satisfied. On success the sets come back in
/// ascending set order, each ascending by icon identifier.
pub fn generate<U: Universe + ?Sized>(
    num_sets: usize,
    items_per_set: usize,
    overlap_threshold: f64,
    universe: &U,
) -> Result<Vec<GeneratedSet>, GenerateError> {
    generate_with_cancel(
        num_sets,
        items_per_set,
        overlap_threshold,
        universe,
        &CancelToken::new(),
    )
}

/// [`generate`] with a caller-supplied cancellation token.
pub fn generate_with_cancel<U: Universe + ?Sized>(
    num_sets: usize,
    items_per_set: usize,
    overlap_threshold: f64,
    universe: &U,
    cancel: &CancelToken,
) -> Result<Vec<GeneratedSet>, GenerateError> {
    let plan = plan(num_sets, items_per_set, overlap_threshold)?;
    let total_icons = universe.size()?;
    let verdict = assess(&plan, total_icons);
    debug!(
        feasible = verdict.feasible,
        depth = verdict.partitions_per_set,
        required_pool = verdict.required_pool,
        total_icons,
        "feasibility verdict"
    );
    if !verdict.feasible {
        return Err(GenerateError::Infeasible(Box::new(verdict)));
    }

    let mut sets = Vec::with_capacity(num_sets);
    for set_index in 0..num_sets {
        if cancel.is_cancelled() {
            return Err(GenerateError::Cancelled);
        }
        let icon_ids = sample_set(&plan, universe, set_index, cancel)?;
        sets.push(GeneratedSet {
            set_index,
            icon_ids,
        });
    }
    Ok(sets)
}

/// The `L` partitions set `s` draws from, in ascending slot order.
///
/// Duplicates are possible and tolerated: a repeated partition contributes
/// its icons twice and the finalisation dedup absorbs the repeats. The
/// intersection bound is a worst-case argument and survives fewer
/// effective partitions.
pub fn partitions_for_set(set_index: usize, depth: usize) -> Vec<usize> {
    (0..depth)
        .map(|slot| {
            let seed = (set_index as i64)
                .wrapping_mul(SET_SEED_MULTIPLIER)
                .wrapping_add(slot as i64);
            icon_hash(seed).rem_euclid(crate::partition::NUM_PARTITIONS as i64) as usize
        })
        .collect()
}

/// Rank of a candidate icon for one set. Lower ranks win.
pub fn rank_of(icon_id: i64, set_index: usize) -> i64 {
    let seed = icon_id
        .wrapping_mul(RANK_MULTIPLIER)
        .wrapping_add(set_index as i64);
    icon_hash(seed).rem_euclid(RANK_MODULUS)
}

struct Candidate {
    rank: i64,
    icon_id: i64,
    slot: usize,
}

fn sample_set<U: Universe + ?Sized>(
    plan: &GenerationPlan,
    universe: &U,
    set_index: usize,
    cancel: &CancelToken,
) -> Result<Vec<i64>, GenerateError> {
    let mut candidates = Vec::new();
    for (slot, partition) in partitions_for_set(set_index, plan.depth).into_iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(GenerateError::Cancelled);
        }
        for icon_id in universe.enumerate_partition(partition)? {
            candidates.push(Candidate {
                rank: rank_of(icon_id, set_index),
                icon_id,
                slot,
            });
        }
    }

    // Deterministic top-2M: ties broken by ascending id, then by slot.
    candidates.sort_unstable_by(|a, b| {
        a.rank
            .cmp(&b.rank)
            .then(a.icon_id.cmp(&b.icon_id))
            .then(a.slot.cmp(&b.slot))
    });
    candidates.truncate(PRETRUNCATION_FACTOR * plan.items_per_set);

    let mut icon_ids: Vec<i64> = candidates.iter().map(|c| c.icon_id).collect();
    icon_ids.sort_unstable();
    icon_ids.dedup();
    if icon_ids.len() < plan.items_per_set {
        return Err(GenerateError::Shortfall {
            set_index,
            have: icon_ids.len(),
            need: plan.items_per_set,
        });
    }
    icon_ids.truncate(plan.items_per_set);
    Ok(icon_ids)
}
