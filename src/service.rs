//! # Service layer
//!
//! The embeddable front of the generator: request/response envelopes,
//! envelope validation, execution timing and the aggregate statistics a
//! caller reports back to its users. A transport (HTTP handler, queue
//! worker, CLI) deserialises a [`GenerationRequest`], hands it here with a
//! universe handle, and serialises the [`GenerationResponse`] or the error.

use crate::jaccard::{sampled_stats, JaccardStats};
use crate::sampler::{generate_with_cancel, CancelToken, GenerateError, GeneratedSet};
use crate::universe::Universe;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// Execution time above which a completed generation is logged as an SLA
/// breach.
pub const SLA_THRESHOLD_MS: u64 = 3_000;

/// Largest `num_sets` the envelope accepts.
pub const MAX_NUM_SETS: usize = 10_000;

/// Largest `items_per_set` the envelope accepts.
pub const MAX_ITEMS_PER_SET: usize = 100;

/// Most pairs the response statistics will inspect before switching to the
/// deterministic sample.
const STATS_PAIR_BUDGET: usize = 20_000;

fn default_num_sets() -> usize {
    100
}

fn default_items_per_set() -> usize {
    20
}

fn default_overlap_threshold() -> f64 {
    0.10
}

/// A generation request as received from the outside.
///
/// The wire uses camelCase field names; the statistics block keeps the
/// snake_case keys of the original statistics map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    #[serde(default = "default_num_sets")]
    pub num_sets: usize,
    #[serde(default = "default_items_per_set")]
    pub items_per_set: usize,
    #[serde(default = "default_overlap_threshold")]
    pub overlap_threshold: f64,
    /// Caller-assigned id; a fresh v4 is assigned when absent.
    #[serde(default)]
    pub request_id: Option<Uuid>,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        GenerationRequest {
            num_sets: default_num_sets(),
            items_per_set: default_items_per_set(),
            overlap_threshold: default_overlap_threshold(),
            request_id: None,
        }
    }
}

/// Aggregate statistics over the generated batch.
///
/// The Jaccard figures come from [`sampled_stats`]: exact under the pair
/// budget, a fixed-seed sample above it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationStatistics {
    /// Distinct icons used across all sets.
    pub total_icons_used: usize,
    pub avg_set_size: f64,
    pub max_jaccard: f64,
    pub avg_jaccard: f64,
    pub pairs_inspected: usize,
}

/// The response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    pub request_id: Uuid,
    pub total_sets: usize,
    pub items_per_set: usize,
    pub execution_time_ms: u64,
    pub sets: Vec<GeneratedSet>,
    pub statistics: GenerationStatistics,
}

/// Service-level failures.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The envelope was out of range; the core was never consulted.
    #[error("invalid request: {0}")]
    Validation(String),
    /// The core rejected or failed the request.
    #[error(transparent)]
    Generate(#[from] GenerateError),
}

/// Run a generation request against a universe.
pub fn execute<U: Universe + ?Sized>(
    request: &GenerationRequest,
    universe: &U,
) -> Result<GenerationResponse, ServiceError> {
    execute_with_cancel(request, universe, &CancelToken::new())
}

/// [`execute`] with a caller-supplied cancellation token.
pub fn execute_with_cancel<U: Universe + ?Sized>(
    request: &GenerationRequest,
    universe: &U,
    cancel: &CancelToken,
) -> Result<GenerationResponse, ServiceError> {
    validate_envelope(request)?;
    let request_id = request.request_id.unwrap_or_else(Uuid::new_v4);
    let start = Instant::now();
    info!(
        %request_id,
        num_sets = request.num_sets,
        items_per_set = request.items_per_set,
        overlap_threshold = request.overlap_threshold,
        "starting generation"
    );

    let sets = generate_with_cancel(
        request.num_sets,
        request.items_per_set,
        request.overlap_threshold,
        universe,
        cancel,
    )?;

    let statistics = batch_statistics(&sets);
    let execution_time_ms = start.elapsed().as_millis() as u64;
    if execution_time_ms > SLA_THRESHOLD_MS {
        warn!(
            %request_id,
            execution_time_ms,
            sla_ms = SLA_THRESHOLD_MS,
            "generation exceeded SLA"
        );
    }
    info!(
        %request_id,
        total_sets = sets.len(),
        execution_time_ms,
        max_jaccard = statistics.max_jaccard,
        "generation completed"
    );

    Ok(GenerationResponse {
        request_id,
        total_sets: sets.len(),
        items_per_set: request.items_per_set,
        execution_time_ms,
        sets,
        statistics,
    })
}

fn validate_envelope(request: &GenerationRequest) -> Result<(), ServiceError> {
    if !(1..=MAX_NUM_SETS).contains(&request.num_sets) {
        return Err(ServiceError::Validation(format!(
            "num_sets must lie in 1..={MAX_NUM_SETS}, got {}",
            request.num_sets
        )));
    }
    if !(1..=MAX_ITEMS_PER_SET).contains(&request.items_per_set) {
        return Err(ServiceError::Validation(format!(
            "items_per_set must lie in 1..={MAX_ITEMS_PER_SET}, got {}",
            request.items_per_set
        )));
    }
    if !(0.0..=1.0).contains(&request.overlap_threshold) {
        return Err(ServiceError::Validation(format!(
            "overlap_threshold must lie in [0, 1], got {}",
            request.overlap_threshold
        )));
    }
    Ok(())
}

fn batch_statistics(sets: &[GeneratedSet]) -> GenerationStatistics {
    let distinct: HashSet<i64> = sets.iter().flat_map(|s| s.icon_ids.iter().copied()).collect();
    let total_items: usize = sets.iter().map(|s| s.icon_ids.len()).sum();
    let JaccardStats {
        max_jaccard,
        avg_jaccard,
        pairs_inspected,
    } = sampled_stats(sets, STATS_PAIR_BUDGET);

    GenerationStatistics {
        total_icons_used: distinct.len(),
        avg_set_size: if sets.is_empty() {
            0.0
        } else {
            total_items as f64 / sets.len() as f64
        },
        max_jaccard,
        avg_jaccard,
        pairs_inspected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::InMemoryUniverse;

    #[test]
    fn request_defaults_match_the_contract() {
        let req: GenerationRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.num_sets, 100);
        assert_eq!(req.items_per_set, 20);
        assert_eq!(req.overlap_threshold, 0.10);
        assert!(req.request_id.is_none());
    }

    #[test]
    fn request_parses_wire_field_names() {
        let req: GenerationRequest = serde_json::from_str(
            r#"{"numSets": 7, "itemsPerSet": 12, "overlapThreshold": 0.2}"#,
        )
        .unwrap();
        assert_eq!(req.num_sets, 7);
        assert_eq!(req.items_per_set, 12);
        assert_eq!(req.overlap_threshold, 0.2);
    }

    #[test]
    fn envelope_bounds_are_enforced() {
        let universe = InMemoryUniverse::sequential(1_000);
        for (n, m, t) in [
            (0usize, 20usize, 0.1f64),
            (10_001, 20, 0.1),
            (10, 0, 0.1),
            (10, 101, 0.1),
            (10, 20, -0.01),
            (10, 20, 1.01),
        ] {
            let req = GenerationRequest {
                num_sets: n,
                items_per_set: m,
                overlap_threshold: t,
                request_id: None,
            };
            assert!(
                matches!(execute(&req, &universe), Err(ServiceError::Validation(_))),
                "({n}, {m}, {t}) should fail validation"
            );
        }
    }

    #[test]
    fn minimal_request_passes_the_envelope() {
        let universe = InMemoryUniverse::sequential(10_000);
        let req = GenerationRequest {
            num_sets: 1,
            items_per_set: 1,
            overlap_threshold: 0.0,
            request_id: None,
        };
        let response = execute(&req, &universe).unwrap();
        assert_eq!(response.total_sets, 1);
        assert_eq!(response.sets[0].icon_ids.len(), 1);
    }

    #[test]
    fn response_echoes_request_fields() {
        let universe = InMemoryUniverse::sequential(100_000);
        let id = Uuid::new_v4();
        let req = GenerationRequest {
            num_sets: 5,
            items_per_set: 10,
            overlap_threshold: 0.10,
            request_id: Some(id),
        };
        let response = execute(&req, &universe).unwrap();
        assert_eq!(response.request_id, id);
        assert_eq!(response.total_sets, 5);
        assert_eq!(response.items_per_set, 10);
        assert_eq!(response.sets.len(), 5);
        assert_eq!(response.statistics.avg_set_size, 10.0);
        assert_eq!(response.statistics.pairs_inspected, 10);
        assert!(response.statistics.max_jaccard <= 0.10);
        assert!(response.statistics.total_icons_used <= 50);
        assert!(response.statistics.total_icons_used >= 10);
    }

    #[test]
    fn infeasible_requests_keep_their_verdict() {
        let universe = InMemoryUniverse::sequential(100_000);
        let req = GenerationRequest {
            num_sets: 1_000,
            items_per_set: 100,
            overlap_threshold: 0.01,
            request_id: None,
        };
        match execute(&req, &universe) {
            Err(ServiceError::Generate(GenerateError::Infeasible(verdict))) => {
                assert!(verdict.required_pool > verdict.total_icons);
                assert!(!verdict.feasible);
            }
            other => panic!("expected infeasible, got {other:?}"),
        }
    }

    #[test]
    fn response_serialises_with_envelope_field_names() {
        let universe = InMemoryUniverse::sequential(100_000);
        let response = execute(&GenerationRequest::default(), &universe).unwrap();
        let json = serde_json::to_value(&response).unwrap();
        for field in [
            "requestId",
            "totalSets",
            "itemsPerSet",
            "executionTimeMs",
            "sets",
            "statistics",
        ] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
        assert_eq!(json["sets"].as_array().unwrap().len(), 100);
        assert!(json["sets"][0].get("setIndex").is_some());
        assert!(json["sets"][0].get("iconIds").is_some());
        assert!(json["statistics"].get("total_icons_used").is_some());
    }
}
