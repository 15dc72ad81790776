//! # Universe handle
//!
//! The sampling engine reads the icon universe through a narrow capability:
//! report its cardinality and enumerate the icons of one partition. How a
//! handle answers is its own business. It can scan a hash-partitioned
//! database table, stream from a file, or serve from memory, as long as the
//! answers are stable for the duration of one generation call and its
//! bucketing agrees with [`crate::partition::partition_of`].

use crate::partition::{self, NUM_PARTITIONS};
use std::error::Error;
use thiserror::Error as ThisError;

/// Failure of the universe handle to answer a query.
///
/// Wraps the underlying cause when there is one (an I/O or database error,
/// say); the engine reports it verbatim and never retries.
#[derive(Debug, ThisError)]
#[error("universe unavailable: {context}")]
pub struct UniverseError {
    context: String,
    #[source]
    source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl UniverseError {
    pub fn new(context: impl Into<String>) -> Self {
        UniverseError {
            context: context.into(),
            source: None,
        }
    }

    pub fn with_source(
        context: impl Into<String>,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        UniverseError {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Read-only, partition-enumerable collection of icon identifiers.
///
/// Implementations must not change while a generation call is running;
/// mutating the universe mid-call breaks output determinism.
pub trait Universe {
    /// Total number of distinct icons.
    fn size(&self) -> Result<u64, UniverseError>;

    /// Enumerate every icon whose partition is `partition`.
    ///
    /// Order is unspecified (ranking is hash-based), but the same call must
    /// yield the same icons for the duration of one generation. The
    /// iterator borrows the handle and is consumed before the sampling call
    /// returns.
    fn enumerate_partition(
        &self,
        partition: usize,
    ) -> Result<Box<dyn Iterator<Item = i64> + '_>, UniverseError>;

    /// Partition of an icon identifier.
    ///
    /// Provided so every handle agrees with the engine's hash by
    /// construction; override only to delegate to a store that buckets
    /// with the identical hash.
    fn partition_of(&self, icon_id: i64) -> usize {
        partition::partition_of(icon_id)
    }
}

/// Universe held in memory, bucketed by partition at construction.
///
/// The bucketing mirrors a hash-partitioned backing table: each partition's
/// icons are materialised once, so repeated enumeration of the same
/// partition is a slice scan.
#[derive(Debug, Clone)]
pub struct InMemoryUniverse {
    buckets: Vec<Vec<i64>>,
    size: u64,
}

impl InMemoryUniverse {
    /// Build from any identifier collection. Duplicates are dropped.
    pub fn from_ids<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        let mut buckets = vec![Vec::new(); NUM_PARTITIONS];
        for id in ids {
            buckets[partition::partition_of(id)].push(id);
        }
        for bucket in &mut buckets {
            bucket.sort_unstable();
            bucket.dedup();
        }
        let size = buckets.iter().map(|b| b.len() as u64).sum();
        InMemoryUniverse { buckets, size }
    }

    /// The canonical sequential universe: identifiers `1..=count`.
    pub fn sequential(count: u64) -> Self {
        Self::from_ids(1..=count as i64)
    }

    /// Number of icons in one partition.
    pub fn partition_len(&self, partition: usize) -> usize {
        self.buckets.get(partition).map_or(0, Vec::len)
    }
}

impl Universe for InMemoryUniverse {
    fn size(&self) -> Result<u64, UniverseError> {
        Ok(self.size)
    }

    fn enumerate_partition(
        &self,
        partition: usize,
    ) -> Result<Box<dyn Iterator<Item = i64> + '_>, UniverseError> {
        let bucket = self
            .buckets
            .get(partition)
            .ok_or_else(|| UniverseError::new(format!("partition {partition} out of range")))?;
        Ok(Box::new(bucket.iter().copied()))
    }
}
