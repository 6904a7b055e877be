//! # Parallel Aggregator
//!
//! Grouped, ordered, top-N summaries over the full store, computed with an
//! explicit fork-join instead of a global lock.
//!
//! ## Algorithm
//!
//! 1. Take a weakly-consistent snapshot of the store.
//! 2. Partition it into contiguous chunks across a bounded worker count
//!    (default: the host's available parallelism — never unbounded fan-out).
//! 3. Each worker reduces its partition into per-group partials (metric sum,
//!    record count, most recent timestamp), polling the cancellation token at
//!    a configured record interval.
//! 4. Partials are merged by key into one grouped result.
//! 5. Groups are ordered by total descending, group key ascending on ties, so
//!    the ranking is deterministic.
//! 6. The top N groups are returned; N larger than the group count returns
//!    every group.
//!
//! Cancellation mid-computation discards all partial work and surfaces
//! `Cancelled` — a truncated merge is never mistaken for a complete answer.
//! The reduction itself runs on the blocking pool so the calling task is only
//! parked, not busy.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::aggregate::ranked::RankedGroupStream;
use crate::config::AggregationConfig;
use crate::error::{RegistryError, Result};
use crate::record::Aggregatable;
use crate::store::EntityStore;

/// Per-group reduction: metric total, record count, most recent observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub key: String,
    pub total: Decimal,
    pub count: u64,
    pub last_seen: DateTime<Utc>,
}

impl GroupSummary {
    fn empty(key: &str) -> Self {
        Self {
            key: key.to_string(),
            total: Decimal::ZERO,
            count: 0,
            last_seen: DateTime::<Utc>::MIN_UTC,
        }
    }

    fn absorb<R: Aggregatable>(&mut self, record: &R) {
        self.total += record.metric();
        self.count += 1;
        self.last_seen = self.last_seen.max(record.observed_at());
    }
}

/// Contractual ranking: total descending, group key ascending on ties.
pub(crate) fn rank_ordering(a: &GroupSummary, b: &GroupSummary) -> Ordering {
    b.total.cmp(&a.total).then_with(|| a.key.cmp(&b.key))
}

/// Bounded fork-join aggregator. Cheap to construct; holds only its limits.
#[derive(Debug, Clone)]
pub struct ParallelAggregator {
    config: AggregationConfig,
}

impl ParallelAggregator {
    /// Aggregator with default limits (worker width = available parallelism).
    pub fn new() -> Self {
        Self {
            config: AggregationConfig::default(),
        }
    }

    pub fn with_config(config: AggregationConfig) -> Result<Self> {
        if config.max_parallelism == 0 {
            return Err(RegistryError::invalid_argument(
                "max_parallelism",
                "must be at least 1",
            ));
        }
        if config.cancellation_check_interval == 0 {
            return Err(RegistryError::invalid_argument(
                "cancellation_check_interval",
                "must be at least 1",
            ));
        }
        Ok(Self { config })
    }

    /// The top `top_n` groups by metric total, fully ordered.
    ///
    /// `top_n == 0` is `InvalidArgument`; an empty store yields an empty
    /// result, not an error.
    pub async fn top_groups<R: Aggregatable>(
        &self,
        store: &EntityStore<R>,
        top_n: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<GroupSummary>> {
        if top_n == 0 {
            return Err(RegistryError::invalid_argument(
                "top_n",
                "must be greater than 0",
            ));
        }

        let snapshot = store.snapshot();
        if snapshot.is_empty() {
            return Ok(Vec::new());
        }

        let merged = self.reduce_groups(snapshot, cancel).await?;
        let mut groups: Vec<GroupSummary> = merged.into_values().collect();
        groups.sort_by(rank_ordering);
        groups.truncate(top_n);
        Ok(groups)
    }

    /// Streaming variant: the top `top_n` groups yielded lazily in ranked
    /// order.
    ///
    /// Group totals are still computed up front (the merge cannot be
    /// avoided), but the ranked list is never materialized: a bounded
    /// min-heap of size `top_n` selects the winners, so groups outside the
    /// result allocate nothing beyond their merge entry.
    pub async fn top_groups_stream<R: Aggregatable>(
        &self,
        store: &EntityStore<R>,
        top_n: usize,
        cancel: &CancellationToken,
    ) -> Result<RankedGroupStream> {
        if top_n == 0 {
            return Err(RegistryError::invalid_argument(
                "top_n",
                "must be greater than 0",
            ));
        }

        let snapshot = store.snapshot();
        if snapshot.is_empty() {
            return Ok(RankedGroupStream::empty(cancel.clone()));
        }

        let merged = self.reduce_groups(snapshot, cancel).await?;
        Ok(RankedGroupStream::select(merged.into_values(), top_n, cancel.clone()))
    }

    /// The single highest-ranked group, or `NotFound` when the store is
    /// empty.
    pub async fn leading_group<R: Aggregatable>(
        &self,
        store: &EntityStore<R>,
        cancel: &CancellationToken,
    ) -> Result<GroupSummary> {
        self.top_groups(store, 1, cancel)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RegistryError::NotFound {
                entity: "group".to_string(),
                id: "leading".to_string(),
            })
    }

    /// Fork-join reduction of a snapshot into per-group partials, merged by
    /// key. `Err(Cancelled)` discards everything computed so far.
    async fn reduce_groups<R: Aggregatable>(
        &self,
        snapshot: Vec<R>,
        cancel: &CancellationToken,
    ) -> Result<HashMap<String, GroupSummary>> {
        let workers = self.config.max_parallelism.max(1).min(snapshot.len());
        let check_interval = self.config.cancellation_check_interval.max(1);
        let cancel = cancel.clone();

        debug!(
            records = snapshot.len(),
            workers, "starting parallel group reduction"
        );

        let merged = tokio::task::spawn_blocking(move || {
            let chunk_size = snapshot.len().div_ceil(workers);

            let partials: Vec<Option<HashMap<String, GroupSummary>>> =
                crossbeam::thread::scope(|scope| {
                    let cancel = &cancel;
                    let handles: Vec<_> = snapshot
                        .chunks(chunk_size)
                        .map(|chunk| {
                            scope.spawn(move |_| reduce_partition(chunk, cancel, check_interval))
                        })
                        .collect();
                    handles
                        .into_iter()
                        .map(|handle| handle.join().expect("aggregation worker panicked"))
                        .collect()
                })
                .expect("aggregation scope panicked");

            let mut merged: HashMap<String, GroupSummary> = HashMap::new();
            for partial in partials {
                match partial {
                    Some(partial) => merge_partials(&mut merged, partial),
                    // A worker observed cancellation; the whole result is void.
                    None => return None,
                }
            }
            Some(merged)
        })
        .await
        .expect("aggregation task panicked");

        merged.ok_or_else(|| RegistryError::cancelled("top_groups"))
    }
}

impl Default for ParallelAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Reduce one contiguous partition, polling the cancellation token every
/// `check_interval` records. `None` means cancellation was observed.
fn reduce_partition<R: Aggregatable>(
    chunk: &[R],
    cancel: &CancellationToken,
    check_interval: usize,
) -> Option<HashMap<String, GroupSummary>> {
    let mut groups: HashMap<String, GroupSummary> = HashMap::new();

    for (index, record) in chunk.iter().enumerate() {
        if index % check_interval == 0 && cancel.is_cancelled() {
            return None;
        }
        groups
            .entry(record.group_key().to_string())
            .or_insert_with(|| GroupSummary::empty(record.group_key()))
            .absorb(record);
    }

    Some(groups)
}

/// Merge one partition's partials into the accumulated result, reducing by
/// key.
fn merge_partials(into: &mut HashMap<String, GroupSummary>, from: HashMap<String, GroupSummary>) {
    for (key, partial) in from {
        match into.entry(key) {
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                let summary = entry.get_mut();
                summary.total += partial.total;
                summary.count += partial.count;
                summary.last_seen = summary.last_seen.max(partial.last_seen);
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(partial);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn summary(key: &str, total: i64, count: u64) -> GroupSummary {
        GroupSummary {
            key: key.to_string(),
            total: Decimal::from(total),
            count,
            last_seen: DateTime::<Utc>::MIN_UTC,
        }
    }

    #[test]
    fn ranking_is_total_desc_then_key_asc() {
        let mut groups = vec![
            summary("carol", 100, 1),
            summary("alice", 100, 1),
            summary("bob", 700, 2),
        ];
        groups.sort_by(rank_ordering);
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["bob", "alice", "carol"]);
    }

    #[test]
    fn merge_reduces_by_key() {
        let mut merged = HashMap::new();
        merged.insert("bob".to_string(), summary("bob", 400, 1));

        let mut partial = HashMap::new();
        partial.insert("bob".to_string(), summary("bob", 300, 1));
        partial.insert("alice".to_string(), summary("alice", 100, 1));

        merge_partials(&mut merged, partial);

        assert_eq!(merged["bob"].total, Decimal::from(700));
        assert_eq!(merged["bob"].count, 2);
        assert_eq!(merged["alice"].total, Decimal::from(100));
    }

    proptest! {
        /// Per-group totals must not depend on how the input was partitioned.
        #[test]
        fn merge_is_partition_invariant(
            amounts in prop::collection::vec((0u8..4, -1000i64..1000), 0..64),
            split in 0usize..64,
        ) {
            let keys = ["a", "b", "c", "d"];
            let entries: Vec<(String, i64)> = amounts
                .iter()
                .map(|(k, v)| (keys[*k as usize].to_string(), *v))
                .collect();

            let reduce = |slice: &[(String, i64)]| {
                let mut groups: HashMap<String, GroupSummary> = HashMap::new();
                for (key, value) in slice {
                    match groups.entry(key.clone()) {
                        std::collections::hash_map::Entry::Occupied(mut e) => {
                            e.get_mut().total += Decimal::from(*value);
                            e.get_mut().count += 1;
                        }
                        std::collections::hash_map::Entry::Vacant(slot) => {
                            let mut s = GroupSummary::empty(key);
                            s.total = Decimal::from(*value);
                            s.count = 1;
                            slot.insert(s);
                        }
                    }
                }
                groups
            };

            let whole = reduce(&entries);

            let pivot = split.min(entries.len());
            let mut merged = reduce(&entries[..pivot]);
            merge_partials(&mut merged, reduce(&entries[pivot..]));

            prop_assert_eq!(merged.len(), whole.len());
            for (key, summary) in &whole {
                prop_assert_eq!(merged[key].total, summary.total);
                prop_assert_eq!(merged[key].count, summary.count);
            }
        }
    }
}
