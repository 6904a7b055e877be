//! Lazy ranked delivery of top-N group summaries.
//!
//! Selection uses a bounded min-heap of size N, so only the winning groups
//! are ever held outside the merge map. Delivery pops the max-heap one group
//! per call, checking the cancellation signal before each pop — the same
//! exhausted-vs-cancelled contract as the streaming query.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use tokio_util::sync::CancellationToken;

use crate::aggregate::parallel::GroupSummary;
use crate::error::{RegistryError, Result};

/// Heap wrapper ordering summaries by rank: greater = better rank
/// (larger total, then lexicographically smaller key).
struct Ranked(GroupSummary);

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .total
            .cmp(&other.0.total)
            .then_with(|| other.0.key.cmp(&self.0.key))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

/// Cancellable stream of the top-N groups, in ranked order.
pub struct RankedGroupStream {
    heap: BinaryHeap<Ranked>,
    cancel: CancellationToken,
}

impl RankedGroupStream {
    pub(crate) fn empty(cancel: CancellationToken) -> Self {
        Self {
            heap: BinaryHeap::new(),
            cancel,
        }
    }

    /// Select the `top_n` best-ranked summaries from `groups` with a bounded
    /// min-heap, keeping at most `top_n + 1` entries alive at once.
    pub(crate) fn select(
        groups: impl Iterator<Item = GroupSummary>,
        top_n: usize,
        cancel: CancellationToken,
    ) -> Self {
        let mut keep: BinaryHeap<Reverse<Ranked>> = BinaryHeap::with_capacity(top_n + 1);
        for summary in groups {
            keep.push(Reverse(Ranked(summary)));
            if keep.len() > top_n {
                // Evict the worst-ranked candidate.
                keep.pop();
            }
        }

        let heap: BinaryHeap<Ranked> = keep.into_iter().map(|Reverse(ranked)| ranked).collect();
        Self { heap, cancel }
    }

    /// Number of groups not yet yielded.
    pub fn remaining(&self) -> usize {
        self.heap.len()
    }

    /// Yield the next group in ranked order. `Ok(None)` when exhausted,
    /// `Err(Cancelled)` when the signal is observed first.
    pub async fn next(&mut self) -> Result<Option<GroupSummary>> {
        if self.cancel.is_cancelled() {
            return Err(RegistryError::cancelled("ranked_group_stream"));
        }
        match self.heap.pop() {
            Some(Ranked(summary)) => {
                tokio::task::yield_now().await;
                Ok(Some(summary))
            }
            None => Ok(None),
        }
    }

    /// Drain the remaining groups in ranked order.
    pub async fn collect(mut self) -> Result<Vec<GroupSummary>> {
        let mut groups = Vec::with_capacity(self.heap.len());
        while let Some(summary) = self.next().await? {
            groups.push(summary);
        }
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;

    fn summary(key: &str, total: i64) -> GroupSummary {
        GroupSummary {
            key: key.to_string(),
            total: Decimal::from(total),
            count: 1,
            last_seen: DateTime::<Utc>::MIN_UTC,
        }
    }

    #[tokio::test]
    async fn yields_in_ranked_order_with_key_tie_break() {
        let groups = vec![
            summary("carol", 100),
            summary("bob", 700),
            summary("alice", 100),
        ];
        let stream =
            RankedGroupStream::select(groups.into_iter(), 3, CancellationToken::new());

        let keys: Vec<String> = stream
            .collect()
            .await
            .unwrap()
            .into_iter()
            .map(|g| g.key)
            .collect();
        assert_eq!(keys, vec!["bob", "alice", "carol"]);
    }

    #[tokio::test]
    async fn bounded_selection_keeps_only_winners() {
        let groups = (0..100).map(|i| summary(&format!("g{i:03}"), i));
        let stream = RankedGroupStream::select(groups, 2, CancellationToken::new());
        assert_eq!(stream.remaining(), 2);

        let totals: Vec<Decimal> = stream
            .collect()
            .await
            .unwrap()
            .into_iter()
            .map(|g| g.total)
            .collect();
        assert_eq!(totals, vec![Decimal::from(99), Decimal::from(98)]);
    }

    #[tokio::test]
    async fn cancellation_preempts_delivery() {
        let cancel = CancellationToken::new();
        let mut stream = RankedGroupStream::select(
            vec![summary("bob", 700), summary("alice", 100)].into_iter(),
            2,
            cancel.clone(),
        );

        assert_eq!(stream.next().await.unwrap().unwrap().key, "bob");
        cancel.cancel();
        assert!(stream.next().await.unwrap_err().is_cancelled());
    }
}
