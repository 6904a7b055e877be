//! # Streaming Query
//!
//! A restartable, lazily-produced sequence of records over a fixed snapshot.
//!
//! The builder takes the snapshot once, at construction; concurrent store
//! mutations after that point are invisible to the stream. An optional
//! comparator is applied up front with a stable sort, so records that compare
//! equal keep their insertion order and the yielded sequence is deterministic.
//! The predicate is applied lazily, one element at a time, and the producer
//! yields control cooperatively between elements.
//!
//! Terminal states are distinct: `Ok(None)` means the snapshot is exhausted,
//! `Err(Cancelled)` means the cancellation signal was observed before the
//! next element was produced. A consumer can always tell the two apart.

use std::cmp::Ordering;

use tokio_util::sync::CancellationToken;

use crate::error::{RegistryError, Result};
use crate::record::Record;

type Predicate<R> = Box<dyn Fn(&R) -> bool + Send + Sync>;
type Comparator<R> = Box<dyn Fn(&R, &R) -> Ordering + Send + Sync>;

/// Builder for a [`QueryStream`]. Obtained from
/// [`EntityStore::query`](crate::store::EntityStore::query).
pub struct QueryBuilder<R: Record> {
    items: Vec<R>,
    predicate: Option<Predicate<R>>,
    comparator: Option<Comparator<R>>,
    cancel: CancellationToken,
}

impl<R: Record> QueryBuilder<R> {
    pub(crate) fn new(snapshot: Vec<R>) -> Self {
        Self {
            items: snapshot,
            predicate: None,
            comparator: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Keep only records matching the predicate. Applied lazily, per
    /// element, during iteration.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&R) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Box::new(predicate));
        self
    }

    /// Order ascending by the given key. Ties keep insertion order.
    pub fn order_by<K, F>(mut self, key: F) -> Self
    where
        K: Ord,
        F: Fn(&R) -> K + Send + Sync + 'static,
    {
        self.comparator = Some(Box::new(move |a, b| key(a).cmp(&key(b))));
        self
    }

    /// Order descending by the given key. Ties keep insertion order.
    pub fn order_by_desc<K, F>(mut self, key: F) -> Self
    where
        K: Ord,
        F: Fn(&R) -> K + Send + Sync + 'static,
    {
        self.comparator = Some(Box::new(move |a, b| key(b).cmp(&key(a))));
        self
    }

    /// Attach a cancellation signal. Checked immediately before each element
    /// is produced.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Finish the build. Sorting, if requested, happens here; filtering stays
    /// lazy.
    pub fn build(mut self) -> QueryStream<R> {
        if let Some(comparator) = &self.comparator {
            // Stable sort: insertion order breaks ties deterministically.
            self.items.sort_by(|a, b| comparator(a, b));
        }
        QueryStream {
            items: self.items,
            position: 0,
            predicate: self.predicate,
            cancel: self.cancel,
        }
    }
}

/// Lazily-produced ordered sequence of records over a fixed snapshot.
pub struct QueryStream<R: Record> {
    items: Vec<R>,
    position: usize,
    predicate: Option<Predicate<R>>,
    cancel: CancellationToken,
}

impl<R: Record> QueryStream<R> {
    /// Produce the next matching record.
    ///
    /// Returns `Ok(Some(record))` while matches remain, `Ok(None)` once the
    /// snapshot is exhausted, and `Err(Cancelled)` if the cancellation signal
    /// was observed first. Yields control between elements so a long query
    /// cannot monopolize a worker thread.
    pub async fn next(&mut self) -> Result<Option<R>> {
        while self.position < self.items.len() {
            if self.cancel.is_cancelled() {
                return Err(RegistryError::cancelled("streaming_query"));
            }

            let candidate = &self.items[self.position];
            self.position += 1;

            let matches = self
                .predicate
                .as_ref()
                .map_or(true, |predicate| predicate(candidate));
            if matches {
                let record = candidate.clone();
                tokio::task::yield_now().await;
                return Ok(Some(record));
            }
        }

        Ok(None)
    }

    /// Restart the stream from the beginning of the same snapshot.
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// Drain the remaining matches into a vector. `Err(Cancelled)` if the
    /// signal fires mid-drain.
    pub async fn collect(mut self) -> Result<Vec<R>> {
        let mut matches = Vec::new();
        while let Some(record) = self.next().await? {
            matches.push(record);
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[derive(Debug, Clone, PartialEq)]
    struct Sample {
        id: Option<Uuid>,
        name: String,
        rank: u32,
    }

    impl Sample {
        fn new(name: &str, rank: u32) -> Self {
            Self {
                id: Some(Uuid::new_v4()),
                name: name.to_string(),
                rank,
            }
        }
    }

    impl Record for Sample {
        fn id(&self) -> Option<Uuid> {
            self.id
        }

        fn assign_id(&mut self, id: Uuid) {
            self.id = Some(id);
        }

        fn label(&self) -> &str {
            &self.name
        }
    }

    fn samples() -> Vec<Sample> {
        vec![
            Sample::new("a", 2),
            Sample::new("b", 3),
            Sample::new("c", 2),
            Sample::new("d", 1),
        ]
    }

    #[tokio::test]
    async fn filters_lazily_and_reports_exhaustion() {
        let mut stream = QueryBuilder::new(samples())
            .filter(|s: &Sample| s.rank == 2)
            .build();

        assert_eq!(stream.next().await.unwrap().unwrap().name, "a");
        assert_eq!(stream.next().await.unwrap().unwrap().name, "c");
        assert_eq!(stream.next().await.unwrap(), None);
        // Exhaustion is sticky.
        assert_eq!(stream.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn ordering_is_deterministic_with_insertion_tie_break() {
        let stream = QueryBuilder::new(samples())
            .order_by_desc(|s: &Sample| s.rank)
            .build();

        let names: Vec<String> = stream
            .collect()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        // rank 3, then the two rank-2 records in insertion order, then rank 1.
        assert_eq!(names, vec!["b", "a", "c", "d"]);
    }

    #[tokio::test]
    async fn cancellation_is_distinct_from_exhaustion() {
        let cancel = CancellationToken::new();
        let mut stream = QueryBuilder::new(samples())
            .with_cancellation(cancel.clone())
            .build();

        assert!(stream.next().await.unwrap().is_some());
        cancel.cancel();

        let err = stream.next().await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn rewind_restarts_the_same_snapshot() {
        let mut stream = QueryBuilder::new(samples()).build();
        assert_eq!(stream.next().await.unwrap().unwrap().name, "a");
        assert_eq!(stream.next().await.unwrap().unwrap().name, "b");

        stream.rewind();
        assert_eq!(stream.next().await.unwrap().unwrap().name, "a");
    }
}
