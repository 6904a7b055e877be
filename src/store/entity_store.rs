//! # Entity Store
//!
//! The single source of truth for record existence and content, safe under
//! arbitrary concurrent access.
//!
//! ## Overview
//!
//! Records live in a sharded concurrent map ([`dashmap::DashMap`]), so
//! mutations on independent keys proceed without contention. The three atomic
//! primitives are exposed directly: insert-if-absent ([`EntityStore::insert`],
//! try-add semantics), compare-and-swap update
//! ([`EntityStore::compare_and_update`]), and remove-if-present
//! ([`EntityStore::remove`]). Every successful mutation emits a
//! [`ChangeEvent`] through the store's [`ChangeNotifier`], strictly after the
//! mutation is visible and with no shard lock held.
//!
//! ## Snapshots
//!
//! [`EntityStore::snapshot`] is weakly consistent: it never blocks writers and
//! may observe any subset of concurrent updates, but each record is cloned
//! under its shard lock so a torn read is impossible. Records carry a
//! monotonic insertion sequence, and snapshots are returned in that order so
//! downstream queries and aggregations are deterministic.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};
use crate::events::{ChangeEvent, ChangeKind, ChangeNotifier};
use crate::query::QueryBuilder;
use crate::record::{effective_id, Record};

struct StoredEntry<R> {
    /// Monotonic insertion sequence; gives snapshots their deterministic
    /// order and breaks ordering ties downstream.
    seq: u64,
    record: R,
}

/// Concurrency-safe keyed container of records.
pub struct EntityStore<R: Record> {
    entries: DashMap<Uuid, StoredEntry<R>>,
    seq: AtomicU64,
    notifier: ChangeNotifier,
    config: RegistryConfig,
}

impl<R: Record> EntityStore<R> {
    /// Create a store with default configuration.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            seq: AtomicU64::new(0),
            notifier: ChangeNotifier::new(),
            config: RegistryConfig::default(),
        }
    }

    /// Create a store with custom configuration.
    pub fn with_config(config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            entries: DashMap::new(),
            seq: AtomicU64::new(0),
            notifier: ChangeNotifier::with_policy(config.events.delivery),
            config,
        })
    }

    /// The store's change notifier, for subscribing to mutation events.
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Insert a record, assigning an identity if it has none.
    ///
    /// Try-add semantics: if the identity is already present the store is
    /// left untouched and the existing identity is returned — a duplicate is
    /// a no-op, not an error. On a fresh insert an `Added` event is emitted;
    /// a failing subscriber surfaces here, after the record is stored.
    pub fn insert(&self, mut record: R) -> Result<Uuid> {
        record.validate()?;

        let id = effective_id(&record).unwrap_or_else(Uuid::new_v4);
        record.assign_id(id);
        let label = record.label().to_string();

        let inserted = match self.entries.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                let seq = self.seq.fetch_add(1, Ordering::Relaxed);
                slot.insert(StoredEntry { seq, record });
                true
            }
        };

        if inserted {
            debug!(record_id = %id, label = %label, "record inserted");
            self.notifier
                .notify(&ChangeEvent::new(ChangeKind::Added, id, label))?;
        }

        Ok(id)
    }

    /// Atomically replace the record under `id`, but only if the stored value
    /// still equals `expected` (structural equality of all fields).
    ///
    /// This is the sole update path: a caller holding a stale read can never
    /// silently clobber a concurrent writer. Returns `Ok(false)` on mismatch
    /// or missing key — the caller decides whether to retry with a fresh
    /// read. Emits an `Updated` event on success.
    pub fn compare_and_update(&self, id: Uuid, expected: &R, mut updated: R) -> Result<bool> {
        if id.is_nil() {
            return Err(RegistryError::invalid_argument("id", "must not be nil"));
        }
        updated.validate()?;

        // Identity is immutable: the replacement must address the same key.
        match effective_id(&updated) {
            Some(existing) if existing != id => {
                return Err(RegistryError::invalid_argument(
                    "updated.id",
                    "must match the id being updated",
                ));
            }
            Some(_) => {}
            None => updated.assign_id(id),
        }

        let label = updated.label().to_string();
        let swapped = match self.entries.get_mut(&id) {
            Some(mut entry) if entry.record == *expected => {
                entry.record = updated;
                true
            }
            _ => false,
        };

        if swapped {
            debug!(record_id = %id, "record updated");
            self.notifier
                .notify(&ChangeEvent::new(ChangeKind::Updated, id, label))?;
        }

        Ok(swapped)
    }

    /// Atomically remove the record under `id`. Returns whether an entry
    /// existed; removing a missing key is an idempotent no-op. Emits a
    /// `Deleted` event carrying the removed record's label on success.
    pub fn remove(&self, id: Uuid) -> Result<bool> {
        match self.entries.remove(&id) {
            Some((_, entry)) => {
                debug!(record_id = %id, "record removed");
                self.notifier.notify(&ChangeEvent::new(
                    ChangeKind::Deleted,
                    id,
                    entry.record.label(),
                ))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Clone of the record under `id`, if present.
    pub fn get(&self, id: Uuid) -> Option<R> {
        self.entries.get(&id).map(|entry| entry.record.clone())
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Point-in-time view of all records, in insertion order.
    ///
    /// Weakly consistent: concurrent writers are never blocked, and updates
    /// racing with the snapshot may or may not appear, but every record that
    /// does appear is a whole value.
    pub fn snapshot(&self) -> Vec<R> {
        let mut entries: Vec<(u64, R)> = self
            .entries
            .iter()
            .map(|entry| (entry.seq, entry.record.clone()))
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, record)| record).collect()
    }

    /// Start building a cancellable streaming query over the current
    /// snapshot.
    pub fn query(&self) -> QueryBuilder<R> {
        QueryBuilder::new(self.snapshot())
    }

    /// Insert a batch, each record independently and with bounded
    /// concurrency.
    ///
    /// A validation failure on one record does not abort the batch; the
    /// returned vector reports one outcome per input record, in input order.
    /// The task yields cooperatively between records. Cancellation aborts the
    /// remaining work and surfaces `Cancelled`; records already inserted stay
    /// inserted (the store has no transactions).
    pub async fn insert_many(
        &self,
        records: Vec<R>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Result<Uuid>>> {
        let concurrency = self.config.bulk.concurrency.max(1);
        let mut pending = futures::stream::iter(records.into_iter().map(|record| async move {
            tokio::task::yield_now().await;
            self.insert(record)
        }))
        .buffered(concurrency);

        let mut results = Vec::new();
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Err(RegistryError::cancelled("insert_many"));
                }
                next = pending.next() => match next {
                    Some(outcome) => results.push(outcome),
                    None => break,
                },
            }
        }

        Ok(results)
    }
}

impl<R: Record> Default for EntityStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> std::fmt::Debug for EntityStore<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("len", &self.len())
            .field("notifier", &self.notifier)
            .finish()
    }
}
