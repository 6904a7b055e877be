//! Capability traits for values stored in the registry.
//!
//! The store is generic over a record type rather than an inheritance
//! hierarchy: anything that can report and accept a unique key can live in an
//! [`EntityStore`](crate::store::EntityStore), and anything that additionally
//! exposes a group key and a metric can flow through the parallel aggregator.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::Result;

/// Minimal capability set required by the store.
///
/// Identity is immutable once assigned: the store calls [`assign_id`] exactly
/// once, on first insert, and only when [`id`] reports no identity yet. A nil
/// UUID counts as "no identity" so callers can use `Uuid::nil()` as a
/// deliberate placeholder.
///
/// `PartialEq` must be structural equality over all fields; the store's
/// compare-and-update relies on it to detect concurrent modification.
///
/// [`assign_id`]: Record::assign_id
/// [`id`]: Record::id
pub trait Record: Clone + PartialEq + Send + Sync + 'static {
    /// The record's identity, if one has been assigned.
    fn id(&self) -> Option<Uuid>;

    /// Assign the store-generated identity. Called once, before the record
    /// becomes visible to readers.
    fn assign_id(&mut self, id: Uuid);

    /// Validate required fields before the record is admitted to the store.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Human-readable label carried on change events (a customer name, a task
    /// name). Never used for identity.
    fn label(&self) -> &str;
}

/// Capability set required by grouped aggregation.
pub trait Aggregatable: Record {
    /// Grouping key; not required to be unique across records.
    fn group_key(&self) -> &str;

    /// Numeric field summed per group. Exact decimal so monetary totals do
    /// not accumulate float error.
    fn metric(&self) -> Decimal;

    /// Observation time, reduced per group as `max` (most recent sighting).
    fn observed_at(&self) -> DateTime<Utc>;
}

/// Normalize an optional identity: `None` and the nil UUID are both "absent".
pub(crate) fn effective_id<R: Record>(record: &R) -> Option<Uuid> {
    record.id().filter(|id| !id.is_nil())
}
