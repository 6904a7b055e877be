#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Registry Core
//!
//! A single-process, memory-resident concurrent entity registry: a
//! thread-safe keyed store supporting concurrent mutation from many
//! producers, synchronous change notifications, cancellable lazily-produced
//! query streams, and parallel grouped top-N aggregation.
//!
//! ## Architecture
//!
//! The store is the only shared mutable resource. Everything else reads
//! point-in-time snapshots or subscribes to immutable event payloads, and no
//! component holds a lock across a suspension point.
//!
//! - [`store`] - Sharded concurrent keyed store with try-add,
//!   compare-and-swap update, and remove-if-present primitives
//! - [`events`] - Synchronous in-thread change notification
//! - [`query`] - Cancellable streaming queries over snapshots
//! - [`aggregate`] - Bounded fork-join grouped top-N aggregation
//! - [`record`] - Capability traits stored types implement
//! - [`models`] - The shipped instantiations: order ledger, project task
//!   board
//! - [`config`] - Validated component limits
//! - [`error`] - Structured error handling
//! - [`diagnostics`] / [`notifications`] - External collaborator boundaries
//!
//! ## Quick Start
//!
//! ```rust
//! use registry_core::models::{Order, OrderLedger};
//! use registry_core::Decimal;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> registry_core::Result<()> {
//! let ledger = OrderLedger::new();
//! ledger.add_order(Order::new("bob", Decimal::from(700)))?;
//! ledger.add_order(Order::new("alice", Decimal::from(100)))?;
//!
//! let top = ledger.top_customers(1, &CancellationToken::new()).await?;
//! assert_eq!(top[0].key, "bob");
//! # Ok(())
//! # }
//! ```
//!
//! ## Cancellation
//!
//! Every long-running operation (streaming query, bulk insert, aggregation)
//! takes a `CancellationToken` and checks it cooperatively at defined points.
//! Once observed, in-flight partial work is discarded and a `Cancelled`
//! outcome is surfaced — never a partial success.

pub mod aggregate;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod notifications;
pub mod query;
pub mod record;
pub mod store;

pub use aggregate::{GroupSummary, ParallelAggregator, RankedGroupStream};
pub use config::{AggregationConfig, BulkConfig, EventsConfig, RegistryConfig};
pub use error::{RegistryError, Result};
pub use events::{ChangeEvent, ChangeKind, ChangeNotifier, ChangeSubscriber, DeliveryPolicy};
pub use query::{QueryBuilder, QueryStream};
pub use record::{Aggregatable, Record};
pub use store::EntityStore;

// Re-exported so downstream code matches the exact numeric type the metric
// accessors use.
pub use rust_decimal::Decimal;
