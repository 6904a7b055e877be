//! # Order Ledger
//!
//! The registry instantiated for customer orders: an [`EntityStore`] of
//! [`Order`] records plus the derived read operations a storefront needs —
//! status and customer filters, recency windows, exact revenue, a streaming
//! per-customer query, and parallel top-N customers by total spend.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::aggregate::{GroupSummary, ParallelAggregator, RankedGroupStream};
use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};
use crate::query::QueryStream;
use crate::record::{Aggregatable, Record};
use crate::store::EntityStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Shipped,
    Delivered,
    Cancelled,
}

/// A customer order. Identity is assigned by the store on first insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Option<Uuid>,
    pub customer_name: String,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub placed_at: DateTime<Utc>,
}

impl Order {
    /// A pending order placed now.
    pub fn new(customer_name: impl Into<String>, total_amount: Decimal) -> Self {
        Self {
            id: None,
            customer_name: customer_name.into(),
            total_amount,
            status: OrderStatus::Pending,
            placed_at: Utc::now(),
        }
    }
}

impl Record for Order {
    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn assign_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }

    fn validate(&self) -> Result<()> {
        if self.customer_name.trim().is_empty() {
            return Err(RegistryError::invalid_argument(
                "customer_name",
                "must not be blank",
            ));
        }
        Ok(())
    }

    fn label(&self) -> &str {
        &self.customer_name
    }
}

impl Aggregatable for Order {
    fn group_key(&self) -> &str {
        &self.customer_name
    }

    fn metric(&self) -> Decimal {
        self.total_amount
    }

    fn observed_at(&self) -> DateTime<Utc> {
        self.placed_at
    }
}

/// Order store plus derived reads. Cheap to share behind an `Arc`; every
/// method takes `&self`.
pub struct OrderLedger {
    store: EntityStore<Order>,
    aggregator: ParallelAggregator,
}

impl OrderLedger {
    pub fn new() -> Self {
        Self {
            store: EntityStore::new(),
            aggregator: ParallelAggregator::new(),
        }
    }

    pub fn with_config(config: RegistryConfig) -> Result<Self> {
        let aggregator = ParallelAggregator::with_config(config.aggregation.clone())?;
        Ok(Self {
            store: EntityStore::with_config(config)?,
            aggregator,
        })
    }

    /// The underlying store, for change subscriptions and raw access.
    pub fn store(&self) -> &EntityStore<Order> {
        &self.store
    }

    pub fn add_order(&self, order: Order) -> Result<Uuid> {
        self.store.insert(order)
    }

    /// Bulk insert with per-order outcomes; see
    /// [`EntityStore::insert_many`].
    pub async fn add_orders(
        &self,
        orders: Vec<Order>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Result<Uuid>>> {
        self.store.insert_many(orders, cancel).await
    }

    /// Replace an order via compare-and-swap. `expected` must be a fresh
    /// read; if another writer got there first this returns `Conflict` and
    /// the caller re-reads and retries.
    pub fn update_order(&self, expected: &Order, updated: Order) -> Result<()> {
        let id = expected
            .id
            .filter(|id| !id.is_nil())
            .ok_or_else(|| RegistryError::invalid_argument("expected.id", "must be set"))?;

        if self.store.compare_and_update(id, expected, updated)? {
            return Ok(());
        }
        if self.store.contains(id) {
            Err(RegistryError::Conflict { id })
        } else {
            Err(RegistryError::NotFound {
                entity: "order".to_string(),
                id: id.to_string(),
            })
        }
    }

    pub fn remove_order(&self, id: Uuid) -> Result<bool> {
        self.store.remove(id)
    }

    pub fn order_count(&self) -> usize {
        self.store.len()
    }

    pub fn orders_by_status(&self, status: OrderStatus) -> Vec<Order> {
        self.store
            .snapshot()
            .into_iter()
            .filter(|order| order.status == status)
            .collect()
    }

    /// Exact sum of every order's total. Decimal arithmetic, no float error.
    pub fn total_revenue(&self) -> Decimal {
        self.store
            .snapshot()
            .iter()
            .map(|order| order.total_amount)
            .sum()
    }

    /// All orders for a customer, matched case-insensitively.
    pub fn orders_by_customer(&self, customer_name: &str) -> Result<Vec<Order>> {
        let wanted = validated_customer(customer_name)?;
        Ok(self
            .store
            .snapshot()
            .into_iter()
            .filter(|order| order.customer_name.eq_ignore_ascii_case(&wanted))
            .collect())
    }

    /// Lazily-produced stream of one customer's orders, in insertion order.
    pub fn stream_customer_orders(
        &self,
        customer_name: &str,
        cancel: CancellationToken,
    ) -> Result<QueryStream<Order>> {
        let wanted = validated_customer(customer_name)?;
        Ok(self
            .store
            .query()
            .filter(move |order: &Order| order.customer_name.eq_ignore_ascii_case(&wanted))
            .with_cancellation(cancel)
            .build())
    }

    /// Orders placed within the last `days` days. Zero days means "today
    /// onward"; a negative count is a caller bug.
    pub fn recent_orders(&self, days: i64) -> Result<Vec<Order>> {
        if days < 0 {
            return Err(RegistryError::invalid_argument(
                "days",
                "must be greater than or equal to 0",
            ));
        }
        let cutoff = Utc::now() - Duration::days(days);
        Ok(self
            .store
            .snapshot()
            .into_iter()
            .filter(|order| order.placed_at >= cutoff)
            .collect())
    }

    /// Top `top_n` customers by total spend, computed in parallel. Fully
    /// ordered: spend descending, customer name ascending on ties.
    pub async fn top_customers(
        &self,
        top_n: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<GroupSummary>> {
        self.aggregator.top_groups(&self.store, top_n, cancel).await
    }

    /// Streaming variant of [`top_customers`](Self::top_customers) for very
    /// large customer counts.
    pub async fn top_customers_stream(
        &self,
        top_n: usize,
        cancel: &CancellationToken,
    ) -> Result<RankedGroupStream> {
        self.aggregator
            .top_groups_stream(&self.store, top_n, cancel)
            .await
    }

    /// The single best customer: total spend, order count, and last order
    /// time. `NotFound` on an empty ledger.
    pub async fn customer_summary(&self, cancel: &CancellationToken) -> Result<GroupSummary> {
        self.aggregator
            .leading_group(&self.store, cancel)
            .await
            .map_err(|err| match err {
                RegistryError::NotFound { .. } => RegistryError::NotFound {
                    entity: "customer".to_string(),
                    id: "leading".to_string(),
                },
                other => other,
            })
    }
}

impl Default for OrderLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn validated_customer(customer_name: &str) -> Result<String> {
    let trimmed = customer_name.trim();
    if trimmed.is_empty() {
        return Err(RegistryError::invalid_argument(
            "customer_name",
            "must not be blank",
        ));
    }
    Ok(trimmed.to_string())
}
