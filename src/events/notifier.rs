//! # Change Notifier
//!
//! Synchronous publish/subscribe for store mutation events.
//!
//! ## Overview
//!
//! The notifier owns an explicit subscriber list with add/remove operations.
//! Delivery is a plain iteration over that list in the thread that performed
//! the mutation, strictly after the mutation is visible in the store, so the
//! events one subscriber sees arrive in the order the mutations were applied.
//!
//! ## Failure handling
//!
//! By default a failing subscriber propagates to the caller of the mutation
//! ([`DeliveryPolicy::Propagate`]); delivery stops at the first failure.
//! [`DeliveryPolicy::Isolate`] instead logs the failure and keeps delivering
//! to the remaining subscribers. Either way the mutation itself has already
//! been applied — a failing subscriber never corrupts the store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::{RegistryError, Result};

/// The kind of mutation that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Added,
    Updated,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Updated => "updated",
            ChangeKind::Deleted => "deleted",
        }
    }
}

/// Immutable payload describing one store mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub record_id: Uuid,
    /// Display label of the affected record (customer name, task name).
    pub label: String,
    pub occurred_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, record_id: Uuid, label: impl Into<String>) -> Self {
        Self {
            kind,
            record_id,
            label: label.into(),
            occurred_at: Utc::now(),
        }
    }
}

/// Trait for change subscribers.
pub trait ChangeSubscriber: Send + Sync {
    /// Handle one mutation event. Runs synchronously in the mutating thread;
    /// long work belongs on the subscriber's side of this boundary.
    fn on_change(
        &self,
        event: &ChangeEvent,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Subscriber name for identification in logs and errors.
    fn subscriber_name(&self) -> &str {
        "unnamed_subscriber"
    }
}

/// How subscriber failures are handled during delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryPolicy {
    /// Stop at the first failing subscriber and return its failure to the
    /// mutation caller.
    #[default]
    Propagate,
    /// Log failures and keep delivering to the remaining subscribers.
    Isolate,
}

/// Handle returned by [`ChangeNotifier::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

struct FnSubscriber<F> {
    name: String,
    handler: F,
}

impl<F> ChangeSubscriber for FnSubscriber<F>
where
    F: Fn(&ChangeEvent) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>
        + Send
        + Sync,
{
    fn on_change(
        &self,
        event: &ChangeEvent,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (self.handler)(event)
    }

    fn subscriber_name(&self) -> &str {
        &self.name
    }
}

/// Registry of change subscribers with ordered, in-thread delivery.
pub struct ChangeNotifier {
    subscribers: RwLock<Vec<(SubscriptionId, Arc<dyn ChangeSubscriber>)>>,
    next_id: AtomicU64,
    policy: DeliveryPolicy,
}

impl ChangeNotifier {
    /// Create a notifier with the default propagate-first-failure policy.
    pub fn new() -> Self {
        Self::with_policy(DeliveryPolicy::default())
    }

    pub fn with_policy(policy: DeliveryPolicy) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            policy,
        }
    }

    pub fn policy(&self) -> DeliveryPolicy {
        self.policy
    }

    /// Register a subscriber. Subscribers are delivered to in registration
    /// order.
    pub fn subscribe(&self, subscriber: Arc<dyn ChangeSubscriber>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push((id, subscriber));
        debug!(subscription = id.0, "change subscriber registered");
        id
    }

    /// Register a closure as a subscriber.
    pub fn subscribe_fn<F>(&self, name: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&ChangeEvent) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>
            + Send
            + Sync
            + 'static,
    {
        self.subscribe(Arc::new(FnSubscriber {
            name: name.into(),
            handler,
        }))
    }

    /// Remove a subscriber. Returns whether the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(sub_id, _)| *sub_id != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Deliver one event to every subscriber, in registration order, in the
    /// calling thread. The subscriber list is copied out under the read lock
    /// so a handler that subscribes or unsubscribes cannot deadlock delivery.
    pub fn notify(&self, event: &ChangeEvent) -> Result<()> {
        let subscribers: Vec<(SubscriptionId, Arc<dyn ChangeSubscriber>)> =
            self.subscribers.read().clone();

        for (_, subscriber) in subscribers {
            if let Err(failure) = subscriber.on_change(event) {
                match self.policy {
                    DeliveryPolicy::Propagate => {
                        return Err(RegistryError::Subscriber {
                            subscriber: subscriber.subscriber_name().to_string(),
                            event: event.kind.as_str().to_string(),
                            message: failure.to_string(),
                        });
                    }
                    DeliveryPolicy::Isolate => {
                        error!(
                            subscriber = subscriber.subscriber_name(),
                            event = event.kind.as_str(),
                            record_id = %event.record_id,
                            error = %failure,
                            "change subscriber failed; continuing delivery"
                        );
                    }
                }
            }
        }

        Ok(())
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("subscribers", &self.subscriber_count())
            .field("policy", &self.policy)
            .finish()
    }
}
