//! Store mutation events and their synchronous delivery.

pub mod notifier;

pub use notifier::{
    ChangeEvent, ChangeKind, ChangeNotifier, ChangeSubscriber, DeliveryPolicy, SubscriptionId,
};
