//! # Registry Configuration
//!
//! Programmatic configuration for the registry components. No file loading or
//! environment fallbacks here: every knob has an explicit, validated default,
//! and callers that want something else construct the struct directly.

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};
use crate::events::DeliveryPolicy;

/// Top-level configuration shared by a registry instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryConfig {
    pub events: EventsConfig,
    pub aggregation: AggregationConfig,
    pub bulk: BulkConfig,
}

/// Change-notification behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventsConfig {
    /// How a failing subscriber is handled during delivery.
    pub delivery: DeliveryPolicy,
}

/// Fork-join aggregation limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AggregationConfig {
    /// Upper bound on worker threads per aggregation. Defaults to the host's
    /// available parallelism so a large store cannot oversubscribe the CPU.
    pub max_parallelism: usize,

    /// How many records a worker reduces between cancellation checks.
    pub cancellation_check_interval: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            max_parallelism: default_parallelism(),
            cancellation_check_interval: 256,
        }
    }
}

/// Bulk-insert behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BulkConfig {
    /// In-flight record limit for `insert_many`. Bounded so one large batch
    /// cannot starve other work on a shared pool.
    pub concurrency: usize,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self { concurrency: 16 }
    }
}

impl RegistryConfig {
    /// Validate every section; zero-width pools and zero-interval polling are
    /// configuration mistakes, not degenerate modes.
    pub fn validate(&self) -> Result<()> {
        if self.aggregation.max_parallelism == 0 {
            return Err(RegistryError::invalid_argument(
                "aggregation.max_parallelism",
                "must be at least 1",
            ));
        }
        if self.aggregation.cancellation_check_interval == 0 {
            return Err(RegistryError::invalid_argument(
                "aggregation.cancellation_check_interval",
                "must be at least 1",
            ));
        }
        if self.bulk.concurrency == 0 {
            return Err(RegistryError::invalid_argument(
                "bulk.concurrency",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
