//! Parallel grouped aggregation over store snapshots.

pub mod parallel;
pub mod ranked;

pub use parallel::{GroupSummary, ParallelAggregator};
pub use ranked::RankedGroupStream;
