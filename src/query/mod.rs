//! Cancellable, lazily-produced streaming queries over store snapshots.

pub mod stream;

pub use stream::{QueryBuilder, QueryStream};
