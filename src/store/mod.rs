//! The concurrency-safe keyed store at the heart of the registry.

pub mod entity_store;

pub use entity_store::EntityStore;
