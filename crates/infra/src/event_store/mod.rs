//! Append-only event store boundary.
//!
//! Tenant-scoped event streams with optimistic concurrency, plus multi-stream
//! transactions for operations that touch more than one aggregate.

pub mod in_memory;
pub mod r#trait;
pub mod transaction;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, StreamKey, UncommittedEvent};
pub use transaction::{StreamAppend, StreamGuard, Transaction};
