//! Domain events and their distribution.
//!
//! Sales, stock movements and campaign changes are recorded as immutable
//! events; committed events are wrapped in tenant-scoped envelopes and fanned
//! out to read-model projections through an [`EventBus`].

pub mod bus;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::execute;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
