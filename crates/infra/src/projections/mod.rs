//! Read models built from committed events.
//!
//! Projections are tenant-isolated, idempotent under replays (per-stream
//! cursors) and disposable: everything they hold can be rebuilt from the
//! event store. The [`ProjectionHub`] applies every committed envelope
//! synchronously before handing it to subscribers, so a query issued after a
//! successful command always sees that command's effects.

mod cursor;

pub mod hub;
pub mod sales;
pub mod stock_levels;
pub mod stock_movements;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;

use comptoir_events::EventEnvelope;

pub use hub::{HubError, ProjectionHub};
pub use sales::{RecoveryLine, SaleSummary, SalesProjection};
pub use stock_levels::{StockLevel, StockLevelsProjection};
pub use stock_movements::{
    DailyMovementStats, MovementPage, MovementQuery, MovementRecord, Page, StockMovementsProjection,
};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize {event_type}: {message}")]
    Deserialize { event_type: String, message: String },

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error("projection lock poisoned")]
    Poisoned,
}

pub(crate) fn decode<E: DeserializeOwned>(envelope: &EventEnvelope<JsonValue>) -> Result<E, ProjectionError> {
    serde_json::from_value(envelope.payload().clone()).map_err(|e| ProjectionError::Deserialize {
        event_type: envelope.event_type().to_string(),
        message: e.to_string(),
    })
}
