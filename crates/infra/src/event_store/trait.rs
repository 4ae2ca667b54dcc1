use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use comptoir_core::{AggregateId, ExpectedVersion, TenantId};
use comptoir_events::EventEnvelope;

use super::transaction::Transaction;

/// Address of one event stream: a sale, a stock item, a tenant's campaign
/// board. Two tenants never share a stream even for equal aggregate ids.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamKey {
    pub tenant_id: TenantId,
    pub aggregate_id: AggregateId,
}

impl StreamKey {
    pub fn new(tenant_id: TenantId, aggregate_id: AggregateId) -> Self {
        Self {
            tenant_id,
            aggregate_id,
        }
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant_id, self.aggregate_id)
    }
}

/// Domain event serialized for storage, not yet positioned in its stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub tenant_id: TenantId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,
    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,
    pub payload: JsonValue,
}

impl UncommittedEvent {
    /// Serialize `event` for the stream of `aggregate_id`.
    pub fn from_typed<E>(
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: comptoir_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event).map_err(|e| {
            EventStoreError::InvalidAppend(format!("cannot serialize {}: {e}", event.event_type()))
        })?;

        Ok(Self {
            event_id,
            tenant_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }

    pub fn stream(&self) -> StreamKey {
        StreamKey::new(self.tenant_id, self.aggregate_id)
    }

    /// Give the event its position; only the store calls this.
    pub(crate) fn into_stored(self, sequence_number: u64) -> StoredEvent {
        StoredEvent {
            event_id: self.event_id,
            tenant_id: self.tenant_id,
            aggregate_id: self.aggregate_id,
            aggregate_type: self.aggregate_type,
            sequence_number,
            event_type: self.event_type,
            event_version: self.event_version,
            occurred_at: self.occurred_at,
            payload: self.payload,
        }
    }
}

/// Event as recorded in the ledger of its stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub tenant_id: TenantId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,
    /// 1-based, gapless within the stream.
    pub sequence_number: u64,
    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,
    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream(&self) -> StreamKey {
        StreamKey::new(self.tenant_id, self.aggregate_id)
    }

    pub fn to_envelope(&self) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            self.event_id,
            self.tenant_id,
            self.aggregate_id,
            self.aggregate_type.clone(),
            self.sequence_number,
            self.event_type.clone(),
            self.occurred_at,
            self.payload.clone(),
        )
    }
}

#[derive(Debug, Error)]
pub enum EventStoreError {
    /// A stream moved since it was read; the caller lost a race.
    #[error("concurrent modification: {0}")]
    Concurrency(String),

    #[error("cross-tenant write refused: {0}")]
    TenantIsolation(String),

    #[error("stream holds another aggregate type: {0}")]
    AggregateTypeMismatch(String),

    #[error("malformed append: {0}")]
    InvalidAppend(String),

    #[error("event store lock poisoned")]
    Poisoned,
}

/// Ledger of every sale, stock item and campaign board, one stream each.
///
/// Writes are version-checked; [`EventStore::commit`] covers the operations
/// that touch several streams at once (a delivery moves the sale and every
/// delivered stock item, a campaign close adjusts many items).
pub trait EventStore: Send + Sync {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Oldest first; empty for an unknown stream.
    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Checks every guard and append, then writes all or nothing.
    fn commit(&self, transaction: Transaction) -> Result<Vec<StoredEvent>, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(tenant_id, aggregate_id)
    }

    fn commit(&self, transaction: Transaction) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).commit(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positioning_keeps_metadata() {
        let tenant_id = TenantId::new();
        let aggregate_id = AggregateId::new();
        let event = UncommittedEvent {
            event_id: Uuid::now_v7(),
            tenant_id,
            aggregate_id,
            aggregate_type: "sales.sale".to_string(),
            event_type: "sales.sale.created".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: JsonValue::Null,
        };

        let stored = event.clone().into_stored(3);
        assert_eq!(stored.sequence_number, 3);
        assert_eq!(stored.stream(), event.stream());
        assert_eq!(stored.to_envelope().sequence_number(), 3);
    }
}
