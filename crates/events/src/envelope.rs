use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use comptoir_core::{AggregateId, TenantId};

/// What the bus carries: one committed sale, stock or campaign event plus
/// where it sits in the ledger.
///
/// Read models key their duplicate detection on
/// `(tenant_id, aggregate_id, sequence_number)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    aggregate_type: String,
    sequence_number: u64,
    event_type: String,
    occurred_at: DateTime<Utc>,
    payload: E,
}

impl<E> EventEnvelope<E> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        event_id: Uuid,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        sequence_number: u64,
        event_type: impl Into<String>,
        occurred_at: DateTime<Utc>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            tenant_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            sequence_number,
            event_type: event_type.into(),
            occurred_at,
            payload,
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    /// True when the event belongs to a stream of `aggregate_type`.
    pub fn is_for(&self, aggregate_type: &str) -> bool {
        self.aggregate_type == aggregate_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    /// Dotted name, e.g. `sales.sale.payment_recorded`.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_matches_the_stream_type() {
        let envelope = EventEnvelope::new(
            Uuid::now_v7(),
            TenantId::new(),
            AggregateId::new(),
            "inventory.stock_item",
            1,
            "inventory.stock_item.created",
            Utc::now(),
            (),
        );
        assert!(envelope.is_for("inventory.stock_item"));
        assert!(!envelope.is_for("sales.sale"));
    }
}
