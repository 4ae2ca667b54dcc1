use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, error};

use comptoir_core::Aggregate;
use comptoir_events::{EventBus, EventEnvelope, InMemoryBusError, InMemoryEventBus, Subscription};
use comptoir_inventory::{MovementId, StockItem, StockItemId};
use comptoir_sales::{Sale, SaleId};

use super::{
    MovementRecord, ProjectionError, SalesProjection, StockLevel, StockLevelsProjection, StockMovementsProjection,
};
use crate::read_model::InMemoryTenantStore;

#[derive(Debug, Error)]
pub enum HubError {
    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Bus(#[from] InMemoryBusError),
}

/// Event bus that updates every read model before fanning out.
///
/// Routing is by aggregate type; envelopes of unknown types only reach
/// subscribers.
#[derive(Debug)]
pub struct ProjectionHub {
    stock_levels: StockLevelsProjection<InMemoryTenantStore<StockItemId, StockLevel>>,
    movements: StockMovementsProjection<InMemoryTenantStore<MovementId, MovementRecord>>,
    sales: SalesProjection<InMemoryTenantStore<SaleId, Sale>>,
    subscribers: InMemoryEventBus<EventEnvelope<JsonValue>>,
}

impl ProjectionHub {
    pub fn new() -> Self {
        Self {
            stock_levels: StockLevelsProjection::new(InMemoryTenantStore::new()),
            movements: StockMovementsProjection::new(InMemoryTenantStore::new()),
            sales: SalesProjection::new(InMemoryTenantStore::new()),
            subscribers: InMemoryEventBus::new(),
        }
    }

    pub fn stock_levels(&self) -> &StockLevelsProjection<InMemoryTenantStore<StockItemId, StockLevel>> {
        &self.stock_levels
    }

    pub fn movements(&self) -> &StockMovementsProjection<InMemoryTenantStore<MovementId, MovementRecord>> {
        &self.movements
    }

    pub fn sales(&self) -> &SalesProjection<InMemoryTenantStore<SaleId, Sale>> {
        &self.sales
    }

    pub fn apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let result = if envelope.is_for(StockItem::AGGREGATE_TYPE) {
            self.stock_levels
                .apply_envelope(envelope)
                .and_then(|()| self.movements.apply_envelope(envelope))
        } else if envelope.is_for(Sale::AGGREGATE_TYPE) {
            self.sales.apply_envelope(envelope)
        } else {
            debug!(aggregate_type = envelope.aggregate_type(), "no read model for aggregate type");
            Ok(())
        };

        if let Err(e) = &result {
            error!(
                tenant_id = %envelope.tenant_id(),
                aggregate_id = %envelope.aggregate_id(),
                sequence = envelope.sequence_number(),
                error = %e,
                "projection failed"
            );
        }
        result
    }
}

impl Default for ProjectionHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus<EventEnvelope<JsonValue>> for ProjectionHub {
    type Error = HubError;

    fn publish(&self, message: EventEnvelope<JsonValue>) -> Result<(), Self::Error> {
        self.apply(&message)?;
        self.subscribers.publish(message)?;
        Ok(())
    }

    fn subscribe(&self) -> Subscription<EventEnvelope<JsonValue>> {
        self.subscribers.subscribe()
    }
}
