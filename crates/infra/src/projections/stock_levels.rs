use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use comptoir_core::TenantId;
use comptoir_events::EventEnvelope;
use comptoir_inventory::{StockItem, StockItemEvent, StockItemId};

use super::cursor::StreamCursors;
use super::{ProjectionError, decode};
use crate::read_model::TenantStore;

/// Current stock per item, as listed by `GET /stock`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockLevel {
    pub id: StockItemId,
    pub name: String,
    pub sku: Option<String>,
    pub level: u64,
    pub movement_count: u64,
    pub last_movement_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct StockLevelsProjection<S>
where
    S: TenantStore<StockItemId, StockLevel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> StockLevelsProjection<S>
where
    S: TenantStore<StockItemId, StockLevel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::default(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, id: &StockItemId) -> Option<StockLevel> {
        self.store.get(tenant_id, id)
    }

    /// All items of a tenant, by name.
    pub fn list(&self, tenant_id: TenantId) -> Vec<StockLevel> {
        let mut levels = self.store.list(tenant_id);
        levels.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        levels
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        self.cursors.advance(envelope, || {
            let tenant_id = envelope.tenant_id();
            let event: StockItemEvent = decode(envelope)?;

            let (event_tenant, item_id) = match &event {
                StockItemEvent::StockItemCreated(e) => (e.tenant_id, e.stock_item_id),
                StockItemEvent::MovementPosted(e) => (e.movement.tenant_id, e.movement.stock_item_id),
            };
            if event_tenant != tenant_id {
                return Err(ProjectionError::TenantIsolation(
                    "event tenant_id does not match envelope tenant_id".to_string(),
                ));
            }
            if item_id.0 != envelope.aggregate_id() {
                return Err(ProjectionError::TenantIsolation(
                    "event stock_item_id does not match envelope aggregate_id".to_string(),
                ));
            }

            match event {
                StockItemEvent::StockItemCreated(e) => {
                    self.store.upsert(
                        tenant_id,
                        e.stock_item_id,
                        StockLevel {
                            id: e.stock_item_id,
                            name: e.name,
                            sku: e.sku,
                            level: 0,
                            movement_count: 0,
                            last_movement_at: None,
                        },
                    );
                }
                StockItemEvent::MovementPosted(e) => {
                    let m = e.movement;
                    self.store.update(tenant_id, m.stock_item_id, |row| {
                        let mut row = row.unwrap_or(StockLevel {
                            id: m.stock_item_id,
                            name: String::new(),
                            sku: None,
                            level: 0,
                            movement_count: 0,
                            last_movement_at: None,
                        });
                        row.level = m.resulting_level;
                        row.movement_count += 1;
                        row.last_movement_at = Some(m.created_at);
                        Some(row)
                    });
                }
            }
            Ok(())
        })
    }
}

impl From<&StockItem> for StockLevel {
    fn from(item: &StockItem) -> Self {
        Self {
            id: item.id_typed(),
            name: item.name().to_string(),
            sku: item.sku().map(str::to_string),
            level: item.level(),
            movement_count: item.movement_count(),
            last_movement_at: item.last_movement_at(),
        }
    }
}
