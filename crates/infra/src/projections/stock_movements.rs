use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use comptoir_core::TenantId;
use comptoir_events::EventEnvelope;
use comptoir_inventory::{MovementId, StockItemEvent, StockItemId, StockMovement};

use super::cursor::StreamCursors;
use super::{ProjectionError, decode};
use crate::read_model::TenantStore;

/// A movement plus its position in the item's ledger stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementRecord {
    pub movement: StockMovement,
    pub sequence: u64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    pub const DEFAULT_LIMIT: usize = 50;
    pub const MAX_LIMIT: usize = 500;

    /// `limit` is clamped to `1..=MAX_LIMIT`.
    pub fn new(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit: limit.clamp(1, Self::MAX_LIMIT),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(0, Self::DEFAULT_LIMIT)
    }
}

/// `from` is inclusive, `to` exclusive; `None` leaves that side open.
#[derive(Debug, Clone, Default)]
pub struct MovementQuery {
    pub stock_item_id: Option<StockItemId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Page,
}

impl MovementQuery {
    fn matches(&self, m: &StockMovement) -> bool {
        self.stock_item_id.is_none_or(|id| id == m.stock_item_id)
            && self.from.is_none_or(|from| m.created_at >= from)
            && self.to.is_none_or(|to| m.created_at < to)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovementPage {
    pub items: Vec<StockMovement>,
    pub total: usize,
    pub next_offset: Option<usize>,
}

/// Movement totals for one UTC calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyMovementStats {
    pub day: NaiveDate,
    pub movements: u64,
    pub quantity_in: u64,
    pub quantity_out: u64,
    pub net: i64,
}

/// Tenant-wide movement journal for range queries and daily statistics.
#[derive(Debug)]
pub struct StockMovementsProjection<S>
where
    S: TenantStore<MovementId, MovementRecord>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> StockMovementsProjection<S>
where
    S: TenantStore<MovementId, MovementRecord>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::default(),
        }
    }

    /// Ordered by `created_at`, then ledger sequence.
    pub fn range(&self, tenant_id: TenantId, query: &MovementQuery) -> MovementPage {
        let mut records: Vec<MovementRecord> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|r| query.matches(&r.movement))
            .collect();
        records.sort_by(|a, b| {
            a.movement
                .created_at
                .cmp(&b.movement.created_at)
                .then(a.sequence.cmp(&b.sequence))
                .then(a.movement.movement_id.cmp(&b.movement.movement_id))
        });

        let total = records.len();
        let items: Vec<StockMovement> = records
            .into_iter()
            .skip(query.page.offset)
            .take(query.page.limit)
            .map(|r| r.movement)
            .collect();
        let end = query.page.offset.saturating_add(items.len());
        let next_offset = (end < total).then_some(end);

        MovementPage {
            items,
            total,
            next_offset,
        }
    }

    /// One entry per UTC day that has at least one movement in `[from, to)`.
    pub fn daily_stats(
        &self,
        tenant_id: TenantId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Vec<DailyMovementStats> {
        let query = MovementQuery {
            stock_item_id: None,
            from,
            to,
            page: Page::default(),
        };

        let mut days: BTreeMap<NaiveDate, DailyMovementStats> = BTreeMap::new();
        for record in self.store.list(tenant_id) {
            let m = &record.movement;
            if !query.matches(m) {
                continue;
            }
            let day = m.created_at.date_naive();
            let stats = days.entry(day).or_insert(DailyMovementStats {
                day,
                movements: 0,
                quantity_in: 0,
                quantity_out: 0,
                net: 0,
            });
            stats.movements += 1;
            stats.quantity_in += m.quantity_in();
            stats.quantity_out += m.quantity_out();
            stats.net += m.delta;
        }
        days.into_values().collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        self.cursors.advance(envelope, || {
            let event: StockItemEvent = decode(envelope)?;
            let StockItemEvent::MovementPosted(posted) = event else {
                return Ok(());
            };

            let movement = posted.movement;
            if movement.tenant_id != envelope.tenant_id() {
                return Err(ProjectionError::TenantIsolation(
                    "movement tenant_id does not match envelope tenant_id".to_string(),
                ));
            }

            self.store.upsert(
                envelope.tenant_id(),
                movement.movement_id,
                MovementRecord {
                    movement,
                    sequence: envelope.sequence_number(),
                },
            );
            Ok(())
        })
    }
}
