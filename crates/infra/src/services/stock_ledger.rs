use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use comptoir_core::{Aggregate, DomainError};
use comptoir_entitlements::{Action, EntitlementEngine, Resource, Session};
use comptoir_inventory::{
    CreateStockItem, MovementKind, StockItem, StockItemCommand, StockItemEvent, StockItemId, StockMovement,
};

use super::postings::Postings;
use super::{Dispatcher, LogRejection, authorize, load_stock_item, unlocked_board};
use crate::command_dispatcher::{DispatchError, UnitOfWork};
use crate::projections::{DailyMovementStats, MovementPage, MovementQuery, StockLevel};

/// One manual posting on a stock item.
#[derive(Debug, Clone)]
pub struct MovementRequest {
    pub stock_item_id: StockItemId,
    pub kind: MovementKind,
    pub quantity: u64,
    pub reason: String,
    pub reference_id: Option<String>,
}

/// One entry of a bulk reception.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ReceiptLine {
    pub stock_item_id: StockItemId,
    pub quantity: u64,
}

/// Append-only stock ledger: one event stream per stock item.
pub struct StockLedger {
    dispatcher: Arc<Dispatcher>,
    engine: Arc<EntitlementEngine>,
}

impl StockLedger {
    pub fn new(dispatcher: Arc<Dispatcher>, engine: Arc<EntitlementEngine>) -> Self {
        Self { dispatcher, engine }
    }

    #[instrument(skip_all, fields(tenant_id = %session.tenant_id()))]
    pub fn create_item(&self, session: &Session, name: &str, sku: Option<&str>) -> Result<StockLevel, DispatchError> {
        self.try_create_item(session, name, sku).log_rejection("create_stock_item")
    }

    fn try_create_item(&self, session: &Session, name: &str, sku: Option<&str>) -> Result<StockLevel, DispatchError> {
        authorize(&self.engine, session, Action::Create, Resource::Inventory)?;
        let tenant_id = session.tenant_id();
        let id = StockItemId::generate();

        let mut staged = self.dispatcher.load(tenant_id, id.0, |_| StockItem::empty(id))?;
        staged.execute(&StockItemCommand::CreateStockItem(CreateStockItem {
            tenant_id,
            stock_item_id: id,
            name: name.to_string(),
            sku: sku.map(str::to_string),
            occurred_at: Utc::now(),
        }))?;

        let mut uow = UnitOfWork::new(tenant_id);
        let item = uow.stage(staged)?;
        self.dispatcher.commit(uow)?;

        info!(stock_item_id = %id, "stock item created");
        Ok(StockLevel::from(&item))
    }

    /// Post one movement. Rejected with `Locked` during an inventory campaign.
    #[instrument(skip_all, fields(tenant_id = %session.tenant_id(), stock_item_id = %request.stock_item_id))]
    pub fn post_movement(&self, session: &Session, request: MovementRequest) -> Result<StockMovement, DispatchError> {
        self.try_post_movement(session, request).log_rejection("post_movement")
    }

    fn try_post_movement(&self, session: &Session, request: MovementRequest) -> Result<StockMovement, DispatchError> {
        authorize(&self.engine, session, Action::Create, Resource::Movements)?;
        let tenant_id = session.tenant_id();
        let board = unlocked_board(&self.dispatcher, tenant_id)?;

        let mut postings = Postings::new(&self.dispatcher, tenant_id, session.user_id(), Utc::now());
        let movement = postings.post(
            request.stock_item_id,
            request.kind,
            request.quantity,
            &request.reason,
            request.reference_id.as_deref(),
        )?;

        let mut uow = UnitOfWork::new(tenant_id);
        uow.guard(&board)?;
        postings.stage_into(&mut uow)?;
        self.dispatcher.commit(uow)?;

        info!(
            movement_id = %movement.movement_id,
            resulting_level = movement.resulting_level,
            "movement posted"
        );
        Ok(movement)
    }

    /// One `IN` per line, all or nothing.
    #[instrument(skip_all, fields(tenant_id = %session.tenant_id(), lines = lines.len()))]
    pub fn bulk_receive(
        &self,
        session: &Session,
        lines: &[ReceiptLine],
        reason: &str,
        reference_id: Option<&str>,
    ) -> Result<Vec<StockMovement>, DispatchError> {
        self.try_bulk_receive(session, lines, reason, reference_id)
            .log_rejection("bulk_receive")
    }

    fn try_bulk_receive(
        &self,
        session: &Session,
        lines: &[ReceiptLine],
        reason: &str,
        reference_id: Option<&str>,
    ) -> Result<Vec<StockMovement>, DispatchError> {
        authorize(&self.engine, session, Action::Create, Resource::Movements)?;
        if lines.is_empty() {
            return Err(DomainError::validation("a reception needs at least one line").into());
        }
        let tenant_id = session.tenant_id();
        let board = unlocked_board(&self.dispatcher, tenant_id)?;

        let mut postings = Postings::new(&self.dispatcher, tenant_id, session.user_id(), Utc::now());
        let movements = lines
            .iter()
            .map(|line| postings.post(line.stock_item_id, MovementKind::In, line.quantity, reason, reference_id))
            .collect::<Result<Vec<_>, _>>()?;

        let mut uow = UnitOfWork::new(tenant_id);
        uow.guard(&board)?;
        postings.stage_into(&mut uow)?;
        self.dispatcher.commit(uow)?;

        info!(movements = movements.len(), "bulk reception posted");
        Ok(movements)
    }

    /// Last resulting level; 0 for an item that never moved.
    pub fn current_level(&self, session: &Session, id: StockItemId) -> Result<u64, DispatchError> {
        authorize(&self.engine, session, Action::View, Resource::Inventory)?;
        let staged = load_stock_item(&self.dispatcher, session.tenant_id(), id)?;
        Ok(staged.aggregate().level())
    }

    /// Every movement of one item, oldest first, read from its ledger stream.
    pub fn movement_history(&self, session: &Session, id: StockItemId) -> Result<Vec<StockMovement>, DispatchError> {
        authorize(&self.engine, session, Action::View, Resource::Movements)?;
        let stream = self.dispatcher.stream(session.tenant_id(), id.0, StockItem::AGGREGATE_TYPE)?;
        if stream.is_empty() {
            return Err(DomainError::not_found(format!("stock item {id}")).into());
        }

        let mut movements = Vec::with_capacity(stream.len());
        for stored in stream {
            let event: StockItemEvent = serde_json::from_value(stored.payload).map_err(|e| {
                DispatchError::Deserialize(format!("{} #{}: {e}", stored.event_type, stored.sequence_number))
            })?;
            if let StockItemEvent::MovementPosted(posted) = event {
                movements.push(posted.movement);
            }
        }
        Ok(movements)
    }

    /// Tenant-wide or per-item movements in a time range, paginated.
    pub fn movements_in_range(&self, session: &Session, query: &MovementQuery) -> Result<MovementPage, DispatchError> {
        authorize(&self.engine, session, Action::View, Resource::Movements)?;
        Ok(self.dispatcher.bus().movements().range(session.tenant_id(), query))
    }

    pub fn daily_stats(
        &self,
        session: &Session,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<DailyMovementStats>, DispatchError> {
        authorize(&self.engine, session, Action::View, Resource::Movements)?;
        Ok(self.dispatcher.bus().movements().daily_stats(session.tenant_id(), from, to))
    }

    pub fn levels(&self, session: &Session) -> Result<Vec<StockLevel>, DispatchError> {
        authorize(&self.engine, session, Action::View, Resource::Inventory)?;
        Ok(self.dispatcher.bus().stock_levels().list(session.tenant_id()))
    }
}
