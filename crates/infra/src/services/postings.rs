use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use chrono::{DateTime, Utc};

use comptoir_core::{DomainError, TenantId, UserId};
use comptoir_inventory::{
    MovementId, MovementKind, PostMovement, StockItem, StockItemCommand, StockItemEvent, StockItemId, StockMovement,
};

use super::{Dispatcher, load_stock_item};
use crate::command_dispatcher::{DispatchError, Staged, UnitOfWork};

/// Stock movements decided inside one unit of work.
///
/// Several postings on the same item fold into one staged aggregate, so the
/// second posting sees the level left by the first.
pub(crate) struct Postings<'a> {
    dispatcher: &'a Dispatcher,
    tenant_id: TenantId,
    operator: UserId,
    occurred_at: DateTime<Utc>,
    items: BTreeMap<StockItemId, Staged<StockItem>>,
}

impl<'a> Postings<'a> {
    pub(crate) fn new(dispatcher: &'a Dispatcher, tenant_id: TenantId, operator: UserId, occurred_at: DateTime<Utc>) -> Self {
        Self {
            dispatcher,
            tenant_id,
            operator,
            occurred_at,
            items: BTreeMap::new(),
        }
    }

    fn item(&mut self, id: StockItemId) -> Result<&mut Staged<StockItem>, DispatchError> {
        match self.items.entry(id) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(v) => {
                let staged = load_stock_item(self.dispatcher, self.tenant_id, id)?;
                Ok(v.insert(staged))
            }
        }
    }

    /// Level including postings already staged here.
    pub(crate) fn level(&mut self, id: StockItemId) -> Result<u64, DispatchError> {
        Ok(self.item(id)?.aggregate().level())
    }

    pub(crate) fn post(
        &mut self,
        id: StockItemId,
        kind: MovementKind,
        quantity: u64,
        reason: &str,
        reference_id: Option<&str>,
    ) -> Result<StockMovement, DispatchError> {
        let command = StockItemCommand::PostMovement(PostMovement {
            tenant_id: self.tenant_id,
            stock_item_id: id,
            movement_id: MovementId::new(),
            kind,
            quantity,
            reason: reason.to_string(),
            reference_id: reference_id.map(str::to_string),
            operator: self.operator,
            occurred_at: self.occurred_at,
        });

        let events = self.item(id)?.execute(&command)?;
        events
            .iter()
            .find_map(|e| match e {
                StockItemEvent::MovementPosted(p) => Some(p.movement.clone()),
                StockItemEvent::StockItemCreated(_) => None,
            })
            .ok_or_else(|| DomainError::invalid_state(format!("no movement posted on stock item {id}")).into())
    }

    /// Queue every touched ledger in `uow`.
    pub(crate) fn stage_into(self, uow: &mut UnitOfWork) -> Result<(), DispatchError> {
        for staged in self.items.into_values() {
            uow.stage(staged)?;
        }
        Ok(())
    }
}
