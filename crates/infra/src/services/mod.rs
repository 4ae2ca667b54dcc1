//! Application services: the operations the HTTP layer calls.
//!
//! Every service takes the caller's [`Session`] explicitly, checks the
//! action against the [`EntitlementEngine`], validates cross-aggregate facts
//! (campaign lock, referenced stock items, customers, services, quotas) and
//! commits through the [`CommandDispatcher`](crate::command_dispatcher::CommandDispatcher).

pub mod campaigns;
pub mod catalog;
pub mod customers;
pub mod sale_lifecycle;
pub mod stock_ledger;

mod postings;

use std::sync::Arc;

use tracing::{error, warn};

use comptoir_core::{AggregateId, DomainError, TenantId};
use comptoir_entitlements::{Action, EntitlementEngine, Resource, Session};
use comptoir_inventory::{CampaignBoard, StockItem, StockItemId};
use comptoir_sales::{Sale, SaleId};

use crate::command_dispatcher::{CommandDispatcher, DispatchError, Staged};
use crate::event_store::EventStore;
use crate::projections::ProjectionHub;

pub use campaigns::CampaignService;
pub use catalog::{NewService, ServiceCatalog, ServiceOffering};
pub use customers::{Customer, CustomerDirectory, NewCustomer};
pub use sale_lifecycle::{NewSale, SaleLifecycleManager};
pub use stock_ledger::{MovementRequest, ReceiptLine, StockLedger};

/// Dispatcher wired to the read-model hub.
pub type Dispatcher = CommandDispatcher<Arc<dyn EventStore>, Arc<ProjectionHub>>;

pub(crate) fn authorize(
    engine: &EntitlementEngine,
    session: &Session,
    action: Action,
    resource: Resource,
) -> Result<(), DomainError> {
    if engine.can_perform(session, action, resource, None) {
        Ok(())
    } else {
        Err(DomainError::forbidden(format!(
            "{action:?} on {} is not permitted",
            resource.as_str()
        )))
    }
}

pub(crate) fn load_board(dispatcher: &Dispatcher, tenant_id: TenantId) -> Result<Staged<CampaignBoard>, DispatchError> {
    dispatcher.load(tenant_id, CampaignBoard::stream_id(tenant_id), CampaignBoard::empty)
}

/// Campaign board, failing with `Locked` while a campaign is in progress.
pub(crate) fn unlocked_board(
    dispatcher: &Dispatcher,
    tenant_id: TenantId,
) -> Result<Staged<CampaignBoard>, DispatchError> {
    let board = load_board(dispatcher, tenant_id)?;
    board.aggregate().ensure_unlocked()?;
    Ok(board)
}

/// Existing stock item of the tenant, `NotFound` otherwise.
pub(crate) fn load_stock_item(
    dispatcher: &Dispatcher,
    tenant_id: TenantId,
    id: StockItemId,
) -> Result<Staged<StockItem>, DispatchError> {
    let staged = dispatcher.load(tenant_id, id.0, |aggregate_id: AggregateId| {
        StockItem::empty(StockItemId::new(aggregate_id))
    })?;
    staged.aggregate().ensure_exists_for(tenant_id)?;
    Ok(staged)
}

/// Existing sale of the tenant, `NotFound` otherwise.
pub(crate) fn load_sale(dispatcher: &Dispatcher, tenant_id: TenantId, id: SaleId) -> Result<Staged<Sale>, DispatchError> {
    let staged = dispatcher.load(tenant_id, id.0, |aggregate_id: AggregateId| Sale::empty(SaleId::new(aggregate_id)))?;
    if !staged.aggregate().exists() {
        return Err(DomainError::not_found(format!("sale {id}")).into());
    }
    Ok(staged)
}

/// Logs a failed operation: domain rejections at `warn`, infrastructure
/// failures at `error`.
pub(crate) trait LogRejection {
    fn log_rejection(self, operation: &'static str) -> Self;
}

impl<T> LogRejection for Result<T, DispatchError> {
    fn log_rejection(self, operation: &'static str) -> Self {
        if let Err(e) = &self {
            match e.kind() {
                Some(kind) => warn!(operation, kind = kind.as_str(), error = %e, "operation rejected"),
                None => error!(operation, error = %e, "operation failed"),
            }
        }
        self
    }
}

impl<T> LogRejection for Result<T, DomainError> {
    fn log_rejection(self, operation: &'static str) -> Self {
        if let Err(e) = &self {
            warn!(operation, kind = e.kind().as_str(), error = %e, "operation rejected");
        }
        self
    }
}
