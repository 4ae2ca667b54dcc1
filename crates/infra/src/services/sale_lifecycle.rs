use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use comptoir_core::{AggregateRoot, CustomerId, DomainError, TaxRate, TenantId};
use comptoir_entitlements::{Action, EntitlementEngine, QuotaResource, Resource, Session};
use comptoir_inventory::{CampaignBoard, MovementKind};
use comptoir_sales::{
    CancelSale, CreateSale, EditSale, ItemQuantity, NewPayment, ProductRef, RecordDelivery, RecordPayment, Sale,
    SaleCommand, SaleEvent, SaleId, SaleLine,
};

use super::postings::Postings;
use super::{
    CustomerDirectory, Dispatcher, LogRejection, ServiceCatalog, authorize, load_sale, load_stock_item, unlocked_board,
};
use crate::command_dispatcher::{DispatchError, Staged, UnitOfWork};
use crate::projections::{RecoveryLine, SaleSummary};
use crate::quota::{QuotaPeriod, TenantQuotas};

pub const DELIVERY_REASON: &str = "sale delivery";
pub const RETURN_REASON: &str = "sale cancellation";

#[derive(Debug, Clone)]
pub struct NewSale {
    pub customer_id: Option<CustomerId>,
    pub lines: Vec<SaleLine>,
    pub initial_payment: Option<NewPayment>,
}

/// Sale lifecycle: creation, payments, deliveries, cancellation and edits.
///
/// Every operation re-reads the campaign board and commits with a guard on
/// it, so a campaign opened concurrently makes the operation fail instead of
/// slipping through. Deliveries and returns post their stock movements in
/// the same unit of work as the sale events.
pub struct SaleLifecycleManager {
    dispatcher: Arc<Dispatcher>,
    engine: Arc<EntitlementEngine>,
    quotas: Arc<TenantQuotas>,
    customers: Arc<CustomerDirectory>,
    services: Arc<ServiceCatalog>,
    tax_rate: TaxRate,
}

impl SaleLifecycleManager {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        engine: Arc<EntitlementEngine>,
        quotas: Arc<TenantQuotas>,
        customers: Arc<CustomerDirectory>,
        services: Arc<ServiceCatalog>,
        tax_rate: TaxRate,
    ) -> Self {
        Self {
            dispatcher,
            engine,
            quotas,
            customers,
            services,
            tax_rate,
        }
    }

    #[instrument(skip_all, fields(tenant_id = %session.tenant_id()))]
    pub fn create_sale(&self, session: &Session, sale: NewSale) -> Result<SaleSummary, DispatchError> {
        self.try_create(session, sale).log_rejection("create_sale")
    }

    fn try_create(&self, session: &Session, sale: NewSale) -> Result<SaleSummary, DispatchError> {
        authorize(&self.engine, session, Action::Create, Resource::Sales)?;
        let tenant_id = session.tenant_id();
        let now = Utc::now();

        let board = unlocked_board(&self.dispatcher, tenant_id)?;
        self.check_references(tenant_id, sale.customer_id, &sale.lines)?;

        let reservation = self.quotas.try_reserve(
            tenant_id,
            QuotaResource::MonthlySales,
            QuotaPeriod::month_of(now),
            |count| self.engine.is_creation_allowed(session, Resource::Sales, count),
        )?;

        let sale_id = SaleId::generate();
        let mut staged = self.load_new(tenant_id, sale_id)?;
        staged.execute(&SaleCommand::Create(CreateSale {
            tenant_id,
            sale_id,
            customer_id: sale.customer_id,
            lines: sale.lines,
            tax_rate: self.tax_rate,
            initial_payment: sale.initial_payment,
            operator: session.user_id(),
            occurred_at: now,
        }))?;

        let mut uow = UnitOfWork::new(tenant_id);
        uow.guard(&board)?;
        let sale = uow.stage(staged)?;
        self.dispatcher.commit(uow)?;
        reservation.confirm();

        info!(sale_id = %sale_id, version = sale.version(), total_ttc = %sale.total_ttc(), "sale created");
        Ok(SaleSummary::from(&sale))
    }

    #[instrument(skip_all, fields(tenant_id = %session.tenant_id(), sale_id = %sale_id))]
    pub fn record_payment(
        &self,
        session: &Session,
        sale_id: SaleId,
        payment: NewPayment,
    ) -> Result<SaleSummary, DispatchError> {
        self.try_record_payment(session, sale_id, payment)
            .log_rejection("record_payment")
    }

    fn try_record_payment(
        &self,
        session: &Session,
        sale_id: SaleId,
        payment: NewPayment,
    ) -> Result<SaleSummary, DispatchError> {
        authorize(&self.engine, session, Action::Create, Resource::Payments)?;
        let tenant_id = session.tenant_id();
        let board = unlocked_board(&self.dispatcher, tenant_id)?;

        let mut staged = load_sale(&self.dispatcher, tenant_id, sale_id)?;
        staged.execute(&SaleCommand::RecordPayment(RecordPayment {
            tenant_id,
            sale_id,
            payment,
            operator: session.user_id(),
            occurred_at: Utc::now(),
        }))?;

        self.commit_sale(tenant_id, &board, staged, None, "payment recorded")
    }

    /// Deliver stock-backed items: one `OUT` per entry, all or nothing.
    #[instrument(skip_all, fields(tenant_id = %session.tenant_id(), sale_id = %sale_id))]
    pub fn record_delivery(
        &self,
        session: &Session,
        sale_id: SaleId,
        deliveries: Vec<ItemQuantity>,
    ) -> Result<SaleSummary, DispatchError> {
        self.try_record_delivery(session, sale_id, deliveries)
            .log_rejection("record_delivery")
    }

    fn try_record_delivery(
        &self,
        session: &Session,
        sale_id: SaleId,
        deliveries: Vec<ItemQuantity>,
    ) -> Result<SaleSummary, DispatchError> {
        authorize(&self.engine, session, Action::Edit, Resource::Sales)?;
        let tenant_id = session.tenant_id();
        let now = Utc::now();
        let board = unlocked_board(&self.dispatcher, tenant_id)?;

        let mut staged = load_sale(&self.dispatcher, tenant_id, sale_id)?;
        let events = staged
            .execute(&SaleCommand::RecordDelivery(RecordDelivery {
                tenant_id,
                sale_id,
                deliveries,
                operator: session.user_id(),
                occurred_at: now,
            }))?
            .to_vec();

        let reference = sale_id.to_string();
        let mut postings = Postings::new(&self.dispatcher, tenant_id, session.user_id(), now);
        for event in &events {
            if let SaleEvent::ItemsDelivered(delivered) = event {
                for transfer in &delivered.deliveries {
                    postings.post(
                        transfer.stock_item_id,
                        MovementKind::Out,
                        transfer.quantity,
                        DELIVERY_REASON,
                        Some(&reference),
                    )?;
                }
            }
        }

        self.commit_sale(tenant_id, &board, staged, Some(postings), "items delivered")
    }

    /// Cancel, returning delivered quantities to stock. Irreversible.
    #[instrument(skip_all, fields(tenant_id = %session.tenant_id(), sale_id = %sale_id))]
    pub fn cancel_sale(
        &self,
        session: &Session,
        sale_id: SaleId,
        reason: &str,
        returns: Vec<ItemQuantity>,
    ) -> Result<SaleSummary, DispatchError> {
        self.try_cancel(session, sale_id, reason, returns)
            .log_rejection("cancel_sale")
    }

    fn try_cancel(
        &self,
        session: &Session,
        sale_id: SaleId,
        reason: &str,
        returns: Vec<ItemQuantity>,
    ) -> Result<SaleSummary, DispatchError> {
        authorize(&self.engine, session, Action::Delete, Resource::Sales)?;
        let tenant_id = session.tenant_id();
        let now = Utc::now();
        let board = unlocked_board(&self.dispatcher, tenant_id)?;

        let mut staged = load_sale(&self.dispatcher, tenant_id, sale_id)?;
        let events = staged
            .execute(&SaleCommand::Cancel(CancelSale {
                tenant_id,
                sale_id,
                reason: reason.to_string(),
                returns,
                operator: session.user_id(),
                occurred_at: now,
            }))?
            .to_vec();

        let reference = sale_id.to_string();
        let mut postings = Postings::new(&self.dispatcher, tenant_id, session.user_id(), now);
        for event in &events {
            if let SaleEvent::Cancelled(cancelled) = event {
                let movement_reason = format!("{RETURN_REASON}: {}", cancelled.reason);
                for transfer in &cancelled.returns {
                    postings.post(
                        transfer.stock_item_id,
                        MovementKind::In,
                        transfer.quantity,
                        &movement_reason,
                        Some(&reference),
                    )?;
                }
            }
        }

        self.commit_sale(tenant_id, &board, staged, Some(postings), "sale cancelled")
    }

    /// Replace items (and customer) while nothing was paid or delivered.
    #[instrument(skip_all, fields(tenant_id = %session.tenant_id(), sale_id = %sale_id))]
    pub fn edit_sale(
        &self,
        session: &Session,
        sale_id: SaleId,
        customer_id: Option<CustomerId>,
        lines: Vec<SaleLine>,
    ) -> Result<SaleSummary, DispatchError> {
        self.try_edit(session, sale_id, customer_id, lines)
            .log_rejection("edit_sale")
    }

    fn try_edit(
        &self,
        session: &Session,
        sale_id: SaleId,
        customer_id: Option<CustomerId>,
        lines: Vec<SaleLine>,
    ) -> Result<SaleSummary, DispatchError> {
        authorize(&self.engine, session, Action::Edit, Resource::Sales)?;
        let tenant_id = session.tenant_id();
        let board = unlocked_board(&self.dispatcher, tenant_id)?;

        let mut staged = load_sale(&self.dispatcher, tenant_id, sale_id)?;
        self.check_references(tenant_id, customer_id, &lines)?;
        staged.execute(&SaleCommand::Edit(EditSale {
            tenant_id,
            sale_id,
            customer_id,
            lines,
            operator: session.user_id(),
            occurred_at: Utc::now(),
        }))?;

        self.commit_sale(tenant_id, &board, staged, None, "sale edited")
    }

    pub fn get(&self, session: &Session, sale_id: SaleId) -> Result<SaleSummary, DispatchError> {
        authorize(&self.engine, session, Action::View, Resource::Sales)?;
        self.dispatcher
            .bus()
            .sales()
            .get(session.tenant_id(), &sale_id)
            .ok_or_else(|| DomainError::not_found(format!("sale {sale_id}")).into())
    }

    pub fn list(&self, session: &Session) -> Result<Vec<SaleSummary>, DispatchError> {
        authorize(&self.engine, session, Action::View, Resource::Sales)?;
        Ok(self.dispatcher.bus().sales().list(session.tenant_id()))
    }

    /// Outstanding balances per customer.
    pub fn recovery(&self, session: &Session) -> Result<Vec<RecoveryLine>, DispatchError> {
        authorize(&self.engine, session, Action::View, Resource::Recovery)?;
        Ok(self.dispatcher.bus().sales().recovery(session.tenant_id()))
    }

    fn load_new(&self, tenant_id: TenantId, sale_id: SaleId) -> Result<Staged<Sale>, DispatchError> {
        self.dispatcher
            .load(tenant_id, sale_id.0, |id| Sale::empty(SaleId::new(id)))
    }

    /// Customer, stock items and services referenced by a cart must exist
    /// in the tenant.
    fn check_references(
        &self,
        tenant_id: TenantId,
        customer_id: Option<CustomerId>,
        lines: &[SaleLine],
    ) -> Result<(), DispatchError> {
        if let Some(customer_id) = customer_id {
            self.customers.ensure_exists(tenant_id, customer_id)?;
        }

        let products: HashSet<ProductRef> = lines.iter().map(|l| l.product).collect();
        for product in products {
            match product {
                ProductRef::Stock(id) => {
                    load_stock_item(&self.dispatcher, tenant_id, id)?;
                }
                ProductRef::Service(id) => self.services.ensure_exists(tenant_id, id)?,
            }
        }
        Ok(())
    }

    fn commit_sale(
        &self,
        tenant_id: TenantId,
        board: &Staged<CampaignBoard>,
        staged: Staged<Sale>,
        postings: Option<Postings<'_>>,
        what: &'static str,
    ) -> Result<SaleSummary, DispatchError> {
        let mut uow = UnitOfWork::new(tenant_id);
        uow.guard(board)?;
        let sale = uow.stage(staged)?;
        if let Some(postings) = postings {
            postings.stage_into(&mut uow)?;
        }
        self.dispatcher.commit(uow)?;

        info!(version = sale.version(), status = ?sale.status(), "{what}");
        Ok(SaleSummary::from(&sale))
    }
}
