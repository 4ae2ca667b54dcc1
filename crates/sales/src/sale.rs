use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use comptoir_core::{
    Aggregate, AggregateId, AggregateRoot, CustomerId, DomainError, Money, TaxRate, TenantId,
    UserId,
};
use comptoir_events::Event;

use crate::item::number_lines;
use crate::pricing::price_lines;
use crate::{ItemQuantity, NewPayment, Payment, SaleItem, SaleLine, StockTransfer};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SaleId(pub AggregateId);

impl SaleId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn generate() -> Self {
        Self(AggregateId::new())
    }
}

impl core::fmt::Display for SaleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl core::str::FromStr for SaleId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Sale lifecycle: `EN_COURS -> TERMINE`, `EN_COURS | TERMINE -> ANNULE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleStatus {
    EnCours,
    Termine,
    Annule,
}

/// Aggregate root: Sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sale {
    id: SaleId,
    tenant_id: Option<TenantId>,
    customer_id: Option<CustomerId>,
    status: SaleStatus,
    items: Vec<SaleItem>,
    tax_rate: TaxRate,
    subtotal: Money,
    total_ttc: Money,
    amount_paid: Money,
    payments: Vec<Payment>,
    created_by: Option<UserId>,
    created_at: Option<DateTime<Utc>>,
    cancel_reason: Option<String>,
    version: u64,
    created: bool,
}

impl Sale {
    /// Not-yet-created instance for rehydration.
    pub fn empty(id: SaleId) -> Self {
        Self {
            id,
            tenant_id: None,
            customer_id: None,
            status: SaleStatus::EnCours,
            items: Vec::new(),
            tax_rate: TaxRate::default(),
            subtotal: Money::ZERO,
            total_ttc: Money::ZERO,
            amount_paid: Money::ZERO,
            payments: Vec::new(),
            created_by: None,
            created_at: None,
            cancel_reason: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SaleId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn status(&self) -> SaleStatus {
        self.status
    }

    pub fn items(&self) -> &[SaleItem] {
        &self.items
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn total_ttc(&self) -> Money {
        self.total_ttc
    }

    pub fn amount_paid(&self) -> Money {
        self.amount_paid
    }

    pub fn outstanding(&self) -> Money {
        self.total_ttc - self.amount_paid
    }

    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    pub fn is_fully_paid(&self) -> bool {
        self.amount_paid >= self.total_ttc
    }

    pub fn is_fully_delivered(&self) -> bool {
        self.items.iter().all(SaleItem::is_fully_delivered)
    }

    /// Nothing paid and nothing delivered yet.
    pub fn is_untouched(&self) -> bool {
        self.amount_paid.is_zero() && self.items.iter().all(|i| i.quantity_delivered == 0)
    }
}

impl AggregateRoot for Sale {
    type Id = SaleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSale {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub customer_id: Option<CustomerId>,
    pub lines: Vec<SaleLine>,
    pub tax_rate: TaxRate,
    pub initial_payment: Option<NewPayment>,
    pub operator: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub payment: NewPayment,
    pub operator: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDelivery {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub deliveries: Vec<ItemQuantity>,
    pub operator: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelSale {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub reason: String,
    pub returns: Vec<ItemQuantity>,
    pub operator: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditSale {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub customer_id: Option<CustomerId>,
    pub lines: Vec<SaleLine>,
    pub operator: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleCommand {
    Create(CreateSale),
    RecordPayment(RecordPayment),
    RecordDelivery(RecordDelivery),
    Cancel(CancelSale),
    Edit(EditSale),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleCreated {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub customer_id: Option<CustomerId>,
    pub items: Vec<SaleItem>,
    pub tax_rate: TaxRate,
    pub subtotal: Money,
    pub total_ttc: Money,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecorded {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub payment: Payment,
    /// Running total after this payment.
    pub amount_paid: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemsDelivered {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub deliveries: Vec<StockTransfer>,
    pub operator: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleCompleted {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleCancelled {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub reason: String,
    pub returns: Vec<StockTransfer>,
    pub operator: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleEdited {
    pub tenant_id: TenantId,
    pub sale_id: SaleId,
    pub customer_id: Option<CustomerId>,
    pub items: Vec<SaleItem>,
    pub subtotal: Money,
    pub total_ttc: Money,
    pub operator: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleEvent {
    Created(SaleCreated),
    PaymentRecorded(PaymentRecorded),
    ItemsDelivered(ItemsDelivered),
    Completed(SaleCompleted),
    Cancelled(SaleCancelled),
    Edited(SaleEdited),
}

impl Event for SaleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SaleEvent::Created(_) => "sales.sale.created",
            SaleEvent::PaymentRecorded(_) => "sales.sale.payment_recorded",
            SaleEvent::ItemsDelivered(_) => "sales.sale.items_delivered",
            SaleEvent::Completed(_) => "sales.sale.completed",
            SaleEvent::Cancelled(_) => "sales.sale.cancelled",
            SaleEvent::Edited(_) => "sales.sale.edited",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SaleEvent::Created(e) => e.occurred_at,
            SaleEvent::PaymentRecorded(e) => e.payment.created_at,
            SaleEvent::ItemsDelivered(e) => e.occurred_at,
            SaleEvent::Completed(e) => e.occurred_at,
            SaleEvent::Cancelled(e) => e.occurred_at,
            SaleEvent::Edited(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Sale {
    type Command = SaleCommand;
    type Event = SaleEvent;
    type Error = DomainError;

    const AGGREGATE_TYPE: &'static str = "sales.sale";

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SaleEvent::Created(e) => {
                self.id = e.sale_id;
                self.tenant_id = Some(e.tenant_id);
                self.customer_id = e.customer_id;
                self.status = SaleStatus::EnCours;
                self.items = e.items.clone();
                self.tax_rate = e.tax_rate;
                self.subtotal = e.subtotal;
                self.total_ttc = e.total_ttc;
                self.amount_paid = Money::ZERO;
                self.created_by = Some(e.created_by);
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            SaleEvent::PaymentRecorded(e) => {
                self.amount_paid = e.amount_paid;
                self.payments.push(e.payment.clone());
            }
            SaleEvent::ItemsDelivered(e) => {
                for d in &e.deliveries {
                    if let Some(item) = self.items.iter_mut().find(|i| i.id == d.item_id) {
                        item.quantity_delivered += d.quantity;
                    }
                }
            }
            SaleEvent::Completed(_) => {
                self.status = SaleStatus::Termine;
            }
            SaleEvent::Cancelled(e) => {
                for r in &e.returns {
                    if let Some(item) = self.items.iter_mut().find(|i| i.id == r.item_id) {
                        item.quantity_delivered = item.quantity_delivered.saturating_sub(r.quantity);
                    }
                }
                self.status = SaleStatus::Annule;
                self.cancel_reason = Some(e.reason.clone());
            }
            SaleEvent::Edited(e) => {
                self.customer_id = e.customer_id;
                self.items = e.items.clone();
                self.subtotal = e.subtotal;
                self.total_ttc = e.total_ttc;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SaleCommand::Create(cmd) => self.handle_create(cmd),
            SaleCommand::RecordPayment(cmd) => self.handle_payment(cmd),
            SaleCommand::RecordDelivery(cmd) => self.handle_delivery(cmd),
            SaleCommand::Cancel(cmd) => self.handle_cancel(cmd),
            SaleCommand::Edit(cmd) => self.handle_edit(cmd),
        }
    }
}

impl Sale {
    fn ensure_exists_for(&self, tenant_id: TenantId, sale_id: SaleId) -> Result<(), DomainError> {
        if !self.created || self.tenant_id != Some(tenant_id) || self.id != sale_id {
            return Err(DomainError::not_found(format!("sale {sale_id}")));
        }
        Ok(())
    }

    fn ensure_not_cancelled(&self) -> Result<(), DomainError> {
        if self.status == SaleStatus::Annule {
            return Err(DomainError::invalid_state("sale is cancelled"));
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), DomainError> {
        self.ensure_not_cancelled()?;
        if self.status == SaleStatus::Termine {
            return Err(DomainError::invalid_state("sale is already completed"));
        }
        Ok(())
    }

    /// Appends `SaleCompleted` when `events` leave the sale paid and delivered.
    fn with_completion(
        &self,
        mut events: Vec<SaleEvent>,
        tenant_id: TenantId,
        occurred_at: DateTime<Utc>,
    ) -> Vec<SaleEvent> {
        let mut next = self.clone();
        for e in &events {
            next.apply(e);
        }
        if next.status == SaleStatus::EnCours && next.is_fully_paid() && next.is_fully_delivered() {
            events.push(SaleEvent::Completed(SaleCompleted {
                tenant_id,
                sale_id: self.id,
                occurred_at,
            }));
        }
        events
    }

    fn payment_event(
        &self,
        tenant_id: TenantId,
        paid_so_far: Money,
        total_ttc: Money,
        payment: &NewPayment,
        operator: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Result<SaleEvent, DomainError> {
        if !payment.amount.is_positive() {
            return Err(DomainError::validation("payment amount must be greater than zero"));
        }
        let amount_paid = paid_so_far
            .checked_add(payment.amount)
            .filter(|total| *total <= total_ttc)
            .ok_or_else(|| {
                DomainError::invalid_state(format!(
                    "payment of {} exceeds the outstanding balance of {}",
                    payment.amount,
                    total_ttc - paid_so_far
                ))
            })?;

        Ok(SaleEvent::PaymentRecorded(PaymentRecorded {
            tenant_id,
            sale_id: self.id,
            payment: Payment {
                payment_id: payment.payment_id,
                amount: payment.amount,
                method: payment.method,
                reference: payment.reference.clone(),
                operator,
                created_at: occurred_at,
            },
            amount_paid,
        }))
    }

    /// Resolve `{item -> qty}` entries against stock-backed items.
    ///
    /// `available` gives the upper bound of each entry for a given item.
    fn resolve_transfers(
        &self,
        entries: &[ItemQuantity],
        what: &str,
        available: impl Fn(&SaleItem) -> u64,
    ) -> Result<Vec<StockTransfer>, DomainError> {
        let mut seen = BTreeSet::new();
        entries
            .iter()
            .map(|entry| {
                if !seen.insert(entry.item_id) {
                    return Err(DomainError::validation(format!(
                        "item {} appears twice in the {what}",
                        entry.item_id
                    )));
                }
                let item = self
                    .items
                    .iter()
                    .find(|i| i.id == entry.item_id)
                    .ok_or_else(|| DomainError::not_found(format!("sale item {}", entry.item_id)))?;
                let stock_item_id = item.product.stock_item().ok_or_else(|| {
                    DomainError::validation(format!("item {} is a service and has no {what}", item.id))
                })?;
                if entry.quantity == 0 {
                    return Err(DomainError::validation(format!(
                        "item {}: {what} quantity must be greater than zero",
                        item.id
                    )));
                }
                let max = available(item);
                if entry.quantity > max {
                    return Err(DomainError::invalid_state(format!(
                        "item {}: {what} of {} exceeds the {} available",
                        item.id, entry.quantity, max
                    )));
                }
                Ok(StockTransfer {
                    item_id: item.id,
                    stock_item_id,
                    quantity: entry.quantity,
                })
            })
            .collect()
    }

    fn handle_create(&self, cmd: &CreateSale) -> Result<Vec<SaleEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("sale already exists"));
        }
        let items = number_lines(&cmd.lines)?;
        let pricing = price_lines(&items, cmd.tax_rate)?;

        let mut events = vec![SaleEvent::Created(SaleCreated {
            tenant_id: cmd.tenant_id,
            sale_id: cmd.sale_id,
            customer_id: cmd.customer_id,
            items,
            tax_rate: cmd.tax_rate,
            subtotal: pricing.subtotal,
            total_ttc: pricing.total_ttc,
            created_by: cmd.operator,
            occurred_at: cmd.occurred_at,
        })];

        if let Some(payment) = &cmd.initial_payment {
            if payment.amount.is_negative() {
                return Err(DomainError::validation("initial payment cannot be negative"));
            }
            if payment.amount.is_positive() {
                events.push(self.payment_event(
                    cmd.tenant_id,
                    Money::ZERO,
                    pricing.total_ttc,
                    payment,
                    cmd.operator,
                    cmd.occurred_at,
                )?);
            }
        }

        Ok(Sale::empty(cmd.sale_id).with_completion(events, cmd.tenant_id, cmd.occurred_at))
    }

    fn handle_payment(&self, cmd: &RecordPayment) -> Result<Vec<SaleEvent>, DomainError> {
        self.ensure_exists_for(cmd.tenant_id, cmd.sale_id)?;
        self.ensure_open()?;
        let event = self.payment_event(
            cmd.tenant_id,
            self.amount_paid,
            self.total_ttc,
            &cmd.payment,
            cmd.operator,
            cmd.occurred_at,
        )?;
        Ok(self.with_completion(vec![event], cmd.tenant_id, cmd.occurred_at))
    }

    fn handle_delivery(&self, cmd: &RecordDelivery) -> Result<Vec<SaleEvent>, DomainError> {
        self.ensure_exists_for(cmd.tenant_id, cmd.sale_id)?;
        self.ensure_open()?;
        if cmd.deliveries.is_empty() {
            return Err(DomainError::validation("nothing to deliver"));
        }
        let deliveries = self.resolve_transfers(&cmd.deliveries, "delivery", SaleItem::remaining)?;

        let event = SaleEvent::ItemsDelivered(ItemsDelivered {
            tenant_id: cmd.tenant_id,
            sale_id: self.id,
            deliveries,
            operator: cmd.operator,
            occurred_at: cmd.occurred_at,
        });
        Ok(self.with_completion(vec![event], cmd.tenant_id, cmd.occurred_at))
    }

    fn handle_cancel(&self, cmd: &CancelSale) -> Result<Vec<SaleEvent>, DomainError> {
        self.ensure_exists_for(cmd.tenant_id, cmd.sale_id)?;
        self.ensure_not_cancelled()?;
        let reason = cmd.reason.trim();
        if reason.is_empty() {
            return Err(DomainError::validation("a cancellation reason is required"));
        }
        let returns = self.resolve_transfers(&cmd.returns, "return", |i| i.quantity_delivered)?;

        Ok(vec![SaleEvent::Cancelled(SaleCancelled {
            tenant_id: cmd.tenant_id,
            sale_id: self.id,
            reason: reason.to_string(),
            returns,
            operator: cmd.operator,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_edit(&self, cmd: &EditSale) -> Result<Vec<SaleEvent>, DomainError> {
        self.ensure_exists_for(cmd.tenant_id, cmd.sale_id)?;
        if self.status != SaleStatus::EnCours {
            return Err(DomainError::invalid_state("only an open sale can be edited"));
        }
        if !self.is_untouched() {
            return Err(DomainError::invalid_state(
                "modification bloquée: the sale already has payments or deliveries",
            ));
        }
        let items = number_lines(&cmd.lines)?;
        let pricing = price_lines(&items, self.tax_rate)?;

        Ok(vec![SaleEvent::Edited(SaleEdited {
            tenant_id: cmd.tenant_id,
            sale_id: self.id,
            customer_id: cmd.customer_id,
            items,
            subtotal: pricing.subtotal,
            total_ttc: pricing.total_ttc,
            operator: cmd.operator,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use comptoir_events::execute;
    use comptoir_inventory::StockItemId;

    use super::*;
    use crate::{compute_rates, PaymentId, PaymentMethod, ProductRef, ServiceId};

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn stock_line(quantity: u64, unit_price: i64) -> SaleLine {
        SaleLine {
            product: ProductRef::Stock(StockItemId::generate()),
            quantity,
            unit_price: Money::new(unit_price),
        }
    }

    fn service_line(unit_price: i64) -> SaleLine {
        SaleLine {
            product: ProductRef::Service(ServiceId::new()),
            quantity: 1,
            unit_price: Money::new(unit_price),
        }
    }

    fn cash(amount: i64) -> NewPayment {
        NewPayment {
            payment_id: PaymentId::new(),
            amount: Money::new(amount),
            method: PaymentMethod::Cash,
            reference: None,
        }
    }

    fn create_cmd(tenant_id: TenantId, lines: Vec<SaleLine>, initial: Option<NewPayment>) -> SaleCommand {
        SaleCommand::Create(CreateSale {
            tenant_id,
            sale_id: SaleId::generate(),
            customer_id: None,
            lines,
            tax_rate: TaxRate::STANDARD,
            initial_payment: initial,
            operator: UserId::new(),
            occurred_at: Utc::now(),
        })
    }

    fn created(tenant_id: TenantId, lines: Vec<SaleLine>, initial: Option<NewPayment>) -> Sale {
        let cmd = create_cmd(tenant_id, lines, initial);
        let SaleCommand::Create(c) = &cmd else { unreachable!() };
        let mut sale = Sale::empty(c.sale_id);
        execute(&mut sale, &cmd).unwrap();
        sale
    }

    fn pay(sale_id: SaleId, tenant_id: TenantId, amount: i64) -> SaleCommand {
        SaleCommand::RecordPayment(RecordPayment {
            tenant_id,
            sale_id,
            payment: cash(amount),
            operator: UserId::new(),
            occurred_at: Utc::now(),
        })
    }

    fn deliver(sale_id: SaleId, tenant_id: TenantId, entries: &[(u32, u64)]) -> SaleCommand {
        SaleCommand::RecordDelivery(RecordDelivery {
            tenant_id,
            sale_id,
            deliveries: entries
                .iter()
                .map(|(item_id, quantity)| ItemQuantity { item_id: *item_id, quantity: *quantity })
                .collect(),
            operator: UserId::new(),
            occurred_at: Utc::now(),
        })
    }

    fn cancel(sale_id: SaleId, tenant_id: TenantId, reason: &str, returns: &[(u32, u64)]) -> SaleCommand {
        SaleCommand::Cancel(CancelSale {
            tenant_id,
            sale_id,
            reason: reason.to_string(),
            returns: returns
                .iter()
                .map(|(item_id, quantity)| ItemQuantity { item_id: *item_id, quantity: *quantity })
                .collect(),
            operator: UserId::new(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn create_prices_the_cart_and_numbers_items() {
        let tenant_id = test_tenant_id();
        let sale = created(tenant_id, vec![stock_line(10, 1_000)], None);
        let id = sale.id_typed();

        assert_eq!(sale.status(), SaleStatus::EnCours);
        assert_eq!(sale.subtotal(), Money::new(10_000));
        assert_eq!(sale.total_ttc(), Money::new(11_800));
        assert_eq!(sale.items()[0].id, 1);
        assert_eq!(sale.items()[0].quantity_delivered, 0);
        assert_eq!(sale.tenant_id(), Some(tenant_id));
    }

    #[test]
    fn create_rejects_empty_cart_and_bad_lines() {
        let tenant_id = test_tenant_id();
        let sale = Sale::empty(SaleId::generate());
        for lines in [vec![], vec![stock_line(0, 100)], vec![stock_line(1, -1)]] {
            let err = sale.handle(&create_cmd(tenant_id, lines, None)).unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)));
        }
    }

    #[test]
    fn initial_payment_is_the_first_payment_and_cannot_overpay() {
        let tenant_id = test_tenant_id();
        let sale = created(tenant_id, vec![stock_line(10, 1_000)], Some(cash(5_000)));
        let id = sale.id_typed();
        assert_eq!(sale.amount_paid(), Money::new(5_000));
        assert_eq!(sale.payments().len(), 1);

        let no_payment = created(tenant_id, vec![stock_line(1, 1_000)], Some(cash(0)));
        assert!(no_payment.payments().is_empty());

        let err = Sale::empty(SaleId::generate())
            .handle(&create_cmd(tenant_id, vec![stock_line(1, 1_000)], Some(cash(1_181))))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn fully_paid_service_sale_completes_at_creation() {
        let tenant_id = test_tenant_id();
        let sale = created(tenant_id, vec![service_line(1_000)], Some(cash(1_180)));
        let id = sale.id_typed();
        assert_eq!(sale.status(), SaleStatus::Termine);
        assert_eq!(compute_rates(&sale).deliv_rate, 100);
        assert_eq!(compute_rates(&sale).pay_rate, 100);
    }

    #[test]
    fn overpayment_is_rejected_without_state_change() {
        let tenant_id = test_tenant_id();
        let mut sale = created(tenant_id, vec![stock_line(10, 1_000)], None);
        let id = sale.id_typed();
        execute(&mut sale, &pay(id, tenant_id, 10_000)).unwrap();
        let before = sale.clone();

        let err = execute(&mut sale, &pay(id, tenant_id, 1_801)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
        assert_eq!(sale, before);

        let err = sale.handle(&pay(id, tenant_id, 0)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn over_delivery_is_rejected_then_exact_delivery_completes_rate() {
        let tenant_id = test_tenant_id();
        let mut sale = created(tenant_id, vec![stock_line(10, 1_000)], None);
        let id = sale.id_typed();
        assert_eq!(sale.total_ttc(), Money::new(11_800));

        execute(&mut sale, &deliver(id, tenant_id, &[(1, 4)])).unwrap();
        let before = sale.clone();
        let err = execute(&mut sale, &deliver(id, tenant_id, &[(1, 7)])).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
        assert_eq!(sale, before);

        let events = execute(&mut sale, &deliver(id, tenant_id, &[(1, 6)])).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(sale.items()[0].quantity_delivered, 10);
        assert_eq!(compute_rates(&sale).deliv_rate, 100);
        assert_eq!(sale.status(), SaleStatus::EnCours);
    }

    #[test]
    fn delivery_carries_stock_item_and_rejects_services_and_duplicates() {
        let tenant_id = test_tenant_id();
        let line = stock_line(5, 100);
        let stock_id = line.product.stock_item().unwrap();
        let sale = created(tenant_id, vec![line, service_line(100)], None);
        let id = sale.id_typed();

        let events = sale.handle(&deliver(id, tenant_id, &[(1, 2)])).unwrap();
        match &events[0] {
            SaleEvent::ItemsDelivered(e) => {
                assert_eq!(e.deliveries[0].stock_item_id, stock_id);
                assert_eq!(e.deliveries[0].quantity, 2);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let err = sale.handle(&deliver(id, tenant_id, &[(2, 1)])).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        let err = sale.handle(&deliver(id, tenant_id, &[(1, 1), (1, 1)])).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        let err = sale.handle(&deliver(id, tenant_id, &[(9, 1)])).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
        let err = sale.handle(&deliver(id, tenant_id, &[])).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn paid_and_delivered_sale_becomes_termine() {
        let tenant_id = test_tenant_id();
        let mut sale = created(tenant_id, vec![stock_line(2, 500), service_line(1_000)], None);
        let id = sale.id_typed();
        execute(&mut sale, &deliver(id, tenant_id, &[(1, 2)])).unwrap();
        let events = execute(&mut sale, &pay(id, tenant_id, 2_360)).unwrap();

        assert!(matches!(events.last(), Some(SaleEvent::Completed(_))));
        assert_eq!(sale.status(), SaleStatus::Termine);

        let err = sale.handle(&pay(id, tenant_id, 1)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));

        execute(&mut sale, &cancel(id, tenant_id, "client returned", &[(1, 1)])).unwrap();
        assert_eq!(sale.status(), SaleStatus::Annule);
    }

    #[test]
    fn cancellation_is_irreversible() {
        let tenant_id = test_tenant_id();
        let mut sale = created(tenant_id, vec![stock_line(3, 100)], None);
        let id = sale.id_typed();
        execute(&mut sale, &cancel(id, tenant_id, "erreur de saisie", &[])).unwrap();
        assert_eq!(sale.cancel_reason(), Some("erreur de saisie"));

        for cmd in [
            pay(id, tenant_id, 1),
            deliver(id, tenant_id, &[(1, 1)]),
            cancel(id, tenant_id, "again", &[]),
            SaleCommand::Edit(EditSale {
                tenant_id,
                sale_id: id,
                customer_id: None,
                lines: vec![stock_line(1, 100)],
                operator: UserId::new(),
                occurred_at: Utc::now(),
            }),
        ] {
            let err = sale.handle(&cmd).unwrap_err();
            assert!(matches!(err, DomainError::InvalidState(_)));
        }
        assert_eq!(sale.status(), SaleStatus::Annule);
        assert_eq!(sale.items()[0].quantity, 3);
    }

    #[test]
    fn cancel_returns_are_bounded_by_delivered_quantities() {
        let tenant_id = test_tenant_id();
        let mut sale = created(tenant_id, vec![stock_line(10, 100)], None);
        let id = sale.id_typed();
        execute(&mut sale, &deliver(id, tenant_id, &[(1, 4)])).unwrap();

        let err = sale.handle(&cancel(id, tenant_id, "retour", &[(1, 5)])).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
        let err = sale.handle(&cancel(id, tenant_id, "retour", &[(1, 0)])).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        let err = sale.handle(&cancel(id, tenant_id, "  ", &[])).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let events = execute(&mut sale, &cancel(id, tenant_id, "retour", &[(1, 4)])).unwrap();
        match &events[0] {
            SaleEvent::Cancelled(e) => assert_eq!(e.returns[0].quantity, 4),
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(sale.items()[0].quantity_delivered, 0);
    }

    #[test]
    fn edit_only_while_untouched() {
        let tenant_id = test_tenant_id();
        let mut sale = created(tenant_id, vec![stock_line(1, 100)], None);
        let id = sale.id_typed();
        let edit = |sale_id: SaleId, lines: Vec<SaleLine>| {
            SaleCommand::Edit(EditSale {
                tenant_id,
                sale_id,
                customer_id: Some(CustomerId::new()),
                lines,
                operator: UserId::new(),
                occurred_at: Utc::now(),
            })
        };

        execute(&mut sale, &edit(id, vec![stock_line(2, 1_000), service_line(500)])).unwrap();
        assert_eq!(sale.items().len(), 2);
        assert_eq!(sale.total_ttc(), Money::new(2_950));
        assert!(sale.customer_id().is_some());

        execute(&mut sale, &pay(id, tenant_id, 100)).unwrap();
        let err = sale.handle(&edit(id, vec![stock_line(1, 1)])).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(msg) if msg.contains("modification")));
    }

    #[test]
    fn foreign_tenant_cannot_see_the_sale() {
        let sale = created(test_tenant_id(), vec![stock_line(1, 100)], None);
        let id = sale.id_typed();
        let err = sale.handle(&pay(id, test_tenant_id(), 10)).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    mod props {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn amount_paid_stays_within_total(
                qty in 1u64..20,
                price in 0i64..5_000,
                attempts in proptest::collection::vec(1i64..20_000, 0..30),
            ) {
                let tenant_id = test_tenant_id();
                let mut sale = created(tenant_id, vec![stock_line(qty, price)], None);
                let id = sale.id_typed();
                for amount in attempts {
                    let before = sale.clone();
                    match execute(&mut sale, &pay(id, tenant_id, amount)) {
                        Ok(_) => prop_assert!(before.amount_paid() + Money::new(amount) <= sale.total_ttc()),
                        Err(_) => prop_assert_eq!(&sale, &before),
                    }
                    prop_assert!(!sale.amount_paid().is_negative());
                    prop_assert!(sale.amount_paid() <= sale.total_ttc());
                    let rates = compute_rates(&sale);
                    prop_assert!(rates.pay_rate <= 100 && rates.deliv_rate <= 100);
                }
            }

            #[test]
            fn delivered_never_exceeds_ordered(
                qty in 1u64..30,
                attempts in proptest::collection::vec(0u64..15, 0..20),
            ) {
                let tenant_id = test_tenant_id();
                let mut sale = created(tenant_id, vec![stock_line(qty, 100)], None);
                let id = sale.id_typed();
                for q in attempts {
                    let _ = execute(&mut sale, &deliver(id, tenant_id, &[(1, q)]));
                    let item = &sale.items()[0];
                    prop_assert!(item.quantity_delivered <= item.quantity);
                }
            }
        }
    }
}
