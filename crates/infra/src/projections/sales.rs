use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use comptoir_core::{Aggregate, CustomerId, Money, TenantId};
use comptoir_events::EventEnvelope;
use comptoir_sales::{Payment, Sale, SaleEvent, SaleId, SaleItem, SaleStatus, compute_rates};

use super::cursor::StreamCursors;
use super::{ProjectionError, decode};
use crate::read_model::TenantStore;

/// Queryable view of one sale, including derived rates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaleSummary {
    pub id: SaleId,
    pub status: SaleStatus,
    pub customer_id: Option<CustomerId>,
    pub items: Vec<SaleItem>,
    pub subtotal: Money,
    pub total_ttc: Money,
    pub amount_paid: Money,
    pub outstanding: Money,
    pub pay_rate: u8,
    pub deliv_rate: u8,
    pub payments: Vec<Payment>,
    pub cancel_reason: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&Sale> for SaleSummary {
    fn from(sale: &Sale) -> Self {
        let rates = compute_rates(sale);
        Self {
            id: sale.id_typed(),
            status: sale.status(),
            customer_id: sale.customer_id(),
            items: sale.items().to_vec(),
            subtotal: sale.subtotal(),
            total_ttc: sale.total_ttc(),
            amount_paid: sale.amount_paid(),
            outstanding: sale.outstanding(),
            pay_rate: rates.pay_rate,
            deliv_rate: rates.deliv_rate,
            payments: sale.payments().to_vec(),
            cancel_reason: sale.cancel_reason().map(str::to_string),
            created_at: sale.created_at(),
        }
    }
}

/// Outstanding balance of one customer (`None` = walk-in sales).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryLine {
    pub customer_id: Option<CustomerId>,
    pub outstanding: Money,
    pub open_sales: u32,
}

/// Sales read model: folds every sale stream into its current state.
#[derive(Debug)]
pub struct SalesProjection<S>
where
    S: TenantStore<SaleId, Sale>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> SalesProjection<S>
where
    S: TenantStore<SaleId, Sale>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::default(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, id: &SaleId) -> Option<SaleSummary> {
        self.store.get(tenant_id, id).map(|s| SaleSummary::from(&s))
    }

    /// Most recent first.
    pub fn list(&self, tenant_id: TenantId) -> Vec<SaleSummary> {
        let mut sales: Vec<SaleSummary> = self.store.list(tenant_id).iter().map(SaleSummary::from).collect();
        sales.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        sales
    }

    /// Outstanding balances per customer over non-cancelled sales that are
    /// not fully paid, largest balance first.
    pub fn recovery(&self, tenant_id: TenantId) -> Vec<RecoveryLine> {
        let mut lines: BTreeMap<Option<CustomerId>, RecoveryLine> = BTreeMap::new();
        for sale in self.store.list(tenant_id) {
            if sale.status() == SaleStatus::Annule || !sale.outstanding().is_positive() {
                continue;
            }
            let line = lines.entry(sale.customer_id()).or_insert(RecoveryLine {
                customer_id: sale.customer_id(),
                outstanding: Money::ZERO,
                open_sales: 0,
            });
            line.outstanding += sale.outstanding();
            line.open_sales += 1;
        }

        let mut lines: Vec<RecoveryLine> = lines.into_values().collect();
        lines.sort_by(|a, b| b.outstanding.cmp(&a.outstanding));
        lines
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        self.cursors.advance(envelope, || {
            let tenant_id = envelope.tenant_id();
            let event: SaleEvent = decode(envelope)?;

            let sale_id = SaleId::new(envelope.aggregate_id());
            let mut sale = self.store.get(tenant_id, &sale_id).unwrap_or_else(|| Sale::empty(sale_id));
            sale.apply(&event);

            if sale.tenant_id() != Some(tenant_id) {
                return Err(ProjectionError::TenantIsolation(
                    "sale tenant_id does not match envelope tenant_id".to_string(),
                ));
            }

            self.store.upsert(tenant_id, sale_id, sale);
            Ok(())
        })
    }
}
