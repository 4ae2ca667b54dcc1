use serde::{Deserialize, Serialize};
use uuid::Uuid;

use comptoir_core::{DomainError, Money};
use comptoir_inventory::StockItemId;

/// Identifier of a service in the tenant's service catalogue.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(Uuid);

impl ServiceId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ServiceId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for ServiceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl core::str::FromStr for ServiceId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::invalid_id(format!("service id '{s}': {e}")))
    }
}

/// What a sale item sells: a physical stock item or a service.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductRef {
    Stock(StockItemId),
    Service(ServiceId),
}

impl ProductRef {
    pub fn stock_item(&self) -> Option<StockItemId> {
        match self {
            ProductRef::Stock(id) => Some(*id),
            ProductRef::Service(_) => None,
        }
    }

    pub fn is_service(&self) -> bool {
        matches!(self, ProductRef::Service(_))
    }
}

/// A requested line, before the aggregate numbers it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub product: ProductRef,
    pub quantity: u64,
    pub unit_price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleItem {
    /// Line number within the sale, starting at 1.
    pub id: u32,
    pub product: ProductRef,
    pub quantity: u64,
    pub unit_price: Money,
    /// Always 0 for service-backed items.
    pub quantity_delivered: u64,
}

impl SaleItem {
    pub fn remaining(&self) -> u64 {
        self.quantity.saturating_sub(self.quantity_delivered)
    }

    pub fn is_fully_delivered(&self) -> bool {
        self.product.is_service() || self.quantity_delivered >= self.quantity
    }
}

/// `{ item id -> quantity }` entry of a delivery or a return.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemQuantity {
    pub item_id: u32,
    pub quantity: u64,
}

/// Stock that leaves (delivery) or re-enters (return) a ledger.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTransfer {
    pub item_id: u32,
    pub stock_item_id: StockItemId,
    pub quantity: u64,
}

/// Number lines `1..n` after validating quantity and price.
pub(crate) fn number_lines(lines: &[SaleLine]) -> Result<Vec<SaleItem>, DomainError> {
    if lines.is_empty() {
        return Err(DomainError::validation("a sale needs at least one item"));
    }
    lines
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            if line.quantity == 0 {
                return Err(DomainError::validation(format!(
                    "item {}: quantity must be greater than zero",
                    idx + 1
                )));
            }
            if line.unit_price.is_negative() {
                return Err(DomainError::validation(format!(
                    "item {}: unit price cannot be negative",
                    idx + 1
                )));
            }
            let id = u32::try_from(idx + 1)
                .map_err(|_| DomainError::validation("too many items in one sale"))?;
            Ok(SaleItem {
                id,
                product: line.product,
                quantity: line.quantity,
                unit_price: line.unit_price,
                quantity_delivered: 0,
            })
        })
        .collect()
}
