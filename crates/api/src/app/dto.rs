use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use comptoir_core::{CustomerId, DomainError, Money};
use comptoir_infra::services::{MovementRequest, NewCustomer, NewService, ReceiptLine};
use comptoir_inventory::{AdjustmentDirection, MovementKind, MovementType, StockItemId};
use comptoir_sales::{ItemQuantity, NewPayment, PaymentId, PaymentMethod, ProductRef, SaleLine};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterCustomerRequest {
    pub name: String,
    pub phone: Option<String>,
}

impl From<RegisterCustomerRequest> for NewCustomer {
    fn from(r: RegisterCustomerRequest) -> Self {
        NewCustomer {
            name: r.name,
            phone: r.phone,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterServiceRequest {
    pub name: String,
    pub unit_price: i64,
}

impl From<RegisterServiceRequest> for NewService {
    fn from(r: RegisterServiceRequest) -> Self {
        NewService {
            name: r.name,
            unit_price: Money::new(r.unit_price),
        }
    }
}

/// `{"product": {"kind": "STOCK" | "SERVICE", "id": ...}, "quantity", "unitPrice"}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleItemRequest {
    pub product: ProductRef,
    pub quantity: u64,
    pub unit_price: i64,
}

impl From<SaleItemRequest> for SaleLine {
    fn from(r: SaleItemRequest) -> Self {
        SaleLine {
            product: r.product,
            quantity: r.quantity,
            unit_price: Money::new(r.unit_price),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleRequest {
    pub customer_id: Option<String>,
    pub items: Vec<SaleItemRequest>,
    #[serde(default)]
    pub amount_paid: i64,
    pub payment_method: Option<PaymentMethod>,
    pub payment_reference: Option<String>,
}

impl CreateSaleRequest {
    /// A zero `amountPaid` means no initial payment.
    pub fn initial_payment(&self) -> Option<NewPayment> {
        (self.amount_paid != 0).then(|| NewPayment {
            payment_id: PaymentId::new(),
            amount: Money::new(self.amount_paid),
            method: self.payment_method.unwrap_or(PaymentMethod::Cash),
            reference: self.payment_reference.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditSaleRequest {
    pub customer_id: Option<String>,
    pub items: Vec<SaleItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub amount: i64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
}

impl From<RecordPaymentRequest> for NewPayment {
    fn from(r: RecordPaymentRequest) -> Self {
        NewPayment {
            payment_id: PaymentId::new(),
            amount: Money::new(r.amount),
            method: r.method,
            reference: r.reference,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryLineRequest {
    pub item_id: u32,
    pub qty_to_deliver: u64,
}

#[derive(Debug, Deserialize)]
pub struct RecordDeliveryRequest {
    pub items: Vec<DeliveryLineRequest>,
}

impl RecordDeliveryRequest {
    pub fn deliveries(&self) -> Vec<ItemQuantity> {
        self.items
            .iter()
            .map(|l| ItemQuantity {
                item_id: l.item_id,
                quantity: l.qty_to_deliver,
            })
            .collect()
    }
}

/// `returnToStockMap` maps a sale item id to the quantity going back to stock.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelSaleRequest {
    pub reason: String,
    #[serde(default)]
    pub return_to_stock_map: BTreeMap<u32, u64>,
}

impl CancelSaleRequest {
    pub fn returns(&self) -> Vec<ItemQuantity> {
        self.return_to_stock_map
            .iter()
            .map(|(item_id, quantity)| ItemQuantity {
                item_id: *item_id,
                quantity: *quantity,
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateStockItemRequest {
    pub name: String,
    pub sku: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMovementRequest {
    pub stock_item_id: String,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    /// Required for `ADJUSTMENT`.
    pub direction: Option<AdjustmentDirection>,
    pub quantity: u64,
    pub reason: String,
    pub reference_id: Option<String>,
}

impl PostMovementRequest {
    pub fn into_request(self) -> Result<MovementRequest, DomainError> {
        let kind = match (self.movement_type, self.direction) {
            (MovementType::In, _) => MovementKind::In,
            (MovementType::Out, _) => MovementKind::Out,
            (MovementType::Adjustment, Some(direction)) => MovementKind::Adjustment(direction),
            (MovementType::Adjustment, None) => {
                return Err(DomainError::validation("an adjustment needs a direction"));
            }
        };
        Ok(MovementRequest {
            stock_item_id: StockItemId::from_str(&self.stock_item_id)?,
            kind,
            quantity: self.quantity,
            reason: self.reason,
            reference_id: self.reference_id,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkReceiptLineRequest {
    pub product_id: String,
    pub quantity: u64,
}

#[derive(Debug, Deserialize)]
pub struct BulkReceiveRequest {
    pub items: Vec<BulkReceiptLineRequest>,
    pub reason: String,
    pub reference: Option<String>,
}

impl BulkReceiveRequest {
    pub fn lines(&self) -> Result<Vec<ReceiptLine>, DomainError> {
        self.items
            .iter()
            .map(|l| {
                Ok(ReceiptLine {
                    stock_item_id: StockItemId::from_str(&l.product_id)?,
                    quantity: l.quantity,
                })
            })
            .collect()
    }
}

/// Query string of `GET /stock/movements` and `GET /stock/movements/stats`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementsQueryParams {
    pub stock_item_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct OpenCampaignRequest {
    pub label: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountLineRequest {
    pub stock_item_id: String,
    pub counted: u64,
}

#[derive(Debug, Deserialize)]
pub struct CloseCampaignRequest {
    #[serde(default)]
    pub counts: Vec<CountLineRequest>,
}

impl CloseCampaignRequest {
    pub fn counts(&self) -> Result<Vec<(StockItemId, u64)>, DomainError> {
        self.counts
            .iter()
            .map(|c| Ok((StockItemId::from_str(&c.stock_item_id)?, c.counted)))
            .collect()
    }
}

// -------------------------
// Parsing helpers
// -------------------------

/// Parse a path or body id, answering `400 invalid_id` on failure.
pub fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, axum::response::Response> {
    raw.parse().map_err(|_| errors::invalid_id(what))
}

pub fn parse_customer(raw: Option<&str>) -> Result<Option<CustomerId>, axum::response::Response> {
    raw.map(|id| parse_id(id, "customer")).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_amount_paid_means_no_initial_payment() {
        let req: CreateSaleRequest = serde_json::from_value(serde_json::json!({
            "items": [],
            "amountPaid": 0,
            "paymentMethod": "CASH"
        }))
        .unwrap();
        assert!(req.initial_payment().is_none());
    }

    #[test]
    fn return_map_keys_are_item_ids_and_zeros_are_kept() {
        let req: CancelSaleRequest = serde_json::from_value(serde_json::json!({
            "reason": "client absent",
            "returnToStockMap": { "1": 2, "3": 0 }
        }))
        .unwrap();
        assert_eq!(
            req.returns(),
            vec![
                ItemQuantity { item_id: 1, quantity: 2 },
                ItemQuantity { item_id: 3, quantity: 0 },
            ]
        );
    }

    #[test]
    fn adjustment_requires_a_direction() {
        let req: PostMovementRequest = serde_json::from_value(serde_json::json!({
            "stockItemId": StockItemId::generate().to_string(),
            "type": "ADJUSTMENT",
            "quantity": 2,
            "reason": "casse"
        }))
        .unwrap();
        assert!(matches!(req.into_request(), Err(DomainError::Validation(_))));
    }
}
