//! Sales domain (event-sourced): the `Sale` aggregate with its items,
//! payments, deliveries, cancellation and edits, plus TTC pricing and the
//! derived payment/delivery rates.
//!
//! Stock effects of a sale are expressed as events (`ItemsDelivered`,
//! `SaleCancelled` returns); turning them into ledger postings is the job of
//! the lifecycle manager in `comptoir-infra`.

pub mod item;
pub mod payment;
pub mod pricing;
pub mod rates;
pub mod sale;

pub use item::{ItemQuantity, ProductRef, SaleItem, SaleLine, ServiceId, StockTransfer};
pub use payment::{NewPayment, Payment, PaymentId, PaymentMethod};
pub use pricing::{price_lines, Pricing};
pub use rates::{compute_rates, SaleRates};
pub use sale::{
    CancelSale, CreateSale, EditSale, ItemsDelivered, PaymentRecorded, RecordDelivery,
    RecordPayment, Sale, SaleCancelled, SaleCommand, SaleCompleted, SaleCreated, SaleEdited,
    SaleEvent, SaleId, SaleStatus,
};
