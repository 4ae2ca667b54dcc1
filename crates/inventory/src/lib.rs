//! Inventory domain (event-sourced): the per-item stock ledger and the
//! per-tenant inventory campaign board.
//!
//! Pure decision logic only; persistence, locking across aggregates and
//! projections live in `comptoir-infra`.

pub mod campaign;
pub mod ledger;
pub mod movement;

pub use campaign::{
    Campaign, CampaignBoard, CampaignClosed, CampaignCommand, CampaignEvent, CampaignId,
    CampaignOpened, CampaignStatus, CloseCampaign, OpenCampaign,
};
pub use ledger::{
    CreateStockItem, MovementPosted, PostMovement, StockItem, StockItemCommand, StockItemCreated,
    StockItemEvent, StockItemId,
};
pub use movement::{AdjustmentDirection, MovementId, MovementKind, MovementType, StockMovement};
