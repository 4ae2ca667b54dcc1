use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use comptoir_core::{TenantId, UserId};

use crate::StockItemId;

/// Identifier of one ledger entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovementId(Uuid);

impl MovementId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MovementId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for MovementId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    In,
    Out,
    Adjustment,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentDirection {
    Increase,
    Decrease,
}

/// What a posting does to the level: `IN` adds, `OUT` removes, an
/// adjustment goes either way.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    In,
    Out,
    Adjustment(AdjustmentDirection),
}

impl MovementKind {
    pub fn movement_type(self) -> MovementType {
        match self {
            MovementKind::In => MovementType::In,
            MovementKind::Out => MovementType::Out,
            MovementKind::Adjustment(_) => MovementType::Adjustment,
        }
    }

    pub fn is_decrease(self) -> bool {
        matches!(
            self,
            MovementKind::Out | MovementKind::Adjustment(AdjustmentDirection::Decrease)
        )
    }

    /// Adjustment that moves `from` to `to`; `None` when they are equal.
    pub fn adjustment_between(from: u64, to: u64) -> Option<(MovementKind, u64)> {
        match to.cmp(&from) {
            core::cmp::Ordering::Equal => None,
            core::cmp::Ordering::Greater => {
                Some((MovementKind::Adjustment(AdjustmentDirection::Increase), to - from))
            }
            core::cmp::Ordering::Less => {
                Some((MovementKind::Adjustment(AdjustmentDirection::Decrease), from - to))
            }
        }
    }
}

/// Immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub tenant_id: TenantId,
    pub movement_id: MovementId,
    pub stock_item_id: StockItemId,
    pub movement_type: MovementType,
    /// Always > 0.
    pub quantity: u64,
    /// Signed change applied to the level.
    pub delta: i64,
    pub resulting_level: u64,
    pub reason: String,
    pub reference_id: Option<String>,
    pub operator: UserId,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    pub fn quantity_in(&self) -> u64 {
        if self.delta > 0 { self.quantity } else { 0 }
    }

    pub fn quantity_out(&self) -> u64 {
        if self.delta < 0 { self.quantity } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjustment_direction_follows_the_count() {
        assert_eq!(MovementKind::adjustment_between(10, 10), None);
        assert_eq!(
            MovementKind::adjustment_between(10, 13),
            Some((MovementKind::Adjustment(AdjustmentDirection::Increase), 3))
        );
        let (kind, qty) = MovementKind::adjustment_between(10, 4).unwrap();
        assert!(kind.is_decrease());
        assert_eq!(qty, 6);
    }
}
