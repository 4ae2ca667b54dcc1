use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use comptoir_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, UserId};
use comptoir_events::Event;

use crate::{MovementId, MovementKind, StockMovement};

/// Stock item identifier (one ledger stream per item).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockItemId(pub AggregateId);

impl StockItemId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn generate() -> Self {
        Self(AggregateId::new())
    }
}

impl core::fmt::Display for StockItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl core::str::FromStr for StockItemId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Aggregate root: one stock item and its movement ledger.
///
/// The level is never stored independently: it is the fold of the
/// `MovementPosted` events, so it always equals the signed sum of movements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockItem {
    id: StockItemId,
    tenant_id: Option<TenantId>,
    name: String,
    sku: Option<String>,
    level: u64,
    movement_count: u64,
    last_movement_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl StockItem {
    /// Not-yet-created instance for rehydration.
    pub fn empty(id: StockItemId) -> Self {
        Self {
            id,
            tenant_id: None,
            name: String::new(),
            sku: None,
            level: 0,
            movement_count: 0,
            last_movement_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> StockItemId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sku(&self) -> Option<&str> {
        self.sku.as_deref()
    }

    pub fn level(&self) -> u64 {
        self.level
    }

    pub fn movement_count(&self) -> u64 {
        self.movement_count
    }

    pub fn last_movement_at(&self) -> Option<DateTime<Utc>> {
        self.last_movement_at
    }

    /// Existence check scoped to the caller's tenant.
    pub fn ensure_exists_for(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created || self.tenant_id != Some(tenant_id) {
            return Err(DomainError::not_found(format!("stock item {}", self.id)));
        }
        Ok(())
    }
}

impl AggregateRoot for StockItem {
    type Id = StockItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateStockItem {
    pub tenant_id: TenantId,
    pub stock_item_id: StockItemId,
    pub name: String,
    pub sku: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMovement {
    pub tenant_id: TenantId,
    pub stock_item_id: StockItemId,
    pub movement_id: MovementId,
    pub kind: MovementKind,
    pub quantity: u64,
    pub reason: String,
    pub reference_id: Option<String>,
    pub operator: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockItemCommand {
    CreateStockItem(CreateStockItem),
    PostMovement(PostMovement),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockItemCreated {
    pub tenant_id: TenantId,
    pub stock_item_id: StockItemId,
    pub name: String,
    pub sku: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementPosted {
    pub movement: StockMovement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockItemEvent {
    StockItemCreated(StockItemCreated),
    MovementPosted(MovementPosted),
}

impl Event for StockItemEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockItemEvent::StockItemCreated(_) => "inventory.stock_item.created",
            StockItemEvent::MovementPosted(_) => "inventory.stock_item.movement_posted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockItemEvent::StockItemCreated(e) => e.occurred_at,
            StockItemEvent::MovementPosted(e) => e.movement.created_at,
        }
    }
}

impl Aggregate for StockItem {
    type Command = StockItemCommand;
    type Event = StockItemEvent;
    type Error = DomainError;

    const AGGREGATE_TYPE: &'static str = "inventory.stock_item";

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StockItemEvent::StockItemCreated(e) => {
                self.id = e.stock_item_id;
                self.tenant_id = Some(e.tenant_id);
                self.name = e.name.clone();
                self.sku = e.sku.clone();
                self.level = 0;
                self.created = true;
            }
            StockItemEvent::MovementPosted(e) => {
                self.level = e.movement.resulting_level;
                self.movement_count += 1;
                self.last_movement_at = Some(e.movement.created_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockItemCommand::CreateStockItem(cmd) => self.handle_create(cmd),
            StockItemCommand::PostMovement(cmd) => self.handle_post(cmd),
        }
    }
}

impl StockItem {
    fn handle_create(&self, cmd: &CreateStockItem) -> Result<Vec<StockItemEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("stock item already exists"));
        }
        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        let sku = cmd
            .sku
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(vec![StockItemEvent::StockItemCreated(StockItemCreated {
            tenant_id: cmd.tenant_id,
            stock_item_id: cmd.stock_item_id,
            name: name.to_string(),
            sku,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_post(&self, cmd: &PostMovement) -> Result<Vec<StockItemEvent>, DomainError> {
        self.ensure_exists_for(cmd.tenant_id)?;
        if self.id != cmd.stock_item_id {
            return Err(DomainError::validation("stock_item_id does not match the ledger"));
        }
        if cmd.quantity == 0 {
            return Err(DomainError::validation("quantity must be greater than zero"));
        }
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("reason cannot be empty"));
        }
        let magnitude = i64::try_from(cmd.quantity)
            .map_err(|_| DomainError::validation("quantity is too large"))?;

        let (delta, resulting_level) = if cmd.kind.is_decrease() {
            let level = self.level.checked_sub(cmd.quantity).ok_or_else(|| {
                DomainError::invalid_state(format!(
                    "insufficient stock for {}: level {}, requested {}",
                    self.id, self.level, cmd.quantity
                ))
            })?;
            (-magnitude, level)
        } else {
            let level = self
                .level
                .checked_add(cmd.quantity)
                .ok_or_else(|| DomainError::validation("stock level overflow"))?;
            (magnitude, level)
        };

        Ok(vec![StockItemEvent::MovementPosted(MovementPosted {
            movement: StockMovement {
                tenant_id: cmd.tenant_id,
                movement_id: cmd.movement_id,
                stock_item_id: self.id,
                movement_type: cmd.kind.movement_type(),
                quantity: cmd.quantity,
                delta,
                resulting_level,
                reason: cmd.reason.trim().to_string(),
                reference_id: cmd.reference_id.clone(),
                operator: cmd.operator,
                created_at: cmd.occurred_at,
            },
        })])
    }
}

#[cfg(test)]
mod tests {
    use comptoir_events::execute;

    use super::*;
    use crate::AdjustmentDirection;

    fn created_item(tenant_id: TenantId) -> StockItem {
        let id = StockItemId::generate();
        let mut item = StockItem::empty(id);
        execute(
            &mut item,
            &StockItemCommand::CreateStockItem(CreateStockItem {
                tenant_id,
                stock_item_id: id,
                name: "Ciment 50kg".to_string(),
                sku: Some(" CIM-50 ".to_string()),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        item
    }

    fn post(stock_item_id: StockItemId, tenant_id: TenantId, kind: MovementKind, quantity: u64) -> StockItemCommand {
        StockItemCommand::PostMovement(PostMovement {
            tenant_id,
            stock_item_id,
            movement_id: MovementId::new(),
            kind,
            quantity,
            reason: "test".to_string(),
            reference_id: None,
            operator: UserId::new(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn create_starts_at_zero_and_trims_sku() {
        let item = created_item(TenantId::new());
        let id = item.id_typed();
        assert!(item.exists());
        assert_eq!(item.level(), 0);
        assert_eq!(item.sku(), Some("CIM-50"));
        assert_eq!(item.version(), 1);
    }

    #[test]
    fn create_rejects_blank_name_and_duplicates() {
        let tenant_id = TenantId::new();
        let id = StockItemId::generate();
        let cmd = StockItemCommand::CreateStockItem(CreateStockItem {
            tenant_id,
            stock_item_id: id,
            name: "  ".to_string(),
            sku: None,
            occurred_at: Utc::now(),
        });
        let err = StockItem::empty(id).handle(&cmd).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let item = created_item(tenant_id);

        let id = item.id_typed();
        let again = StockItemCommand::CreateStockItem(CreateStockItem {
            tenant_id,
            stock_item_id: item.id_typed(),
            name: "dup".to_string(),
            sku: None,
            occurred_at: Utc::now(),
        });
        assert!(matches!(item.handle(&again).unwrap_err(), DomainError::Conflict(_)));
    }

    #[test]
    fn in_then_out_tracks_resulting_level() {
        let tenant_id = TenantId::new();
        let mut item = created_item(tenant_id);
        let id = item.id_typed();

        execute(&mut item, &post(id, tenant_id, MovementKind::In, 10)).unwrap();
        let events = execute(&mut item, &post(id, tenant_id, MovementKind::Out, 4)).unwrap();

        match &events[0] {
            StockItemEvent::MovementPosted(e) => {
                assert_eq!(e.movement.delta, -4);
                assert_eq!(e.movement.resulting_level, 6);
                assert_eq!(e.movement.quantity_out(), 4);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(item.level(), 6);
        assert_eq!(item.movement_count(), 2);
    }

    #[test]
    fn out_beyond_level_is_rejected_without_state_change() {
        let tenant_id = TenantId::new();
        let mut item = created_item(tenant_id);
        let id = item.id_typed();
        execute(&mut item, &post(id, tenant_id, MovementKind::In, 3)).unwrap();
        let before = item.clone();

        let err = execute(&mut item, &post(id, tenant_id, MovementKind::Out, 4)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
        let decrease = MovementKind::Adjustment(AdjustmentDirection::Decrease);
        assert!(execute(&mut item, &post(id, tenant_id, decrease, 4)).is_err());
        assert_eq!(item, before);
    }

    #[test]
    fn rejects_zero_quantity_and_blank_reason() {
        let tenant_id = TenantId::new();
        let item = created_item(tenant_id);
        let id = item.id_typed();
        let err = item.handle(&post(id, tenant_id, MovementKind::In, 0)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let mut cmd = post(id, tenant_id, MovementKind::In, 1);
        if let StockItemCommand::PostMovement(p) = &mut cmd {
            p.reason = " ".to_string();
        }
        assert!(matches!(item.handle(&cmd).unwrap_err(), DomainError::Validation(_)));
    }

    #[test]
    fn other_tenants_see_not_found() {
        let item = created_item(TenantId::new());
        let id = item.id_typed();
        let err = item.handle(&post(id, TenantId::new(), MovementKind::In, 1)).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        let missing = StockItem::empty(StockItemId::generate());
        let err = missing.handle(&post(missing.id_typed(), TenantId::new(), MovementKind::In, 1)).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    mod props {
        use proptest::prelude::*;

        use super::*;

        fn any_kind() -> impl Strategy<Value = MovementKind> {
            prop_oneof![
                Just(MovementKind::In),
                Just(MovementKind::Out),
                Just(MovementKind::Adjustment(AdjustmentDirection::Increase)),
                Just(MovementKind::Adjustment(AdjustmentDirection::Decrease)),
            ]
        }

        proptest! {
            #[test]
            fn level_is_the_signed_sum_of_accepted_movements(
                ops in proptest::collection::vec((any_kind(), 1u64..50), 0..60)
            ) {
                let tenant_id = TenantId::new();
                let mut item = created_item(tenant_id);
                let id = item.id_typed();
                let mut signed_sum: i64 = 0;

                for (kind, qty) in ops {
                    match execute(&mut item, &post(id, tenant_id, kind, qty)) {
                        Ok(events) => {
                            for ev in events {
                                if let StockItemEvent::MovementPosted(e) = ev {
                                    signed_sum += e.movement.delta;
                                    prop_assert_eq!(e.movement.resulting_level as i64, signed_sum);
                                }
                            }
                        }
                        Err(err) => prop_assert!(kind.is_decrease(), "unexpected rejection: {err}"),
                    }
                    prop_assert!(signed_sum >= 0);
                    prop_assert_eq!(item.level() as i64, signed_sum);
                }
            }
        }
    }
}
