//! Command execution pipeline.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load events from store (tenant-scoped)
//!   ↓
//! 2. Rehydrate aggregate (apply history)
//!   ↓
//! 3. Handle command (pure decision, produces events)
//!   ↓
//! 4. Persist events (append-only, optimistic concurrency)
//!   ↓
//! 5. Publish committed events (read models, subscribers)
//! ```
//!
//! Single-aggregate commands go through [`CommandDispatcher::dispatch`].
//! Operations spanning several aggregates (a delivery decrements stock on
//! every delivered item, a campaign closure adjusts every counted item) load
//! each aggregate as a [`Staged`] value, execute commands on it in memory and
//! commit everything as one [`UnitOfWork`]: either every stream is written or
//! none is.

use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use comptoir_core::{Aggregate, AggregateId, DomainError, ErrorKind, ExpectedVersion, TenantId};
use comptoir_events::{EventBus, EventEnvelope, Subscription};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, Transaction, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Deterministic rejection by an aggregate or a service rule. Lost
    /// optimistic-concurrency races surface here as `Conflict`.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Cross-tenant or cross-aggregate stream mixing.
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    /// Historical payload does not decode into the aggregate event type.
    #[error("cannot decode stored event: {0}")]
    Deserialize(String),

    #[error("event store failure: {0}")]
    Store(EventStoreError),

    /// Publication failed after a successful commit (events are persisted).
    #[error("publication failed: {0}")]
    Publish(String),
}

impl DispatchError {
    /// Domain classification, `None` for infrastructure failures.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            DispatchError::Domain(e) => Some(e.kind()),
            _ => None,
        }
    }
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Domain(DomainError::conflict(msg)),
            EventStoreError::TenantIsolation(msg) => DispatchError::TenantIsolation(msg),
            other => DispatchError::Store(other),
        }
    }
}

/// An aggregate rehydrated from its stream, plus the events decided on it
/// that are not committed yet.
#[derive(Debug, Clone)]
pub struct Staged<A: Aggregate> {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    aggregate: A,
    loaded_version: u64,
    pending: Vec<A::Event>,
}

impl<A: Aggregate> Staged<A> {
    /// Current state, including pending events.
    pub fn aggregate(&self) -> &A {
        &self.aggregate
    }

    pub fn into_aggregate(self) -> A {
        self.aggregate
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn loaded_version(&self) -> u64 {
        self.loaded_version
    }

    pub fn pending(&self) -> &[A::Event] {
        &self.pending
    }

    /// Decide and fold in memory. On rejection nothing is staged.
    pub fn execute(&mut self, command: &A::Command) -> Result<&[A::Event], A::Error> {
        let events = comptoir_events::execute(&mut self.aggregate, command)?;
        let start = self.pending.len();
        self.pending.extend(events);
        Ok(&self.pending[start..])
    }

    fn expected_version(&self) -> ExpectedVersion {
        if self.loaded_version == 0 {
            ExpectedVersion::NoStream
        } else {
            ExpectedVersion::Exact(self.loaded_version)
        }
    }
}

/// Streams to write and streams to re-check, committed atomically.
#[derive(Debug)]
pub struct UnitOfWork {
    tenant_id: TenantId,
    transaction: Transaction,
}

impl UnitOfWork {
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            transaction: Transaction::new(),
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Queue the pending events of `staged`, expecting its stream to still
    /// be at the version it was loaded at. Returns the folded aggregate.
    pub fn stage<A>(&mut self, staged: Staged<A>) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: comptoir_events::Event + Serialize,
    {
        self.ensure_tenant(staged.tenant_id)?;
        if staged.pending.is_empty() {
            return Ok(staged.aggregate);
        }

        let expected = staged.expected_version();
        let events = staged
            .pending
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    staged.tenant_id,
                    staged.aggregate_id,
                    A::AGGREGATE_TYPE,
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.transaction = std::mem::take(&mut self.transaction).append(events, expected);
        Ok(staged.aggregate)
    }

    /// Commit only if `staged`'s stream has not moved since it was read.
    pub fn guard<A: Aggregate>(&mut self, staged: &Staged<A>) -> Result<(), DispatchError> {
        self.ensure_tenant(staged.tenant_id)?;
        self.transaction = std::mem::take(&mut self.transaction).guard(
            staged.tenant_id,
            staged.aggregate_id,
            ExpectedVersion::Exact(staged.loaded_version),
        );
        Ok(())
    }

    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DispatchError> {
        if tenant_id != self.tenant_id {
            return Err(DispatchError::TenantIsolation(format!(
                "unit of work for tenant {} cannot touch tenant {tenant_id}",
                self.tenant_id
            )));
        }
        Ok(())
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// Commits and publications are serialized: events reach the bus in the
/// order they were committed, which the projections rely on to see gap-free
/// per-stream sequences.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
    commit_lock: Mutex<()>,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self {
            store,
            bus,
            commit_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Load, decide, persist and publish a single command.
    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: comptoir_events::Event + Serialize + DeserializeOwned,
    {
        let mut staged = self.load(tenant_id, aggregate_id, make_aggregate)?;
        staged.execute(&command)?;
        if staged.pending.is_empty() {
            return Ok(vec![]);
        }

        let mut uow = UnitOfWork::new(tenant_id);
        uow.stage(staged)?;
        self.commit(uow)
    }

    /// Rehydrate an aggregate from its tenant-scoped stream.
    pub fn load<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Staged<A>, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.stream(tenant_id, aggregate_id, A::AGGREGATE_TYPE)?;

        let mut aggregate = make_aggregate(aggregate_id);
        apply_history(&mut aggregate, &history)?;

        Ok(Staged {
            tenant_id,
            aggregate_id,
            aggregate,
            loaded_version: stream_version(&history),
            pending: Vec::new(),
        })
    }

    /// Raw stream, validated for tenant isolation and ordering.
    ///
    /// A stream recorded under another aggregate type is reported as
    /// `NotFound`: a sale id is not a stock item.
    pub fn stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let history = self.store.load_stream(tenant_id, aggregate_id)?;
        validate_loaded_stream(tenant_id, aggregate_id, &history)?;
        if history.iter().any(|e| e.aggregate_type != aggregate_type) {
            return Err(DomainError::not_found(format!("{aggregate_type} {aggregate_id}")).into());
        }
        Ok(history)
    }

    /// Persist every staged stream atomically, then publish.
    pub fn commit(&self, uow: UnitOfWork) -> Result<Vec<StoredEvent>, DispatchError> {
        if uow.transaction.is_empty() {
            return Ok(vec![]);
        }

        let _serialized = self
            .commit_lock
            .lock()
            .map_err(|_| DispatchError::Store(EventStoreError::Poisoned))?;

        let committed = self.store.commit(uow.transaction)?;

        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(committed)
    }

    pub fn subscribe(&self) -> Subscription<EventEnvelope<JsonValue>> {
        self.bus.subscribe()
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // Sequence numbers must be exactly 1..=n.
    for (idx, e) in stream.iter().enumerate() {
        if e.tenant_id != tenant_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong tenant_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        let expected = idx as u64 + 1;
        if e.sequence_number != expected {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "gap in loaded stream (expected sequence {expected}, found {})",
                e.sequence_number
            ))));
        }
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(format!("{} #{}: {e}", stored.event_type, stored.sequence_number)))?;
        aggregate.apply(&ev);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use comptoir_core::UserId;
    use comptoir_events::InMemoryEventBus;
    use comptoir_inventory::{
        CreateStockItem, MovementId, MovementKind, PostMovement, StockItem, StockItemCommand, StockItemId,
    };

    use super::*;
    use crate::event_store::InMemoryEventStore;

    type TestDispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;

    fn dispatcher() -> TestDispatcher {
        CommandDispatcher::new(Arc::new(InMemoryEventStore::new()), Arc::new(InMemoryEventBus::new()))
    }

    fn create(tenant_id: TenantId, id: StockItemId) -> StockItemCommand {
        StockItemCommand::CreateStockItem(CreateStockItem {
            tenant_id,
            stock_item_id: id,
            name: "Riz 25kg".to_string(),
            sku: None,
            occurred_at: Utc::now(),
        })
    }

    fn post(tenant_id: TenantId, id: StockItemId, kind: MovementKind, quantity: u64) -> StockItemCommand {
        StockItemCommand::PostMovement(PostMovement {
            tenant_id,
            stock_item_id: id,
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
    fn dispatch_persists_then_publishes() {
        let d = dispatcher();
        let sub = d.subscribe();
        let tenant = TenantId::new();
        let id = StockItemId::generate();

        let committed = d.dispatch(tenant, id.0, create(tenant, id), |_| StockItem::empty(id)).unwrap();
        assert_eq!(committed.len(), 1);

        let env = sub.try_recv().unwrap();
        assert_eq!(env.tenant_id(), tenant);
        assert_eq!(env.sequence_number(), 1);
        assert_eq!(env.aggregate_type(), "inventory.stock_item");
    }

    #[test]
    fn domain_rejection_writes_nothing() {
        let d = dispatcher();
        let tenant = TenantId::new();
        let id = StockItemId::generate();
        d.dispatch(tenant, id.0, create(tenant, id), |_| StockItem::empty(id)).unwrap();

        let err = d
            .dispatch(tenant, id.0, post(tenant, id, MovementKind::Out, 1), |_| StockItem::empty(id))
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::InvalidState));
        assert_eq!(d.stream(tenant, id.0, StockItem::AGGREGATE_TYPE).unwrap().len(), 1);
    }

    #[test]
    fn stale_staged_aggregate_loses_the_race() {
        let d = dispatcher();
        let tenant = TenantId::new();
        let id = StockItemId::generate();
        d.dispatch(tenant, id.0, create(tenant, id), |_| StockItem::empty(id)).unwrap();

        let mut first = d.load(tenant, id.0, |_| StockItem::empty(id)).unwrap();
        let mut second = d.load(tenant, id.0, |_| StockItem::empty(id)).unwrap();
        first.execute(&post(tenant, id, MovementKind::In, 5)).unwrap();
        second.execute(&post(tenant, id, MovementKind::In, 7)).unwrap();

        let mut uow = UnitOfWork::new(tenant);
        uow.stage(first).unwrap();
        d.commit(uow).unwrap();

        let mut uow = UnitOfWork::new(tenant);
        uow.stage(second).unwrap();
        let err = d.commit(uow).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Conflict));

        let item = d.load(tenant, id.0, |_| StockItem::empty(id)).unwrap();
        assert_eq!(item.aggregate().level(), 5);
    }

    #[test]
    fn stream_of_another_aggregate_type_is_not_found() {
        let d = dispatcher();
        let tenant = TenantId::new();
        let id = StockItemId::generate();
        d.dispatch(tenant, id.0, create(tenant, id), |_| StockItem::empty(id)).unwrap();

        let err = d.stream(tenant, id.0, "sales.sale").unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::NotFound));
        assert!(!err.to_string().contains("created"));
    }

    #[test]
    fn staging_a_foreign_tenant_is_refused() {
        let d = dispatcher();
        let tenant = TenantId::new();
        let id = StockItemId::generate();
        let staged = d.load(TenantId::new(), id.0, |_| StockItem::empty(id)).unwrap();

        let mut uow = UnitOfWork::new(tenant);
        assert!(matches!(uow.guard(&staged), Err(DispatchError::TenantIsolation(_))));
    }
}
