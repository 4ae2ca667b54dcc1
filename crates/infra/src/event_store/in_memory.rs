use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use comptoir_core::{AggregateId, ExpectedVersion, TenantId};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, StreamKey, UncommittedEvent};
use super::transaction::{StreamAppend, Transaction};

type Streams = HashMap<StreamKey, Vec<StoredEvent>>;

/// Process-local ledger behind one `RwLock`.
///
/// `commit` validates and writes under the write lock, so readers never see
/// half of a delivery or a campaign close.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<Streams>,
}

fn version_of(stream: Option<&Vec<StoredEvent>>) -> u64 {
    stream.and_then(|s| s.last()).map_or(0, |e| e.sequence_number)
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stream a batch targets, `None` for an empty batch.
    fn target(events: &[UncommittedEvent]) -> Result<Option<StreamKey>, EventStoreError> {
        let Some(first) = events.first() else {
            return Ok(None);
        };

        if let Some(stray) = events.iter().find(|e| e.tenant_id != first.tenant_id) {
            return Err(EventStoreError::TenantIsolation(format!(
                "event {} belongs to tenant {}, batch to {}",
                stray.event_id, stray.tenant_id, first.tenant_id
            )));
        }
        if let Some(stray) = events
            .iter()
            .find(|e| e.aggregate_id != first.aggregate_id || e.aggregate_type != first.aggregate_type)
        {
            return Err(EventStoreError::InvalidAppend(format!(
                "event {} targets {} ({}), batch targets {} ({})",
                stray.event_id, stray.aggregate_id, stray.aggregate_type, first.aggregate_id, first.aggregate_type
            )));
        }

        Ok(Some(first.stream()))
    }

    fn check_append(streams: &Streams, key: StreamKey, append: &StreamAppend) -> Result<(), EventStoreError> {
        let stream = streams.get(&key);
        let current = version_of(stream);
        append.expected_version.check(current).map_err(|_| {
            EventStoreError::Concurrency(format!(
                "stream {key}: expected {:?}, found {current}",
                append.expected_version
            ))
        })?;

        if let (Some(existing), Some(incoming)) = (stream.and_then(|s| s.first()), append.events.first()) {
            if existing.aggregate_type != incoming.aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream {key} holds '{}', got '{}'",
                    existing.aggregate_type, incoming.aggregate_type
                )));
            }
        }
        Ok(())
    }

    fn write(stream: &mut Vec<StoredEvent>, events: Vec<UncommittedEvent>) -> Vec<StoredEvent> {
        let base = stream.last().map_or(0, |e| e.sequence_number);
        let stored: Vec<StoredEvent> = events
            .into_iter()
            .zip(base + 1..)
            .map(|(event, seq)| event.into_stored(seq))
            .collect();
        stream.extend(stored.iter().cloned());
        stored
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.commit(Transaction::new().append(events, expected_version))
    }

    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self.streams.read().map_err(|_| EventStoreError::Poisoned)?;
        Ok(streams
            .get(&StreamKey::new(tenant_id, aggregate_id))
            .cloned()
            .unwrap_or_default())
    }

    fn commit(&self, transaction: Transaction) -> Result<Vec<StoredEvent>, EventStoreError> {
        let Transaction { appends, guards } = transaction;

        let mut keyed = Vec::with_capacity(appends.len());
        let mut seen = HashSet::new();
        for append in appends {
            let Some(key) = Self::target(&append.events)? else {
                continue;
            };
            if !seen.insert(key) {
                return Err(EventStoreError::InvalidAppend(format!(
                    "stream {key} appended twice in one transaction"
                )));
            }
            keyed.push((key, append));
        }

        let mut streams = self.streams.write().map_err(|_| EventStoreError::Poisoned)?;

        for guard in &guards {
            let key = StreamKey::new(guard.tenant_id, guard.aggregate_id);
            let current = version_of(streams.get(&key));
            if !guard.expected_version.matches(current) {
                return Err(EventStoreError::Concurrency(format!(
                    "read stream {key}: expected {:?}, found {current}",
                    guard.expected_version
                )));
            }
        }
        for (key, append) in &keyed {
            Self::check_append(&streams, *key, append)?;
        }

        let mut committed = Vec::new();
        for (key, append) in keyed {
            let stream = streams.entry(key).or_default();
            committed.extend(Self::write(stream, append.events));
        }

        Ok(committed)
    }
}
