use comptoir_core::{AggregateId, ExpectedVersion, TenantId};

use super::UncommittedEvent;

/// Events for one stream, written only if the stream is at `expected_version`.
#[derive(Debug, Clone)]
pub struct StreamAppend {
    pub events: Vec<UncommittedEvent>,
    pub expected_version: ExpectedVersion,
}

/// A stream that is read for a decision but not written: the transaction
/// only commits if it is still at `expected_version`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StreamGuard {
    pub tenant_id: TenantId,
    pub aggregate_id: AggregateId,
    pub expected_version: ExpectedVersion,
}

/// All-or-nothing write spanning several streams.
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    pub appends: Vec<StreamAppend>,
    pub guards: Vec<StreamGuard>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(mut self, events: Vec<UncommittedEvent>, expected_version: ExpectedVersion) -> Self {
        self.appends.push(StreamAppend {
            events,
            expected_version,
        });
        self
    }

    pub fn guard(mut self, tenant_id: TenantId, aggregate_id: AggregateId, expected_version: ExpectedVersion) -> Self {
        self.guards.push(StreamGuard {
            tenant_id,
            aggregate_id,
            expected_version,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.appends.iter().all(|a| a.events.is_empty())
    }
}
