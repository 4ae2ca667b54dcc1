use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;

use comptoir_core::{AggregateId, TenantId};
use comptoir_events::EventEnvelope;

use super::ProjectionError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

/// Last applied sequence number per `(tenant, aggregate)` stream.
///
/// Makes projections idempotent under at-least-once delivery: replays are
/// skipped, gaps are errors.
#[derive(Debug, Default)]
pub(crate) struct StreamCursors {
    cursors: RwLock<HashMap<CursorKey, u64>>,
}

impl StreamCursors {
    /// Run `apply` if `envelope` is the next event of its stream.
    ///
    /// The cursor lock is held while `apply` runs, so one stream is never
    /// projected twice concurrently.
    pub(crate) fn advance(
        &self,
        envelope: &EventEnvelope<JsonValue>,
        apply: impl FnOnce() -> Result<(), ProjectionError>,
    ) -> Result<(), ProjectionError> {
        let mut cursors = self.cursors.write().map_err(|_| ProjectionError::Poisoned)?;

        let key = CursorKey {
            tenant_id: envelope.tenant_id(),
            aggregate_id: envelope.aggregate_id(),
        };
        let last = cursors.get(&key).copied().unwrap_or(0);
        let seq = envelope.sequence_number();

        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(());
        }
        // The first event seen may start anywhere; after that, no gaps.
        if last != 0 && seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }

        apply()?;
        cursors.insert(key, seq);
        Ok(())
    }
}
