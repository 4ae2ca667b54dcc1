//! Per-tenant creation counters with an atomic check-and-increment.
//!
//! Plan quotas (`maxCustomers`, `maxUsers`, `maxMonthlySales`) are compared
//! against these counters. A creation first reserves a slot; the slot becomes
//! permanent on [`Reservation::confirm`] and is released when the reservation
//! is dropped unconfirmed (the creation failed to commit).

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use comptoir_core::{DomainError, TenantId};
use comptoir_entitlements::QuotaResource;

/// Window a counter covers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum QuotaPeriod {
    Lifetime,
    /// Calendar month, UTC.
    Month { year: i32, month: u32 },
}

impl QuotaPeriod {
    pub fn month_of(at: DateTime<Utc>) -> Self {
        QuotaPeriod::Month {
            year: at.year(),
            month: at.month(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CounterKey {
    tenant_id: TenantId,
    resource: QuotaResource,
    period: QuotaPeriod,
}

#[derive(Debug, Default, Copy, Clone)]
struct Counter {
    committed: u64,
    reserved: u64,
}

impl Counter {
    fn total(self) -> u64 {
        self.committed + self.reserved
    }
}

#[derive(Debug, Default)]
pub struct TenantQuotas {
    counters: Mutex<HashMap<CounterKey, Counter>>,
}

impl TenantQuotas {
    pub fn new() -> Self {
        Self::default()
    }

    // Counters are plain integers: a panic elsewhere cannot leave them torn.
    fn counters(&self) -> MutexGuard<'_, HashMap<CounterKey, Counter>> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Evaluate `admits(current_count)` and take a slot, under one lock.
    ///
    /// In-flight reservations count towards `current_count`, so two racing
    /// creations can never both take the last slot.
    pub fn try_reserve(
        &self,
        tenant_id: TenantId,
        resource: QuotaResource,
        period: QuotaPeriod,
        admits: impl FnOnce(u64) -> bool,
    ) -> Result<Reservation<'_>, DomainError> {
        let key = CounterKey {
            tenant_id,
            resource,
            period,
        };
        let mut counters = self.counters();
        let counter = counters.entry(key).or_default();

        let current = counter.total();
        if !admits(current) {
            return Err(DomainError::quota_exceeded(format!(
                "{} quota reached ({current} used)",
                resource.as_str()
            )));
        }
        counter.reserved += 1;

        Ok(Reservation {
            quotas: self,
            key,
            settled: false,
        })
    }

    /// Committed count (in-flight reservations excluded).
    pub fn current(&self, tenant_id: TenantId, resource: QuotaResource, period: QuotaPeriod) -> u64 {
        let key = CounterKey {
            tenant_id,
            resource,
            period,
        };
        self.counters().get(&key).map(|c| c.committed).unwrap_or(0)
    }

    /// Set the committed baseline, e.g. users counted by the auth collaborator.
    pub fn seed(&self, tenant_id: TenantId, resource: QuotaResource, period: QuotaPeriod, count: u64) {
        let key = CounterKey {
            tenant_id,
            resource,
            period,
        };
        self.counters().entry(key).or_default().committed = count;
    }

    fn settle(&self, key: CounterKey, keep: bool) {
        let mut counters = self.counters();
        if let Some(counter) = counters.get_mut(&key) {
            counter.reserved = counter.reserved.saturating_sub(1);
            if keep {
                counter.committed += 1;
            }
        }
    }
}

/// A quota slot held while a creation is in flight.
#[derive(Debug)]
#[must_use = "an unconfirmed reservation is released on drop"]
pub struct Reservation<'a> {
    quotas: &'a TenantQuotas,
    key: CounterKey,
    settled: bool,
}

impl Reservation<'_> {
    /// The creation committed: keep the slot.
    pub fn confirm(mut self) {
        self.quotas.settle(self.key, true);
        self.settled = true;
    }

    /// Give the slot back now.
    pub fn release(mut self) {
        self.quotas.settle(self.key, false);
        self.settled = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.quotas.settle(self.key, false);
        }
    }
}
