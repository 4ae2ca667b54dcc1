use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock};

use comptoir_core::TenantId;

/// Rows of a read model (stock levels, movement journal, sale summaries),
/// partitioned by tenant. A key is only ever visible to its own tenant.
pub trait TenantStore<K, V>: Send + Sync {
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V>;

    fn upsert(&self, tenant_id: TenantId, key: K, value: V);

    /// Replace the row at `key` with `f(current)`; `None` removes it.
    /// Runs under the store's write lock.
    fn update<F>(&self, tenant_id: TenantId, key: K, f: F)
    where
        F: FnOnce(Option<V>) -> Option<V>;

    /// Unordered; callers sort.
    fn list(&self, tenant_id: TenantId) -> Vec<V>;
}

#[derive(Debug)]
pub struct InMemoryTenantStore<K, V> {
    partitions: RwLock<HashMap<TenantId, HashMap<K, V>>>,
}

impl<K, V> InMemoryTenantStore<K, V> {
    pub fn new() -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryTenantStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

// Rows are rebuilt from the ledger; a poisoned lock still holds usable rows.
impl<K, V> TenantStore<K, V> for InMemoryTenantStore<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        let partitions = self.partitions.read().unwrap_or_else(PoisonError::into_inner);
        partitions.get(&tenant_id)?.get(key).cloned()
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        let mut partitions = self.partitions.write().unwrap_or_else(PoisonError::into_inner);
        partitions.entry(tenant_id).or_default().insert(key, value);
    }

    fn update<F>(&self, tenant_id: TenantId, key: K, f: F)
    where
        F: FnOnce(Option<V>) -> Option<V>,
    {
        let mut partitions = self.partitions.write().unwrap_or_else(PoisonError::into_inner);
        let rows = partitions.entry(tenant_id).or_default();
        let current = rows.remove(&key);
        if let Some(next) = f(current) {
            rows.insert(key, next);
        }
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        let partitions = self.partitions.read().unwrap_or_else(PoisonError::into_inner);
        partitions
            .get(&tenant_id)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }
}
