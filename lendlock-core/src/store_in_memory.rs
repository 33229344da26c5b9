use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use tracing::trace;

use crate::error::{StoreError, StoreResult};
use crate::store::{Condition, Consistency, Key, ReplicatedStore, Row, Table};

pub const DEFAULT_REPLICATION_FACTOR: usize = 3;

/// In-process stand-in for a replicated cluster.
///
/// Rows live in one map guarded by a mutex, so every operation is
/// linearizable. Replication is modelled only as availability: each call
/// needs `consistency.required_replicas(rf)` live replicas or it fails with
/// `StoreError::Unavailable`, the way a real cluster answers when too many
/// nodes are down.
pub struct InMemoryStore {
    rows: Mutex<BTreeMap<Key, Row>>,
    replication_factor: usize,
    live_replicas: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_replication(DEFAULT_REPLICATION_FACTOR)
    }

    pub fn with_replication(replication_factor: usize) -> Self {
        let replication_factor = replication_factor.max(1);
        Self {
            rows: Mutex::new(BTreeMap::new()),
            replication_factor,
            live_replicas: AtomicUsize::new(replication_factor),
        }
    }

    pub fn replication_factor(&self) -> usize {
        self.replication_factor
    }

    pub fn live_replicas(&self) -> usize {
        self.live_replicas.load(Ordering::SeqCst)
    }

    /// Simulate replicas going down (or coming back).
    pub fn set_live_replicas(&self, live: usize) {
        self.live_replicas
            .store(live.min(self.replication_factor), Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.rows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows().is_empty()
    }

    fn rows(&self) -> MutexGuard<'_, BTreeMap<Key, Row>> {
        // A panicking test thread must not wedge every other caller.
        self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_quorum(&self, consistency: Consistency) -> StoreResult<()> {
        let required = consistency.required_replicas(self.replication_factor);
        let alive = self.live_replicas();
        if alive < required {
            return Err(StoreError::Unavailable {
                consistency,
                required,
                alive,
            });
        }
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplicatedStore for InMemoryStore {
    fn get(&self, key: &Key, consistency: Consistency) -> StoreResult<Option<Row>> {
        self.check_quorum(consistency)?;
        Ok(self.rows().get(key).cloned())
    }

    fn scan(
        &self,
        table: Table,
        partition: Option<&str>,
        consistency: Consistency,
    ) -> StoreResult<Vec<(Key, Row)>> {
        self.check_quorum(consistency)?;
        Ok(self
            .rows()
            .iter()
            .filter(|(key, _)| key.table == table)
            .filter(|(key, _)| partition.is_none_or(|p| key.partition == p))
            .map(|(key, row)| (key.clone(), row.clone()))
            .collect())
    }

    fn put(&self, key: &Key, row: Row, consistency: Consistency) -> StoreResult<()> {
        self.check_quorum(consistency)?;
        self.rows().entry(key.clone()).or_default().extend(row);
        Ok(())
    }

    fn conditional_put(
        &self,
        key: &Key,
        row: Row,
        condition: &Condition,
        consistency: Consistency,
    ) -> StoreResult<bool> {
        self.check_quorum(consistency)?;
        let mut rows = self.rows();
        if !condition.holds(rows.get(key)) {
            trace!(%key, ?condition, "conditional put not applied");
            return Ok(false);
        }
        rows.entry(key.clone()).or_default().extend(row);
        Ok(true)
    }

    fn delete(&self, key: &Key, consistency: Consistency) -> StoreResult<()> {
        self.check_quorum(consistency)?;
        self.rows().remove(key);
        Ok(())
    }

    fn conditional_delete(
        &self,
        key: &Key,
        condition: &Condition,
        consistency: Consistency,
    ) -> StoreResult<bool> {
        self.check_quorum(consistency)?;
        let mut rows = self.rows();
        if !condition.holds(rows.get(key)) {
            trace!(%key, ?condition, "conditional delete not applied");
            return Ok(false);
        }
        Ok(rows.remove(key).is_some())
    }
}
