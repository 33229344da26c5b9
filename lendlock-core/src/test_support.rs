//! Shared fixtures for the unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::catalog::CatalogRepository;
use crate::config::ReservationConfig;
use crate::coordinator::ReservationCoordinator;
use crate::error::StoreResult;
use crate::store::{Condition, Consistency, Key, ReplicatedStore, Row, Table, Value, row};
use crate::store_faulty::FaultyStore;
use crate::store_in_memory::InMemoryStore;
use crate::types::{Item, columns};

pub(crate) struct Fixture<S> {
    pub store: Arc<S>,
    pub catalog: CatalogRepository,
    pub coordinator: ReservationCoordinator,
}

impl<S: ReplicatedStore + 'static> Fixture<S> {
    pub fn over(store: S, config: ReservationConfig) -> Self {
        let store = Arc::new(store);
        let shared: Arc<dyn ReplicatedStore> = store.clone();
        Self {
            catalog: CatalogRepository::new(shared.clone(), &config),
            coordinator: ReservationCoordinator::new(shared, config)
                .expect("test config is valid"),
            store,
        }
    }

    pub fn holder(&self, name: &str) {
        assert!(self.catalog.register_holder(name).unwrap());
    }

    pub fn book(&self, title: &str) -> Item {
        self.catalog.insert_item(title, "Anonymous").unwrap()
    }

    pub fn item(&self, item: &Item) -> Item {
        self.catalog.get_item_by_key(&item.key()).unwrap().unwrap()
    }

    pub fn count(&self, holder: &str) -> u32 {
        self.catalog.get_holder(holder).unwrap().unwrap().active_count
    }
}

pub(crate) fn fixture(max_quota: u32) -> Fixture<InMemoryStore> {
    Fixture::over(
        InMemoryStore::new(),
        ReservationConfig::default().with_max_quota(max_quota),
    )
}

pub(crate) fn faulty_fixture(max_quota: u32) -> Fixture<FaultyStore<InMemoryStore>> {
    Fixture::over(
        FaultyStore::new(InMemoryStore::new()),
        ReservationConfig::default().with_max_quota(max_quota),
    )
}

pub(crate) const DUE: u64 = 1_700_000_000_000;

/// A store where some other writer always bumps a holder's counter just
/// before our compare-and-set lands, so every CAS round on `holders` loses.
pub(crate) struct MeddlingStore {
    pub inner: InMemoryStore,
}

impl ReplicatedStore for MeddlingStore {
    fn get(&self, key: &Key, consistency: Consistency) -> StoreResult<Option<Row>> {
        self.inner.get(key, consistency)
    }

    fn scan(
        &self,
        table: Table,
        partition: Option<&str>,
        consistency: Consistency,
    ) -> StoreResult<Vec<(Key, Row)>> {
        self.inner.scan(table, partition, consistency)
    }

    fn put(&self, key: &Key, row: Row, consistency: Consistency) -> StoreResult<()> {
        self.inner.put(key, row, consistency)
    }

    fn conditional_put(
        &self,
        key: &Key,
        update: Row,
        condition: &Condition,
        consistency: Consistency,
    ) -> StoreResult<bool> {
        if key.table == Table::Holders
            && let Condition::Equals { value: Value::Int(seen), .. } = condition
        {
            // The interloper moves the counter, our CAS misses, and the
            // counter is put back so the next round sees the same value.
            let moved = row([(columns::ACTIVE_COUNT, Value::Int(seen + 1000))]);
            let restored = row([(columns::ACTIVE_COUNT, Value::Int(*seen))]);
            self.inner.put(key, moved, consistency)?;
            let applied = self.inner.conditional_put(key, update, condition, consistency)?;
            self.inner.put(key, restored, consistency)?;
            return Ok(applied);
        }
        self.inner.conditional_put(key, update, condition, consistency)
    }

    fn delete(&self, key: &Key, consistency: Consistency) -> StoreResult<()> {
        self.inner.delete(key, consistency)
    }

    fn conditional_delete(
        &self,
        key: &Key,
        condition: &Condition,
        consistency: Consistency,
    ) -> StoreResult<bool> {
        self.inner.conditional_delete(key, condition, consistency)
    }
}

/// Serves each holder row once; afterwards holders read as missing, as if
/// an operator removed the row between two steps of a reservation.
pub(crate) struct VanishingHolderStore {
    pub inner: InMemoryStore,
    holder_reads: AtomicUsize,
}

impl VanishingHolderStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            holder_reads: AtomicUsize::new(0),
        }
    }
}

impl ReplicatedStore for VanishingHolderStore {
    fn get(&self, key: &Key, consistency: Consistency) -> StoreResult<Option<Row>> {
        if key.table == Table::Holders && self.holder_reads.fetch_add(1, Ordering::SeqCst) > 0 {
            return Ok(None);
        }
        self.inner.get(key, consistency)
    }

    fn scan(
        &self,
        table: Table,
        partition: Option<&str>,
        consistency: Consistency,
    ) -> StoreResult<Vec<(Key, Row)>> {
        self.inner.scan(table, partition, consistency)
    }

    fn put(&self, key: &Key, row: Row, consistency: Consistency) -> StoreResult<()> {
        self.inner.put(key, row, consistency)
    }

    fn conditional_put(
        &self,
        key: &Key,
        update: Row,
        condition: &Condition,
        consistency: Consistency,
    ) -> StoreResult<bool> {
        self.inner.conditional_put(key, update, condition, consistency)
    }

    fn delete(&self, key: &Key, consistency: Consistency) -> StoreResult<()> {
        self.inner.delete(key, consistency)
    }

    fn conditional_delete(
        &self,
        key: &Key,
        condition: &Condition,
        consistency: Consistency,
    ) -> StoreResult<bool> {
        self.inner.conditional_delete(key, condition, consistency)
    }
}
