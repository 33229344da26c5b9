//! High-level client that wires catalog and coordinator to one store.
//! The CLI front ends (HTTP server, shell, stress) all delegate to this.

use std::sync::Arc;

use crate::audit::AuditReport;
use crate::catalog::CatalogRepository;
use crate::config::ReservationConfig;
use crate::coordinator::ReservationCoordinator;
use crate::error::Result;
use crate::store::ReplicatedStore;
use crate::store_in_memory::InMemoryStore;
use crate::types::*;

/// The main entry point for using lendlock. Holds no mutable state of its
/// own, so one instance can be shared by every request thread.
pub struct LendingClient {
    catalog: CatalogRepository,
    coordinator: ReservationCoordinator,
}

impl LendingClient {
    /// Create a client over any store backend.
    pub fn with_store(store: Arc<dyn ReplicatedStore>, config: ReservationConfig) -> Result<Self> {
        let catalog = CatalogRepository::new(store.clone(), &config);
        let coordinator = ReservationCoordinator::new(store, config)?;
        Ok(Self {
            catalog,
            coordinator,
        })
    }

    /// Create a client over a fresh in-memory replica set.
    pub fn in_memory(config: ReservationConfig) -> Result<Self> {
        Self::with_store(Arc::new(InMemoryStore::new()), config)
    }

    /// Create a client backed by SQLite at the given path.
    /// Reservations persist across restarts.
    #[cfg(feature = "sqlite")]
    pub fn with_sqlite(path: &str, config: ReservationConfig) -> Result<Self> {
        let store = crate::store_sqlite::SqliteStore::open(path)?;
        Self::with_store(Arc::new(store), config)
    }

    pub fn catalog(&self) -> &CatalogRepository {
        &self.catalog
    }

    pub fn coordinator(&self) -> &ReservationCoordinator {
        &self.coordinator
    }

    pub fn config(&self) -> &ReservationConfig {
        self.coordinator.config()
    }

    pub fn add_item(&self, title: &str, author: &str) -> Result<Item> {
        self.catalog.insert_item(title, author)
    }

    pub fn find_items(&self, title: &str) -> Result<Vec<Item>> {
        self.catalog.find_items_by_title(title)
    }

    pub fn register_holder(&self, name: &str) -> Result<bool> {
        self.catalog.register_holder(name)
    }

    /// Reserve until `due_at`, or for the default loan period when `None`.
    pub fn reserve(
        &self,
        holder: &str,
        item_id: &ItemId,
        item_title: &str,
        due_at: Option<u64>,
    ) -> Result<Outcome> {
        match due_at {
            Some(due_at) => self.coordinator.reserve(holder, item_id, item_title, due_at),
            None => self
                .coordinator
                .reserve_for_days(holder, item_id, item_title, None),
        }
    }

    pub fn release(&self, holder: &str, item_id: &ItemId, item_title: &str) -> Result<Outcome> {
        self.coordinator.release(holder, item_id, item_title)
    }

    pub fn prolong(&self, holder: &str, item_id: &ItemId, new_due_at: u64) -> Result<Outcome> {
        self.coordinator.prolong(holder, item_id, new_due_at)
    }

    pub fn reservations_of(&self, holder: &str) -> Result<Vec<Reservation>> {
        self.catalog.reservations_of(holder)
    }

    pub fn audit(&self) -> Result<AuditReport> {
        self.coordinator.audit()
    }
}
