//! Catalog repository: plain reads and writes over items, holders and
//! reservations. No invariant logic lives here.

use std::sync::Arc;

use tracing::debug;

use crate::config::ReservationConfig;
use crate::error::Result;
use crate::store::{Condition, Consistency, Key, ReplicatedStore, Table, Value, row};
use crate::types::{Holder, Item, ItemId, ItemKey, Reservation, columns};

pub struct CatalogRepository {
    store: Arc<dyn ReplicatedStore>,
    read: Consistency,
    write: Consistency,
    serial: Consistency,
}

impl CatalogRepository {
    pub fn new(store: Arc<dyn ReplicatedStore>, config: &ReservationConfig) -> Self {
        Self {
            store,
            read: config.read_consistency,
            write: config.write_consistency,
            serial: config.serial_consistency,
        }
    }

    /// Same store, different consistency for reads.
    pub fn with_read_consistency(mut self, read: Consistency) -> Self {
        self.read = read;
        self
    }

    pub fn read_consistency(&self) -> Consistency {
        self.read
    }

    // ─── Items ──────────────────────────────────────────────────────────────

    /// Insert a new, available item under a fresh id.
    pub fn insert_item(&self, title: &str, author: &str) -> Result<Item> {
        let item = Item {
            id: ItemId::generate(),
            title: title.to_string(),
            author: author.to_string(),
            available: true,
        };
        self.store
            .put(&item.key().store_key(), item.to_row(), self.write)?;
        debug!(item_id = %item.id, title, "item inserted");
        Ok(item)
    }

    /// All items sharing a title (one partition).
    pub fn find_items_by_title(&self, title: &str) -> Result<Vec<Item>> {
        self.store
            .scan(Table::Items, Some(title), self.read)?
            .iter()
            .map(|(key, row)| Item::from_row(key, row))
            .collect()
    }

    /// Look an item up by id alone. Items are partitioned by title, so this
    /// filters a full table scan; prefer `get_item_by_key` when the title is known.
    pub fn get_item(&self, id: &ItemId) -> Result<Option<Item>> {
        self.store
            .scan(Table::Items, None, self.read)?
            .iter()
            .find(|(key, _)| key.clustering == id.as_str())
            .map(|(key, row)| Item::from_row(key, row))
            .transpose()
    }

    pub fn get_item_by_key(&self, key: &ItemKey) -> Result<Option<Item>> {
        let store_key = key.store_key();
        self.store
            .get(&store_key, self.read)?
            .map(|row| Item::from_row(&store_key, &row))
            .transpose()
    }

    pub fn list_items(&self) -> Result<Vec<Item>> {
        self.store
            .scan(Table::Items, None, self.read)?
            .iter()
            .map(|(key, row)| Item::from_row(key, row))
            .collect()
    }

    // ─── Holders ────────────────────────────────────────────────────────────

    /// Create a holder with a zero count. First writer wins: returns false
    /// if the name is already taken.
    pub fn register_holder(&self, name: &str) -> Result<bool> {
        let created = self.store.conditional_put(
            &Key::holder(name),
            row([(columns::ACTIVE_COUNT, Value::from(0u32))]),
            &Condition::NotExists,
            self.serial,
        )?;
        debug!(holder = name, created, "holder registration");
        Ok(created)
    }

    pub fn get_holder(&self, name: &str) -> Result<Option<Holder>> {
        let key = Key::holder(name);
        self.store
            .get(&key, self.read)?
            .map(|row| Holder::from_row(&key, &row))
            .transpose()
    }

    pub fn list_holders(&self) -> Result<Vec<Holder>> {
        self.store
            .scan(Table::Holders, None, self.read)?
            .iter()
            .map(|(key, row)| Holder::from_row(key, row))
            .collect()
    }

    // ─── Reservations (read-only; only the coordinator writes them) ────────

    pub fn get_reservation(&self, holder: &str, item_id: &ItemId) -> Result<Option<Reservation>> {
        let key = Key::reservation(holder, item_id.as_str());
        self.store
            .get(&key, self.read)?
            .map(|row| Reservation::from_row(&key, &row))
            .transpose()
    }

    pub fn reservations_of(&self, holder: &str) -> Result<Vec<Reservation>> {
        self.store
            .scan(Table::Reservations, Some(holder), self.read)?
            .iter()
            .map(|(key, row)| Reservation::from_row(key, row))
            .collect()
    }

    pub fn list_reservations(&self) -> Result<Vec<Reservation>> {
        self.store
            .scan(Table::Reservations, None, self.read)?
            .iter()
            .map(|(key, row)| Reservation::from_row(key, row))
            .collect()
    }
}
