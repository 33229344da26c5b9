//! Item lock manager.
//!
//! An item is "locked" while its `available` column is false. The only
//! serialization point is the conditional write flipping it `true -> false`:
//! the store lets at most one such write apply per row revision, so no
//! external mutex is needed.

use std::sync::Arc;

use tracing::{debug, error};

use crate::error::{CoordinatorError, Result};
use crate::store::{Condition, Consistency, ReplicatedStore, Value, row};
use crate::types::{ItemKey, columns};

pub struct ItemLockManager {
    store: Arc<dyn ReplicatedStore>,
    serial: Consistency,
}

impl ItemLockManager {
    pub fn new(store: Arc<dyn ReplicatedStore>, serial: Consistency) -> Self {
        Self { store, serial }
    }

    /// Take the item. Returns false when someone else holds it (or the
    /// item does not exist); losing the race is not an error.
    pub fn acquire(&self, item: &ItemKey) -> Result<bool> {
        let acquired = self.store.conditional_put(
            &item.store_key(),
            row([(columns::AVAILABLE, Value::from(false))]),
            &Condition::equals(columns::AVAILABLE, true),
            self.serial,
        )?;
        debug!(%item, acquired, "item lock attempt");
        Ok(acquired)
    }

    /// Give the item back. The caller must believe it holds the lock, so a
    /// missing row is an invariant violation rather than a soft failure.
    pub fn release(&self, item: &ItemKey) -> Result<()> {
        let released = self.store.conditional_put(
            &item.store_key(),
            row([(columns::AVAILABLE, Value::from(true))]),
            &Condition::Exists,
            self.serial,
        )?;
        if !released {
            error!(%item, "release found no item row");
            return Err(CoordinatorError::invariant(format!(
                "item {} vanished while locked",
                item
            )));
        }
        debug!(%item, "item lock released");
        Ok(())
    }
}
