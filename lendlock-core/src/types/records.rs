use serde::{Deserialize, Serialize};

use super::{ItemId, ItemKey};
use crate::error::{CoordinatorError, Result};
use crate::store::{Key, Row, Value, row};

/// Column names shared by every backend.
pub mod columns {
    pub const TITLE: &str = "title";
    pub const AUTHOR: &str = "author";
    pub const AVAILABLE: &str = "available";
    pub const ACTIVE_COUNT: &str = "active_count";
    pub const ITEM_TITLE: &str = "item_title";
    pub const DUE_AT: &str = "due_at";
}

/// A catalog entry (a book).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub author: String,
    /// False while exactly one reservation holds the item
    pub available: bool,
}

impl Item {
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.title.clone(), self.id.clone())
    }

    pub(crate) fn to_row(&self) -> Row {
        row([
            (columns::TITLE, Value::from(self.title.as_str())),
            (columns::AUTHOR, Value::from(self.author.as_str())),
            (columns::AVAILABLE, Value::from(self.available)),
        ])
    }

    pub(crate) fn from_row(key: &Key, row: &Row) -> Result<Self> {
        Ok(Self {
            id: ItemId::new(key.clustering.clone()),
            title: key.partition.clone(),
            author: text(key, row, columns::AUTHOR)?,
            available: boolean(key, row, columns::AVAILABLE)?,
        })
    }
}

/// An entity that may hold reservations, bounded by the quota.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holder {
    pub name: String,
    /// Number of reservations currently charged to this holder
    pub active_count: u32,
}

impl Holder {
    pub(crate) fn from_row(key: &Key, row: &Row) -> Result<Self> {
        let count = integer(key, row, columns::ACTIVE_COUNT)?;
        let active_count = u32::try_from(count).map_err(|_| {
            corrupt(key, format!("{} out of range: {}", columns::ACTIVE_COUNT, count))
        })?;
        Ok(Self {
            name: key.partition.clone(),
            active_count,
        })
    }
}

/// Durable witness that an item is locked and charged to a holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub holder: String,
    pub item_id: ItemId,
    pub item_title: String,
    /// Unix milliseconds
    pub due_at: u64,
}

impl Reservation {
    pub fn key(&self) -> Key {
        Key::reservation(&self.holder, self.item_id.as_str())
    }

    pub fn item_key(&self) -> ItemKey {
        ItemKey::new(self.item_title.clone(), self.item_id.clone())
    }

    pub(crate) fn to_row(&self) -> Row {
        row([
            (columns::ITEM_TITLE, Value::from(self.item_title.as_str())),
            (columns::DUE_AT, Value::from(self.due_at)),
        ])
    }

    pub(crate) fn from_row(key: &Key, row: &Row) -> Result<Self> {
        let due_at = integer(key, row, columns::DUE_AT)?;
        Ok(Self {
            holder: key.partition.clone(),
            item_id: ItemId::new(key.clustering.clone()),
            item_title: text(key, row, columns::ITEM_TITLE)?,
            due_at: u64::try_from(due_at)
                .map_err(|_| corrupt(key, format!("negative {}: {}", columns::DUE_AT, due_at)))?,
        })
    }
}

// ─── Column Decoding ────────────────────────────────────────────────────────

fn corrupt(key: &Key, reason: impl Into<String>) -> CoordinatorError {
    CoordinatorError::CorruptRow {
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn column<'a>(key: &Key, row: &'a Row, name: &str) -> Result<&'a Value> {
    row.get(name)
        .ok_or_else(|| corrupt(key, format!("missing column '{}'", name)))
}

fn text(key: &Key, row: &Row, name: &str) -> Result<String> {
    column(key, row, name)?
        .as_text()
        .map(str::to_string)
        .ok_or_else(|| corrupt(key, format!("column '{}' is not text", name)))
}

fn boolean(key: &Key, row: &Row, name: &str) -> Result<bool> {
    column(key, row, name)?
        .as_bool()
        .ok_or_else(|| corrupt(key, format!("column '{}' is not a boolean", name)))
}

fn integer(key: &Key, row: &Row, name: &str) -> Result<i64> {
    column(key, row, name)?
        .as_int()
        .ok_or_else(|| corrupt(key, format!("column '{}' is not an integer", name)))
}
