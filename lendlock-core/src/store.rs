use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::StoreResult;

// The store is treated as an external capability. Backends only have to
// guarantee that a conditional write on one row is linearizable with every
// other conditional write on that row; nothing spans rows.

/// Logical tables of the catalog keyspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Table {
    /// `items(title, id) -> {title, author, available}`
    Items,
    /// `holders(name) -> {active_count}`
    Holders,
    /// `reservations(holder, item_id) -> {item_title, due_at}`
    Reservations,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::Items => "items",
            Table::Holders => "holders",
            Table::Reservations => "reservations",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "items" => Some(Table::Items),
            "holders" => Some(Table::Holders),
            "reservations" => Some(Table::Reservations),
            _ => None,
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Primary key of a row: partition key plus clustering key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key {
    pub table: Table,
    pub partition: String,
    /// Empty for single-row partitions (holders).
    pub clustering: String,
}

impl Key {
    pub fn new(table: Table, partition: impl Into<String>, clustering: impl Into<String>) -> Self {
        Self {
            table,
            partition: partition.into(),
            clustering: clustering.into(),
        }
    }

    pub fn item(title: &str, id: &str) -> Self {
        Self::new(Table::Items, title, id)
    }

    pub fn holder(name: &str) -> Self {
        Self::new(Table::Holders, name, "")
    }

    pub fn reservation(holder: &str, item_id: &str) -> Self {
        Self::new(Table::Reservations, holder, item_id)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clustering.is_empty() {
            write!(f, "{}/{}", self.table, self.partition)
        } else {
            write!(f, "{}/{}/{}", self.table, self.partition, self.clustering)
        }
    }
}

/// A single column value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Text(String),
    Bool(bool),
    Int(i64),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u64> for Value {
    fn from(i: u64) -> Self {
        Value::Int(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

/// Column name -> value. Writes merge the given columns into the stored row.
pub type Row = BTreeMap<String, Value>;

/// Builds a row from `(column, value)` pairs.
pub fn row<const N: usize>(columns: [(&str, Value); N]) -> Row {
    columns
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// Predicate evaluated atomically against the current row by a conditional write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    /// `IF EXISTS`
    Exists,
    /// `IF NOT EXISTS`
    NotExists,
    /// `IF column = value`; never holds for an absent row.
    Equals { column: String, value: Value },
    /// Conjunction of all nested conditions.
    All(Vec<Condition>),
}

impl Condition {
    pub fn equals(column: &str, value: impl Into<Value>) -> Self {
        Condition::Equals {
            column: column.to_string(),
            value: value.into(),
        }
    }

    pub fn holds(&self, current: Option<&Row>) -> bool {
        match self {
            Condition::Exists => current.is_some(),
            Condition::NotExists => current.is_none(),
            Condition::Equals { column, value } => current
                .and_then(|row| row.get(column))
                .is_some_and(|stored| stored == value),
            Condition::All(conditions) => conditions.iter().all(|c| c.holds(current)),
        }
    }
}

/// How many replicas must answer before an operation is acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Consistency {
    One,
    Quorum,
    All,
    /// Paxos-style linearizable read/write; needs a quorum.
    Serial,
}

impl Consistency {
    pub fn required_replicas(self, replication_factor: usize) -> usize {
        match self {
            Consistency::One => 1,
            Consistency::Quorum | Consistency::Serial => replication_factor / 2 + 1,
            Consistency::All => replication_factor,
        }
    }
}

impl fmt::Display for Consistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Consistency::One => write!(f, "ONE"),
            Consistency::Quorum => write!(f, "QUORUM"),
            Consistency::All => write!(f, "ALL"),
            Consistency::Serial => write!(f, "SERIAL"),
        }
    }
}

impl FromStr for Consistency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ONE" => Ok(Consistency::One),
            "QUORUM" => Ok(Consistency::Quorum),
            "ALL" => Ok(Consistency::All),
            "SERIAL" => Ok(Consistency::Serial),
            _ => Err(format!(
                "Invalid consistency '{}'. Must be one of: ONE, QUORUM, ALL, SERIAL",
                s
            )),
        }
    }
}

/// Defines the contract for replicated row storage backends.
pub trait ReplicatedStore: Send + Sync {
    /// Read one row.
    fn get(&self, key: &Key, consistency: Consistency) -> StoreResult<Option<Row>>;

    /// Read every row of a table, or of one partition, ordered by key.
    fn scan(
        &self,
        table: Table,
        partition: Option<&str>,
        consistency: Consistency,
    ) -> StoreResult<Vec<(Key, Row)>>;

    /// Unconditional upsert.
    fn put(&self, key: &Key, row: Row, consistency: Consistency) -> StoreResult<()>;

    /// Upsert only if `condition` holds against the current row.
    /// Returns whether the write was applied.
    fn conditional_put(
        &self,
        key: &Key,
        row: Row,
        condition: &Condition,
        consistency: Consistency,
    ) -> StoreResult<bool>;

    /// Unconditional delete; deleting an absent row is not an error.
    fn delete(&self, key: &Key, consistency: Consistency) -> StoreResult<()>;

    /// Delete only if `condition` holds. Returns whether the row was removed.
    fn conditional_delete(
        &self,
        key: &Key,
        condition: &Condition,
        consistency: Consistency,
    ) -> StoreResult<bool>;
}

impl<S: ReplicatedStore + ?Sized> ReplicatedStore for Arc<S> {
    fn get(&self, key: &Key, consistency: Consistency) -> StoreResult<Option<Row>> {
        (**self).get(key, consistency)
    }

    fn scan(
        &self,
        table: Table,
        partition: Option<&str>,
        consistency: Consistency,
    ) -> StoreResult<Vec<(Key, Row)>> {
        (**self).scan(table, partition, consistency)
    }

    fn put(&self, key: &Key, row: Row, consistency: Consistency) -> StoreResult<()> {
        (**self).put(key, row, consistency)
    }

    fn conditional_put(
        &self,
        key: &Key,
        row: Row,
        condition: &Condition,
        consistency: Consistency,
    ) -> StoreResult<bool> {
        (**self).conditional_put(key, row, condition, consistency)
    }

    fn delete(&self, key: &Key, consistency: Consistency) -> StoreResult<()> {
        (**self).delete(key, consistency)
    }

    fn conditional_delete(
        &self,
        key: &Key,
        condition: &Condition,
        consistency: Consistency,
    ) -> StoreResult<bool> {
        (**self).conditional_delete(key, condition, consistency)
    }
}
