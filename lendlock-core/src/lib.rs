//! # lendlock-core
//!
//! Reservation coordination for a shared catalog on top of a replicated,
//! leaderless key/value store. Items are locked, holder quotas are charged
//! and reservations are recorded using nothing but single-row conditional
//! writes; cross-row consistency is restored by saga compensation.

pub mod audit;
pub mod catalog;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod lock;
pub mod quota;
pub mod saga;
pub mod store;
#[path = "store_faulty.rs"]
pub mod store_faulty;
#[path = "store_in_memory.rs"]
pub mod store_in_memory;
#[cfg(feature = "sqlite")]
#[path = "store_sqlite.rs"]
pub mod store_sqlite;
pub mod types;

pub use error::{CoordinatorError, Result, StoreError, StoreResult};

#[cfg(test)]
mod catalog_test;
#[cfg(test)]
mod quota_test;
#[cfg(test)]
mod saga_test;
#[cfg(all(test, feature = "sqlite"))]
#[path = "store_sqlite_test.rs"]
mod store_sqlite_test;
#[cfg(test)]
mod test_support;
