//! Quota ledger: a bounded per-holder counter kept with compare-and-set.
//!
//! Each round reads `active_count = c` and writes `c ± 1` guarded by
//! `active_count = c`. Losing a round means another writer moved the counter,
//! so the ledger re-reads and tries again, up to `max_cas_retries` rounds.

use std::sync::Arc;

use tracing::{debug, error, trace};

use crate::error::{CoordinatorError, Result};
use crate::store::{Condition, Consistency, Key, ReplicatedStore, Value, row};
use crate::types::{Holder, columns};

/// Result of trying to charge a holder one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charge {
    Charged,
    AtQuota,
    UnknownHolder,
}

pub struct QuotaLedger {
    store: Arc<dyn ReplicatedStore>,
    serial: Consistency,
    max_cas_retries: u32,
}

impl QuotaLedger {
    pub fn new(store: Arc<dyn ReplicatedStore>, serial: Consistency, max_cas_retries: u32) -> Self {
        Self {
            store,
            serial,
            max_cas_retries: max_cas_retries.max(1),
        }
    }

    /// Current count, or `None` for an unknown holder.
    pub fn current(&self, holder: &str) -> Result<Option<u32>> {
        let key = Key::holder(holder);
        self.store
            .get(&key, self.serial)?
            .map(|row| Holder::from_row(&key, &row).map(|h| h.active_count))
            .transpose()
    }

    /// Charge one unit to `holder` unless that would exceed `max_quota`.
    /// Nothing is written unless the result is `Charge::Charged`.
    pub fn try_increment(&self, holder: &str, max_quota: u32) -> Result<Charge> {
        let key = Key::holder(holder);
        for attempt in 1..=self.max_cas_retries {
            let Some(count) = self.current(holder)? else {
                debug!(holder, "no holder row to charge");
                return Ok(Charge::UnknownHolder);
            };
            if count >= max_quota {
                debug!(holder, count, max_quota, "holder at quota");
                return Ok(Charge::AtQuota);
            }
            if self.swap(&key, count, count + 1)? {
                debug!(holder, active_count = count + 1, "quota charged");
                return Ok(Charge::Charged);
            }
            trace!(holder, attempt, "quota increment lost a CAS round");
        }
        Err(CoordinatorError::Contended {
            key: key.to_string(),
            attempts: self.max_cas_retries,
        })
    }

    /// Return one unit. The caller holds a reservation, so the counter must
    /// be positive; anything else is an invariant violation.
    pub fn decrement(&self, holder: &str) -> Result<()> {
        let key = Key::holder(holder);
        for attempt in 1..=self.max_cas_retries {
            let count = self.read_existing(holder)?;
            if count == 0 {
                error!(holder, "decrement on a zero counter");
                return Err(CoordinatorError::invariant(format!(
                    "holder '{}' has no active reservations to release",
                    holder
                )));
            }
            if self.swap(&key, count, count - 1)? {
                debug!(holder, active_count = count - 1, "quota returned");
                return Ok(());
            }
            trace!(holder, attempt, "quota decrement lost a CAS round");
        }
        Err(CoordinatorError::Contended {
            key: key.to_string(),
            attempts: self.max_cas_retries,
        })
    }

    fn read_existing(&self, holder: &str) -> Result<u32> {
        // Only reached while releasing a reservation the holder owns.
        self.current(holder)?.ok_or_else(|| {
            error!(holder, "holder row missing from quota ledger");
            CoordinatorError::invariant(format!("holder '{}' vanished", holder))
        })
    }

    fn swap(&self, key: &Key, expected: u32, next: u32) -> Result<bool> {
        Ok(self.store.conditional_put(
            key,
            row([(columns::ACTIVE_COUNT, Value::from(next))]),
            &Condition::equals(columns::ACTIVE_COUNT, expected),
            self.serial,
        )?)
    }
}
