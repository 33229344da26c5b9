//! The reservation coordinator: the only component that creates or deletes
//! reservation rows.
//!
//! Reserving is a saga over three rows that the store cannot update
//! atomically together:
//!
//! ```text
//! Checking -> Locking -> Charging -> Recording -> Committed
//!    |           |          |
//!    |           |          +-- at quota: release item, Rejected(QuotaExceeded)
//!    |           +-- lost the CAS: Rejected(LostRace)
//!    +-- Rejected(HolderNotFound | ItemNotFound | ItemUnavailable)
//! ```
//!
//! Between Locking and Charging the item is locked but not yet charged to
//! anyone. That window is confined to a single call and is closed either
//! by Recording or by the Locking compensation. Other callers only ever see
//! the item as unavailable during it.
//!
//! A transient store failure on any write yields `Outcome::Indeterminate`:
//! the write may have applied, so the coordinator never compensates on
//! guesswork. Callers re-read the item and holder before retrying.

use std::cell::OnceCell;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::audit::{self, AuditReport};
use crate::catalog::CatalogRepository;
use crate::config::ReservationConfig;
use crate::error::{CoordinatorError, Result};
use crate::lock::ItemLockManager;
use crate::quota::{Charge, QuotaLedger};
use crate::saga::{Saga, SagaOutcome, StepOutcome};
use crate::store::{Condition, Key, ReplicatedStore, Value, row};
use crate::types::{
    DAY_MS, ItemId, ItemKey, MAX_DUE_AT, Outcome, RejectReason, Reservation, Stage, columns,
    now_ms,
};

pub struct ReservationCoordinator {
    store: Arc<dyn ReplicatedStore>,
    /// Reads here gate conditional writes, so they use serial consistency.
    catalog: CatalogRepository,
    locks: ItemLockManager,
    quota: QuotaLedger,
    config: ReservationConfig,
}

impl ReservationCoordinator {
    pub fn new(store: Arc<dyn ReplicatedStore>, config: ReservationConfig) -> Result<Self> {
        config.validate()?;
        let catalog = CatalogRepository::new(store.clone(), &config)
            .with_read_consistency(config.serial_consistency);
        let locks = ItemLockManager::new(store.clone(), config.serial_consistency);
        let quota = QuotaLedger::new(
            store.clone(),
            config.serial_consistency,
            config.max_cas_retries,
        );
        Ok(Self {
            store,
            catalog,
            locks,
            quota,
            config,
        })
    }

    pub fn config(&self) -> &ReservationConfig {
        &self.config
    }

    /// Reserve `item_id` for `holder` until `due_at` (Unix ms).
    pub fn reserve(
        &self,
        holder: &str,
        item_id: &ItemId,
        item_title: &str,
        due_at: u64,
    ) -> Result<Outcome> {
        check_due_at(due_at)?;
        let item = ItemKey::new(item_title, item_id.clone());
        let reservation = Reservation {
            holder: holder.to_string(),
            item_id: item_id.clone(),
            item_title: item_title.to_string(),
            due_at,
        };
        let max_quota = self.config.max_quota;

        let outcome = Saga::new("reserve")
            .step(Stage::Checking, || self.check_reservable(holder, &item))
            .compensated_step(
                Stage::Locking,
                || {
                    Ok(if self.locks.acquire(&item)? {
                        StepOutcome::Advance
                    } else {
                        StepOutcome::Halt(RejectReason::LostRace)
                    })
                },
                || self.locks.release(&item),
            )
            .step(Stage::Charging, || {
                match self.quota.try_increment(holder, max_quota) {
                    Ok(Charge::Charged) => Ok(StepOutcome::Advance),
                    Ok(Charge::AtQuota) => Ok(StepOutcome::Halt(RejectReason::QuotaExceeded)),
                    Ok(Charge::UnknownHolder) => {
                        Ok(StepOutcome::Halt(RejectReason::HolderNotFound))
                    }
                    // Every lost round left the counter untouched.
                    Err(CoordinatorError::Contended { .. }) => {
                        Ok(StepOutcome::Halt(RejectReason::Contended))
                    }
                    Err(e) => Err(e),
                }
            })
            // A plain insert: the lock and the charge already make the
            // (holder, item) pair unique. Never retried blindly, since a
            // retry after an unknown failure could double-charge.
            .step(Stage::Recording, || {
                self.store.put(
                    &reservation.key(),
                    reservation.to_row(),
                    self.config.write_consistency,
                )?;
                Ok(StepOutcome::Advance)
            })
            .run();

        let settled = Self::settle("reserve", outcome, &[Stage::Charging, Stage::Recording])?;
        if settled.is_committed() {
            info!(holder, %item, due_at, "reservation committed");
        }
        Ok(settled)
    }

    /// Reserve for `days` days starting now, or for the configured loan
    /// period when `days` is `None`.
    pub fn reserve_for_days(
        &self,
        holder: &str,
        item_id: &ItemId,
        item_title: &str,
        days: Option<u32>,
    ) -> Result<Outcome> {
        let period = days.map_or(self.config.loan_period_ms(), |d| u64::from(d) * DAY_MS);
        self.reserve(holder, item_id, item_title, now_ms().saturating_add(period))
    }

    /// Release a held reservation: delete it, return the quota unit, then
    /// make the item available again.
    ///
    /// Only the delete is race-protected. Two concurrent releases of the
    /// same reservation yield one `Committed` and one
    /// `Rejected(ReservationNotFound)`; nothing stronger is promised.
    pub fn release(&self, holder: &str, item_id: &ItemId, item_title: &str) -> Result<Outcome> {
        let key = Key::reservation(holder, item_id.as_str());
        let held: OnceCell<Reservation> = OnceCell::new();

        let outcome = Saga::new("release")
            .step(Stage::VerifyingHold, || {
                match self.catalog.get_reservation(holder, item_id)? {
                    Some(reservation) => {
                        if reservation.item_title != item_title {
                            warn!(
                                holder,
                                %item_id,
                                given = item_title,
                                stored = %reservation.item_title,
                                "release title differs from reservation, using stored title"
                            );
                        }
                        let _ = held.set(reservation);
                        Ok(StepOutcome::Advance)
                    }
                    None => Ok(StepOutcome::Halt(RejectReason::ReservationNotFound)),
                }
            })
            .step(Stage::Deleting, || {
                let deleted = self.store.conditional_delete(
                    &key,
                    &Condition::Exists,
                    self.config.serial_consistency,
                )?;
                Ok(if deleted {
                    StepOutcome::Advance
                } else {
                    // A concurrent release got there first.
                    StepOutcome::Halt(RejectReason::ReservationNotFound)
                })
            })
            .step(Stage::Uncharging, || {
                self.quota.decrement(holder)?;
                Ok(StepOutcome::Advance)
            })
            .step(Stage::Unlocking, || {
                let item = held
                    .get()
                    .map(Reservation::item_key)
                    .unwrap_or_else(|| ItemKey::new(item_title, item_id.clone()));
                self.locks.release(&item)?;
                Ok(StepOutcome::Advance)
            })
            .run();

        let settled = Self::settle("release", outcome, &[Stage::Uncharging, Stage::Unlocking])?;
        if settled.is_committed() {
            info!(holder, %item_id, "reservation released");
        }
        Ok(settled)
    }

    /// Move the due date of an existing reservation.
    pub fn prolong(&self, holder: &str, item_id: &ItemId, new_due_at: u64) -> Result<Outcome> {
        check_due_at(new_due_at)?;
        let applied = self.store.conditional_put(
            &Key::reservation(holder, item_id.as_str()),
            row([(columns::DUE_AT, Value::from(new_due_at))]),
            &Condition::Exists,
            self.config.serial_consistency,
        );
        match applied {
            Ok(true) => {
                info!(holder, %item_id, new_due_at, "reservation prolonged");
                Ok(Outcome::Committed)
            }
            Ok(false) => Ok(Outcome::rejected(RejectReason::ReservationNotFound)),
            Err(e) if e.is_transient() => {
                warn!(holder, %item_id, error = %e, "prolong outcome unknown");
                Ok(Outcome::Indeterminate {
                    stage: Stage::Prolonging,
                    detail: e.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Check the reservation invariants over the whole store.
    pub fn audit(&self) -> Result<AuditReport> {
        audit::audit(&self.catalog, self.config.max_quota)
    }

    // Advisory only: the conditional write in Locking is the real check.
    fn check_reservable(&self, holder: &str, item: &ItemKey) -> Result<StepOutcome> {
        if self.catalog.get_holder(holder)?.is_none() {
            return Ok(StepOutcome::Halt(RejectReason::HolderNotFound));
        }
        Ok(match self.catalog.get_item_by_key(item)? {
            None => StepOutcome::Halt(RejectReason::ItemNotFound),
            Some(found) if !found.available => StepOutcome::Halt(RejectReason::ItemUnavailable),
            Some(_) => StepOutcome::Advance,
        })
    }

    /// Map a saga result onto the caller-facing outcome.
    ///
    /// `exposed` lists the stages that run after the saga's first
    /// irreversible write; a hard failure there leaves the rows disagreeing
    /// and is reported as an invariant violation.
    fn settle(operation: &'static str, outcome: SagaOutcome, exposed: &[Stage]) -> Result<Outcome> {
        match outcome {
            SagaOutcome::Completed => Ok(Outcome::Committed),
            SagaOutcome::Halted { reason, .. } => Ok(Outcome::rejected(reason)),
            SagaOutcome::Failed { stage, error } if stage.is_read_only() => Err(error),
            SagaOutcome::Failed { stage, error } if error.is_transient() => {
                warn!(operation, %stage, %error, "outcome indeterminate");
                Ok(Outcome::Indeterminate {
                    stage,
                    detail: error.to_string(),
                })
            }
            SagaOutcome::Failed { stage, error } => {
                if error.is_invariant_violation() || !exposed.contains(&stage) {
                    return Err(error);
                }
                error!(operation, %stage, %error, "failed after earlier writes applied");
                Err(CoordinatorError::invariant(format!(
                    "{} failed at {} after earlier steps applied: {}",
                    operation, stage, error
                )))
            }
            SagaOutcome::CompensationFailed {
                stage,
                reason,
                error,
            } => {
                if error.is_transient() {
                    warn!(operation, %stage, ?reason, %error, "compensation outcome indeterminate");
                    return Ok(Outcome::Indeterminate {
                        stage,
                        detail: format!("undoing {} after {:?}: {}", stage, reason, error),
                    });
                }
                error!(operation, %stage, ?reason, %error, "compensation failed");
                if error.is_invariant_violation() {
                    Err(error)
                } else {
                    Err(CoordinatorError::invariant(format!(
                        "{} could not undo {} after {:?}: {}",
                        operation, stage, reason, error
                    )))
                }
            }
        }
    }
}

/// Due dates are stored as signed 64-bit milliseconds.
fn check_due_at(due_at: u64) -> Result<()> {
    if due_at == 0 || due_at > MAX_DUE_AT {
        return Err(CoordinatorError::InvalidRequest(format!(
            "due_at {} is outside 1..={}",
            due_at, MAX_DUE_AT
        )));
    }
    Ok(())
}
