use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an attempt was turned down. These are expected outcomes, not errors;
/// no side effects survive a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    /// No holder row with that name
    HolderNotFound,
    /// No item row with that key
    ItemNotFound,
    /// The item was already held when checked
    ItemUnavailable,
    /// Another caller flipped the item's availability first
    LostRace,
    /// The holder already holds the maximum number of reservations
    QuotaExceeded,
    /// Nothing to release or prolong for that holder and item
    ReservationNotFound,
    /// Too many lost compare-and-set rounds on the holder's counter
    Contended,
}

impl RejectReason {
    /// Whether retrying the whole attempt later could succeed.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            RejectReason::ItemUnavailable
                | RejectReason::LostRace
                | RejectReason::QuotaExceeded
                | RejectReason::Contended
        )
    }

    /// Plain-language explanation for front ends.
    pub fn describe(self) -> &'static str {
        match self {
            RejectReason::HolderNotFound => "no such user",
            RejectReason::ItemNotFound => "no such book",
            RejectReason::ItemUnavailable => "the book is already reserved",
            RejectReason::LostRace => "someone else reserved the book a moment earlier",
            RejectReason::QuotaExceeded => "you already hold the maximum number of reservations",
            RejectReason::ReservationNotFound => "you do not hold a reservation for that book",
            RejectReason::Contended => "too many simultaneous requests, try again",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Protocol stages of the reserve and release state machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Checking,
    Locking,
    Charging,
    Recording,
    VerifyingHold,
    Deleting,
    Uncharging,
    Unlocking,
    Prolonging,
}

impl Stage {
    /// Stages that never write; a store failure there leaves nothing behind.
    pub fn is_read_only(self) -> bool {
        matches!(self, Stage::Checking | Stage::VerifyingHold)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Result of a reserve, release or prolong call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Committed,
    Rejected { reason: RejectReason },
    /// The store could not confirm whether a write applied. Re-read the
    /// item and holder before deciding anything.
    Indeterminate { stage: Stage, detail: String },
}

impl Outcome {
    pub fn rejected(reason: RejectReason) -> Self {
        Outcome::Rejected { reason }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed)
    }

    pub fn rejected_reason(&self) -> Option<RejectReason> {
        match self {
            Outcome::Rejected { reason } => Some(*reason),
            _ => None,
        }
    }

    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Outcome::Indeterminate { .. })
    }
}
