//! Error types for lendlock

use thiserror::Error;

use crate::store::Consistency;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub type Result<T> = std::result::Result<T, CoordinatorError>;

/// Failures reported by a store backend.
///
/// `Unavailable` and `Timeout` are transient: for a write they mean the
/// outcome is unknown, not that the write did not happen.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not enough replicas for {consistency}: need {required}, {alive} alive")]
    Unavailable {
        consistency: Consistency,
        required: usize,
        alive: usize,
    },

    #[error("{operation} on {key} timed out")]
    Timeout { operation: &'static str, key: String },

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Is this a transient error (retry after re-reading state)?
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. } | StoreError::Timeout { .. })
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Backend(format!("row encoding: {}", e))
    }
}

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A write the protocol guarantees must apply did not. Aborts the
    /// current operation and must be surfaced to an operator.
    #[error("invariant violation: {context}")]
    InvariantViolation { context: String },

    #[error("gave up on {key} after {attempts} lost compare-and-set attempts")]
    Contended { key: String, attempts: u32 },

    #[error("corrupt row {key}: {reason}")]
    CorruptRow { key: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Rejected before touching the store.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl CoordinatorError {
    pub fn invariant(context: impl Into<String>) -> Self {
        CoordinatorError::InvariantViolation {
            context: context.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        match self {
            CoordinatorError::Store(e) => e.is_transient(),
            _ => false,
        }
    }

    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, CoordinatorError::InvariantViolation { .. })
    }
}
