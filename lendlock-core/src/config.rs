//! Coordinator configuration.

use serde::{Deserialize, Serialize};

use crate::error::{CoordinatorError, Result};
use crate::store::Consistency;
use crate::types::DAY_MS;

pub const DEFAULT_MAX_QUOTA: u32 = 3;
pub const DEFAULT_MAX_CAS_RETRIES: u32 = 16;
pub const DEFAULT_LOAN_PERIOD_DAYS: u32 = 14;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReservationConfig {
    /// Maximum simultaneous reservations per holder
    pub max_quota: u32,
    /// Compare-and-set rounds on a holder counter before giving up
    pub max_cas_retries: u32,
    /// Default loan length used when the caller gives no due date
    pub loan_period_days: u32,
    /// Catalog reads and listings
    pub read_consistency: Consistency,
    /// Plain writes (item insert, reservation insert)
    pub write_consistency: Consistency,
    /// Conditional writes and the reads that gate them
    pub serial_consistency: Consistency,
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            max_quota: DEFAULT_MAX_QUOTA,
            max_cas_retries: DEFAULT_MAX_CAS_RETRIES,
            loan_period_days: DEFAULT_LOAN_PERIOD_DAYS,
            read_consistency: Consistency::Quorum,
            write_consistency: Consistency::Quorum,
            serial_consistency: Consistency::Serial,
        }
    }
}

impl ReservationConfig {
    pub fn with_max_quota(mut self, max_quota: u32) -> Self {
        self.max_quota = max_quota;
        self
    }

    /// Parse a JSON config document; absent fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CoordinatorError::InvalidConfig(format!("malformed config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_quota == 0 {
            return Err(CoordinatorError::InvalidConfig(
                "max_quota must be greater than 0".to_string(),
            ));
        }
        if self.max_cas_retries == 0 {
            return Err(CoordinatorError::InvalidConfig(
                "max_cas_retries must be greater than 0".to_string(),
            ));
        }
        if self.loan_period_days == 0 {
            return Err(CoordinatorError::InvalidConfig(
                "loan_period_days must be greater than 0".to_string(),
            ));
        }
        // A conditional write acknowledged by a single replica is not linearizable.
        if !matches!(
            self.serial_consistency,
            Consistency::Serial | Consistency::All
        ) {
            return Err(CoordinatorError::InvalidConfig(format!(
                "serial_consistency must be SERIAL or ALL, got {}",
                self.serial_consistency
            )));
        }
        Ok(())
    }

    pub fn loan_period_ms(&self) -> u64 {
        u64::from(self.loan_period_days) * DAY_MS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(ReservationConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ReservationConfig::from_json_str(r#"{"max_quota": 2, "read_consistency": "one"}"#)
            .unwrap();
        assert_eq!(config.max_quota, 2);
        assert_eq!(config.read_consistency, Consistency::One);
        assert_eq!(config.max_cas_retries, DEFAULT_MAX_CAS_RETRIES);
    }

    #[test]
    fn rejects_zero_quota_and_weak_serial() {
        assert!(ReservationConfig::from_json_str(r#"{"max_quota": 0}"#).is_err());
        assert!(ReservationConfig::from_json_str(r#"{"serial_consistency": "one"}"#).is_err());
        assert!(ReservationConfig::from_json_str("not json").is_err());
    }
}
