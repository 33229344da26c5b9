use clap::Args;

use lendlock_core::client::LendingClient;
use lendlock_core::config::ReservationConfig;
use lendlock_core::{CoordinatorError, Result};

/// Store and policy options shared by every subcommand that opens a client.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Storage backend: "memory" or "sqlite:<path>"
    #[arg(long, default_value = "memory", env = "LENDLOCK_STORAGE")]
    pub storage: String,

    /// Maximum concurrent reservations per holder (overrides the config file)
    #[arg(long, env = "LENDLOCK_MAX_QUOTA")]
    pub max_quota: Option<u32>,

    /// JSON file with a full reservation config
    #[arg(long, env = "LENDLOCK_CONFIG")]
    pub config: Option<String>,
}

impl StoreArgs {
    pub fn reservation_config(&self) -> Result<ReservationConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let json = std::fs::read_to_string(path).map_err(|e| {
                    CoordinatorError::InvalidConfig(format!("cannot read {}: {}", path, e))
                })?;
                ReservationConfig::from_json_str(&json)?
            }
            None => ReservationConfig::default(),
        };
        if let Some(max_quota) = self.max_quota {
            config = config.with_max_quota(max_quota);
        }
        config.validate()?;
        Ok(config)
    }

    // ─── Storage Backend Selection ──────────────────────────────────────────

    pub fn open_client(&self) -> Result<LendingClient> {
        let config = self.reservation_config()?;
        tracing::info!(
            max_quota = config.max_quota,
            max_cas_retries = config.max_cas_retries,
            serial = %config.serial_consistency,
            "reservation policy"
        );

        if self.storage == "memory" {
            tracing::info!("storage backend: in-memory replica set (nothing persists)");
            return LendingClient::in_memory(config);
        }
        if let Some(path) = self.storage.strip_prefix("sqlite:") {
            #[cfg(feature = "sqlite")]
            {
                tracing::info!("storage backend: SQLite ({})", path);
                return LendingClient::with_sqlite(path, config);
            }
            #[cfg(not(feature = "sqlite"))]
            {
                let _ = path;
                return Err(CoordinatorError::InvalidConfig(
                    "SQLite storage requested but the `sqlite` feature is not enabled".to_string(),
                ));
            }
        }
        Err(CoordinatorError::InvalidConfig(format!(
            "unknown storage backend '{}', use 'memory' or 'sqlite:<path>'",
            self.storage
        )))
    }
}
