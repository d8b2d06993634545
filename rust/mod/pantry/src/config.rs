use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables of the pantry module, read from the `[pantry]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PantryConfig {
    /// Fully eaten batches older than this many days are purged.
    #[serde(default = "default_retention_days")]
    pub batch_retention_days: u32,

    /// Seconds between purge sweeps.
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,

    /// Run the purge sweeper at all.
    #[serde(default = "default_true")]
    pub purge_enabled: bool,
}

fn default_retention_days() -> u32 {
    7
}

fn default_purge_interval() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

impl Default for PantryConfig {
    fn default() -> Self {
        Self {
            batch_retention_days: default_retention_days(),
            purge_interval_secs: default_purge_interval(),
            purge_enabled: default_true(),
        }
    }
}

impl PantryConfig {
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.batch_retention_days))
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }
}
