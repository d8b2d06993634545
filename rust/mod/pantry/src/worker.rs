use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::PantryConfig;
use crate::engine::PantryEngine;

/// Configuration for the background batch sweeper.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How often to look for batches to purge.
    pub purge_interval: Duration,
    /// Fully eaten batches prepared longer ago than this are deleted.
    pub retention: chrono::Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::from(&PantryConfig::default())
    }
}

impl From<&PantryConfig> for WorkerConfig {
    fn from(config: &PantryConfig) -> Self {
        Self {
            purge_interval: config.purge_interval(),
            retention: config.retention(),
        }
    }
}

/// Start the batch purge loop.
///
/// Returns a CancellationToken that stops the sweeper when cancelled.
pub fn start(engine: Arc<PantryEngine>, config: WorkerConfig) -> CancellationToken {
    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        let interval = config.purge_interval;
        let retention = config.retention;

        tokio::spawn(async move {
            info!(
                "batch sweeper started (interval={interval:?}, retention={}d)",
                retention.num_days()
            );
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("batch sweeper stopped");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        debug!("batch sweep");
                        match engine.purge_batches(retention) {
                            Ok(0) => {}
                            Ok(n) => info!("batch sweeper: purged {n} empty batches"),
                            Err(e) => error!("batch sweeper error: {e}"),
                        }
                    }
                }
            }
        });
    }

    cancel
}
