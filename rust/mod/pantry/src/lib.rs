pub mod config;
pub mod engine;
pub mod ledger;
pub mod model;
pub mod schema;
pub mod worker;

mod batch;
mod catalog;
mod confirmation;
mod db;
mod reservation;
mod shortage;

use std::sync::Arc;

use larder_core::ServiceError;
use larder_sql::SQLStore;
use tokio_util::sync::CancellationToken;

pub use config::PantryConfig;
pub use engine::PantryEngine;
pub use model::*;
pub use worker::WorkerConfig;

/// The pantry module: the inventory engine plus its batch sweeper.
///
/// Embed this in a long-running service. One-shot tools can use
/// [`PantryEngine`] directly.
pub struct PantryModule {
    engine: Arc<PantryEngine>,
    worker_cancel: Option<CancellationToken>,
}

impl PantryModule {
    /// Create the module, initialise storage and, when enabled, start the
    /// sweeper. Must be called from within a tokio runtime.
    pub fn new(db: Arc<dyn SQLStore>, config: PantryConfig) -> Result<Self, ServiceError> {
        let worker_config = WorkerConfig::from(&config);
        let enabled = config.purge_enabled;
        let engine = Arc::new(PantryEngine::new(db, config)?);
        let worker_cancel = enabled.then(|| worker::start(Arc::clone(&engine), worker_config));

        Ok(Self {
            engine,
            worker_cancel,
        })
    }

    pub fn engine(&self) -> &Arc<PantryEngine> {
        &self.engine
    }

    /// Stop background work. The engine stays usable.
    pub fn shutdown(&self) {
        if let Some(cancel) = &self.worker_cancel {
            cancel.cancel();
        }
    }
}

impl Drop for PantryModule {
    fn drop(&mut self) {
        self.shutdown();
    }
}
