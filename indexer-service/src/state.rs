//! Shared application state

use std::sync::Arc;

use election_core::projector::Projection;
use tokio::sync::RwLock;

use crate::config::ServiceConfig;
use crate::database::Database;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    /// Replaced wholesale after each persisted batch. Writers hold the lock
    /// for the whole ingest so batches are applied one at a time.
    pub projection: Arc<RwLock<Projection>>,
    pub config: Arc<ServiceConfig>,
}

impl AppState {
    pub fn new(db: Database, projection: Projection, config: ServiceConfig) -> Self {
        Self {
            db,
            projection: Arc::new(RwLock::new(projection)),
            config: Arc::new(config),
        }
    }
}
