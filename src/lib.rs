pub mod config;
pub mod dispatch;
pub mod error;
pub mod models;
pub mod store;
pub mod sweeper;

use std::sync::Arc;

use crate::config::{Config, StoreConfig};
use crate::dispatch::HttpDispatcher;
use crate::error::SweepError;
use crate::store::{LeadStore, PgStore, RestStore};
use crate::sweeper::Sweeper;

/// Wire the configured store and the HTTP dispatcher into a sweeper.
pub async fn build_sweeper(config: &Config) -> Result<Sweeper, SweepError> {
    let store: Arc<dyn LeadStore> = match &config.store {
        StoreConfig::Rest { url, key } => Arc::new(
            RestStore::new(url, key, &config.table)
                .map_err(|e| SweepError::Config(e.to_string()))?,
        ),
        StoreConfig::Postgres { database_url } => Arc::new(
            PgStore::connect(database_url, &config.table)
                .await
                .map_err(SweepError::CandidateRead)?,
        ),
    };

    let dispatcher = HttpDispatcher::new(&config.webhook_url, config.sweep.dispatch_timeout)
        .map_err(SweepError::Config)?;

    Ok(Sweeper::new(store, Arc::new(dispatcher), config.sweep.clone()))
}
