use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use dinely_core::config::{AppConfig, ConfigError, LoadOptions};
use dinely_core::dialog::DialogManager;
use dinely_db::repositories::{
    SqlDetailsStore, SqlLastSearchRepository, SqlRequestQueue, SqlSearchIndex,
};
use dinely_db::{connect_with_settings, migrations, DbPool};
use dinely_notify::channel::DeliveryError;
use dinely_notify::HttpEmailChannel;
use dinely_worker::{CandidateResolver, DetailEnricher, FulfillmentWorker, WorkerSettings};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub dialog: Arc<DialogManager>,
    pub queue: Arc<SqlRequestQueue>,
    pub worker: Arc<FulfillmentWorker>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("delivery channel setup failed: {0}")]
    Delivery(#[source] DeliveryError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let queue = Arc::new(SqlRequestQueue::new(db_pool.clone()));
    let channel = HttpEmailChannel::new(
        config.delivery.base_url.clone(),
        config.delivery.api_token.clone(),
        config.delivery.sender.clone(),
        Duration::from_secs(config.worker.call_timeout_secs),
    )
    .map_err(BootstrapError::Delivery)?;

    let worker = Arc::new(FulfillmentWorker::new(
        queue.clone(),
        CandidateResolver::new(Arc::new(SqlSearchIndex::new(db_pool.clone()))),
        DetailEnricher::new(Arc::new(SqlDetailsStore::new(db_pool.clone()))),
        Arc::new(channel),
        Arc::new(SqlLastSearchRepository::new(db_pool.clone())),
        WorkerSettings::from_config(&config.queue, &config.worker),
    ));

    Ok(Application {
        config,
        db_pool,
        dialog: Arc::new(DialogManager::default()),
        queue,
        worker,
    })
}
