use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use quill_core::config::{AppConfig, ConfigError, LoadOptions};
use quill_db::repositories::{
    LeadActivityRepository, LeadRepository, SqlAssignmentStore, SqlLeadActivityRepository,
    SqlLeadRepository,
};
use quill_db::{connect_with_settings, migrations, DbPool};
use quill_routing::{AssignmentRotator, LeadIntake, LeadProgress};

use crate::leads::LeadsState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub leads_state: LeadsState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Connect, migrate, and wire the routing services over their SQL
/// repositories. Everything downstream of config validation that can fail
/// fails here, before the listener binds.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;

    let leads: Arc<dyn LeadRepository> = Arc::new(SqlLeadRepository::new(db_pool.clone()));
    let activity: Arc<dyn LeadActivityRepository> =
        Arc::new(SqlLeadActivityRepository::new(db_pool.clone()));
    let store = Arc::new(SqlAssignmentStore::new(db_pool.clone()));

    let leads_state = LeadsState::new(
        Arc::new(LeadIntake::new(Arc::clone(&leads), Arc::clone(&activity))),
        Arc::new(AssignmentRotator::new(store, Arc::clone(&activity))),
        Arc::new(LeadProgress::new(Arc::clone(&leads), Arc::clone(&activity))),
        leads,
        activity,
        config.intake.partner_token.clone(),
    );

    info!(
        event_name = "system.bootstrap.ready",
        database_url = %config.database.url,
        "database migrated and routing services wired"
    );

    Ok(Application { config, db_pool, leads_state })
}
