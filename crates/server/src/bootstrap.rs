use std::sync::Arc;

use staffchat_agent::{LlmError, Orchestrator};
use staffchat_core::config::{AppConfig, ConfigError, LoadOptions};
use staffchat_db::{connect_with_settings, AccessMode, DbPool, SqliteDataSource};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub orchestrator: Arc<Orchestrator>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("model client setup failed: {0}")]
    Llm(#[source] LlmError),
    #[error("chart directory `{path}` could not be created: {source}")]
    ChartDirectory { path: String, source: std::io::Error },
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
        AccessMode::ReadOnly,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        access_mode = "read_only",
        "database connection established"
    );

    tokio::fs::create_dir_all(&config.charts.directory).await.map_err(|source| {
        BootstrapError::ChartDirectory { path: config.charts.directory.display().to_string(), source }
    })?;

    let source = Arc::new(SqliteDataSource::new(db_pool.clone(), config.database.timeout_secs));
    let orchestrator = Orchestrator::from_config(&config, source).map_err(BootstrapError::Llm)?;
    info!(
        event_name = "system.bootstrap.agents_ready",
        correlation_id = "bootstrap",
        router_model = %config.llm.router_model,
        query_model = %config.llm.query_model,
        analysis_model = %config.llm.analysis_model,
        "router and agents initialized"
    );

    Ok(Application { config, db_pool, orchestrator: Arc::new(orchestrator) })
}
