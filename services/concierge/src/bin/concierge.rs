//! services/concierge/src/bin/concierge.rs

use concierge_core::flow::FlowDefinition;
use concierge_core::memory::{InMemoryCatalog, InMemoryPersonaStore, InMemorySessionStore};
use concierge_core::ports::{CatalogService, PersonaStore, SessionStore};
use concierge_lib::{
    adapters::PgAdapter,
    config::Config,
    driver::{serve_lines, AppState},
    error::ServiceError,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::io::{stdin, stdout, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ServiceError> {
    // --- 1. Load Configuration & Set Up Logging ---
    // Stdout carries the protocol, so logs go to stderr.
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!("Configuration loaded. Starting concierge...");

    // --- 2. Load the Flow Definition ---
    let definition = FlowDefinition::from_path(&config.flow_definition_path)?;
    info!(
        path = %config.flow_definition_path.display(),
        version = %definition.version,
        entries = definition.entries.len(),
        "Flow definition loaded."
    );

    // --- 3. Connect the Stores ---
    let (personas, sessions, catalog) = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect(database_url)
                .await?;
            let db_adapter = Arc::new(PgAdapter::new(db_pool));
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            let personas: Arc<dyn PersonaStore> = db_adapter.clone();
            let sessions: Arc<dyn SessionStore> = db_adapter.clone();
            let catalog: Arc<dyn CatalogService> = db_adapter;
            (personas, sessions, catalog)
        }
        None => {
            warn!("DATABASE_URL is not set; personas and sessions will not outlive this process.");
            let personas: Arc<dyn PersonaStore> = Arc::new(InMemoryPersonaStore::new());
            let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
            let catalog: Arc<dyn CatalogService> = Arc::new(InMemoryCatalog::new());
            (personas, sessions, catalog)
        }
    };

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        Arc::new(definition),
        personas,
        sessions,
        catalog,
    ));

    // --- 5. Serve the Client on Stdin/Stdout ---
    serve_lines(app_state, BufReader::new(stdin()), stdout()).await?;
    info!("Concierge stopped.");
    Ok(())
}
