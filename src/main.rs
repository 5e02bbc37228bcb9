use clap::Parser;
use r2d2::Pool;
use std::sync::Arc;
use tracing::{error, info};

mod config;
mod db;
mod error;
mod llm;
mod pipeline;
mod safety;
mod util;
mod web;

use crate::config::{AppConfig, CliArgs};
use crate::db::db_pool::DataStoreConnectionManager;
use crate::db::executor::QueryExecutor;
use crate::db::history::HistoryStore;
use crate::db::schema::SchemaInspector;
use crate::llm::prompt::DEFAULT_INSTRUCTIONS;
use crate::llm::LlmManager;
use crate::pipeline::QueryPipeline;
use crate::util::logging::init_tracing;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_tracing();

    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    info!(
        "Connecting to data store at {}",
        config.database.connection_string
    );
    let manager = DataStoreConnectionManager::new(&config.database.connection_string)?;
    let pool = Pool::builder()
        .max_size(config.database.pool_size as u32)
        .build(manager)?;

    info!(
        "Initializing history store at {}",
        config.history.connection_string
    );
    let history = Arc::new(HistoryStore::new(config.history.connection_string.clone()));
    history.initialize().await?;

    // Initialize LLM manager
    info!("Initializing LLM manager with backend: {}", config.llm.backend);
    let llm = Arc::new(LlmManager::new(&config.llm)?);

    // The instruction template is policy configuration; a file override wins
    let instructions = config
        .prompt
        .instructions
        .clone()
        .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string());

    let query_pipeline = QueryPipeline::new(
        SchemaInspector::new(pool.clone()),
        QueryExecutor::new(pool),
        llm,
        Arc::clone(&history),
        instructions,
    );

    let app_state = Arc::new(AppState::new(query_pipeline, history));

    // Start the web server
    info!(
        "Starting nl-sql server on {}:{}",
        config.web.host, config.web.port
    );
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e);
        }
    }

    Ok(())
}
