//! PDS Agent Binary
//!
//! Runs the agent's admin HTTP server.

use pds_backends::backends::DataVaultBackend;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use pds_agent::{create_router, default_registry, Agent, AgentConfig, AgentStore, MemoryStore};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AgentConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    let log_level = config.log_level.parse().unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "PDS agent stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AgentConfig) -> Result<(), String> {
    let store = open_store(&config).await?;

    if let Some(url) = &config.data_vault_url {
        match DataVaultBackend::new().with_api_url(url.clone()).ping().await {
            Ok(()) => info!(url = %url, "Data vault reachable"),
            Err(e) => warn!(url = %url, error = %e, "Data vault not reachable at startup"),
        }
    }

    let registry = default_registry(&config);
    let port = config.port;
    let agent = Agent::new(config, registry, store)
        .await
        .map_err(|e| e.to_string())?;

    info!(
        label = %agent.config.label,
        public_did = ?agent.config.public_did,
        port = port,
        "Starting PDS agent"
    );

    // Build router
    let app = create_router(Arc::new(agent));

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    info!(addr = %addr, "PDS agent listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| format!("Server error: {}", e))
}

#[cfg(feature = "postgres")]
async fn open_store(config: &AgentConfig) -> Result<Arc<dyn AgentStore>, String> {
    match &config.database_url {
        Some(url) => {
            let store = pds_agent::storage::PostgresStore::new(url)
                .await
                .map_err(|e| e.to_string())?;
            info!("Using PostgreSQL agent store");
            if config.route_cache_ttl_secs > 0 {
                warn!(
                    ttl_secs = config.route_cache_ttl_secs,
                    "Route cache enabled on a shared store; set PDS_AGENT_ROUTE_CACHE_TTL_SECS=0 if other agents write to it"
                );
            }
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(MemoryStore::new())),
    }
}

#[cfg(not(feature = "postgres"))]
async fn open_store(config: &AgentConfig) -> Result<Arc<dyn AgentStore>, String> {
    if config.database_url.is_some() {
        warn!("PDS_AGENT_DATABASE_URL is set but the postgres feature is disabled; using in-memory store");
    }
    Ok(Arc::new(MemoryStore::new()))
}
