//! creditgate Server - Headless Daemon
//!
//! A pure Rust HTTP server that:
//! - Admits generation requests through a per-IP rate limiter and a monthly quota ledger
//! - Walks each service's ordered model fallback chain
//! - Charges quota only for delivered units
//!
//! Access via: http://localhost:8080/api/generate/{service}

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod cli;
mod config_commands;
mod router;
mod server_utils;
mod state;
#[cfg(test)]
mod test_helpers;

use cli::{Cli, Commands};
use creditgate_core::{
    config as core_config, HttpModelInvoker, InMemoryUsageRepository, PostgresUsageRepository,
    UsageRepository,
};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    match cli.command {
        None => run_server(None).await,
        Some(Commands::Serve { port }) => run_server(port).await,
        Some(Commands::Config(cmd)) => config_commands::handle_config_command(cmd),
    }
}

async fn run_server(port_override: Option<u16>) -> Result<()> {
    let mut config = core_config::load_config().map_err(|e| anyhow::anyhow!(e))?;
    if let Some(port) = port_override {
        config.server.port = port;
    }

    info!("🚀 creditgate starting on {}...", config.server.get_socket_addr());
    creditgate_core::metrics::init_metrics();

    let (repository, storage): (Arc<dyn UsageRepository>, &'static str) =
        match config.database_url.as_deref() {
            Some(url) => {
                let repo = PostgresUsageRepository::connect(url)
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to connect to PostgreSQL: {}", e))?;
                repo.run_migrations()
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
                info!("🐘 Usage records stored in PostgreSQL");
                (Arc::new(repo), "postgres")
            },
            None => {
                warn!("⚠️ No database_url configured, usage records live in memory only");
                (Arc::new(InMemoryUsageRepository::new()), "memory")
            },
        };

    if config.provider.api_key.is_empty() {
        warn!("⚠️ provider.api_key is empty, upstream calls will be rejected");
    }
    let invoker = Arc::new(
        HttpModelInvoker::new(&config.provider)
            .map_err(|e| anyhow::anyhow!("Failed to build model client: {}", e))?,
    );

    let state = AppState::new_with_components(&config, repository, invoker, storage)?;
    info!(
        "✅ Application state initialized: services [{}]",
        state.orchestrator().service_ids().collect::<Vec<_>>().join(", ")
    );

    let app = router::build_router(state);
    let listener = server_utils::create_listener(&config.server.host, config.server.port).await?;

    info!("🌐 Server listening on http://{}", config.server.get_socket_addr());
    info!("🔌 API available at http://{}/api/", config.server.get_socket_addr());

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(server_utils::shutdown_signal())
        .await?;

    info!("👋 Server stopped");
    Ok(())
}
