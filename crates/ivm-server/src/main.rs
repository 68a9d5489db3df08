use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use ivm_server::identity::PgIdentityStore;
use ivm_server::ws::registry::ConnectionRegistry;
use ivm_server::ws::verifier::ConnectionVerifier;
use ivm_server::{build_router, workers, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env
    dotenvy::dotenv().ok();

    // Load configuration
    let config = ivm_common::AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .json()
        .init();

    tracing::info!("Starting IVM real-time gateway...");

    // Connect to PostgreSQL
    let db = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to PostgreSQL")?;
    tracing::info!("Connected to PostgreSQL");

    // Connect to Redis when configured
    let redis = match &config.redis {
        Some(redis_config) => {
            let client = redis::Client::open(redis_config.url.as_str())?;
            let manager = client.get_connection_manager().await?;
            tracing::info!("Connected to Redis");
            Some(manager)
        }
        None => {
            tracing::warn!("Redis not configured; upgrade rate limiting and token revocation disabled");
            None
        }
    };

    // Build shared state
    let registry = Arc::new(ConnectionRegistry::new(&config.realtime));
    let verifier = ConnectionVerifier::new(
        Arc::new(PgIdentityStore::new(db)),
        &config.auth,
        redis.clone(),
    );
    let state = Arc::new(AppState {
        config: config.clone(),
        registry: registry.clone(),
        verifier,
        redis,
    });

    // Start background workers
    let worker_handles = workers::start_all_workers(state.clone());
    tracing::info!("Background workers started");

    let app = build_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.api_port)
        .parse()
        .context("Invalid server host/port")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(registry.clone()))
    .await?;

    for handle in worker_handles {
        handle.abort();
    }
    tracing::info!("Server stopped");

    Ok(())
}

/// Wait for Ctrl+C, then close every socket so upgraded connections do not
/// hold graceful shutdown open.
async fn shutdown_signal(registry: Arc<ConnectionRegistry>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
    registry.close_all();
}
