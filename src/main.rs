// Pulse API server entry point

mod cache;
mod config;
mod db;
mod error;
mod handlers;
mod services;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, Router};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cache::CacheClient;
use config::ApiConfig;
use db::DbPool;
use handlers::{health_check, AppState};
use services::health::HealthService;

fn load_env() {
    dotenv::dotenv().ok();
}

#[tokio::main]
async fn main() {
    load_env();
    // Configure logging with tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load API configuration from environment
    let config = ApiConfig::from_env();
    tracing::info!("Configuration loaded");

    // Establish database connection pool
    let db_pool = DbPool::new(&config)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Connected to database");

    // Set up the optional cache client. A cache that cannot be reached is
    // kept so /health reports it as down instead of aborting startup.
    let cache_client = config.cache.clone().map(|cache_cfg| {
        let client = match CacheClient::new(cache_cfg.clone()) {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(error = %e, "Cache pool could not be created");
                CacheClient::disconnected(cache_cfg)
            }
        };
        Arc::new(client)
    });

    if let Some(client) = &cache_client {
        match tokio::time::timeout(Duration::from_secs(5), client.ping()).await {
            Ok(Ok(())) => tracing::info!("Connected to redis"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Redis unreachable, reporting cache as down"),
            Err(_) => tracing::warn!("Redis ping timed out, reporting cache as down"),
        }
    }

    let health_service = HealthService::new(Arc::new(db_pool), cache_client.clone());
    let app_state: AppState = Arc::new(health_service);

    // Set up API routes
    let app = Router::new()
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // Parse server address from config
    let addr: SocketAddr = config.server_addr().parse().expect("Invalid address");

    // Start HTTP server
    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");

    // The cache pool is closed exactly once, after in-flight requests drain
    if let Some(client) = &cache_client {
        client.close();
    }
    tracing::info!("Server exiting");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutting down gracefully");
}
