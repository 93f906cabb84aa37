// Database connection pooling management

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use crate::config::ApiConfig;
use crate::db::error::DbError;
use crate::db::DbService;

/// Timeout applied to the health-check ping
const HEALTH_PING_TIMEOUT: Duration = Duration::from_secs(2);

/// Database connection pool for managing Sea-ORM connections
pub struct DbPool {
    pool: DatabaseConnection,
}

impl DbPool {
    /// Creates a new database connection pool from API configuration
    pub async fn new(config: &ApiConfig) -> Result<Self, DbError> {
        let max_connections: u32 = std::env::var("DB_POOL_MAX")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(50);
        let min_connections: u32 = std::env::var("DB_POOL_MIN")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);
        // How long to wait for a free connection before giving up
        let acquire_timeout_secs: u64 = 8;
        // Recycle idle connections before an upstream pooler kills them
        let idle_timeout_secs: u64 = 25;
        // Force full reconnect periodically to avoid stale connections
        let max_lifetime_secs: u64 = 300;
        let connect_timeout_secs: u64 = 10;

        let conn_opts = ConnectOptions::new(config.database_url.clone())
            .max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .idle_timeout(Duration::from_secs(idle_timeout_secs))
            .acquire_timeout(Duration::from_secs(acquire_timeout_secs))
            .max_lifetime(Duration::from_secs(max_lifetime_secs))
            .sqlx_logging(false)
            .to_owned();

        Database::connect(conn_opts)
            .await
            .map(|pool| DbPool { pool })
            .map_err(|e| DbError::ConnectionError(e.to_string()))
    }
}

#[async_trait]
impl DbService for DbPool {
    async fn health(&self) -> HashMap<String, String> {
        let mut stats = HashMap::new();

        match tokio::time::timeout(HEALTH_PING_TIMEOUT, self.pool.ping()).await {
            Ok(Ok(())) => {
                stats.insert("status".to_string(), "up".to_string());
                stats.insert("message".to_string(), "It's healthy".to_string());
            }
            Ok(Err(e)) => {
                stats.insert("status".to_string(), "down".to_string());
                stats.insert("error".to_string(), format!("db down: {}", e));
            }
            Err(_) => {
                stats.insert("status".to_string(), "down".to_string());
                stats.insert(
                    "error".to_string(),
                    "db down: health ping timed out".to_string(),
                );
            }
        }

        stats
    }
}
