// Pooled redis client management

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use deadpool_redis::redis::{cmd, Cmd, FromRedisValue, RedisError};
use deadpool_redis::{Config, Pool, PoolConfig, PoolError, Runtime};
use thiserror::Error;

use crate::config::CacheConfig;

/// Error types for cache connection and command execution
#[derive(Debug, Error)]
pub enum CacheError {
    /// Error occurred while connecting to or checking out from the pool
    #[error("Cache connection error: {0}")]
    ConnectionError(String),

    /// Error occurred while executing a command
    #[error("Cache command error: {0}")]
    CommandError(String),

    /// The client was constructed without a pool
    #[error("cache client is not connected")]
    NotConnected,
}

/// Snapshot of connection-pool counters at probe time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub total_conns: u64,
    pub idle_conns: u64,
    pub stale_conns: u64,
    pub hits: u64,
    pub misses: u64,
    pub timeouts: u64,
}

/// Checkout counters maintained by the client. The pool layer is the only
/// writer; the health probe only reads snapshots.
#[derive(Debug, Default)]
struct PoolMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    timeouts: AtomicU64,
    stale: AtomicU64,
}

/// Pooled redis client shared by all request handlers for the process
/// lifetime. The pool is optional so a misconfigured or disabled cache can
/// still answer health probes (as down) instead of failing requests.
pub struct CacheClient {
    pool: Option<Pool>,
    metrics: PoolMetrics,
    config: CacheConfig,
}

impl CacheClient {
    /// Creates a pooled client from cache configuration. The pool connects
    /// lazily; an unreachable server surfaces on first use, not here.
    pub fn new(config: CacheConfig) -> Result<Self, CacheError> {
        let mut cfg = Config::from_url(config.connection_url());

        let mut pool_cfg = PoolConfig::new(config.pool_size);
        pool_cfg.timeouts.wait = Some(config.pool_timeout);
        pool_cfg.timeouts.create = Some(config.dial_timeout);
        pool_cfg.timeouts.recycle = Some(config.read_timeout);
        cfg.pool = Some(pool_cfg);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::ConnectionError(e.to_string()))?;

        Ok(Self {
            pool: Some(pool),
            metrics: PoolMetrics::default(),
            config,
        })
    }

    /// Creates a client with no underlying pool. Its health probe reports
    /// down without touching the network.
    pub fn disconnected(config: CacheConfig) -> Self {
        Self {
            pool: None,
            metrics: PoolMetrics::default(),
            config,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.pool.is_some()
    }

    pub(crate) fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Closes the pool. Safe to call more than once and on a client that was
    /// never connected.
    pub fn close(&self) {
        if let Some(pool) = &self.pool {
            if !pool.is_closed() {
                pool.close();
            }
        }
    }

    /// Liveness ping
    pub async fn ping(&self) -> Result<(), CacheError> {
        let _: String = self.query(cmd("PING")).await?;
        Ok(())
    }

    /// Server introspection blob (line-oriented `key:value` records)
    pub async fn server_info(&self) -> Result<String, CacheError> {
        self.query(cmd("INFO")).await
    }

    /// Total number of keys in the selected database
    pub async fn key_count(&self) -> Result<u64, CacheError> {
        self.query(cmd("DBSIZE")).await
    }

    /// Keys matching a glob pattern
    pub async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let mut command = cmd("KEYS");
        command.arg(pattern);
        self.query(command).await
    }

    /// Counter snapshot for the health report
    pub fn pool_stats(&self) -> PoolStats {
        let (total_conns, idle_conns) = match &self.pool {
            Some(pool) => {
                let status = pool.status();
                (status.size as u64, status.available as u64)
            }
            None => (0, 0),
        };

        PoolStats {
            total_conns,
            idle_conns,
            stale_conns: self.metrics.stale.load(Ordering::Relaxed),
            hits: self.metrics.hits.load(Ordering::Relaxed),
            misses: self.metrics.misses.load(Ordering::Relaxed),
            timeouts: self.metrics.timeouts.load(Ordering::Relaxed),
        }
    }

    /// Runs a command with the client's bounded retry policy: up to
    /// `max_retries` extra attempts with exponential backoff clamped to
    /// [`min_retry_backoff`, `max_retry_backoff`].
    async fn query<T: FromRedisValue>(&self, command: Cmd) -> Result<T, CacheError> {
        if self.pool.is_none() {
            return Err(CacheError::NotConnected);
        }

        let mut last_err = CacheError::NotConnected;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tokio::time::sleep(self.retry_backoff(attempt - 1)).await;
            }
            match self.checkout().await {
                Ok(mut conn) => {
                    let result: Result<T, RedisError> = command.query_async(&mut conn).await;
                    match result {
                        Ok(value) => return Ok(value),
                        Err(e) => last_err = CacheError::CommandError(e.to_string()),
                    }
                }
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }

    /// Checks a connection out of the pool, classifying the outcome into the
    /// pool counters: a connection available up front is a hit, waiting or
    /// dialing is a miss, a wait timeout is a timeout, and a pooled
    /// connection that cannot be handed back out counts as stale.
    async fn checkout(&self) -> Result<deadpool_redis::Connection, CacheError> {
        let pool = self.pool.as_ref().ok_or(CacheError::NotConnected)?;
        let available = pool.status().available;

        match pool.get().await {
            Ok(conn) => {
                if available > 0 {
                    self.metrics.hits.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.metrics.misses.fetch_add(1, Ordering::Relaxed);
                }
                Ok(conn)
            }
            Err(PoolError::Timeout(_)) => {
                self.metrics.timeouts.fetch_add(1, Ordering::Relaxed);
                Err(CacheError::ConnectionError(
                    "timed out waiting for a pooled connection".to_string(),
                ))
            }
            Err(PoolError::Backend(e)) => {
                self.metrics.stale.fetch_add(1, Ordering::Relaxed);
                Err(CacheError::ConnectionError(e.to_string()))
            }
            Err(e) => Err(CacheError::ConnectionError(e.to_string())),
        }
    }

    fn retry_backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        self.config
            .min_retry_backoff
            .saturating_mul(factor)
            .min(self.config.max_retry_backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_backoff_doubles_and_clamps() {
        let client = CacheClient::disconnected(CacheConfig::default());
        assert_eq!(client.retry_backoff(0), Duration::from_millis(8));
        assert_eq!(client.retry_backoff(1), Duration::from_millis(16));
        assert_eq!(client.retry_backoff(2), Duration::from_millis(32));
        // Clamped to max_retry_backoff well before overflow territory
        assert_eq!(client.retry_backoff(10), Duration::from_millis(500));
        assert_eq!(client.retry_backoff(63), Duration::from_millis(500));
    }

    #[test]
    fn test_disconnected_client_has_empty_pool_stats() {
        let client = CacheClient::disconnected(CacheConfig::default());
        assert!(!client.is_connected());
        assert_eq!(client.pool_stats(), PoolStats::default());
    }

    #[test]
    fn test_close_is_idempotent_without_pool() {
        let client = CacheClient::disconnected(CacheConfig::default());
        client.close();
        client.close();
    }

    #[tokio::test]
    async fn test_query_on_disconnected_client_fails_without_network() {
        let client = CacheClient::disconnected(CacheConfig::default());
        let err = client.ping().await.unwrap_err();
        assert!(matches!(err, CacheError::NotConnected));
    }
}
