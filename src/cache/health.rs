// Cache health probe: liveness ping, server introspection, pool counters
// and derived status messages. The probe never fails; every failure path is
// captured as report fields.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use crate::cache::client::{CacheClient, CacheError, PoolStats};
use crate::config::CacheConfig;

/// Bound applied to each network call in the probe, independent of any
/// request-level timeout
const HEALTH_OP_TIMEOUT: Duration = Duration::from_secs(2);

/// INFO fields copied into the report
const INFO_FIELDS: [&str; 4] = [
    "used_memory",
    "connected_clients",
    "blocked_clients",
    "total_connections_received",
];

impl CacheClient {
    /// Probes the cache and returns a report map. Always contains `status`;
    /// all other fields are best-effort. Only a failed liveness ping
    /// short-circuits the probe.
    pub async fn health(&self) -> HashMap<String, String> {
        let mut stats = HashMap::new();

        if !self.is_connected() {
            stats.insert("status".to_string(), "down".to_string());
            stats.insert("error".to_string(), "redis client is nil".to_string());
            return stats;
        }

        if let Err(e) = bounded(self.ping()).await {
            stats.insert("status".to_string(), "down".to_string());
            stats.insert("error".to_string(), format!("redis down: {}", e));
            return stats;
        }

        let info_ok = match bounded(self.server_info()).await {
            Ok(info) => {
                stats.insert("status".to_string(), "up".to_string());
                parse_info(&info, &mut stats);
                true
            }
            Err(e) => {
                stats.insert("status".to_string(), "degraded".to_string());
                stats.insert(
                    "error".to_string(),
                    format!("could not get redis info: {}", e),
                );
                false
            }
        };

        // Pool counters are local and always available once the ping passed
        let pool = self.pool_stats();
        stats.insert("total_conns".to_string(), pool.total_conns.to_string());
        stats.insert("idle_conns".to_string(), pool.idle_conns.to_string());
        stats.insert("stale_conns".to_string(), pool.stale_conns.to_string());
        stats.insert("hits".to_string(), pool.hits.to_string());
        stats.insert("misses".to_string(), pool.misses.to_string());
        stats.insert("timeouts".to_string(), pool.timeouts.to_string());

        if info_ok {
            let used_memory = stats.get("used_memory").and_then(|v| v.parse().ok());
            let message = derive_message(self.config(), &pool, used_memory)
                .unwrap_or("It's healthy");
            stats.insert("message".to_string(), message.to_string());
        }

        // Key space info for timer metrics, best effort
        if let Ok(count) = bounded(self.key_count()).await {
            stats.insert("total_keys".to_string(), count.to_string());

            let pattern = format!("{}*", self.config().reserved_key_prefix);
            if let Ok(keys) = bounded(self.keys_matching(&pattern)).await {
                stats.insert("timer_keys".to_string(), keys.len().to_string());
            }
        }

        stats
    }
}

async fn bounded<T>(
    op: impl Future<Output = Result<T, CacheError>>,
) -> Result<T, CacheError> {
    match tokio::time::timeout(HEALTH_OP_TIMEOUT, op).await {
        Ok(result) => result,
        Err(_) => Err(CacheError::CommandError("operation timed out".to_string())),
    }
}

/// Extracts known fields from the line-oriented `key:value` INFO payload.
/// Comment and malformed lines are skipped without failing the probe.
fn parse_info(info: &str, stats: &mut HashMap<String, String>) {
    for line in info.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if INFO_FIELDS.contains(&key) {
            stats.insert(key.to_string(), value.to_string());
        }
    }
}

/// Evaluates the status-message heuristics over fixed counters. Rules run in
/// a fixed order and each overwrites the previous match; the last one to
/// trigger wins.
fn derive_message(
    config: &CacheConfig,
    pool: &PoolStats,
    used_memory: Option<u64>,
) -> Option<&'static str> {
    let mut message = None;

    // Near the configured pool size (>= 90% in use)
    if config.pool_size > 0
        && pool.total_conns > 0
        && pool.total_conns * 10 >= config.pool_size as u64 * 9
    {
        message = Some("Redis is experiencing high connection usage");
    }

    if pool.misses > pool.hits / 2 {
        message = Some("High number of pool misses, consider increasing pool size");
    }

    if pool.timeouts > config.timeout_threshold {
        message = Some("High number of timeouts, check Redis server load");
    }

    if pool.stale_conns > 0 {
        message = Some("Detected stale connections, check network stability");
    }

    if let Some(mem) = used_memory {
        if mem > config.memory_threshold {
            message = Some("High memory usage in Redis");
        }
    }

    message
}
