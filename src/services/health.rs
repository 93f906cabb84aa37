// Health aggregation service: composes dependency health reports into a
// single status object. Dependencies are independent; a down dependency is
// reported as data, never as an error. Only encoding a report can fail.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::cache::CacheClient;
use crate::db::DbService;
use crate::error::ApiResult;

/// Aggregated health snapshot, built fresh per request. Each dependency's
/// report is carried as its JSON-encoded string form.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<String>,
}

/// Contract between the health endpoint and the aggregation logic. New
/// dependencies extend the aggregator, not this trait.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check_health(&self) -> ApiResult<HealthStatus>;
}

pub struct HealthService {
    db: Arc<dyn DbService>,
    cache: Option<Arc<CacheClient>>,
}

impl HealthService {
    pub fn new(db: Arc<dyn DbService>, cache: Option<Arc<CacheClient>>) -> Self {
        Self { db, cache }
    }
}

#[async_trait]
impl HealthCheck for HealthService {
    async fn check_health(&self) -> ApiResult<HealthStatus> {
        let db_report = self.db.health().await;
        let database = serde_json::to_string(&db_report)?;

        let cache = match &self.cache {
            Some(client) => Some(serde_json::to_string(&client.health().await)?),
            None => None,
        };

        Ok(HealthStatus { database, cache })
    }
}
