// Database Module
// This module wraps the database connection pool and exposes its health capability

mod error;
mod pool;

use std::collections::HashMap;

use async_trait::async_trait;

pub use error::DbError;
pub use pool::DbPool;

/// Health capability of the database layer. The report never fails: an
/// unreachable database is captured as `status=down` inside the map.
#[async_trait]
pub trait DbService: Send + Sync {
    async fn health(&self) -> HashMap<String, String>;
}
