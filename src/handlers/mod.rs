// Handlers Module
// This module contains the API endpoint handlers

mod health;

use std::sync::Arc;

use crate::services::health::HealthCheck;

pub use health::health_check;

// Type alias for the application state
pub type AppState = Arc<dyn HealthCheck>;
