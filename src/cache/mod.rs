// Cache Module
// This module wraps the pooled redis client and its health probe

mod client;
mod health;

pub use client::{CacheClient, CacheError, PoolStats};
