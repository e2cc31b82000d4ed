use anyhow::{Context, Result};
use std::time::Duration;

/// Largest page a search may request unless overridden.
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,
    pub database_max_connections: u32,
    pub database_acquire_timeout: Duration,

    // Export cache
    pub export_cache_ttl: Duration,
    pub export_cache_capacity: u64,

    // Search
    pub search_max_page_size: u32,

    // Bulk population
    pub populate_seed: Option<u64>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            // Database
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL not set")?,
            database_max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            database_acquire_timeout: Duration::from_secs(env_or(
                "DATABASE_ACQUIRE_TIMEOUT_SECS",
                5,
            )),

            // Export cache
            export_cache_ttl: Duration::from_secs(env_or("EXPORT_CACHE_TTL_SECS", 300)),
            export_cache_capacity: env_or("EXPORT_CACHE_CAPACITY", 64),

            // Search
            search_max_page_size: env_or("SEARCH_MAX_PAGE_SIZE", DEFAULT_MAX_PAGE_SIZE),

            // Bulk population
            populate_seed: std::env::var("POPULATE_SEED")
                .ok()
                .and_then(|v| v.parse().ok()),
        })
    }

    /// Settings for running the core without a database (tests, experiments)
    pub fn in_memory() -> Self {
        Self {
            database_url: String::new(),
            database_max_connections: 1,
            database_acquire_timeout: Duration::from_secs(5),
            export_cache_ttl: Duration::from_secs(300),
            export_cache_capacity: 64,
            search_max_page_size: DEFAULT_MAX_PAGE_SIZE,
            populate_seed: None,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
