/*!
 * Core engine configuration
 *
 * Configuration for the relational store, cache coordinator, and external
 * sync pipeline.
 */

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Postgres connection string for the relational store gateway.
    pub database_url: String,
    /// Redis connection string for the cache coordinator.
    pub cache_url: String,
    pub pool: PoolConfig,
    pub cache_timeouts: CacheTimeoutConfig,
    pub sync: SyncConfig,
    pub debug: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub min_connections: u32,
    pub max_connections: u32,
    pub recycle_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheTimeoutConfig {
    /// Bound on a single GET/SET round trip, in milliseconds.
    pub get_set_timeout_ms: u64,
    /// Bound on a single pattern-delete batch, in milliseconds.
    pub pattern_delete_batch_timeout_ms: u64,
    /// Number of keys deleted per batch during pattern deletes.
    pub pattern_delete_batch_size: usize,
    pub default_ttl_seconds: u64,
    pub events_ttl_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Cron expression for the scheduled batch sync orchestration (C6).
    pub cron_schedule: String,
    /// Overall per-request budget enforced at the transport boundary;
    /// individual discovery/fetch calls apply their own tighter timeouts
    /// within this ceiling.
    pub provider_timeout_seconds: u64,
    pub http_user_agent: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 2,
            max_connections: 15,
            recycle_seconds: 3600,
        }
    }
}

impl Default for CacheTimeoutConfig {
    fn default() -> Self {
        Self {
            get_set_timeout_ms: 2000,
            pattern_delete_batch_timeout_ms: 1500,
            pattern_delete_batch_size: 25,
            default_ttl_seconds: 3600,
            events_ttl_seconds: 900,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cron_schedule: "0 0 */6 * * *".to_string(),
            provider_timeout_seconds: 60,
            http_user_agent: "calndr-sync/1.0".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/calndr".to_string(),
            cache_url: "redis://localhost:6379".to_string(),
            pool: PoolConfig::default(),
            cache_timeouts: CacheTimeoutConfig::default(),
            sync: SyncConfig::default(),
            debug: false,
        }
    }
}

/// Load configuration from `CALNDR_*` environment variables layered over
/// `config/default.toml`, falling back to defaults when neither is present.
pub fn load_config() -> Result<AppConfig, config::ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name("config/default").required(false))
        .add_source(config::Environment::with_prefix("CALNDR").separator("__"));

    match builder.build() {
        Ok(cfg) => cfg.try_deserialize().or_else(|_| Ok(AppConfig::default())),
        Err(_) => Ok(AppConfig::default()),
    }
}

pub fn validate_config(config: &AppConfig) -> Result<(), String> {
    if config.pool.min_connections == 0 {
        return Err("pool.min_connections must be greater than 0".to_string());
    }
    if config.pool.max_connections < config.pool.min_connections {
        return Err("pool.max_connections must be >= pool.min_connections".to_string());
    }
    if config.cache_timeouts.pattern_delete_batch_size == 0 {
        return Err("cache_timeouts.pattern_delete_batch_size must be greater than 0".to_string());
    }
    Ok(())
}
