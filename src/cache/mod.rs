/*!
 * Cache Coordinator (C1)
 *
 * Best-effort key/value cache over Redis. Every operation is bounded by a
 * short timeout and a connection failure degrades to a miss/no-op rather
 * than propagating an error — callers always fall through to the
 * relational store gateway on a cache failure.
 */

pub mod keys;

use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::CacheTimeoutConfig;

#[derive(Clone)]
pub struct CacheCoordinator {
    url: String,
    manager: Arc<Mutex<Option<ConnectionManager>>>,
    timeouts: CacheTimeoutConfig,
}

impl CacheCoordinator {
    pub async fn new(url: impl Into<String>, timeouts: CacheTimeoutConfig) -> Self {
        let url = url.into();
        let manager = Self::connect(&url).await;
        Self {
            url,
            manager: Arc::new(Mutex::new(manager)),
            timeouts,
        }
    }

    async fn connect(url: &str) -> Option<ConnectionManager> {
        match redis::Client::open(url) {
            Ok(client) => match client.get_connection_manager().await {
                Ok(manager) => Some(manager),
                Err(e) => {
                    warn!(error = %e, "failed to establish redis connection manager");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "invalid redis url");
                None
            }
        }
    }

    async fn ensure_connection(&self) -> Option<ConnectionManager> {
        let mut guard = self.manager.lock().await;
        if guard.is_none() {
            *guard = Self::connect(&self.url).await;
        }
        guard.clone()
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut manager = self.ensure_connection().await?;
        let bound = Duration::from_millis(self.timeouts.get_set_timeout_ms);

        match timeout(bound, manager.get::<_, Option<String>>(key)).await {
            Ok(Ok(Some(raw))) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    debug!(key, "cache hit");
                    Some(value)
                }
                Err(e) => {
                    warn!(key, error = %e, "corrupted cache entry, evicting");
                    self.delete(key).await;
                    None
                }
            },
            Ok(Ok(None)) => {
                debug!(key, "cache miss");
                None
            }
            Ok(Err(e)) => {
                warn!(key, error = %e, "redis get failed");
                None
            }
            Err(_) => {
                warn!(key, "redis get timed out");
                None
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> bool {
        let Some(mut manager) = self.ensure_connection().await else {
            return false;
        };
        let Ok(serialized) = serde_json::to_string(value) else {
            return false;
        };
        let bound = Duration::from_millis(self.timeouts.get_set_timeout_ms);

        let result = if let Some(ttl) = ttl {
            timeout(
                bound,
                manager.set_ex::<_, _, ()>(key, serialized, ttl.as_secs()),
            )
            .await
        } else {
            timeout(bound, manager.set::<_, _, ()>(key, serialized)).await
        };

        match result {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(key, error = %e, "redis set failed");
                false
            }
            Err(_) => {
                warn!(key, "redis set timed out");
                false
            }
        }
    }

    pub async fn delete(&self, key: &str) -> bool {
        let Some(mut manager) = self.ensure_connection().await else {
            return false;
        };
        let bound = Duration::from_millis(self.timeouts.get_set_timeout_ms);
        matches!(
            timeout(bound, manager.del::<_, i64>(key)).await,
            Ok(Ok(_))
        )
    }

    /// Deletes every key matching `pattern` in batches, bounding each batch
    /// by its own timeout so one slow batch can't stall the rest.
    pub async fn delete_pattern(&self, pattern: &str) -> usize {
        let Some(mut manager) = self.ensure_connection().await else {
            return 0;
        };
        let scan_bound = Duration::from_millis(self.timeouts.get_set_timeout_ms);
        let matched: Vec<String> = match timeout(scan_bound, manager.keys(pattern)).await {
            Ok(Ok(keys)) => keys,
            Ok(Err(e)) => {
                warn!(pattern, error = %e, "redis keys scan failed");
                return 0;
            }
            Err(_) => {
                warn!(pattern, "redis keys scan timed out");
                return 0;
            }
        };

        if matched.is_empty() {
            return 0;
        }

        let batch_bound = Duration::from_millis(self.timeouts.pattern_delete_batch_timeout_ms);
        let mut total_deleted = 0usize;
        for batch in matched.chunks(self.timeouts.pattern_delete_batch_size) {
            match timeout(batch_bound, manager.del::<_, i64>(batch.to_vec())).await {
                Ok(Ok(count)) => total_deleted += count as usize,
                Ok(Err(e)) => {
                    warn!(pattern, error = %e, "batch delete failed, continuing");
                }
                Err(_) => {
                    warn!(pattern, "batch delete timed out, continuing");
                }
            }
        }
        total_deleted
    }

    /// Invalidates all cached custody/handoff/events entries for a family.
    pub async fn clear_family_cache(&self, family_id: uuid::Uuid) -> usize {
        let mut total = 0usize;
        total += self
            .delete_pattern(&keys::family_custody_pattern(family_id))
            .await;
        total += self
            .delete_pattern(&keys::family_handoff_pattern(family_id))
            .await;
        total += self
            .delete_pattern(&keys::family_events_pattern(family_id))
            .await;
        total
    }

    pub async fn is_connected(&self) -> bool {
        self.manager.lock().await.is_some()
    }
}
