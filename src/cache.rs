use crate::{config::Config, errors::GatewayError, models::RequestType};
use async_trait::async_trait;
use moka::{future::Cache, Expiry};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{debug, warn};

const KEY_PREFIX: &str = "whois";

/// Key for a (domain, type) pair.
///
/// The domain is trimmed, lower-cased and stripped of a trailing dot. The
/// type suffix comes from a fixed set, so distinct pairs never share a key.
pub fn cache_key(domain: &str, request_type: RequestType) -> String {
    format!("{}:{}:{}", KEY_PREFIX, normalize_domain(domain), request_type)
}

fn normalize_domain(domain: &str) -> String {
    let normalized = domain.trim().to_lowercase();

    // Remove trailing dot if present (common in DNS contexts)
    match normalized.strip_suffix('.') {
        Some(stripped) => stripped.to_string(),
        None => normalized,
    }
}

/// String key-value backend with per-entry expiration.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get_raw(&self, key: &str) -> Option<String>;
    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), GatewayError>;
    async fn remove(&self, key: &str);
}

#[derive(Clone)]
struct StoredValue {
    payload: Arc<str>,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, StoredValue> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &StoredValue, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process backend on top of moka.
pub struct MokaCacheStore {
    cache: Cache<String, StoredValue>,
}

impl MokaCacheStore {
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryTtl)
            .build();

        Self { cache }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.cache_max_entries)
    }
}

#[async_trait]
impl CacheStore for MokaCacheStore {
    async fn get_raw(&self, key: &str) -> Option<String> {
        self.cache.get(key).await.map(|stored| stored.payload.to_string())
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), GatewayError> {
        let stored = StoredValue {
            payload: Arc::from(value),
            ttl,
        };
        self.cache.insert(key.to_string(), stored).await;
        Ok(())
    }

    async fn remove(&self, key: &str) {
        self.cache.invalidate(key).await;
    }
}

/// Typed cache-aside access over a [`CacheStore`]. Values go through JSON.
pub struct CacheService {
    store: Arc<dyn CacheStore>,
}

impl CacheService {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub fn in_memory(config: &Config) -> Self {
        Self::new(Arc::new(MokaCacheStore::from_config(config)))
    }

    /// Returns `None` on a miss and on a value that no longer deserializes;
    /// the latter is evicted.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get_raw(key).await {
            Some(raw) => raw,
            None => {
                debug!("Cache miss for key: {}", key);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!("Cache hit for key: {}", key);
                Some(value)
            }
            Err(e) => {
                warn!("Discarding unreadable cache entry {}: {}", key, e);
                self.store.remove(key).await;
                None
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), GatewayError> {
        let serialized = serde_json::to_string(value)
            .map_err(|e| GatewayError::CacheError(format!("Failed to serialize value for {}: {}", key, e)))?;
        self.store.set_raw(key, serialized, ttl).await?;
        debug!("Cached value for key: {} (ttl {:?})", key, ttl);
        Ok(())
    }

    pub async fn remove(&self, key: &str) {
        self.store.remove(key).await;
    }
}
