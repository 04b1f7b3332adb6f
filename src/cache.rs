use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::errors::ServiceError;

/// Key-value cache abstraction used for cart/session state, the token
/// revocation list, webhook dedup keys and analytics documents.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), ServiceError>;
    /// Stores the value only if the key does not exist yet. Returns whether
    /// the value was stored; false means another writer got there first.
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, ServiceError>;
    async fn delete(&self, key: &str) -> Result<(), ServiceError>;
    async fn exists(&self, key: &str) -> Result<bool, ServiceError>;
}

/// Redis-backed cache used in production.
pub struct RedisCache {
    client: Arc<redis::Client>,
}

impl RedisCache {
    pub fn new(client: Arc<redis::Client>) -> Self {
        Self { client }
    }

    async fn conn(&self) -> Result<redis::aio::Connection, ServiceError> {
        self.client
            .get_async_connection()
            .await
            .map_err(|e| ServiceError::CacheError(e.to_string()))
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        let mut conn = self.conn().await?;
        conn.get(key)
            .await
            .map_err(|e| ServiceError::CacheError(e.to_string()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), ServiceError> {
        let mut conn = self.conn().await?;
        match ttl {
            Some(ttl) => conn
                .set_ex(key, value, ttl.as_secs() as usize)
                .await
                .map_err(|e| ServiceError::CacheError(e.to_string())),
            None => conn
                .set(key, value)
                .await
                .map_err(|e| ServiceError::CacheError(e.to_string())),
        }
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, ServiceError> {
        let mut conn = self.conn().await?;
        let stored: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async(&mut conn)
            .await
            .map_err(|e| ServiceError::CacheError(e.to_string()))?;
        Ok(stored.is_some())
    }

    async fn delete(&self, key: &str) -> Result<(), ServiceError> {
        let mut conn = self.conn().await?;
        conn.del(key)
            .await
            .map_err(|e| ServiceError::CacheError(e.to_string()))
    }

    async fn exists(&self, key: &str) -> Result<bool, ServiceError> {
        let mut conn = self.conn().await?;
        conn.exists(key)
            .await
            .map_err(|e| ServiceError::CacheError(e.to_string()))
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => Instant::now() > at,
            None => false,
        }
    }
}

/// In-memory cache used in tests and when Redis is unavailable.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    store: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        let expired = {
            let store = self.store.read().unwrap();
            match store.get(key) {
                Some(entry) if entry.is_expired() => true,
                Some(entry) => return Ok(Some(entry.value.clone())),
                None => return Ok(None),
            }
        };
        if expired {
            self.store.write().unwrap().remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), ServiceError> {
        let mut store = self.store.write().unwrap();
        store.insert(key.to_string(), CacheEntry::new(value.to_string(), ttl));
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, ServiceError> {
        let mut store = self.store.write().unwrap();
        let live = store.get(key).map(|e| !e.is_expired()).unwrap_or(false);
        if live {
            return Ok(false);
        }
        store.insert(
            key.to_string(),
            CacheEntry::new(value.to_string(), Some(ttl)),
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<(), ServiceError> {
        self.store.write().unwrap().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, ServiceError> {
        Ok(self.get(key).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_roundtrip() {
        let cache = InMemoryCache::new();
        cache.set("k", "v", None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
        assert!(cache.exists("k").await.unwrap());

        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn in_memory_ttl_expires() {
        let cache = InMemoryCache::new();
        cache
            .set("k", "v", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_nx_stores_only_once() {
        let cache = InMemoryCache::new();
        assert!(cache
            .set_nx("evt", "1", Duration::from_secs(60))
            .await
            .unwrap());
        assert!(!cache
            .set_nx("evt", "1", Duration::from_secs(60))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn set_nx_after_expiry_stores_again() {
        let cache = InMemoryCache::new();
        assert!(cache
            .set_nx("evt", "1", Duration::from_millis(10))
            .await
            .unwrap());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache
            .set_nx("evt", "1", Duration::from_secs(60))
            .await
            .unwrap());
    }
}
