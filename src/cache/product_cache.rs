//! Read-through product cache with TTL, invalidated on stock mutations.

use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use super::redis_client::RedisClient;
use super::Invalidator;
use crate::models::Product;

pub struct ProductCache {
    redis: Option<RedisClient>,
    ttl_secs: u64,
}

impl ProductCache {
    /// Connect to Redis, degrading to a disabled cache when it is
    /// unreachable. The service keeps working either way.
    pub async fn connect(url: &str, ttl_secs: u64) -> Self {
        let redis = match RedisClient::from_url(url).await {
            Ok(client) => Some(client),
            Err(e) => {
                warn!("Product cache disabled, Redis unavailable at {}: {}", url, e);
                None
            }
        };
        Self { redis, ttl_secs }
    }

    pub fn is_available(&self) -> bool {
        self.redis.is_some()
    }

    /// Round-trip liveness of the cache connection. A disabled cache
    /// reports down; the service itself stays healthy either way.
    pub async fn ping(&self) -> bool {
        match self.redis.as_ref() {
            Some(redis) => redis.ping().await.unwrap_or(false),
            None => false,
        }
    }

    fn key(product_id: Uuid) -> String {
        format!("product:{}", product_id)
    }

    pub async fn get_product(&self, product_id: Uuid) -> Option<Product> {
        let redis = self.redis.as_ref()?;
        match redis.get(&Self::key(product_id)).await {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(product) => {
                    debug!("Cache hit for product {}", product_id);
                    Some(product)
                }
                Err(e) => {
                    warn!("Discarding corrupt cache entry for product {}: {}", product_id, e);
                    None
                }
            },
            Ok(None) => {
                debug!("Cache miss for product {}", product_id);
                None
            }
            Err(e) => {
                warn!("Product cache read failed for {}: {}", product_id, e);
                None
            }
        }
    }

    pub async fn set_product(&self, product: &Product) {
        let Some(redis) = self.redis.as_ref() else {
            return;
        };
        let json = match serde_json::to_string(product) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize product {} for cache: {}", product.id, e);
                return;
            }
        };
        if let Err(e) = redis.set_ex(&Self::key(product.id), &json, self.ttl_secs).await {
            warn!("Product cache write failed for {}: {}", product.id, e);
        } else {
            debug!("Cached product {}", product.id);
        }
    }
}

#[async_trait]
impl Invalidator for ProductCache {
    async fn invalidate(&self, product_id: Uuid) {
        let Some(redis) = self.redis.as_ref() else {
            return;
        };
        match redis.del(&Self::key(product_id)).await {
            Ok(_) => debug!("Invalidated product cache {}", product_id),
            Err(e) => warn!("Failed to invalidate product cache {}: {}", product_id, e),
        }
    }
}
