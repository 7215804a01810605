//! Product read cache.
//!
//! The engines only ever need one thing from the cache: drop the entry for a
//! product whose stock just changed. That narrow dependency is the
//! [`Invalidator`] trait; the lookup side is a read-through used solely by
//! the product-detail endpoint. Cache failures never propagate - a miss or a
//! dead Redis degrades to direct store reads.

mod product_cache;
mod redis_client;

pub use product_cache::ProductCache;
pub use redis_client::{RedisClient, RedisConfig};

use async_trait::async_trait;
use uuid::Uuid;

/// Called on every committed stock mutation. Fire-and-forget: failures are
/// logged, never returned.
#[async_trait]
pub trait Invalidator: Send + Sync + 'static {
    async fn invalidate(&self, product_id: Uuid);
}
