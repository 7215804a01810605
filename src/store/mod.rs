//! Transactional persistence layer.
//!
//! Everything the engines do to the five entities goes through the [`Store`]
//! and [`StoreTx`] traits. A transaction is obtained with [`Store::begin`],
//! mutated through [`StoreTx`] primitives, and either committed explicitly or
//! rolled back when dropped. `lock_product` / `lock_hold` take a row-level
//! exclusive lock (`SELECT ... FOR UPDATE` on Postgres), which is what
//! serializes concurrent writers on the hold and payment paths.

pub mod postgres;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Hold, HoldStatus, Order, OrderStatus, PendingWebhook, Product, WebhookLog};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("row not found")]
    NotFound,

    #[error("unique constraint violated")]
    UniqueViolation,

    #[error("transaction conflict")]
    Conflict,

    #[error("storage failure: {0}")]
    Storage(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if matches!(err, sqlx::Error::RowNotFound) {
            return StoreError::NotFound;
        }
        if let sqlx::Error::Database(ref db) = err {
            match db.code().as_deref() {
                // unique_violation
                Some("23505") => return StoreError::UniqueViolation,
                // serialization_failure, deadlock_detected
                Some("40001") | Some("40P01") => return StoreError::Conflict,
                _ => {}
            }
        }
        StoreError::Storage(err)
    }
}

#[async_trait]
pub trait Store: Clone + Send + Sync + 'static {
    type Tx: StoreTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError>;

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

    async fn get_webhook_log(&self, idempotency_key: &str)
        -> Result<Option<WebhookLog>, StoreError>;

    /// Ids of holds still `pending` whose deadline is at or before `cutoff`.
    async fn pending_holds_expiring_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, StoreError>;
}

#[async_trait]
pub trait StoreTx: Send {
    /// Read a product under an exclusive row lock.
    async fn lock_product(&mut self, id: Uuid) -> Result<Option<Product>, StoreError>;

    async fn set_product_stock(&mut self, id: Uuid, total_stock: i32) -> Result<(), StoreError>;

    async fn insert_hold(&mut self, hold: &Hold) -> Result<(), StoreError>;

    /// Read a hold under an exclusive row lock, optionally requiring a
    /// status. A filter miss reads as not-found.
    async fn lock_hold(
        &mut self,
        id: Uuid,
        status: Option<HoldStatus>,
    ) -> Result<Option<Hold>, StoreError>;

    async fn set_hold_status(&mut self, id: Uuid, status: HoldStatus) -> Result<(), StoreError>;

    /// Fails with [`StoreError::UniqueViolation`] when an order for the same
    /// hold already exists.
    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError>;

    async fn order_for_hold(&mut self, hold_id: Uuid) -> Result<Option<Order>, StoreError>;

    async fn set_order_status(&mut self, id: Uuid, status: OrderStatus) -> Result<(), StoreError>;

    /// Fails with [`StoreError::UniqueViolation`] when a result is already
    /// parked for the same hold.
    async fn insert_pending_webhook(&mut self, webhook: &PendingWebhook)
        -> Result<(), StoreError>;

    async fn pending_webhook_for_hold(
        &mut self,
        hold_id: Uuid,
    ) -> Result<Option<PendingWebhook>, StoreError>;

    async fn delete_pending_webhook(&mut self, id: Uuid) -> Result<(), StoreError>;

    /// Fails with [`StoreError::UniqueViolation`] when the key is already
    /// sealed by a concurrent delivery.
    async fn insert_webhook_log(&mut self, log: &WebhookLog) -> Result<(), StoreError>;

    async fn commit(self) -> Result<(), StoreError>;
}
