//! In-memory store used by the engine tests.
//!
//! One async mutex guards the whole state, so every transaction is trivially
//! serializable; a snapshot taken at `begin` is restored when a transaction
//! is dropped without committing. The unique constraints of the real schema
//! are enforced by hand so the engines see the same error surface.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{Store, StoreError, StoreTx};
use crate::models::{Hold, HoldStatus, Order, OrderStatus, PendingWebhook, Product, WebhookLog};

#[derive(Debug, Clone, Default)]
pub struct MemState {
    pub products: HashMap<Uuid, Product>,
    pub holds: HashMap<Uuid, Hold>,
    pub orders: HashMap<Uuid, Order>,
    pub webhook_logs: HashMap<String, WebhookLog>,
    pub pending_webhooks: HashMap<Uuid, PendingWebhook>,
}

#[derive(Clone, Default)]
pub struct MemStore {
    state: Arc<Mutex<MemState>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a product directly, bypassing the store API. Returns its id.
    pub async fn seed_product(&self, name: &str, total_stock: i32, price: Decimal) -> Uuid {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            total_stock,
            price,
            created_at: now,
            updated_at: now,
        };
        let id = product.id;
        self.state.lock().await.products.insert(id, product);
        id
    }

    /// Clone of the full state, for assertions.
    pub async fn snapshot(&self) -> MemState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl Store for MemStore {
    type Tx = MemTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let snapshot = guard.clone();
        Ok(MemTx {
            guard,
            snapshot,
            committed: false,
        })
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        self.state
            .lock()
            .await
            .products
            .insert(product.id, product.clone());
        Ok(())
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn get_webhook_log(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<WebhookLog>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .webhook_logs
            .get(idempotency_key)
            .cloned())
    }

    async fn pending_holds_expiring_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, StoreError> {
        let state = self.state.lock().await;
        let mut due: Vec<(DateTime<Utc>, Uuid)> = state
            .holds
            .values()
            .filter(|h| h.status == HoldStatus::Pending && h.expires_at <= cutoff)
            .map(|h| (h.expires_at, h.id))
            .collect();
        due.sort();
        Ok(due.into_iter().map(|(_, id)| id).collect())
    }
}

pub struct MemTx {
    guard: OwnedMutexGuard<MemState>,
    snapshot: MemState,
    committed: bool,
}

impl Drop for MemTx {
    fn drop(&mut self) {
        if !self.committed {
            *self.guard = std::mem::take(&mut self.snapshot);
        }
    }
}

#[async_trait]
impl StoreTx for MemTx {
    async fn lock_product(&mut self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.guard.products.get(&id).cloned())
    }

    async fn set_product_stock(&mut self, id: Uuid, total_stock: i32) -> Result<(), StoreError> {
        let product = self.guard.products.get_mut(&id).ok_or(StoreError::NotFound)?;
        product.total_stock = total_stock;
        product.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_hold(&mut self, hold: &Hold) -> Result<(), StoreError> {
        self.guard.holds.insert(hold.id, hold.clone());
        Ok(())
    }

    async fn lock_hold(
        &mut self,
        id: Uuid,
        status: Option<HoldStatus>,
    ) -> Result<Option<Hold>, StoreError> {
        let hold = self.guard.holds.get(&id).cloned();
        Ok(match (hold, status) {
            (Some(h), Some(wanted)) if h.status != wanted => None,
            (hold, _) => hold,
        })
    }

    async fn set_hold_status(&mut self, id: Uuid, status: HoldStatus) -> Result<(), StoreError> {
        let hold = self.guard.holds.get_mut(&id).ok_or(StoreError::NotFound)?;
        hold.status = status;
        hold.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        if self
            .guard
            .orders
            .values()
            .any(|o| o.hold_id == order.hold_id)
        {
            return Err(StoreError::UniqueViolation);
        }
        self.guard.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn order_for_hold(&mut self, hold_id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self
            .guard
            .orders
            .values()
            .find(|o| o.hold_id == hold_id)
            .cloned())
    }

    async fn set_order_status(&mut self, id: Uuid, status: OrderStatus) -> Result<(), StoreError> {
        let order = self.guard.orders.get_mut(&id).ok_or(StoreError::NotFound)?;
        order.status = status;
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_pending_webhook(
        &mut self,
        webhook: &PendingWebhook,
    ) -> Result<(), StoreError> {
        if self
            .guard
            .pending_webhooks
            .values()
            .any(|w| w.hold_id == webhook.hold_id)
        {
            return Err(StoreError::UniqueViolation);
        }
        self.guard.pending_webhooks.insert(webhook.id, webhook.clone());
        Ok(())
    }

    async fn pending_webhook_for_hold(
        &mut self,
        hold_id: Uuid,
    ) -> Result<Option<PendingWebhook>, StoreError> {
        Ok(self
            .guard
            .pending_webhooks
            .values()
            .find(|w| w.hold_id == hold_id)
            .cloned())
    }

    async fn delete_pending_webhook(&mut self, id: Uuid) -> Result<(), StoreError> {
        self.guard.pending_webhooks.remove(&id);
        Ok(())
    }

    async fn insert_webhook_log(&mut self, log: &WebhookLog) -> Result<(), StoreError> {
        if self.guard.webhook_logs.contains_key(&log.idempotency_key) {
            return Err(StoreError::UniqueViolation);
        }
        self.guard
            .webhook_logs
            .insert(log.idempotency_key.clone(), log.clone());
        Ok(())
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        self.committed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_uncommitted_transaction_rolls_back() {
        let store = MemStore::new();
        let product_id = store.seed_product("widget", 10, dec!(9.99)).await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.set_product_stock(product_id, 3).await.unwrap();
            // dropped without commit
        }

        let state = store.snapshot().await;
        assert_eq!(state.products[&product_id].total_stock, 10);
    }

    #[tokio::test]
    async fn test_commit_persists_changes() {
        let store = MemStore::new();
        let product_id = store.seed_product("widget", 10, dec!(9.99)).await;

        let mut tx = store.begin().await.unwrap();
        tx.set_product_stock(product_id, 3).await.unwrap();
        tx.commit().await.unwrap();

        let state = store.snapshot().await;
        assert_eq!(state.products[&product_id].total_stock, 3);
    }

    #[tokio::test]
    async fn test_duplicate_order_for_hold_is_a_unique_violation() {
        let store = MemStore::new();
        let hold_id = Uuid::new_v4();
        let now = Utc::now();
        let order = |id: Uuid| Order {
            id,
            hold_id,
            status: OrderStatus::Pending,
            total_amount: dec!(10.00),
            created_at: now,
            updated_at: now,
        };

        let mut tx = store.begin().await.unwrap();
        tx.insert_order(&order(Uuid::new_v4())).await.unwrap();
        let err = tx.insert_order(&order(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation));
    }
}
