//! Postgres implementation of the store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{Store, StoreError, StoreTx};
use crate::models::{Hold, HoldStatus, Order, OrderStatus, PendingWebhook, Product, WebhookLog};

const PRODUCT_COLUMNS: &str = "id, name, total_stock, price, created_at, updated_at";
const HOLD_COLUMNS: &str = "id, product_id, qty, status, expires_at, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, hold_id, status, total_amount, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    type Tx = PgStoreTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(PgStoreTx { tx })
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, total_stock, price, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(product.total_stock)
        .bind(product.price)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(order)
    }

    async fn get_webhook_log(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<WebhookLog>, StoreError> {
        let log = sqlx::query_as::<_, WebhookLog>(
            r#"
            SELECT idempotency_key, response_body, response_status_code
            FROM webhook_logs
            WHERE idempotency_key = $1
            "#,
        )
        .bind(idempotency_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(log)
    }

    async fn pending_holds_expiring_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, StoreError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM holds
            WHERE status = 'pending' AND expires_at <= $1
            ORDER BY expires_at
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgStoreTx {
    async fn lock_product(&mut self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(product)
    }

    async fn set_product_stock(&mut self, id: Uuid, total_stock: i32) -> Result<(), StoreError> {
        sqlx::query("UPDATE products SET total_stock = $1, updated_at = NOW() WHERE id = $2")
            .bind(total_stock)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_hold(&mut self, hold: &Hold) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO holds (id, product_id, qty, status, expires_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(hold.id)
        .bind(hold.product_id)
        .bind(hold.qty)
        .bind(hold.status)
        .bind(hold.expires_at)
        .bind(hold.created_at)
        .bind(hold.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn lock_hold(
        &mut self,
        id: Uuid,
        status: Option<HoldStatus>,
    ) -> Result<Option<Hold>, StoreError> {
        let hold = match status {
            Some(status) => {
                sqlx::query_as::<_, Hold>(&format!(
                    "SELECT {HOLD_COLUMNS} FROM holds WHERE id = $1 AND status = $2 FOR UPDATE"
                ))
                .bind(id)
                .bind(status)
                .fetch_optional(&mut *self.tx)
                .await?
            }
            None => {
                sqlx::query_as::<_, Hold>(&format!(
                    "SELECT {HOLD_COLUMNS} FROM holds WHERE id = $1 FOR UPDATE"
                ))
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await?
            }
        };
        Ok(hold)
    }

    async fn set_hold_status(&mut self, id: Uuid, status: HoldStatus) -> Result<(), StoreError> {
        sqlx::query("UPDATE holds SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, hold_id, status, total_amount, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(order.id)
        .bind(order.hold_id)
        .bind(order.status)
        .bind(order.total_amount)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn order_for_hold(&mut self, hold_id: Uuid) -> Result<Option<Order>, StoreError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE hold_id = $1"
        ))
        .bind(hold_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(order)
    }

    async fn set_order_status(&mut self, id: Uuid, status: OrderStatus) -> Result<(), StoreError> {
        sqlx::query("UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_pending_webhook(
        &mut self,
        webhook: &PendingWebhook,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO pending_webhooks (id, hold_id, status, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(webhook.id)
        .bind(webhook.hold_id)
        .bind(webhook.status)
        .bind(webhook.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn pending_webhook_for_hold(
        &mut self,
        hold_id: Uuid,
    ) -> Result<Option<PendingWebhook>, StoreError> {
        let webhook = sqlx::query_as::<_, PendingWebhook>(
            "SELECT id, hold_id, status, created_at FROM pending_webhooks WHERE hold_id = $1",
        )
        .bind(hold_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(webhook)
    }

    async fn delete_pending_webhook(&mut self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM pending_webhooks WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_webhook_log(&mut self, log: &WebhookLog) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO webhook_logs (idempotency_key, response_body, response_status_code)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(&log.idempotency_key)
        .bind(&log.response_body)
        .bind(log.response_status_code)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}
