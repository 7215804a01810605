//! Hold engine: stock reservation under concurrent writers.
//!
//! The product row lock taken at the top of the transaction serializes every
//! writer that intends to mutate stock, so the availability check and the
//! decrement are atomic with respect to other holds, webhook restorations,
//! and the sweeper. Stock can never go negative.

use std::sync::Arc;

use uuid::Uuid;

use crate::cache::Invalidator;
use crate::clock::Clock;
use crate::models::{Hold, HoldReceipt, HoldStatus};
use crate::store::{Store, StoreError, StoreTx};

#[derive(Debug, thiserror::Error)]
pub enum HoldError {
    #[error("product does not exist")]
    UnknownProduct,

    #[error("insufficient stock: {available} available, {requested} requested")]
    InsufficientStock { available: i32, requested: i32 },

    #[error("qty must be a positive integer")]
    NonPositiveQty,

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

#[derive(Clone)]
pub struct HoldService<S: Store> {
    store: S,
    invalidator: Arc<dyn Invalidator>,
    clock: Arc<dyn Clock>,
    hold_ttl: chrono::Duration,
}

impl<S: Store> HoldService<S> {
    pub fn new(
        store: S,
        invalidator: Arc<dyn Invalidator>,
        clock: Arc<dyn Clock>,
        hold_ttl: chrono::Duration,
    ) -> Self {
        Self {
            store,
            invalidator,
            clock,
            hold_ttl,
        }
    }

    pub async fn create_hold(&self, product_id: Uuid, qty: i32) -> Result<HoldReceipt, HoldError> {
        // The HTTP layer already validates qty; re-checked here because the
        // engine contract holds for any caller.
        if qty <= 0 {
            return Err(HoldError::NonPositiveQty);
        }

        let mut tx = self.store.begin().await?;

        let product = tx
            .lock_product(product_id)
            .await?
            .ok_or(HoldError::UnknownProduct)?;

        if product.total_stock < qty {
            return Err(HoldError::InsufficientStock {
                available: product.total_stock,
                requested: qty,
            });
        }

        let now = self.clock.now();
        let hold = Hold {
            id: Uuid::new_v4(),
            product_id,
            qty,
            status: HoldStatus::Pending,
            expires_at: now + self.hold_ttl,
            created_at: now,
            updated_at: now,
        };
        tx.insert_hold(&hold).await?;
        tx.set_product_stock(product_id, product.total_stock - qty).await?;
        tx.commit().await?;

        self.invalidator.invalidate(product_id).await;
        crate::metrics::record_hold_created();
        tracing::info!(
            "Hold {} created: {} x product {} (expires {})",
            hold.id,
            qty,
            product_id,
            hold.expires_at
        );

        Ok(HoldReceipt {
            hold_id: hold.id,
            expires_at: hold.expires_at,
        })
    }
}
