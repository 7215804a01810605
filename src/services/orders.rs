//! Order engine: at most one order per hold.
//!
//! Three mechanisms stack up to the at-most-once guarantee: the hold row
//! lock, the pending-status filter on that lock, and the unique constraint
//! on `orders.hold_id`. The reconciliation task is enqueued strictly after
//! commit, so it never observes an uncommitted order.

use std::sync::Arc;

use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use crate::clock::Clock;
use crate::models::{HoldStatus, Order, OrderStatus};
use crate::services::reconciliation::ReconciliationQueue;
use crate::store::{Store, StoreError, StoreTx};

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("hold invalid or expired")]
    InvalidHold,

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

#[derive(Clone)]
pub struct OrderService<S: Store> {
    store: S,
    clock: Arc<dyn Clock>,
    reconciliation: ReconciliationQueue,
}

impl<S: Store> OrderService<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>, reconciliation: ReconciliationQueue) -> Self {
        Self {
            store,
            clock,
            reconciliation,
        }
    }

    pub async fn create_order(&self, hold_id: Uuid) -> Result<Order, OrderError> {
        let mut tx = self.store.begin().await?;

        // Lock and status check happen inside this transaction; a sweep or a
        // competing order between check and insert is impossible.
        let hold = tx
            .lock_hold(hold_id, Some(HoldStatus::Pending))
            .await?
            .ok_or(OrderError::InvalidHold)?;

        let product = tx
            .lock_product(hold.product_id)
            .await?
            .ok_or(StoreError::NotFound)?;

        let total_amount = (product.price * Decimal::from(hold.qty))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

        let now = self.clock.now();
        let order = Order {
            id: Uuid::new_v4(),
            hold_id,
            status: OrderStatus::Pending,
            total_amount,
            created_at: now,
            updated_at: now,
        };
        match tx.insert_order(&order).await {
            Ok(()) => {}
            // A concurrent order won the race on this hold.
            Err(StoreError::UniqueViolation) => return Err(OrderError::InvalidHold),
            Err(e) => return Err(e.into()),
        }
        tx.set_hold_status(hold_id, HoldStatus::Completed).await?;
        tx.commit().await?;

        // Strictly after commit: a rolled-back order must never reach the
        // reconciliation worker.
        self.reconciliation.enqueue(order.id);
        crate::metrics::record_order_created();
        tracing::info!(
            "Order {} created for hold {}: total {}",
            order.id,
            hold_id,
            order.total_amount
        );

        Ok(order)
    }
}
