//! Deferred reconciliation of early payment results.
//!
//! The order engine enqueues an order id here after its transaction commits.
//! The worker checks whether a payment result was parked for the order's hold
//! before the order existed and, if so, applies it: order status from the
//! parked row, row deleted, stock restored when the result was a failure.
//!
//! Safe to run any number of times for the same order: the parked row is
//! consumed on first application, so replays and the race where the webhook
//! engine already applied the result both collapse to a no-op.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::cache::Invalidator;
use crate::models::PaymentStatus;
use crate::store::{Store, StoreError, StoreTx};

const MAX_ATTEMPTS: u32 = 5;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

/// After-commit handle given to the order engine.
#[derive(Clone)]
pub struct ReconciliationQueue {
    sender: mpsc::UnboundedSender<Uuid>,
}

impl ReconciliationQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Uuid>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn enqueue(&self, order_id: Uuid) {
        if self.sender.send(order_id).is_err() {
            tracing::error!(
                "Reconciliation worker is gone, dropping task for order {}",
                order_id
            );
        }
    }
}

#[derive(Clone)]
pub struct ReconciliationService<S: Store> {
    store: S,
    invalidator: Arc<dyn Invalidator>,
}

impl<S: Store> ReconciliationService<S> {
    pub fn new(store: S, invalidator: Arc<dyn Invalidator>) -> Self {
        Self { store, invalidator }
    }

    /// Apply the parked payment result for this order, if one exists.
    /// Returns whether anything was applied.
    pub async fn reconcile(&self, order_id: Uuid) -> Result<bool, ReconcileError> {
        let Some(order) = self.store.get_order(order_id).await? else {
            tracing::warn!("Reconciliation for unknown order {}", order_id);
            return Ok(false);
        };

        let mut tx = self.store.begin().await?;

        let Some(hold) = tx.lock_hold(order.hold_id, None).await? else {
            tracing::warn!("Order {} references missing hold {}", order_id, order.hold_id);
            return Ok(false);
        };

        let Some(parked) = tx.pending_webhook_for_hold(hold.id).await? else {
            // Nothing was parked, or the webhook engine already applied the
            // result directly. Either way there is nothing to do.
            return Ok(false);
        };

        // Read the status before the row is deleted.
        let status = parked.status;

        tx.set_order_status(order.id, status.into()).await?;
        tx.delete_pending_webhook(parked.id).await?;

        let mut invalidate_product = None;
        if status == PaymentStatus::Failed {
            let product = tx
                .lock_product(hold.product_id)
                .await?
                .ok_or(StoreError::NotFound)?;
            tx.set_product_stock(product.id, product.total_stock + hold.qty)
                .await?;
            invalidate_product = Some(product.id);
        }

        tx.commit().await?;

        if let Some(product_id) = invalidate_product {
            self.invalidator.invalidate(product_id).await;
            crate::metrics::record_stock_restoration();
        }

        tracing::info!(
            "Reconciled order {}: applied parked {} result for hold {}",
            order_id,
            status,
            hold.id
        );
        Ok(true)
    }

    /// Drain the queue until every sender is dropped. Transient storage
    /// failures are retried with exponential backoff; reconcile itself is
    /// idempotent, so retrying a half-observed task is safe.
    pub fn spawn(self, mut receiver: mpsc::UnboundedReceiver<Uuid>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("Reconciliation worker started");

            while let Some(order_id) = receiver.recv().await {
                let mut attempt = 0;
                loop {
                    match self.reconcile(order_id).await {
                        Ok(_) => break,
                        Err(e) => {
                            attempt += 1;
                            if attempt >= MAX_ATTEMPTS {
                                tracing::error!(
                                    "Giving up reconciling order {} after {} attempts: {}",
                                    order_id,
                                    attempt,
                                    e
                                );
                                break;
                            }
                            tracing::warn!(
                                "Reconciling order {} failed (attempt {}/{}): {}",
                                order_id,
                                attempt,
                                MAX_ATTEMPTS,
                                e
                            );
                            tokio::time::sleep(RETRY_BASE_DELAY * 2u32.pow(attempt - 1)).await;
                        }
                    }
                }
            }

            tracing::warn!("Reconciliation worker stopped");
        })
    }
}
