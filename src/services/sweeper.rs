//! Expiration sweeper: reclaims stock from holds that were never ordered.
//!
//! The scan runs without locks; each due hold is then re-locked with the
//! pending filter inside its own transaction. A hold that an order or a
//! webhook claimed between scan and lock is skipped, which is what prevents
//! double-counting against the order path.

use std::sync::Arc;

use crate::cache::Invalidator;
use crate::clock::Clock;
use crate::models::HoldStatus;
use crate::store::{Store, StoreError, StoreTx};

#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

pub struct SweeperService<S: Store> {
    store: S,
    invalidator: Arc<dyn Invalidator>,
    clock: Arc<dyn Clock>,
}

impl<S: Store> SweeperService<S> {
    pub fn new(store: S, invalidator: Arc<dyn Invalidator>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            invalidator,
            clock,
        }
    }

    /// One sweep pass. Returns how many holds were expired.
    pub async fn run_once(&self) -> Result<usize, SweepError> {
        let now = self.clock.now();
        let due = self.store.pending_holds_expiring_before(now).await?;

        let mut swept = 0;
        for hold_id in due {
            let mut tx = self.store.begin().await?;

            // Re-check under lock: the hold may have been completed since
            // the scan.
            let Some(hold) = tx.lock_hold(hold_id, Some(HoldStatus::Pending)).await? else {
                continue;
            };

            tx.set_hold_status(hold.id, HoldStatus::Expired).await?;
            let product = tx
                .lock_product(hold.product_id)
                .await?
                .ok_or(StoreError::NotFound)?;
            tx.set_product_stock(product.id, product.total_stock + hold.qty)
                .await?;
            tx.commit().await?;

            self.invalidator.invalidate(product.id).await;
            crate::metrics::record_hold_expired();
            crate::metrics::record_stock_restoration();
            tracing::info!(
                "Hold {} expired, returned {} units to product {}",
                hold.id,
                hold.qty,
                product.id
            );
            swept += 1;
        }

        if swept > 0 {
            tracing::info!("Expired {} overdue holds", swept);
        }
        Ok(swept)
    }

    /// Periodic sweep loop.
    pub fn start(self: Arc<Self>, interval: std::time::Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick fires immediately; that is fine, an empty pass is
            // cheap.
            loop {
                ticker.tick().await;
                if let Err(e) = self.run_once().await {
                    tracing::error!("Expiration sweep failed: {}", e);
                }
            }
        })
    }
}
