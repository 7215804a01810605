//! Webhook engine: idempotent, out-of-order-tolerant payment results.
//!
//! Delivery outcomes are sealed in `webhook_logs` inside the same transaction
//! as their side effects, so a retried delivery - immediate or days later -
//! replays the stored response without re-applying anything. A result that
//! arrives before its order exists is parked in `pending_webhooks` for the
//! reconciliation task.
//!
//! A `failed` result restores stock exactly once across the whole protocol:
//! here, when it is applied to an existing order that was not already
//! failed; or in reconciliation, when a parked result is consumed. Parking
//! alone never touches stock - the hold is still pending and the sweeper
//! owns that reservation until an order claims it.

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crate::cache::Invalidator;
use crate::clock::Clock;
use crate::models::{OrderStatus, PaymentStatus, PendingWebhook, WebhookLog};
use crate::store::{Store, StoreError, StoreTx};

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// A different early result is already parked for this hold. Two
    /// distinct idempotency keys racing on the same unordered hold is a
    /// policy violation, not a retry.
    #[error("conflicting payment result already recorded for this hold")]
    ConflictingResult,

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

/// Response the HTTP layer relays verbatim; for replays this is the sealed
/// body and status code of the original delivery.
#[derive(Debug, Clone)]
pub struct WebhookOutcome {
    pub body: serde_json::Value,
    pub status_code: i32,
}

#[derive(Clone)]
pub struct WebhookService<S: Store> {
    store: S,
    invalidator: Arc<dyn Invalidator>,
    clock: Arc<dyn Clock>,
}

impl<S: Store> WebhookService<S> {
    pub fn new(store: S, invalidator: Arc<dyn Invalidator>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            invalidator,
            clock,
        }
    }

    pub async fn handle_webhook(
        &self,
        idempotency_key: &str,
        hold_id: Uuid,
        status: PaymentStatus,
    ) -> Result<WebhookOutcome, WebhookError> {
        if let Some(sealed) = self.store.get_webhook_log(idempotency_key).await? {
            crate::metrics::record_webhook_replayed();
            tracing::debug!("Replaying sealed webhook response for key {}", idempotency_key);
            return Ok(WebhookOutcome {
                body: sealed.response_body,
                status_code: sealed.response_status_code,
            });
        }

        let mut tx = self.store.begin().await?;
        let mut invalidate_product = None;

        let (body, status_code) = match tx.lock_hold(hold_id, None).await? {
            None => (json!({ "msg": "Hold not found" }), 404),
            Some(hold) => {
                match tx.order_for_hold(hold.id).await? {
                    Some(order) => {
                        tx.set_order_status(order.id, status.into()).await?;
                        // Restore only on the transition into failed; a
                        // repeat failure with a fresh key must not restore
                        // twice.
                        if status == PaymentStatus::Failed && order.status != OrderStatus::Failed {
                            let product = tx
                                .lock_product(hold.product_id)
                                .await?
                                .ok_or(StoreError::NotFound)?;
                            tx.set_product_stock(product.id, product.total_stock + hold.qty)
                                .await?;
                            invalidate_product = Some(product.id);
                        }
                    }
                    None => {
                        let parked = PendingWebhook {
                            id: Uuid::new_v4(),
                            hold_id: hold.id,
                            status,
                            created_at: self.clock.now(),
                        };
                        match tx.insert_pending_webhook(&parked).await {
                            Ok(()) => {}
                            Err(StoreError::UniqueViolation) => {
                                return Err(WebhookError::ConflictingResult)
                            }
                            Err(e) => return Err(e.into()),
                        }
                    }
                }
                (json!({ "data": { "hold_id": hold.id, "status": status } }), 200)
            }
        };

        let log = WebhookLog {
            idempotency_key: idempotency_key.to_string(),
            response_body: body.clone(),
            response_status_code: status_code,
        };
        match tx.insert_webhook_log(&log).await {
            Ok(()) => {}
            Err(StoreError::UniqueViolation) => {
                // Lost a same-key race: roll back our side effects and
                // return whatever the winner sealed.
                drop(tx);
                let sealed = self
                    .store
                    .get_webhook_log(idempotency_key)
                    .await?
                    .ok_or(StoreError::Conflict)?;
                crate::metrics::record_webhook_replayed();
                return Ok(WebhookOutcome {
                    body: sealed.response_body,
                    status_code: sealed.response_status_code,
                });
            }
            Err(e) => return Err(e.into()),
        }
        tx.commit().await?;

        if let Some(product_id) = invalidate_product {
            self.invalidator.invalidate(product_id).await;
            crate::metrics::record_stock_restoration();
        }
        crate::metrics::record_webhook_processed(&status.to_string());
        tracing::info!(
            "Webhook {} processed: hold {} -> {} ({})",
            idempotency_key,
            hold_id,
            status,
            status_code
        );

        Ok(WebhookOutcome { body, status_code })
    }
}
