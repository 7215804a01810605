//! End-to-end scenarios across the hold, order, webhook, reconciliation, and
//! sweeper engines, run against the in-memory store.

use std::sync::Arc;

use rust_decimal_macros::dec;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use crate::clock::manual::ManualClock;
use crate::models::{HoldStatus, OrderStatus, PaymentStatus};
use crate::services::holds::{HoldError, HoldService};
use crate::services::orders::{OrderError, OrderService};
use crate::services::reconciliation::{ReconciliationQueue, ReconciliationService};
use crate::services::sweeper::SweeperService;
use crate::services::webhooks::WebhookService;
use crate::services::testutil::{fixed_clock, RecordingInvalidator};
use crate::store::memory::MemStore;

struct Checkout {
    store: MemStore,
    clock: Arc<ManualClock>,
    holds: HoldService<MemStore>,
    orders: OrderService<MemStore>,
    webhooks: WebhookService<MemStore>,
    reconciliation: ReconciliationService<MemStore>,
    sweeper: SweeperService<MemStore>,
}

fn checkout() -> (Checkout, UnboundedReceiver<Uuid>) {
    let store = MemStore::new();
    let invalidator = RecordingInvalidator::new();
    let clock = fixed_clock();
    let (queue, receiver) = ReconciliationQueue::new();

    let checkout = Checkout {
        holds: HoldService::new(
            store.clone(),
            invalidator.clone(),
            clock.clone(),
            chrono::Duration::seconds(120),
        ),
        orders: OrderService::new(store.clone(), clock.clone(), queue),
        webhooks: WebhookService::new(store.clone(), invalidator.clone(), clock.clone()),
        reconciliation: ReconciliationService::new(store.clone(), invalidator.clone()),
        sweeper: SweeperService::new(store.clone(), invalidator, clock.clone()),
        store,
        clock,
    };
    (checkout, receiver)
}

#[tokio::test]
async fn scenario_round_trip_success() {
    let (cx, _rx) = checkout();
    let product_id = cx.store.seed_product("gpu", 100, dec!(50.00)).await;

    let receipt = cx.holds.create_hold(product_id, 4).await.unwrap();
    let order = cx.orders.create_order(receipt.hold_id).await.unwrap();
    let outcome = cx
        .webhooks
        .handle_webhook("k", receipt.hold_id, PaymentStatus::Paid)
        .await
        .unwrap();
    assert_eq!(outcome.status_code, 200);

    let state = cx.store.snapshot().await;
    assert_eq!(state.products[&product_id].total_stock, 96);
    assert_eq!(state.orders[&order.id].status, OrderStatus::Paid);
    assert!(state.pending_webhooks.is_empty());
    assert!(state.webhook_logs.contains_key("k"));
}

#[tokio::test]
async fn scenario_round_trip_failure_restores_stock() {
    let (cx, _rx) = checkout();
    let product_id = cx.store.seed_product("gpu", 100, dec!(50.00)).await;

    let receipt = cx.holds.create_hold(product_id, 4).await.unwrap();
    let order = cx.orders.create_order(receipt.hold_id).await.unwrap();
    cx.webhooks
        .handle_webhook("k", receipt.hold_id, PaymentStatus::Failed)
        .await
        .unwrap();

    let state = cx.store.snapshot().await;
    assert_eq!(state.products[&product_id].total_stock, 100);
    assert_eq!(state.orders[&order.id].status, OrderStatus::Failed);
}

/// Scenario: the payment result arrives before the order exists; the parked
/// result is applied by reconciliation after order creation.
#[tokio::test]
async fn scenario_early_webhook_then_order_then_reconcile() {
    let (cx, _rx) = checkout();
    let product_id = cx.store.seed_product("gpu", 100, dec!(50.00)).await;

    let receipt = cx.holds.create_hold(product_id, 2).await.unwrap();
    let outcome = cx
        .webhooks
        .handle_webhook("k1", receipt.hold_id, PaymentStatus::Paid)
        .await
        .unwrap();
    assert_eq!(outcome.status_code, 200);
    assert_eq!(cx.store.snapshot().await.pending_webhooks.len(), 1);

    let order = cx.orders.create_order(receipt.hold_id).await.unwrap();
    assert!(cx.reconciliation.reconcile(order.id).await.unwrap());

    let state = cx.store.snapshot().await;
    assert_eq!(state.orders[&order.id].status, OrderStatus::Paid);
    assert!(state.pending_webhooks.is_empty());
    assert_eq!(state.products[&product_id].total_stock, 98);
}

/// Early and late webhook delivery must converge to the same end state for
/// the same payload.
#[tokio::test]
async fn scenario_webhook_order_commutativity() {
    for status in [PaymentStatus::Paid, PaymentStatus::Failed] {
        // Early: webhook first, then order, then reconciliation.
        let (early, _rx) = checkout();
        let early_product = early.store.seed_product("gpu", 100, dec!(50.00)).await;
        let receipt = early.holds.create_hold(early_product, 2).await.unwrap();
        early
            .webhooks
            .handle_webhook("k", receipt.hold_id, status)
            .await
            .unwrap();
        let order = early.orders.create_order(receipt.hold_id).await.unwrap();
        early.reconciliation.reconcile(order.id).await.unwrap();
        let early_state = early.store.snapshot().await;
        let early_order = &early_state.orders[&order.id];

        // Late: order first, then webhook.
        let (late, _rx) = checkout();
        let late_product = late.store.seed_product("gpu", 100, dec!(50.00)).await;
        let receipt = late.holds.create_hold(late_product, 2).await.unwrap();
        let order = late.orders.create_order(receipt.hold_id).await.unwrap();
        late.webhooks
            .handle_webhook("k", receipt.hold_id, status)
            .await
            .unwrap();
        let late_state = late.store.snapshot().await;
        let late_order = &late_state.orders[&order.id];

        assert_eq!(early_order.status, late_order.status, "status for {status}");
        assert_eq!(
            early_state.products[&early_product].total_stock,
            late_state.products[&late_product].total_stock,
            "stock for {status}"
        );
        assert!(early_state.pending_webhooks.is_empty());
        assert!(late_state.pending_webhooks.is_empty());
    }
}

/// Scenario: an expired hold is swept, its stock returns, and a later order
/// attempt against it is rejected.
#[tokio::test]
async fn scenario_expired_hold_cannot_be_ordered() {
    let (cx, _rx) = checkout();
    let product_id = cx.store.seed_product("gpu", 100, dec!(50.00)).await;

    let receipt = cx.holds.create_hold(product_id, 10).await.unwrap();
    assert_eq!(cx.store.snapshot().await.products[&product_id].total_stock, 90);

    cx.clock.advance(chrono::Duration::minutes(5));
    assert_eq!(cx.sweeper.run_once().await.unwrap(), 1);

    let state = cx.store.snapshot().await;
    assert_eq!(state.holds[&receipt.hold_id].status, HoldStatus::Expired);
    assert_eq!(state.products[&product_id].total_stock, 100);

    let err = cx.orders.create_order(receipt.hold_id).await.unwrap_err();
    assert!(matches!(err, OrderError::InvalidHold));
}

/// Scenario: serial mix of holds, orders, a failed payment, and a late hold
/// over a stock of five.
#[tokio::test]
async fn scenario_serial_checkout_accounting() {
    let (cx, _rx) = checkout();
    let product_id = cx.store.seed_product("gpu", 5, dec!(50.00)).await;

    let hold1 = cx.holds.create_hold(product_id, 3).await.unwrap();
    let hold2 = cx.holds.create_hold(product_id, 2).await.unwrap();
    assert!(matches!(
        cx.holds.create_hold(product_id, 1).await.unwrap_err(),
        HoldError::InsufficientStock { .. }
    ));

    cx.orders.create_order(hold1.hold_id).await.unwrap();
    cx.orders.create_order(hold2.hold_id).await.unwrap();

    let outcome = cx
        .webhooks
        .handle_webhook("k-fail", hold2.hold_id, PaymentStatus::Failed)
        .await
        .unwrap();
    assert_eq!(outcome.status_code, 200);

    // The failed payment freed two units; one more hold now fits.
    cx.holds.create_hold(product_id, 1).await.unwrap();

    let state = cx.store.snapshot().await;
    assert_eq!(state.products[&product_id].total_stock, 1);
}

/// The queue wired through the order engine drives the background worker to
/// the same end state as calling reconcile directly.
#[tokio::test]
async fn scenario_reconciliation_worker_consumes_queue() {
    let (cx, rx) = checkout();
    let product_id = cx.store.seed_product("gpu", 100, dec!(50.00)).await;

    let receipt = cx.holds.create_hold(product_id, 2).await.unwrap();
    cx.webhooks
        .handle_webhook("k", receipt.hold_id, PaymentStatus::Paid)
        .await
        .unwrap();

    let worker = cx.reconciliation.clone().spawn(rx);
    let order = cx.orders.create_order(receipt.hold_id).await.unwrap();

    let applied = tokio::time::timeout(std::time::Duration::from_secs(2), async {
        loop {
            let state = cx.store.snapshot().await;
            if state.orders[&order.id].status == OrderStatus::Paid {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(applied.is_ok(), "worker never applied the parked result");

    worker.abort();
}
