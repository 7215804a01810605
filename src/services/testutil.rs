//! Shared fixtures for the engine tests: a recording cache invalidator, a
//! pinned clock, and direct seeding helpers over the in-memory store.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::cache::Invalidator;
use crate::clock::manual::ManualClock;
use crate::models::{Hold, HoldStatus};
use crate::store::memory::MemStore;
use crate::store::{Store, StoreTx};

pub struct RecordingInvalidator {
    invalidated: Mutex<Vec<Uuid>>,
}

impl RecordingInvalidator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            invalidated: Mutex::new(Vec::new()),
        })
    }

    pub fn invalidated(&self) -> Vec<Uuid> {
        self.invalidated.lock().unwrap().clone()
    }
}

#[async_trait]
impl Invalidator for RecordingInvalidator {
    async fn invalidate(&self, product_id: Uuid) {
        self.invalidated.lock().unwrap().push(product_id);
    }
}

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

pub fn fixed_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::at(fixed_now()))
}

/// Insert a hold directly, bypassing the hold engine.
pub async fn seed_hold(
    store: &MemStore,
    product_id: Uuid,
    qty: i32,
    status: HoldStatus,
    expires_at: DateTime<Utc>,
) -> Uuid {
    let now = fixed_now();
    let hold = Hold {
        id: Uuid::new_v4(),
        product_id,
        qty,
        status,
        expires_at,
        created_at: now,
        updated_at: now,
    };
    let id = hold.id;
    let mut tx = store.begin().await.unwrap();
    tx.insert_hold(&hold).await.unwrap();
    tx.commit().await.unwrap();
    id
}
