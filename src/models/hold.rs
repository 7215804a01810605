use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;
use validator::Validate;

use super::datetime_as_millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "hold_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum HoldStatus {
    Pending,
    Completed,
    Expired,
}

impl fmt::Display for HoldStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoldStatus::Pending => write!(f, "pending"),
            HoldStatus::Completed => write!(f, "completed"),
            HoldStatus::Expired => write!(f, "expired"),
        }
    }
}

/// A time-limited reservation of `qty` units of a product.
///
/// Created `pending`, leaves `pending` exactly once: to `completed` when an
/// order claims it, or to `expired` when the sweeper reclaims it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Hold {
    pub id: Uuid,
    pub product_id: Uuid,
    pub qty: i32,
    pub status: HoldStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateHoldRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "qty must be a positive integer"))]
    pub qty: i32,
}

/// What the client gets back for a successful reservation.
#[derive(Debug, Clone, Serialize)]
pub struct HoldReceipt {
    pub hold_id: Uuid,
    #[serde(serialize_with = "datetime_as_millis::serialize")]
    pub expires_at: DateTime<Utc>,
}
