use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// Result of a payment attempt as reported by the payment provider.
///
/// Closed set: anything else is rejected at the HTTP boundary before the
/// idempotency key is looked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Paid => write!(f, "paid"),
            PaymentStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            _ => Err(()),
        }
    }
}

/// Sealed outcome of a webhook delivery, keyed by the client's idempotency
/// key. Replays return the stored body and status code verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WebhookLog {
    pub idempotency_key: String,
    pub response_body: serde_json::Value,
    pub response_status_code: i32,
}

/// A payment result that arrived before its order existed, parked until
/// reconciliation consumes it. At most one per hold.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PendingWebhook {
    pub id: Uuid,
    pub hold_id: Uuid,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct WebhookRequest {
    #[validate(length(min = 1, max = 255, message = "idempotency_key must not be empty"))]
    pub idempotency_key: String,
    pub data: WebhookEvent,
}

/// Payload of a payment-result delivery. `status` stays a raw token here so
/// the handler can reject unknown values with a structured validation error.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub hold_id: Uuid,
    pub status: String,
}
