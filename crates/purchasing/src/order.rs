//! Order lifecycle constants and the posting outcome.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use creditpost_core::OrderId;

/// Payment term granted on every posted order.
pub const PAYMENT_TERM_DAYS: i64 = 30;

/// Due date of an order posted at `posted_at`.
pub fn due_at(posted_at: DateTime<Utc>) -> DateTime<Utc> {
    posted_at + Duration::days(PAYMENT_TERM_DAYS)
}

/// Order status. Posting only ever produces `Posted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Posted,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Posted => "posted",
        }
    }
}

/// Kind of balance-affecting ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerEntryType {
    Charge,
}

impl LedgerEntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEntryType::Charge => "charge",
        }
    }
}

/// Outcome of posting a purchase.
///
/// Both variants are successes; `AlreadyExisted` means an earlier request
/// with the same idempotency key had already committed and nothing was
/// mutated by this call.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "order_id", rename_all = "snake_case")]
pub enum PostOutcome {
    Created(OrderId),
    AlreadyExisted(OrderId),
}

impl PostOutcome {
    pub fn order_id(&self) -> OrderId {
        match self {
            PostOutcome::Created(id) | PostOutcome::AlreadyExisted(id) => *id,
        }
    }

    pub fn is_replay(&self) -> bool {
        matches!(self, PostOutcome::AlreadyExisted(_))
    }
}
