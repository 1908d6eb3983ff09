//! Storage error model shared by every store implementation.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StoreError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `UniqueViolation` (callers may refine, e.g. `DuplicateOrder`) |
//! | Database (check constraint violation) | `23514` | `CheckViolation` |
//! | Database (other) | Any other | `Database` |
//! | PoolClosed / PoolTimedOut / Io | N/A | `Unavailable` |
//! | Other | N/A | `Database` |

use thiserror::Error;

use creditpost_core::{BusinessId, IdempotencyKey};

/// Unique constraint guarding one order per (business, idempotency key).
pub const ORDERS_IDEMPOTENCY_CONSTRAINT: &str = "orders_business_idempotency_key";

/// Unique constraint guarding one sku per business.
pub const PRODUCTS_SKU_CONSTRAINT: &str = "products_business_sku";

/// Storage operation error.
///
/// These are **infrastructure errors** as opposed to business-rule rejections.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An order for this (business, idempotency key) is already committed.
    #[error("order already exists for business {business_id} and idempotency key {idempotency_key}")]
    DuplicateOrder {
        business_id: BusinessId,
        idempotency_key: IdempotencyKey,
    },

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("check constraint violated: {0}")]
    CheckViolation(String),

    /// Connection-level failure (pool closed, timeout, network).
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Name of the violated unique constraint, if this is a unique violation.
    pub fn violated_unique_constraint(&self) -> Option<&str> {
        match self {
            StoreError::UniqueViolation(constraint) => Some(constraint.as_str()),
            _ => None,
        }
    }
}

/// Map SQLx errors to StoreError.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let constraint = db_err.constraint().unwrap_or("unknown").to_string();
            match db_err.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation(constraint),
                Some("23514") => StoreError::CheckViolation(constraint),
                _ => StoreError::Database(format!(
                    "database error in {}: {}",
                    operation,
                    db_err.message()
                )),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool timed out in {}", operation))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {}: {}", operation, e)),
        _ => StoreError::Database(format!("sqlx error in {}: {}", operation, err)),
    }
}
