//! Credit purchasing domain module.
//!
//! This crate contains the business rules for posting a purchase on credit,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no
//! storage): request normalization, server-side pricing against locked
//! snapshots, and the stock and credit checks.

pub mod order;
pub mod pricing;
pub mod request;

pub use order::{LedgerEntryType, OrderStatus, PAYMENT_TERM_DAYS, PostOutcome, due_at};
pub use pricing::{
    CreditSnapshot, LockedProduct, PricedLine, PricedPurchase, PurchaseRejection, price_purchase,
};
pub use request::{PurchaseItem, PurchaseRequest};
