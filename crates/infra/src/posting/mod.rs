//! Order posting: the transactional core.
//!
//! ```text
//! PurchaseRequest (validated, coalesced)
//!   ↓
//! 1. Idempotency pre-check (existing order → AlreadyExisted)
//!   ↓
//! 2. Lock credit account, then products in ascending id order
//!   ↓
//! 3-6. Existence, pricing, stock and credit checks on locked snapshots
//!   ↓
//! 7. Insert order (unique violation → AlreadyExisted after rollback)
//!   ↓
//! 8. Items, stock decrement, balance increase, ledger charge
//!   ↓
//! 9. Commit
//! ```
//!
//! The engine is written against [`PostingStore`]/[`PostingTx`]; Postgres and
//! the in-memory store both implement them.

pub mod engine;
pub mod in_memory;
pub mod postgres;
pub mod store;

pub use engine::{PostingEngine, PostingError};
pub use in_memory::InMemoryPostingTx;
pub use postgres::PgPostingTx;
pub use store::{NewLedgerEntry, NewOrder, PostingStore, PostingTx};
