//! Infrastructure layer: Postgres and in-memory stores, the order posting
//! engine, catalog maintenance, overdue reports and configuration.

pub mod catalog;
pub mod config;
pub mod db;
pub mod memory;
pub mod posting;
pub mod reports;
pub mod store;

pub use db::PgStore;
pub use memory::InMemoryStore;
pub use posting::{PostingEngine, PostingError};
pub use store::StoreError;
