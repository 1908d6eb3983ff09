//! Postgres connection handle, schema bootstrap and demo seeding.

pub mod schema;
pub mod seed;

use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::OnceCell;

use crate::store::StoreError;

/// Postgres-backed store for businesses, products, credit accounts and orders.
///
/// ## Thread Safety
///
/// Uses the SQLx connection pool, which is `Send + Sync`; clones share the pool
/// and the schema bootstrap state.
///
/// ## Schema
///
/// The schema is applied lazily by the first operation and then never again
/// for the lifetime of this handle (and its clones).
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: Arc<PgPool>,
    schema_ready: Arc<OnceCell<()>>,
}

impl PgStore {
    /// Create a new PgStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the schema once per handle.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.schema_ready
            .get_or_try_init(|| schema::apply(&self.pool))
            .await
            .map(|_| ())
    }
}
