//! In-memory store with real row-level exclusive locks.
//!
//! Intended for tests and local development. It mirrors the guarantees the
//! posting engine relies on from Postgres:
//!
//! - each credit account and product row has its own exclusive lock, held by a
//!   transaction until it commits or is dropped;
//! - writes are staged per transaction and applied atomically on commit;
//! - the (business, idempotency key) uniqueness of orders is checked on insert
//!   and again, authoritatively, on commit;
//! - the column checks of the Postgres schema (`stock >= 0`,
//!   `0 <= balance <= limit`) are enforced on commit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use creditpost_core::{BusinessId, IdempotencyKey, OrderId, ProductId};
use creditpost_purchasing::{LedgerEntryType, OrderStatus};

use crate::db::seed::{demo_businesses, demo_products};
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessRecord {
    pub id: BusinessId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    pub id: ProductId,
    pub business_id: BusinessId,
    pub sku: String,
    pub name: String,
    pub stock: i64,
    pub price_cents: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditAccountRecord {
    pub business_id: BusinessId,
    pub credit_limit_cents: i64,
    pub balance_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub id: OrderId,
    pub business_id: BusinessId,
    pub idempotency_key: IdempotencyKey,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub paid_cents: i64,
    pub created_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItemRecord {
    pub id: Uuid,
    pub business_id: BusinessId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub qty: i64,
    pub unit_price_cents: i64,
}

impl OrderItemRecord {
    pub fn line_total_cents(&self) -> i64 {
        self.qty * self.unit_price_cents
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntryRecord {
    pub id: Uuid,
    pub business_id: BusinessId,
    pub order_id: Option<OrderId>,
    pub entry_type: LedgerEntryType,
    pub amount_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// Committed rows.
#[derive(Debug, Default)]
pub(crate) struct State {
    pub(crate) businesses: HashMap<BusinessId, BusinessRecord>,
    pub(crate) products: HashMap<ProductId, ProductRecord>,
    pub(crate) credit_accounts: HashMap<BusinessId, CreditAccountRecord>,
    pub(crate) orders: HashMap<OrderId, OrderRecord>,
    pub(crate) order_keys: HashMap<(BusinessId, IdempotencyKey), OrderId>,
    pub(crate) order_items: Vec<OrderItemRecord>,
    pub(crate) ledger: Vec<LedgerEntryRecord>,
}

impl ProductRecord {
    /// Column checks of the `products` table.
    pub(crate) fn check(&self) -> Result<(), StoreError> {
        if self.stock < 0 {
            return Err(StoreError::CheckViolation("products_stock_check".into()));
        }
        Ok(())
    }
}

impl CreditAccountRecord {
    /// Column and table checks of `business_credit_accounts`.
    pub(crate) fn check(&self) -> Result<(), StoreError> {
        if self.balance_cents < 0 {
            return Err(StoreError::CheckViolation(
                "business_credit_accounts_balance_cents_check".into(),
            ));
        }
        if self.balance_cents > self.credit_limit_cents {
            return Err(StoreError::CheckViolation(
                "credit_accounts_balance_within_limit".into(),
            ));
        }
        Ok(())
    }
}

/// Lockable row identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum RowKey {
    CreditAccount(BusinessId),
    Product(ProductId),
}

#[derive(Debug, Default)]
pub(crate) struct Shared {
    state: RwLock<State>,
    row_locks: Mutex<HashMap<RowKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl Shared {
    pub(crate) fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    pub(crate) fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    /// Acquire the exclusive lock of one row, waiting for the current holder
    /// to commit or roll back.
    pub(crate) async fn lock_row(&self, key: RowKey) -> Result<OwnedMutexGuard<()>, StoreError> {
        let row = {
            let mut locks = self
                .row_locks
                .lock()
                .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
            locks.entry(key).or_default().clone()
        };
        Ok(row.lock_owned().await)
    }
}

/// In-memory store shared by clones (cheap `Arc` handle).
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    pub(crate) shared: Arc<Shared>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with the demo businesses, products and accounts.
    pub fn with_demo_data() -> Self {
        let store = Self::new();
        {
            let mut state = store
                .shared
                .state
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let now = Utc::now();
            for b in demo_businesses() {
                state.businesses.insert(
                    b.id,
                    BusinessRecord {
                        id: b.id,
                        name: b.name.to_string(),
                        created_at: now,
                    },
                );
                state.credit_accounts.insert(
                    b.id,
                    CreditAccountRecord {
                        business_id: b.id,
                        credit_limit_cents: b.credit_limit_cents,
                        balance_cents: 0,
                    },
                );
            }
            for p in demo_products() {
                state.products.insert(
                    p.id,
                    ProductRecord {
                        id: p.id,
                        business_id: p.business_id,
                        sku: p.sku.to_string(),
                        name: p.name.to_string(),
                        stock: p.stock,
                        price_cents: p.price_cents,
                        created_at: now,
                    },
                );
            }
        }
        store
    }

    pub fn product(&self, id: ProductId) -> Result<Option<ProductRecord>, StoreError> {
        Ok(self.shared.read()?.products.get(&id).cloned())
    }

    pub fn credit_account(&self, business_id: BusinessId) -> Result<Option<CreditAccountRecord>, StoreError> {
        Ok(self.shared.read()?.credit_accounts.get(&business_id).cloned())
    }

    /// Orders of a business, oldest first.
    pub fn orders(&self, business_id: BusinessId) -> Result<Vec<OrderRecord>, StoreError> {
        let state = self.shared.read()?;
        let mut orders: Vec<OrderRecord> = state
            .orders
            .values()
            .filter(|o| o.business_id == business_id)
            .cloned()
            .collect();
        orders.sort_by_key(|o| (o.created_at, o.id));
        Ok(orders)
    }

    pub fn order_items(&self, order_id: OrderId) -> Result<Vec<OrderItemRecord>, StoreError> {
        Ok(self
            .shared
            .read()?
            .order_items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect())
    }

    pub fn ledger(&self, business_id: BusinessId) -> Result<Vec<LedgerEntryRecord>, StoreError> {
        Ok(self
            .shared
            .read()?
            .ledger
            .iter()
            .filter(|e| e.business_id == business_id)
            .cloned()
            .collect())
    }
}
