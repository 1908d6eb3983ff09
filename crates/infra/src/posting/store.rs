use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use creditpost_core::{BusinessId, IdempotencyKey, OrderId, ProductId};
use creditpost_purchasing::{CreditSnapshot, LedgerEntryType, LockedProduct, OrderStatus, PricedLine};

use crate::store::StoreError;

/// Order row to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub business_id: BusinessId,
    pub idempotency_key: IdempotencyKey,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub paid_cents: i64,
    pub created_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
}

/// Ledger row to append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub entry_id: Uuid,
    pub business_id: BusinessId,
    pub order_id: Option<OrderId>,
    pub entry_type: LedgerEntryType,
    pub amount_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// Transactional store used by the posting engine.
#[async_trait]
pub trait PostingStore: Send + Sync {
    type Tx: PostingTx;

    /// Open a transaction.
    async fn begin(&self) -> Result<Self::Tx, StoreError>;

    /// Look up a committed order outside any transaction.
    ///
    /// Used after a lost idempotency race, once the losing transaction has
    /// been rolled back.
    async fn find_order_id(
        &self,
        business_id: BusinessId,
        idempotency_key: IdempotencyKey,
    ) -> Result<Option<OrderId>, StoreError>;
}

/// One open transaction.
///
/// Dropping a transaction without committing rolls it back and releases all of
/// its row locks.
#[async_trait]
pub trait PostingTx: Send + Sized {
    async fn find_order_id(
        &mut self,
        business_id: BusinessId,
        idempotency_key: IdempotencyKey,
    ) -> Result<Option<OrderId>, StoreError>;

    /// Exclusively lock the business's credit account row.
    ///
    /// Returns `None` when the business has no credit account.
    async fn lock_credit_account(
        &mut self,
        business_id: BusinessId,
    ) -> Result<Option<CreditSnapshot>, StoreError>;

    /// Exclusively lock the products of `business_id` among `product_ids`.
    ///
    /// Locks are acquired in ascending product id order. Ids that do not exist
    /// or belong to another business are silently absent from the result.
    async fn lock_products(
        &mut self,
        business_id: BusinessId,
        product_ids: &[ProductId],
    ) -> Result<Vec<LockedProduct>, StoreError>;

    /// Insert the order row.
    ///
    /// Fails with [`StoreError::DuplicateOrder`] when the (business,
    /// idempotency key) pair is already taken.
    async fn insert_order(&mut self, order: &NewOrder) -> Result<(), StoreError>;

    async fn insert_items(
        &mut self,
        business_id: BusinessId,
        order_id: OrderId,
        lines: &[PricedLine],
    ) -> Result<(), StoreError>;

    async fn decrement_stock(
        &mut self,
        business_id: BusinessId,
        lines: &[PricedLine],
    ) -> Result<(), StoreError>;

    async fn increase_balance(
        &mut self,
        business_id: BusinessId,
        amount_cents: i64,
    ) -> Result<(), StoreError>;

    async fn append_ledger(&mut self, entry: &NewLedgerEntry) -> Result<(), StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}
