//! In-memory implementation of the posting store.
//!
//! A transaction holds the row guards it acquired and a list of staged
//! writes. Nothing becomes visible to other transactions until `commit`
//! checks the writes against the rows they touch and then applies them in
//! place, all under one write lock of the committed state. Dropping the
//! transaction discards the writes and releases the guards.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use creditpost_core::{BusinessId, IdempotencyKey, OrderId, ProductId};
use creditpost_purchasing::{CreditSnapshot, LockedProduct, PricedLine};

use super::store::{NewLedgerEntry, NewOrder, PostingStore, PostingTx};
use crate::memory::{
    CreditAccountRecord, InMemoryStore, LedgerEntryRecord, OrderItemRecord, OrderRecord,
    ProductRecord, RowKey, Shared, State,
};
use crate::store::StoreError;

#[derive(Debug)]
enum StagedWrite {
    Order(OrderRecord),
    Items(Vec<OrderItemRecord>),
    StockDecrement { product_id: ProductId, qty: i64 },
    BalanceIncrease { business_id: BusinessId, amount_cents: i64 },
    Ledger(LedgerEntryRecord),
}

/// Open in-memory transaction.
#[derive(Debug)]
pub struct InMemoryPostingTx {
    shared: Arc<Shared>,
    held: HashSet<RowKey>,
    guards: Vec<OwnedMutexGuard<()>>,
    staged: Vec<StagedWrite>,
}

impl InMemoryPostingTx {
    fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            held: HashSet::new(),
            guards: Vec::new(),
            staged: Vec::new(),
        }
    }

    async fn lock(&mut self, key: RowKey) -> Result<(), StoreError> {
        if self.held.contains(&key) {
            return Ok(());
        }
        let guard = self.shared.lock_row(key).await?;
        self.guards.push(guard);
        self.held.insert(key);
        Ok(())
    }

    fn require_lock(&self, key: RowKey) -> Result<(), StoreError> {
        if self.held.contains(&key) {
            Ok(())
        } else {
            Err(StoreError::Database(format!("row {key:?} written without holding its lock")))
        }
    }

    fn staged_key_taken(&self, business_id: BusinessId, key: IdempotencyKey) -> bool {
        self.staged.iter().any(|w| {
            matches!(w, StagedWrite::Order(o) if o.business_id == business_id && o.idempotency_key == key)
        })
    }
}

/// New values of the product and credit account rows a commit updates.
#[derive(Debug, Default)]
struct TouchedRows {
    products: HashMap<ProductId, ProductRecord>,
    accounts: HashMap<BusinessId, CreditAccountRecord>,
}

/// Check staged writes against committed state without modifying it.
fn resolve(state: &State, staged: &[StagedWrite]) -> Result<TouchedRows, StoreError> {
    let mut keys = HashSet::new();
    let mut touched = TouchedRows::default();

    for write in staged {
        match write {
            StagedWrite::Order(order) => {
                let key = (order.business_id, order.idempotency_key);
                if state.order_keys.contains_key(&key) || !keys.insert(key) {
                    return Err(StoreError::DuplicateOrder {
                        business_id: order.business_id,
                        idempotency_key: order.idempotency_key,
                    });
                }
            }
            StagedWrite::StockDecrement { product_id, qty } => {
                let product = match touched.products.entry(*product_id) {
                    Entry::Occupied(e) => e.into_mut(),
                    Entry::Vacant(e) => e.insert(state.products.get(product_id).cloned().ok_or_else(
                        || StoreError::Database(format!("product {product_id} vanished before commit")),
                    )?),
                };
                product.stock = product
                    .stock
                    .checked_sub(*qty)
                    .ok_or_else(|| StoreError::CheckViolation("products_stock_check".into()))?;
            }
            StagedWrite::BalanceIncrease {
                business_id,
                amount_cents,
            } => {
                let account = match touched.accounts.entry(*business_id) {
                    Entry::Occupied(e) => e.into_mut(),
                    Entry::Vacant(e) => e.insert(
                        state.credit_accounts.get(business_id).cloned().ok_or_else(|| {
                            StoreError::Database(format!(
                                "credit account {business_id} vanished before commit"
                            ))
                        })?,
                    ),
                };
                account.balance_cents = account
                    .balance_cents
                    .checked_add(*amount_cents)
                    .ok_or_else(|| StoreError::CheckViolation("balance_cents overflow".into()))?;
            }
            StagedWrite::Items(_) | StagedWrite::Ledger(_) => {}
        }
    }

    touched.products.values().try_for_each(ProductRecord::check)?;
    touched.accounts.values().try_for_each(CreditAccountRecord::check)?;
    Ok(touched)
}

fn apply(state: &mut State, staged: Vec<StagedWrite>, touched: TouchedRows) {
    for write in staged {
        match write {
            StagedWrite::Order(order) => {
                state.order_keys.insert((order.business_id, order.idempotency_key), order.id);
                state.orders.insert(order.id, order);
            }
            StagedWrite::Items(items) => state.order_items.extend(items),
            StagedWrite::Ledger(entry) => state.ledger.push(entry),
            StagedWrite::StockDecrement { .. } | StagedWrite::BalanceIncrease { .. } => {}
        }
    }
    state.products.extend(touched.products);
    state.credit_accounts.extend(touched.accounts);
}

#[async_trait]
impl PostingStore for InMemoryStore {
    type Tx = InMemoryPostingTx;

    async fn begin(&self) -> Result<InMemoryPostingTx, StoreError> {
        Ok(InMemoryPostingTx::new(self.shared.clone()))
    }

    async fn find_order_id(
        &self,
        business_id: BusinessId,
        idempotency_key: IdempotencyKey,
    ) -> Result<Option<OrderId>, StoreError> {
        Ok(self
            .shared
            .read()?
            .order_keys
            .get(&(business_id, idempotency_key))
            .copied())
    }
}

#[async_trait]
impl PostingTx for InMemoryPostingTx {
    async fn find_order_id(
        &mut self,
        business_id: BusinessId,
        idempotency_key: IdempotencyKey,
    ) -> Result<Option<OrderId>, StoreError> {
        Ok(self
            .shared
            .read()?
            .order_keys
            .get(&(business_id, idempotency_key))
            .copied())
    }

    async fn lock_credit_account(
        &mut self,
        business_id: BusinessId,
    ) -> Result<Option<CreditSnapshot>, StoreError> {
        let exists = self.shared.read()?.credit_accounts.contains_key(&business_id);
        if !exists {
            return Ok(None);
        }

        self.lock(RowKey::CreditAccount(business_id)).await?;

        let state = self.shared.read()?;
        Ok(state.credit_accounts.get(&business_id).map(|a| CreditSnapshot {
            credit_limit_cents: a.credit_limit_cents,
            balance_cents: a.balance_cents,
        }))
    }

    async fn lock_products(
        &mut self,
        business_id: BusinessId,
        product_ids: &[ProductId],
    ) -> Result<Vec<LockedProduct>, StoreError> {
        let mut owned: Vec<ProductId> = {
            let state = self.shared.read()?;
            product_ids
                .iter()
                .copied()
                .filter(|id| {
                    state
                        .products
                        .get(id)
                        .is_some_and(|p| p.business_id == business_id)
                })
                .collect()
        };
        owned.sort();
        owned.dedup();

        for id in &owned {
            self.lock(RowKey::Product(*id)).await?;
        }

        let state = self.shared.read()?;
        Ok(owned
            .iter()
            .filter_map(|id| state.products.get(id))
            .filter(|p| p.business_id == business_id)
            .map(|p| LockedProduct {
                product_id: p.id,
                stock: p.stock,
                price_cents: p.price_cents,
            })
            .collect())
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<(), StoreError> {
        let committed = self
            .shared
            .read()?
            .order_keys
            .contains_key(&(order.business_id, order.idempotency_key));
        if committed || self.staged_key_taken(order.business_id, order.idempotency_key) {
            return Err(StoreError::DuplicateOrder {
                business_id: order.business_id,
                idempotency_key: order.idempotency_key,
            });
        }

        self.staged.push(StagedWrite::Order(OrderRecord {
            id: order.order_id,
            business_id: order.business_id,
            idempotency_key: order.idempotency_key,
            status: order.status,
            total_cents: order.total_cents,
            paid_cents: order.paid_cents,
            created_at: order.created_at,
            due_at: order.due_at,
        }));
        Ok(())
    }

    async fn insert_items(
        &mut self,
        business_id: BusinessId,
        order_id: OrderId,
        lines: &[PricedLine],
    ) -> Result<(), StoreError> {
        let items = lines
            .iter()
            .map(|line| OrderItemRecord {
                id: Uuid::now_v7(),
                business_id,
                order_id,
                product_id: line.product_id,
                qty: line.qty,
                unit_price_cents: line.unit_price_cents,
            })
            .collect();
        self.staged.push(StagedWrite::Items(items));
        Ok(())
    }

    async fn decrement_stock(
        &mut self,
        _business_id: BusinessId,
        lines: &[PricedLine],
    ) -> Result<(), StoreError> {
        for line in lines {
            self.require_lock(RowKey::Product(line.product_id))?;
            self.staged.push(StagedWrite::StockDecrement {
                product_id: line.product_id,
                qty: line.qty,
            });
        }
        Ok(())
    }

    async fn increase_balance(
        &mut self,
        business_id: BusinessId,
        amount_cents: i64,
    ) -> Result<(), StoreError> {
        self.require_lock(RowKey::CreditAccount(business_id))?;
        self.staged.push(StagedWrite::BalanceIncrease {
            business_id,
            amount_cents,
        });
        Ok(())
    }

    async fn append_ledger(&mut self, entry: &NewLedgerEntry) -> Result<(), StoreError> {
        self.staged.push(StagedWrite::Ledger(LedgerEntryRecord {
            id: entry.entry_id,
            business_id: entry.business_id,
            order_id: entry.order_id,
            entry_type: entry.entry_type,
            amount_cents: entry.amount_cents,
            created_at: entry.created_at,
        }));
        Ok(())
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        let staged = std::mem::take(&mut self.staged);
        {
            let mut state = self.shared.write()?;
            let touched = resolve(&state, &staged)?;
            apply(&mut state, staged, touched);
        }
        drop(self.guards);
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        drop(self);
        Ok(())
    }
}
