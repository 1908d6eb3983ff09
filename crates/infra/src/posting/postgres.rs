//! Postgres implementation of the posting store.
//!
//! Row locks are `SELECT ... FOR UPDATE`. The product query orders by `id`,
//! and Postgres locks rows as the sorted result is produced, so locks are
//! taken in ascending id order.

use async_trait::async_trait;
use sqlx::{Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use creditpost_core::{BusinessId, IdempotencyKey, OrderId, ProductId};
use creditpost_purchasing::{CreditSnapshot, LockedProduct, PricedLine};

use super::store::{NewLedgerEntry, NewOrder, PostingStore, PostingTx};
use crate::db::PgStore;
use crate::store::{ORDERS_IDEMPOTENCY_CONSTRAINT, StoreError, map_sqlx_error};

/// Open Postgres transaction (rolled back on drop if not committed).
pub struct PgPostingTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl PostingStore for PgStore {
    type Tx = PgPostingTx;

    async fn begin(&self) -> Result<PgPostingTx, StoreError> {
        self.ensure_schema().await?;
        let tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(PgPostingTx { tx })
    }

    async fn find_order_id(
        &self,
        business_id: BusinessId,
        idempotency_key: IdempotencyKey,
    ) -> Result<Option<OrderId>, StoreError> {
        self.ensure_schema().await?;
        let id: Option<Uuid> = sqlx::query_scalar(
            "select id from orders where business_id = $1 and idempotency_key = $2",
        )
        .bind(business_id.as_uuid())
        .bind(idempotency_key.as_uuid())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_sqlx_error("find_order", e))?;

        Ok(id.map(OrderId::from_uuid))
    }
}

#[async_trait]
impl PostingTx for PgPostingTx {
    async fn find_order_id(
        &mut self,
        business_id: BusinessId,
        idempotency_key: IdempotencyKey,
    ) -> Result<Option<OrderId>, StoreError> {
        let id: Option<Uuid> = sqlx::query_scalar(
            "select id from orders where business_id = $1 and idempotency_key = $2",
        )
        .bind(business_id.as_uuid())
        .bind(idempotency_key.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_order", e))?;

        Ok(id.map(OrderId::from_uuid))
    }

    #[instrument(skip(self), fields(business_id = %business_id), err)]
    async fn lock_credit_account(
        &mut self,
        business_id: BusinessId,
    ) -> Result<Option<CreditSnapshot>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT credit_limit_cents, balance_cents
            FROM business_credit_accounts
            WHERE business_id = $1
            FOR UPDATE
            "#,
        )
        .bind(business_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_credit_account", e))?;

        row.map(|r| {
            Ok(CreditSnapshot {
                credit_limit_cents: r
                    .try_get("credit_limit_cents")
                    .map_err(|e| map_sqlx_error("read_credit_account", e))?,
                balance_cents: r
                    .try_get("balance_cents")
                    .map_err(|e| map_sqlx_error("read_credit_account", e))?,
            })
        })
        .transpose()
    }

    #[instrument(skip(self, product_ids), fields(business_id = %business_id, products = product_ids.len()), err)]
    async fn lock_products(
        &mut self,
        business_id: BusinessId,
        product_ids: &[ProductId],
    ) -> Result<Vec<LockedProduct>, StoreError> {
        let ids: Vec<Uuid> = product_ids.iter().map(|id| *id.as_uuid()).collect();

        let rows = sqlx::query(
            r#"
            SELECT id, stock, price_cents
            FROM products
            WHERE business_id = $1 AND id = ANY($2::uuid[])
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(business_id.as_uuid())
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_products", e))?;

        let mut locked = Vec::with_capacity(rows.len());
        for r in rows {
            let id: Uuid = r.try_get("id").map_err(|e| map_sqlx_error("read_product", e))?;
            locked.push(LockedProduct {
                product_id: ProductId::from_uuid(id),
                stock: r.try_get("stock").map_err(|e| map_sqlx_error("read_product", e))?,
                price_cents: r
                    .try_get("price_cents")
                    .map_err(|e| map_sqlx_error("read_product", e))?,
            });
        }
        Ok(locked)
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id,
                business_id,
                idempotency_key,
                status,
                total_cents,
                paid_cents,
                created_at,
                due_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order.order_id.as_uuid())
        .bind(order.business_id.as_uuid())
        .bind(order.idempotency_key.as_uuid())
        .bind(order.status.as_str())
        .bind(order.total_cents)
        .bind(order.paid_cents)
        .bind(order.created_at)
        .bind(order.due_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            let err = map_sqlx_error("insert_order", e);
            if err.violated_unique_constraint() == Some(ORDERS_IDEMPOTENCY_CONSTRAINT) {
                StoreError::DuplicateOrder {
                    business_id: order.business_id,
                    idempotency_key: order.idempotency_key,
                }
            } else {
                err
            }
        })?;

        Ok(())
    }

    async fn insert_items(
        &mut self,
        business_id: BusinessId,
        order_id: OrderId,
        lines: &[PricedLine],
    ) -> Result<(), StoreError> {
        let product_ids: Vec<Uuid> = lines.iter().map(|l| *l.product_id.as_uuid()).collect();
        let qtys: Vec<i64> = lines.iter().map(|l| l.qty).collect();
        let prices: Vec<i64> = lines.iter().map(|l| l.unit_price_cents).collect();

        sqlx::query(
            r#"
            INSERT INTO order_items (business_id, order_id, product_id, qty, unit_price_cents)
            SELECT $1, $2, v.product_id, v.qty, v.unit_price_cents
            FROM UNNEST($3::uuid[], $4::bigint[], $5::bigint[]) AS v(product_id, qty, unit_price_cents)
            "#,
        )
        .bind(business_id.as_uuid())
        .bind(order_id.as_uuid())
        .bind(&product_ids)
        .bind(&qtys)
        .bind(&prices)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order_items", e))?;

        Ok(())
    }

    async fn decrement_stock(
        &mut self,
        business_id: BusinessId,
        lines: &[PricedLine],
    ) -> Result<(), StoreError> {
        let product_ids: Vec<Uuid> = lines.iter().map(|l| *l.product_id.as_uuid()).collect();
        let qtys: Vec<i64> = lines.iter().map(|l| l.qty).collect();

        let result = sqlx::query(
            r#"
            UPDATE products p
            SET stock = p.stock - v.qty
            FROM UNNEST($2::uuid[], $3::bigint[]) AS v(product_id, qty)
            WHERE p.id = v.product_id AND p.business_id = $1
            "#,
        )
        .bind(business_id.as_uuid())
        .bind(&product_ids)
        .bind(&qtys)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("decrement_stock", e))?;

        if result.rows_affected() != lines.len() as u64 {
            return Err(StoreError::Database(format!(
                "stock update touched {} rows, expected {}",
                result.rows_affected(),
                lines.len()
            )));
        }
        Ok(())
    }

    async fn increase_balance(
        &mut self,
        business_id: BusinessId,
        amount_cents: i64,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE business_credit_accounts SET balance_cents = balance_cents + $1 WHERE business_id = $2",
        )
        .bind(amount_cents)
        .bind(business_id.as_uuid())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("increase_balance", e))?;

        if result.rows_affected() != 1 {
            return Err(StoreError::Database(format!(
                "balance update touched {} rows, expected 1",
                result.rows_affected()
            )));
        }
        Ok(())
    }

    async fn append_ledger(&mut self, entry: &NewLedgerEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO credit_ledger (id, business_id, order_id, entry_type, amount_cents, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.entry_id)
        .bind(entry.business_id.as_uuid())
        .bind(entry.order_id.map(Uuid::from))
        .bind(entry.entry_type.as_str())
        .bind(entry.amount_cents)
        .bind(entry.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("append_ledger", e))?;

        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}
