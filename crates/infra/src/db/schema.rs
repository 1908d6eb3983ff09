//! Schema bootstrap.
//!
//! Every statement is idempotent so the bootstrap can run against an existing
//! database. Monetary amounts, stock and quantities are `bigint`.

use sqlx::PgPool;
use tracing::instrument;

use crate::store::{StoreError, map_sqlx_error};

/// DDL applied, in order, inside a single transaction.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    r#"create extension if not exists "pgcrypto""#,
    r#"
    create table if not exists businesses (
        id uuid primary key default gen_random_uuid(),
        name text not null,
        created_at timestamptz not null default now()
    )
    "#,
    r#"
    create table if not exists products (
        id uuid primary key default gen_random_uuid(),
        business_id uuid not null references businesses(id) on delete cascade,
        sku text not null,
        name text not null,
        stock bigint not null check (stock >= 0),
        price_cents bigint not null check (price_cents >= 0),
        created_at timestamptz not null default now(),
        constraint products_business_sku unique (business_id, sku)
    )
    "#,
    // balance <= limit is also checked by the posting engine under lock; the
    // constraint covers writers outside the engine.
    r#"
    create table if not exists business_credit_accounts (
        business_id uuid primary key references businesses(id) on delete cascade,
        credit_limit_cents bigint not null check (credit_limit_cents >= 0),
        balance_cents bigint not null default 0 check (balance_cents >= 0),
        created_at timestamptz not null default now(),
        constraint credit_accounts_balance_within_limit check (balance_cents <= credit_limit_cents)
    )
    "#,
    r#"
    create table if not exists orders (
        id uuid primary key default gen_random_uuid(),
        business_id uuid not null references businesses(id) on delete cascade,
        idempotency_key uuid not null,
        status text not null default 'posted',
        total_cents bigint not null check (total_cents >= 0),
        paid_cents bigint not null default 0 check (paid_cents >= 0),
        created_at timestamptz not null default now(),
        due_at timestamptz not null default (now() + interval '30 days'),
        constraint orders_business_idempotency_key unique (business_id, idempotency_key)
    )
    "#,
    r#"
    create table if not exists order_items (
        id uuid primary key default gen_random_uuid(),
        business_id uuid not null references businesses(id) on delete cascade,
        order_id uuid not null references orders(id) on delete cascade,
        product_id uuid not null references products(id) on delete cascade,
        qty bigint not null check (qty > 0),
        unit_price_cents bigint not null check (unit_price_cents >= 0),
        line_total_cents bigint generated always as (qty * unit_price_cents) stored
    )
    "#,
    r#"
    create table if not exists credit_ledger (
        id uuid primary key default gen_random_uuid(),
        business_id uuid not null references businesses(id) on delete cascade,
        order_id uuid references orders(id) on delete set null,
        entry_type text not null,
        amount_cents bigint not null,
        created_at timestamptz not null default now()
    )
    "#,
    "create index if not exists idx_products_business on products(business_id)",
    "create index if not exists idx_orders_business_created on orders(business_id, created_at)",
    "create index if not exists idx_orders_business_due_at on orders(business_id, due_at)",
    "create index if not exists idx_orders_overdue on orders(due_at) where status = 'posted'",
    "create index if not exists idx_order_items_business_order on order_items(business_id, order_id)",
    "create index if not exists idx_credit_ledger_business_created on credit_ledger(business_id, created_at)",
];

/// Apply [`SCHEMA_STATEMENTS`] atomically.
#[instrument(skip(pool), err)]
pub async fn apply(pool: &PgPool) -> Result<(), StoreError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| map_sqlx_error("begin_transaction", e))?;

    for stmt in SCHEMA_STATEMENTS {
        if let Err(e) = sqlx::query(stmt).execute(&mut *tx).await {
            let err = map_sqlx_error("apply_schema", e);
            if let Err(rb) = tx.rollback().await {
                tracing::warn!("schema rollback failed: {rb}");
            }
            return Err(err);
        }
    }

    tx.commit()
        .await
        .map_err(|e| map_sqlx_error("commit_transaction", e))?;

    tracing::info!(statements = SCHEMA_STATEMENTS.len(), "schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statements_are_idempotent() {
        for stmt in SCHEMA_STATEMENTS {
            let lowered = stmt.to_lowercase();
            assert!(
                lowered.contains("if not exists"),
                "statement is not idempotent: {stmt}"
            );
        }
    }

    #[test]
    fn named_constraints_match_error_mapping() {
        let ddl = SCHEMA_STATEMENTS.join("\n");
        assert!(ddl.contains(crate::store::ORDERS_IDEMPOTENCY_CONSTRAINT));
        assert!(ddl.contains(crate::store::PRODUCTS_SKU_CONSTRAINT));
    }
}
