//! Demo data set for local development.
//!
//! The same rows back both `seed()` (Postgres, via the `creditpost-seed`
//! binary) and `InMemoryStore::with_demo_data()`.

use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use creditpost_core::{BusinessId, ProductId};

use crate::store::{StoreError, map_sqlx_error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoBusiness {
    pub id: BusinessId,
    pub name: &'static str,
    pub credit_limit_cents: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoProduct {
    pub id: ProductId,
    pub business_id: BusinessId,
    pub sku: &'static str,
    pub name: &'static str,
    pub stock: i64,
    pub price_cents: i64,
}

pub const ACME_ID: BusinessId =
    BusinessId::from_uuid(Uuid::from_u128(0x7d8f8c6b_5d2f_4e0a_9c1a_1d4f2c7a3b11));
pub const GLOBEX_ID: BusinessId =
    BusinessId::from_uuid(Uuid::from_u128(0x2a5c7d1e_8f4b_4a2c_9b3d_7e1f2a3b4c5d));

pub const RED_ID: ProductId =
    ProductId::from_uuid(Uuid::from_u128(0x3e5a9b2c_1d4f_4b7a_8c9d_1e2f3a4b5c6d));
pub const BLUE_ID: ProductId =
    ProductId::from_uuid(Uuid::from_u128(0x6f7a8b9c_0d1e_4f2a_8b3c_4d5e6f7a8b9c));
pub const GREEN_ID: ProductId =
    ProductId::from_uuid(Uuid::from_u128(0x7a8b9c0d_1e2f_4a3b_8c4d_5e6f7a8b9c0d));

pub fn demo_businesses() -> [DemoBusiness; 2] {
    [
        DemoBusiness {
            id: ACME_ID,
            name: "Acme Supply Co",
            credit_limit_cents: 500_000,
        },
        DemoBusiness {
            id: GLOBEX_ID,
            name: "Globex Traders",
            credit_limit_cents: 300_000,
        },
    ]
}

pub fn demo_products() -> [DemoProduct; 3] {
    [
        DemoProduct {
            id: RED_ID,
            business_id: ACME_ID,
            sku: "SKU-RED-01",
            name: "Red Widget",
            stock: 100,
            price_cents: 1500,
        },
        DemoProduct {
            id: BLUE_ID,
            business_id: ACME_ID,
            sku: "SKU-BLU-02",
            name: "Blue Widget",
            stock: 50,
            price_cents: 2500,
        },
        DemoProduct {
            id: GREEN_ID,
            business_id: GLOBEX_ID,
            sku: "SKU-GRN-01",
            name: "Green Widget",
            stock: 80,
            price_cents: 1800,
        },
    ]
}

/// Apply the schema and the demo rows in one transaction.
///
/// Existing rows are left untouched (`on conflict do nothing`), so seeding is
/// safe to repeat.
#[instrument(skip(pool), err)]
pub async fn seed(pool: &PgPool) -> Result<(), StoreError> {
    super::schema::apply(pool).await?;

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| map_sqlx_error("begin_transaction", e))?;

    for b in demo_businesses() {
        sqlx::query("insert into businesses (id, name) values ($1, $2) on conflict do nothing")
            .bind(b.id.as_uuid())
            .bind(b.name)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("seed_business", e))?;

        sqlx::query(
            r#"
            insert into business_credit_accounts (business_id, credit_limit_cents, balance_cents)
            values ($1, $2, 0)
            on conflict do nothing
            "#,
        )
        .bind(b.id.as_uuid())
        .bind(b.credit_limit_cents)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("seed_credit_account", e))?;
    }

    for p in demo_products() {
        sqlx::query(
            r#"
            insert into products (id, business_id, sku, name, stock, price_cents)
            values ($1, $2, $3, $4, $5, $6)
            on conflict do nothing
            "#,
        )
        .bind(p.id.as_uuid())
        .bind(p.business_id.as_uuid())
        .bind(p.sku)
        .bind(p.name)
        .bind(p.stock)
        .bind(p.price_cents)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("seed_product", e))?;
    }

    tx.commit()
        .await
        .map_err(|e| map_sqlx_error("commit_transaction", e))?;

    tracing::info!("seed data applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_products_belong_to_demo_businesses() {
        let businesses = demo_businesses();
        for p in demo_products() {
            assert!(businesses.iter().any(|b| b.id == p.business_id), "{} has no owner", p.sku);
        }
    }

    #[test]
    fn demo_ids_match_published_fixtures() {
        assert_eq!(
            demo_businesses()[0].id.to_string(),
            "7d8f8c6b-5d2f-4e0a-9c1a-1d4f2c7a3b11"
        );
        assert_eq!(
            demo_products()[0].id.to_string(),
            "3e5a9b2c-1d4f-4b7a-8c9d-1e2f3a4b5c6d"
        );
    }
}
