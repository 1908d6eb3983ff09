use async_trait::async_trait;
use tracing::instrument;
use uuid::Uuid;

use creditpost_core::{BusinessId, ProductId};

use super::{CatalogError, CatalogStore, NewBusiness, NewProduct, ProductPatch};
use crate::db::PgStore;
use crate::store::{PRODUCTS_SKU_CONSTRAINT, StoreError, map_sqlx_error};

fn sku_conflict(err: StoreError, business_id: BusinessId, sku: &str) -> CatalogError {
    if err.violated_unique_constraint() == Some(PRODUCTS_SKU_CONSTRAINT) {
        return CatalogError::DuplicateSku {
            business_id,
            sku: sku.to_string(),
        };
    }
    err.into()
}

#[async_trait]
impl CatalogStore for PgStore {
    #[instrument(skip(self, business), fields(name = business.name()), err)]
    async fn register_business(&self, business: &NewBusiness) -> Result<BusinessId, CatalogError> {
        self.ensure_schema().await?;
        let business_id = BusinessId::new();

        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("INSERT INTO businesses (id, name) VALUES ($1, $2)")
            .bind(business_id.as_uuid())
            .bind(business.name())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_business", e))?;

        sqlx::query(
            r#"
            INSERT INTO business_credit_accounts (business_id, credit_limit_cents, balance_cents)
            VALUES ($1, $2, 0)
            "#,
        )
        .bind(business_id.as_uuid())
        .bind(business.credit_limit_cents())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_credit_account", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        tracing::info!(business_id = %business_id, "business registered");
        Ok(business_id)
    }

    #[instrument(skip(self, product), fields(business_id = %product.business_id(), sku = product.sku()), err)]
    async fn create_product(&self, product: &NewProduct) -> Result<ProductId, CatalogError> {
        self.ensure_schema().await?;
        let product_id = ProductId::new();
        let business_id = product.business_id();

        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let exists: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM businesses WHERE id = $1 FOR KEY SHARE")
                .bind(business_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("find_business", e))?;
        if exists.is_none() {
            tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(CatalogError::BusinessNotFound(business_id));
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO products (id, business_id, sku, name, stock, price_cents)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(business_id.as_uuid())
        .bind(product.sku())
        .bind(product.name())
        .bind(product.stock())
        .bind(product.price_cents())
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(sku_conflict(
                map_sqlx_error("insert_product", e),
                business_id,
                product.sku(),
            ));
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        tracing::info!(product_id = %product_id, "product created");
        Ok(product_id)
    }

    #[instrument(skip(self, patch), fields(product_id = %product_id, business_id = %business_id), err)]
    async fn update_product(
        &self,
        product_id: ProductId,
        business_id: BusinessId,
        patch: &ProductPatch,
    ) -> Result<(), CatalogError> {
        self.ensure_schema().await?;

        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let locked: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM products WHERE id = $1 AND business_id = $2 FOR UPDATE",
        )
        .bind(product_id.as_uuid())
        .bind(business_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_product", e))?;

        if locked.is_none() {
            tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(CatalogError::ProductNotFound {
                product_id,
                business_id,
            });
        }

        // Absent fields keep their current value.
        let updated = sqlx::query(
            r#"
            UPDATE products
            SET sku = COALESCE($3, sku),
                name = COALESCE($4, name),
                stock = COALESCE($5, stock),
                price_cents = COALESCE($6, price_cents)
            WHERE id = $1 AND business_id = $2
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(business_id.as_uuid())
        .bind(patch.sku())
        .bind(patch.name())
        .bind(patch.stock())
        .bind(patch.price_cents())
        .execute(&mut *tx)
        .await;

        if let Err(e) = updated {
            tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(sku_conflict(
                map_sqlx_error("update_product", e),
                business_id,
                patch.sku().unwrap_or_default(),
            ));
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(())
    }
}
