use async_trait::async_trait;
use chrono::Utc;

use creditpost_core::{BusinessId, ProductId};

use super::{CatalogError, CatalogStore, NewBusiness, NewProduct, ProductPatch};
use crate::memory::{BusinessRecord, CreditAccountRecord, InMemoryStore, ProductRecord, RowKey, State};

fn sku_taken(state: &State, business_id: BusinessId, sku: &str, except: Option<ProductId>) -> bool {
    state
        .products
        .values()
        .any(|p| p.business_id == business_id && p.sku == sku && Some(p.id) != except)
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn register_business(&self, business: &NewBusiness) -> Result<BusinessId, CatalogError> {
        let business_id = BusinessId::new();
        let now = Utc::now();

        let mut state = self.shared.write()?;
        state.businesses.insert(
            business_id,
            BusinessRecord {
                id: business_id,
                name: business.name().to_string(),
                created_at: now,
            },
        );
        state.credit_accounts.insert(
            business_id,
            CreditAccountRecord {
                business_id,
                credit_limit_cents: business.credit_limit_cents(),
                balance_cents: 0,
            },
        );

        tracing::info!(business_id = %business_id, "business registered");
        Ok(business_id)
    }

    async fn create_product(&self, product: &NewProduct) -> Result<ProductId, CatalogError> {
        let business_id = product.business_id();
        let product_id = ProductId::new();

        let mut state = self.shared.write()?;
        if !state.businesses.contains_key(&business_id) {
            return Err(CatalogError::BusinessNotFound(business_id));
        }
        if sku_taken(&state, business_id, product.sku(), None) {
            return Err(CatalogError::DuplicateSku {
                business_id,
                sku: product.sku().to_string(),
            });
        }

        state.products.insert(
            product_id,
            ProductRecord {
                id: product_id,
                business_id,
                sku: product.sku().to_string(),
                name: product.name().to_string(),
                stock: product.stock(),
                price_cents: product.price_cents(),
                created_at: Utc::now(),
            },
        );

        tracing::info!(product_id = %product_id, "product created");
        Ok(product_id)
    }

    async fn update_product(
        &self,
        product_id: ProductId,
        business_id: BusinessId,
        patch: &ProductPatch,
    ) -> Result<(), CatalogError> {
        let not_found = || CatalogError::ProductNotFound {
            product_id,
            business_id,
        };

        let owned = self
            .shared
            .read()?
            .products
            .get(&product_id)
            .is_some_and(|p| p.business_id == business_id);
        if !owned {
            return Err(not_found());
        }

        let _guard = self.shared.lock_row(RowKey::Product(product_id)).await?;

        let mut state = self.shared.write()?;
        if let Some(sku) = patch.sku() {
            if sku_taken(&state, business_id, sku, Some(product_id)) {
                return Err(CatalogError::DuplicateSku {
                    business_id,
                    sku: sku.to_string(),
                });
            }
        }

        let product = state.products.get_mut(&product_id).ok_or_else(not_found)?;
        if let Some(sku) = patch.sku() {
            product.sku = sku.to_string();
        }
        if let Some(name) = patch.name() {
            product.name = name.to_string();
        }
        if let Some(stock) = patch.stock() {
            product.stock = stock;
        }
        if let Some(price_cents) = patch.price_cents() {
            product.price_cents = price_cents;
        }
        Ok(())
    }
}
