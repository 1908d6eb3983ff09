//! Catalog maintenance: businesses with their credit accounts, and products.
//!
//! These are the collaborators that own the rows the posting engine reads.
//! Product updates lock the row first, like the engine does, so an update
//! never interleaves with a purchase that has the product locked.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use creditpost_core::{BusinessId, DomainError, DomainResult, ProductId};

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("business not found: {0}")]
    BusinessNotFound(BusinessId),

    #[error("product {product_id} not found for business {business_id}")]
    ProductNotFound {
        product_id: ProductId,
        business_id: BusinessId,
    },

    #[error("sku {sku} already exists for business {business_id}")]
    DuplicateSku { business_id: BusinessId, sku: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CatalogError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CatalogError::BusinessNotFound(_) | CatalogError::ProductNotFound { .. }
        )
    }
}

fn non_empty(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} must be a non-empty string")));
    }
    Ok(trimmed.to_string())
}

fn non_negative(field: &str, value: i64) -> DomainResult<i64> {
    if value < 0 {
        return Err(DomainError::validation(format!("{field} must be a non-negative integer")));
    }
    Ok(value)
}

/// A business to register, together with its credit account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBusiness {
    name: String,
    credit_limit_cents: i64,
}

impl NewBusiness {
    pub fn new(name: &str, credit_limit_cents: i64) -> DomainResult<Self> {
        Ok(Self {
            name: non_empty("name", name)?,
            credit_limit_cents: non_negative("creditLimitCents", credit_limit_cents)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn credit_limit_cents(&self) -> i64 {
        self.credit_limit_cents
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    business_id: BusinessId,
    sku: String,
    name: String,
    stock: i64,
    price_cents: i64,
}

impl NewProduct {
    pub fn new(
        business_id: BusinessId,
        sku: &str,
        name: &str,
        stock: i64,
        price_cents: i64,
    ) -> DomainResult<Self> {
        Ok(Self {
            business_id,
            sku: non_empty("sku", sku)?,
            name: non_empty("name", name)?,
            stock: non_negative("stock", stock)?,
            price_cents: non_negative("priceCents", price_cents)?,
        })
    }

    pub fn business_id(&self) -> BusinessId {
        self.business_id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stock(&self) -> i64 {
        self.stock
    }

    pub fn price_cents(&self) -> i64 {
        self.price_cents
    }
}

/// Partial product update. At least one field is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductPatch {
    sku: Option<String>,
    name: Option<String>,
    stock: Option<i64>,
    price_cents: Option<i64>,
}

impl ProductPatch {
    pub fn new(
        sku: Option<&str>,
        name: Option<&str>,
        stock: Option<i64>,
        price_cents: Option<i64>,
    ) -> DomainResult<Self> {
        if sku.is_none() && name.is_none() && stock.is_none() && price_cents.is_none() {
            return Err(DomainError::validation("no fields to update"));
        }
        Ok(Self {
            sku: sku.map(|s| non_empty("sku", s)).transpose()?,
            name: name.map(|n| non_empty("name", n)).transpose()?,
            stock: stock.map(|s| non_negative("stock", s)).transpose()?,
            price_cents: price_cents.map(|p| non_negative("priceCents", p)).transpose()?,
        })
    }

    pub fn sku(&self) -> Option<&str> {
        self.sku.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn stock(&self) -> Option<i64> {
        self.stock
    }

    pub fn price_cents(&self) -> Option<i64> {
        self.price_cents
    }
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Create a business and its credit account (balance 0) atomically.
    async fn register_business(&self, business: &NewBusiness) -> Result<BusinessId, CatalogError>;

    async fn create_product(&self, product: &NewProduct) -> Result<ProductId, CatalogError>;

    /// Apply `patch` to a product of `business_id`, holding the product's row
    /// lock for the duration of the update.
    async fn update_product(
        &self,
        product_id: ProductId,
        business_id: BusinessId,
        patch: &ProductPatch,
    ) -> Result<(), CatalogError>;
}
