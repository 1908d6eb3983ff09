//! Store selection and the operations the handlers call.
//!
//! `USE_PERSISTENT_STORES=true` selects Postgres; otherwise everything runs
//! against an in-memory store pre-loaded with the demo data set.

use chrono::{DateTime, Utc};
use thiserror::Error;

use creditpost_core::{BusinessId, ProductId};
use creditpost_infra::catalog::{CatalogError, CatalogStore, NewBusiness, NewProduct, ProductPatch};
use creditpost_infra::config::{ConfigError, DatabaseConfig, ServerConfig};
use creditpost_infra::reports::{OverduePage, OverdueQuery, OverdueReports, OverdueSummary};
use creditpost_infra::{InMemoryStore, PgStore, PostingEngine, PostingError, StoreError};
use creditpost_purchasing::{PostOutcome, PurchaseRequest};

#[derive(Debug, Error)]
pub enum ServiceInitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub enum AppServices {
    InMemory {
        store: InMemoryStore,
        engine: PostingEngine<InMemoryStore>,
    },
    Persistent {
        store: PgStore,
        engine: PostingEngine<PgStore>,
    },
}

impl AppServices {
    pub fn in_memory(store: InMemoryStore) -> Self {
        AppServices::InMemory {
            engine: PostingEngine::new(store.clone()),
            store,
        }
    }

    pub fn persistent(store: PgStore) -> Self {
        AppServices::Persistent {
            engine: PostingEngine::new(store.clone()),
            store,
        }
    }

    pub async fn post_purchase(&self, request: &PurchaseRequest) -> Result<PostOutcome, PostingError> {
        match self {
            AppServices::InMemory { engine, .. } => engine.post_purchase(request).await,
            AppServices::Persistent { engine, .. } => engine.post_purchase(request).await,
        }
    }

    fn catalog(&self) -> &dyn CatalogStore {
        match self {
            AppServices::InMemory { store, .. } => store,
            AppServices::Persistent { store, .. } => store,
        }
    }

    fn reports(&self) -> &dyn OverdueReports {
        match self {
            AppServices::InMemory { store, .. } => store,
            AppServices::Persistent { store, .. } => store,
        }
    }

    pub async fn register_business(&self, business: &NewBusiness) -> Result<BusinessId, CatalogError> {
        self.catalog().register_business(business).await
    }

    pub async fn create_product(&self, product: &NewProduct) -> Result<ProductId, CatalogError> {
        self.catalog().create_product(product).await
    }

    pub async fn update_product(
        &self,
        product_id: ProductId,
        business_id: BusinessId,
        patch: &ProductPatch,
    ) -> Result<(), CatalogError> {
        self.catalog().update_product(product_id, business_id, patch).await
    }

    pub async fn business_overdue(
        &self,
        business_id: BusinessId,
        now: DateTime<Utc>,
    ) -> Result<Option<OverdueSummary>, StoreError> {
        self.reports().business_overdue(business_id, now).await
    }

    pub async fn overdue_businesses(
        &self,
        query: &OverdueQuery,
        now: DateTime<Utc>,
    ) -> Result<OverduePage, StoreError> {
        self.reports().overdue_businesses(query, now).await
    }
}

pub async fn build_services(config: &ServerConfig) -> Result<AppServices, ServiceInitError> {
    if config.use_persistent_stores {
        return build_persistent_services().await;
    }

    tracing::info!("using in-memory store with demo data");
    Ok(AppServices::in_memory(InMemoryStore::with_demo_data()))
}

async fn build_persistent_services() -> Result<AppServices, ServiceInitError> {
    let db = DatabaseConfig::from_env()?;
    let store = db.open_store().await?;
    store.ensure_schema().await?;

    tracing::info!("using postgres store");
    Ok(AppServices::persistent(store))
}
