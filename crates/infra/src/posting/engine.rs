//! The order posting engine.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{Span, instrument};
use uuid::Uuid;

use creditpost_core::{BusinessId, OrderId};
use creditpost_purchasing::{
    LedgerEntryType, OrderStatus, PostOutcome, PurchaseRejection, PurchaseRequest, due_at,
    price_purchase,
};

use super::store::{NewLedgerEntry, NewOrder, PostingStore, PostingTx};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum PostingError {
    #[error("credit account not found for business {0}")]
    CreditAccountNotFound(BusinessId),

    #[error(transparent)]
    Rejected(#[from] PurchaseRejection),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PostingError {
    /// Missing credit account, or a product that does not exist for the
    /// business.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PostingError::CreditAccountNotFound(_)
                | PostingError::Rejected(PurchaseRejection::UnknownProducts { .. })
        )
    }
}

/// What a transaction did before commit.
enum Staged {
    /// The key was already used; nothing was written.
    Existing(OrderId),
    Posted { order_id: OrderId, total_cents: i64 },
}

/// Posts purchases against a [`PostingStore`].
///
/// The engine keeps no state of its own: all coordination between concurrent
/// callers happens through the store's row locks and its unique constraint on
/// (business, idempotency key).
#[derive(Debug, Clone)]
pub struct PostingEngine<S> {
    store: S,
}

impl<S: PostingStore> PostingEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn post_purchase(&self, request: &PurchaseRequest) -> Result<PostOutcome, PostingError> {
        self.post_purchase_at(request, Utc::now()).await
    }

    /// Post `request` as of `now`, which becomes the order's `created_at`
    /// and the base of its due date.
    #[instrument(
        skip(self, request),
        fields(
            business_id = %request.business_id(),
            idempotency_key = %request.idempotency_key(),
            order_id = tracing::field::Empty,
        ),
        err
    )]
    pub async fn post_purchase_at(
        &self,
        request: &PurchaseRequest,
        now: DateTime<Utc>,
    ) -> Result<PostOutcome, PostingError> {
        let mut tx = self.store.begin().await?;

        match stage(&mut tx, request, now).await {
            Ok(Staged::Existing(order_id)) => {
                tx.commit().await?;
                Span::current().record("order_id", tracing::field::display(order_id));
                tracing::info!("idempotent replay, order already posted");
                Ok(PostOutcome::AlreadyExisted(order_id))
            }
            Ok(Staged::Posted {
                order_id,
                total_cents,
            }) => match tx.commit().await {
                Ok(()) => {
                    Span::current().record("order_id", tracing::field::display(order_id));
                    tracing::info!(total_cents, "purchase posted");
                    Ok(PostOutcome::Created(order_id))
                }
                Err(StoreError::DuplicateOrder { .. }) => self.resolve_replay(request).await,
                Err(e) => Err(e.into()),
            },
            Err(PostingError::Store(StoreError::DuplicateOrder { .. })) => {
                rollback_quietly(tx).await;
                self.resolve_replay(request).await
            }
            Err(e) => {
                rollback_quietly(tx).await;
                Err(e)
            }
        }
    }

    /// A concurrent transaction committed the same key first. Our own
    /// transaction is gone; read the winner's order id from committed state.
    async fn resolve_replay(&self, request: &PurchaseRequest) -> Result<PostOutcome, PostingError> {
        let found = self
            .store
            .find_order_id(request.business_id(), request.idempotency_key())
            .await?;

        match found {
            Some(order_id) => {
                Span::current().record("order_id", tracing::field::display(order_id));
                tracing::info!("lost idempotency race, returning committed order");
                Ok(PostOutcome::AlreadyExisted(order_id))
            }
            None => Err(StoreError::Database(format!(
                "order for idempotency key {} conflicted but is not visible",
                request.idempotency_key()
            ))
            .into()),
        }
    }
}

async fn stage<T: PostingTx>(
    tx: &mut T,
    request: &PurchaseRequest,
    now: DateTime<Utc>,
) -> Result<Staged, PostingError> {
    let business_id = request.business_id();
    let key = request.idempotency_key();

    if let Some(order_id) = tx.find_order_id(business_id, key).await? {
        return Ok(Staged::Existing(order_id));
    }

    let credit = tx
        .lock_credit_account(business_id)
        .await?
        .ok_or(PostingError::CreditAccountNotFound(business_id))?;

    // Same-key requests serialize on the credit account lock; whoever waited
    // sees the winner's order here.
    if let Some(order_id) = tx.find_order_id(business_id, key).await? {
        return Ok(Staged::Existing(order_id));
    }

    let locked = tx.lock_products(business_id, &request.product_ids()).await?;
    let priced = price_purchase(request, &locked, &credit)?;

    let order_id = OrderId::new();
    tx.insert_order(&NewOrder {
        order_id,
        business_id,
        idempotency_key: key,
        status: OrderStatus::Posted,
        total_cents: priced.total_cents,
        paid_cents: 0,
        created_at: now,
        due_at: due_at(now),
    })
    .await?;

    tx.insert_items(business_id, order_id, &priced.lines).await?;
    tx.decrement_stock(business_id, &priced.lines).await?;
    tx.increase_balance(business_id, priced.total_cents).await?;
    tx.append_ledger(&NewLedgerEntry {
        entry_id: Uuid::now_v7(),
        business_id,
        order_id: Some(order_id),
        entry_type: LedgerEntryType::Charge,
        amount_cents: priced.total_cents,
        created_at: now,
    })
    .await?;

    Ok(Staged::Posted {
        order_id,
        total_cents: priced.total_cents,
    })
}

async fn rollback_quietly<T: PostingTx>(tx: T) {
    if let Err(e) = tx.rollback().await {
        tracing::warn!(error = %e, "rollback failed; transaction is discarded on drop");
    }
}
