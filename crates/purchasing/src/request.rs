//! Purchase request validation and normalization.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use creditpost_core::{BusinessId, DomainError, DomainResult, IdempotencyKey, ProductId};

/// One requested line as submitted by the client.
///
/// There is deliberately no price field: prices are read from the locked
/// product row at posting time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseItem {
    pub product_id: ProductId,
    pub qty: i64,
}

impl PurchaseItem {
    pub fn new(product_id: ProductId, qty: i64) -> Self {
        Self { product_id, qty }
    }
}

/// A validated purchase request.
///
/// Lines referencing the same product are coalesced into a single quantity,
/// and products are kept in ascending id order. That order is the lock order
/// used by every store implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRequest {
    business_id: BusinessId,
    idempotency_key: IdempotencyKey,
    quantities: BTreeMap<ProductId, i64>,
}

impl PurchaseRequest {
    /// Validate and coalesce a raw item list.
    ///
    /// Fails with [`DomainError::Validation`] when the list is empty, a
    /// quantity is zero or negative, or a coalesced quantity overflows.
    pub fn new(
        business_id: BusinessId,
        idempotency_key: IdempotencyKey,
        items: impl IntoIterator<Item = PurchaseItem>,
    ) -> DomainResult<Self> {
        let mut quantities: BTreeMap<ProductId, i64> = BTreeMap::new();

        for (idx, item) in items.into_iter().enumerate() {
            if item.qty <= 0 {
                return Err(DomainError::validation(format!(
                    "items[{idx}].qty must be a positive integer"
                )));
            }

            let slot = quantities.entry(item.product_id).or_insert(0);
            *slot = slot.checked_add(item.qty).ok_or_else(|| {
                DomainError::validation(format!(
                    "combined qty for product {} is too large",
                    item.product_id
                ))
            })?;
        }

        if quantities.is_empty() {
            return Err(DomainError::validation("items must be a non-empty array"));
        }

        Ok(Self {
            business_id,
            idempotency_key,
            quantities,
        })
    }

    pub fn business_id(&self) -> BusinessId {
        self.business_id
    }

    pub fn idempotency_key(&self) -> IdempotencyKey {
        self.idempotency_key
    }

    /// Distinct product ids in ascending order.
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.quantities.keys().copied().collect()
    }

    pub fn quantity_of(&self, product_id: &ProductId) -> Option<i64> {
        self.quantities.get(product_id).copied()
    }

    /// `(product, coalesced qty)` pairs in ascending product order.
    pub fn lines(&self) -> impl Iterator<Item = (ProductId, i64)> + '_ {
        self.quantities.iter().map(|(id, qty)| (*id, *qty))
    }

    pub fn distinct_products(&self) -> usize {
        self.quantities.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn product(n: u128) -> ProductId {
        ProductId::from_uuid(Uuid::from_u128(n))
    }

    #[test]
    fn coalesces_duplicate_products() {
        let req = PurchaseRequest::new(
            BusinessId::new(),
            IdempotencyKey::new(),
            vec![
                PurchaseItem::new(product(7), 3),
                PurchaseItem::new(product(2), 1),
                PurchaseItem::new(product(7), 4),
            ],
        )
        .unwrap();

        assert_eq!(req.distinct_products(), 2);
        assert_eq!(req.quantity_of(&product(7)), Some(7));
        assert_eq!(req.product_ids(), vec![product(2), product(7)]);
    }

    #[test]
    fn rejects_empty_items() {
        let err = PurchaseRequest::new(BusinessId::new(), IdempotencyKey::new(), vec![]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("non-empty")));
    }

    #[test]
    fn rejects_non_positive_qty() {
        for qty in [0, -5] {
            let err = PurchaseRequest::new(
                BusinessId::new(),
                IdempotencyKey::new(),
                vec![PurchaseItem::new(product(1), 2), PurchaseItem::new(product(3), qty)],
            )
            .unwrap_err();
            assert!(matches!(err, DomainError::Validation(msg) if msg.starts_with("items[1]")));
        }
    }

    #[test]
    fn rejects_overflowing_sum() {
        let err = PurchaseRequest::new(
            BusinessId::new(),
            IdempotencyKey::new(),
            vec![PurchaseItem::new(product(1), i64::MAX), PurchaseItem::new(product(1), 1)],
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: coalescing preserves the total requested quantity per product
        /// and always yields strictly ascending product ids.
        #[test]
        fn coalescing_preserves_quantities(
            raw in prop::collection::vec((0u128..6, 1i64..1_000), 1..20)
        ) {
            let items: Vec<PurchaseItem> = raw
                .iter()
                .map(|(p, q)| PurchaseItem::new(product(*p), *q))
                .collect();
            let req = PurchaseRequest::new(BusinessId::new(), IdempotencyKey::new(), items).unwrap();

            for id in req.product_ids() {
                let expected: i64 = raw
                    .iter()
                    .filter(|(p, _)| product(*p) == id)
                    .map(|(_, q)| *q)
                    .sum();
                prop_assert_eq!(req.quantity_of(&id), Some(expected));
            }

            let ids = req.product_ids();
            prop_assert!(ids.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
