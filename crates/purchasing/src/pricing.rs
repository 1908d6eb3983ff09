//! Server-side pricing and the stock/credit checks.
//!
//! Everything here operates on snapshots read from rows that the caller has
//! already locked; nothing submitted by the client carries a price.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use creditpost_core::ProductId;

use crate::request::PurchaseRequest;

/// Product row as read under an exclusive lock.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedProduct {
    pub product_id: ProductId,
    pub stock: i64,
    pub price_cents: i64,
}

/// Credit account row as read under an exclusive lock.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditSnapshot {
    pub credit_limit_cents: i64,
    pub balance_cents: i64,
}

/// One priced line, carrying the unit price captured at posting time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub qty: i64,
    pub unit_price_cents: i64,
}

impl PricedLine {
    pub fn line_total_cents(&self) -> i64 {
        self.qty * self.unit_price_cents
    }
}

/// Result of a successful pricing pass: lines in lock order plus the total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedPurchase {
    pub lines: Vec<PricedLine>,
    pub total_cents: i64,
}

/// Business-rule rejection of a purchase.
///
/// Each variant carries enough detail for the caller to tell which rule
/// failed. None of them is ever partially applied.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PurchaseRejection {
    /// Some requested products do not exist or belong to another business.
    #[error("invalid product in items: {}", format_ids(.missing))]
    UnknownProducts { missing: Vec<ProductId> },

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    #[error(
        "credit limit exceeded: balance {balance_cents} + total {total_cents} > limit {credit_limit_cents}"
    )]
    CreditLimitExceeded {
        credit_limit_cents: i64,
        balance_cents: i64,
        total_cents: i64,
    },

    /// A line total or the order total does not fit in 64 bits.
    #[error("amount overflow while pricing product {0}")]
    AmountOverflow(ProductId),
}

fn format_ids(ids: &[ProductId]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Price a request against locked rows and run the existence, stock and
/// credit checks, in that order.
///
/// `locked` may come back in any order; lines in the result follow the
/// request's ascending product order.
pub fn price_purchase(
    request: &PurchaseRequest,
    locked: &[LockedProduct],
    credit: &CreditSnapshot,
) -> Result<PricedPurchase, PurchaseRejection> {
    let by_id: HashMap<ProductId, &LockedProduct> =
        locked.iter().map(|p| (p.product_id, p)).collect();

    let missing: Vec<ProductId> = request
        .product_ids()
        .into_iter()
        .filter(|id| !by_id.contains_key(id))
        .collect();
    if !missing.is_empty() || by_id.len() != request.distinct_products() {
        return Err(PurchaseRejection::UnknownProducts { missing });
    }

    let mut lines = Vec::with_capacity(request.distinct_products());
    let mut total_cents: i64 = 0;

    for (product_id, qty) in request.lines() {
        let row = by_id[&product_id];

        if row.stock < qty {
            return Err(PurchaseRejection::InsufficientStock {
                product_id,
                requested: qty,
                available: row.stock,
            });
        }

        let line_total = qty
            .checked_mul(row.price_cents)
            .ok_or(PurchaseRejection::AmountOverflow(product_id))?;
        total_cents = total_cents
            .checked_add(line_total)
            .ok_or(PurchaseRejection::AmountOverflow(product_id))?;

        lines.push(PricedLine {
            product_id,
            qty,
            unit_price_cents: row.price_cents,
        });
    }

    let exceeds = match credit.balance_cents.checked_add(total_cents) {
        Some(new_balance) => new_balance > credit.credit_limit_cents,
        None => true,
    };
    if exceeds {
        return Err(PurchaseRejection::CreditLimitExceeded {
            credit_limit_cents: credit.credit_limit_cents,
            balance_cents: credit.balance_cents,
            total_cents,
        });
    }

    Ok(PricedPurchase { lines, total_cents })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::PurchaseItem;
    use creditpost_core::{BusinessId, IdempotencyKey};
    use proptest::prelude::*;
    use uuid::Uuid;

    fn product(n: u128) -> ProductId {
        ProductId::from_uuid(Uuid::from_u128(n))
    }

    fn request(items: &[(u128, i64)]) -> PurchaseRequest {
        PurchaseRequest::new(
            BusinessId::new(),
            IdempotencyKey::new(),
            items.iter().map(|(p, q)| PurchaseItem::new(product(*p), *q)),
        )
        .unwrap()
    }

    fn locked(n: u128, stock: i64, price_cents: i64) -> LockedProduct {
        LockedProduct {
            product_id: product(n),
            stock,
            price_cents,
        }
    }

    fn credit(limit: i64, balance: i64) -> CreditSnapshot {
        CreditSnapshot {
            credit_limit_cents: limit,
            balance_cents: balance,
        }
    }

    #[test]
    fn prices_the_worked_example() {
        let priced = price_purchase(&request(&[(1, 10)]), &[locked(1, 100, 1500)], &credit(500_000, 0)).unwrap();

        assert_eq!(priced.total_cents, 15_000);
        assert_eq!(priced.lines.len(), 1);
        assert_eq!(priced.lines[0].unit_price_cents, 1500);
        assert_eq!(priced.lines[0].line_total_cents(), 15_000);
    }

    #[test]
    fn lines_follow_request_order_regardless_of_row_order() {
        let priced = price_purchase(
            &request(&[(9, 1), (3, 2)]),
            &[locked(9, 5, 100), locked(3, 5, 10)],
            &credit(1_000, 0),
        )
        .unwrap();

        let ids: Vec<_> = priced.lines.iter().map(|l| l.product_id).collect();
        assert_eq!(ids, vec![product(3), product(9)]);
        assert_eq!(priced.total_cents, 120);
    }

    #[test]
    fn reports_missing_products() {
        let err = price_purchase(&request(&[(1, 1), (2, 1)]), &[locked(1, 10, 10)], &credit(1_000, 0)).unwrap_err();
        assert_eq!(
            err,
            PurchaseRejection::UnknownProducts {
                missing: vec![product(2)]
            }
        );
    }

    #[test]
    fn rejects_insufficient_stock_with_detail() {
        let err = price_purchase(&request(&[(1, 11)]), &[locked(1, 10, 10)], &credit(1_000, 0)).unwrap_err();
        assert_eq!(
            err,
            PurchaseRejection::InsufficientStock {
                product_id: product(1),
                requested: 11,
                available: 10,
            }
        );
    }

    #[test]
    fn credit_limit_is_inclusive() {
        assert!(price_purchase(&request(&[(1, 10)]), &[locked(1, 10, 10)], &credit(150, 50)).is_ok());

        let err = price_purchase(&request(&[(1, 10)]), &[locked(1, 10, 10)], &credit(150, 51)).unwrap_err();
        assert_eq!(
            err,
            PurchaseRejection::CreditLimitExceeded {
                credit_limit_cents: 150,
                balance_cents: 51,
                total_cents: 100,
            }
        );
    }

    #[test]
    fn stock_is_checked_before_credit() {
        let err = price_purchase(&request(&[(1, 50)]), &[locked(1, 10, 10)], &credit(0, 0)).unwrap_err();
        assert!(matches!(err, PurchaseRejection::InsufficientStock { .. }));
    }

    #[test]
    fn overflow_is_a_rejection() {
        let err = price_purchase(&request(&[(1, 2)]), &[locked(1, 10, i64::MAX)], &credit(i64::MAX, 0)).unwrap_err();
        assert_eq!(err, PurchaseRejection::AmountOverflow(product(1)));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: the total is exactly the sum of qty × locked price, and a
        /// priced purchase never pushes the balance past the limit.
        #[test]
        fn total_is_sum_of_line_totals(
            lines in prop::collection::vec((1i64..100, 0i64..10_000), 1..8),
            balance in 0i64..1_000_000,
        ) {
            let items: Vec<(u128, i64)> = lines
                .iter()
                .enumerate()
                .map(|(i, (qty, _))| (i as u128 + 1, *qty))
                .collect();
            let rows: Vec<LockedProduct> = lines
                .iter()
                .enumerate()
                .map(|(i, (_, price))| locked(i as u128 + 1, 1_000, *price))
                .collect();
            let snapshot = credit(10_000_000, balance);

            let expected: i64 = lines.iter().map(|(q, p)| q * p).sum();
            match price_purchase(&request(&items), &rows, &snapshot) {
                Ok(priced) => {
                    prop_assert_eq!(priced.total_cents, expected);
                    prop_assert!(balance + priced.total_cents <= snapshot.credit_limit_cents);
                }
                Err(PurchaseRejection::CreditLimitExceeded { total_cents, .. }) => {
                    prop_assert_eq!(total_cents, expected);
                    prop_assert!(balance + expected > snapshot.credit_limit_cents);
                }
                Err(other) => prop_assert!(false, "unexpected rejection: {other}"),
            }
        }
    }
}
