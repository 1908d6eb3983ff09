use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use creditpost_core::BusinessId;
use creditpost_purchasing::OrderStatus;

use super::{OverdueBusiness, OverduePage, OverdueQuery, OverdueReports, OverdueSummary, default_cutoff};
use crate::memory::{InMemoryStore, OrderRecord, State};
use crate::store::StoreError;

#[derive(Debug, Clone, Copy)]
struct Totals {
    overdue_cents: i64,
    oldest_due_at: DateTime<Utc>,
    overdue_orders: i64,
}

fn is_overdue(order: &OrderRecord, cutoff: DateTime<Utc>, due_after: Option<DateTime<Utc>>) -> bool {
    order.status == OrderStatus::Posted
        && order.total_cents - order.paid_cents > 0
        && order.due_at < cutoff
        && due_after.is_none_or(|after| order.due_at >= after)
}

fn totals_by_business(
    state: &State,
    cutoff: DateTime<Utc>,
    due_after: Option<DateTime<Utc>>,
) -> HashMap<BusinessId, Totals> {
    let mut totals: HashMap<BusinessId, Totals> = HashMap::new();
    for order in state.orders.values().filter(|o| is_overdue(o, cutoff, due_after)) {
        let unpaid = order.total_cents - order.paid_cents;
        totals
            .entry(order.business_id)
            .and_modify(|t| {
                t.overdue_cents += unpaid;
                t.oldest_due_at = t.oldest_due_at.min(order.due_at);
                t.overdue_orders += 1;
            })
            .or_insert(Totals {
                overdue_cents: unpaid,
                oldest_due_at: order.due_at,
                overdue_orders: 1,
            });
    }
    totals
}

#[async_trait]
impl OverdueReports for InMemoryStore {
    async fn business_overdue(
        &self,
        business_id: BusinessId,
        now: DateTime<Utc>,
    ) -> Result<Option<OverdueSummary>, StoreError> {
        let state = self.shared.read()?;
        Ok(totals_by_business(&state, default_cutoff(now), None)
            .remove(&business_id)
            .map(|t| OverdueSummary {
                business_id,
                overdue_cents: t.overdue_cents,
                oldest_due_at: t.oldest_due_at,
                overdue_orders: t.overdue_orders,
            }))
    }

    async fn overdue_businesses(
        &self,
        query: &OverdueQuery,
        now: DateTime<Utc>,
    ) -> Result<OverduePage, StoreError> {
        let state = self.shared.read()?;

        let mut rows: Vec<OverdueBusiness> = totals_by_business(&state, query.cutoff(now), query.due_after())
            .into_iter()
            .filter_map(|(business_id, t)| {
                state.businesses.get(&business_id).map(|b| OverdueBusiness {
                    business_id,
                    name: b.name.clone(),
                    overdue_cents: t.overdue_cents,
                    oldest_due_at: t.oldest_due_at,
                    overdue_orders: t.overdue_orders,
                })
            })
            .collect();
        rows.sort_by(|a, b| {
            b.overdue_cents
                .cmp(&a.overdue_cents)
                .then_with(|| a.business_id.cmp(&b.business_id))
        });

        let total = rows.len() as i64;
        let items = rows
            .into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(query.page_size()).unwrap_or(0))
            .collect();

        Ok(OverduePage {
            items,
            page: query.page(),
            page_size: query.page_size(),
            total,
        })
    }
}
