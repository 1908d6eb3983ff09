use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;
use tracing::instrument;
use uuid::Uuid;

use creditpost_core::BusinessId;

use super::{OverdueBusiness, OverduePage, OverdueQuery, OverdueReports, OverdueSummary, default_cutoff};
use crate::db::PgStore;
use crate::store::{StoreError, map_sqlx_error};

fn read_business(row: &PgRow) -> Result<OverdueBusiness, sqlx::Error> {
    let business_id: Uuid = row.try_get("business_id")?;
    Ok(OverdueBusiness {
        business_id: BusinessId::from_uuid(business_id),
        name: row.try_get("name")?,
        overdue_cents: row.try_get("overdue_cents")?,
        oldest_due_at: row.try_get("oldest_due_at")?,
        overdue_orders: row.try_get("overdue_orders")?,
    })
}

#[async_trait]
impl OverdueReports for PgStore {
    #[instrument(skip(self), fields(business_id = %business_id), err)]
    async fn business_overdue(
        &self,
        business_id: BusinessId,
        now: DateTime<Utc>,
    ) -> Result<Option<OverdueSummary>, StoreError> {
        self.ensure_schema().await?;

        let row = sqlx::query(
            r#"
            SELECT
                business_id,
                SUM(total_cents - paid_cents)::bigint AS overdue_cents,
                MIN(due_at) AS oldest_due_at,
                COUNT(*) AS overdue_orders
            FROM orders
            WHERE business_id = $1
                AND status = 'posted'
                AND (total_cents - paid_cents) > 0
                AND due_at < $2
            GROUP BY business_id
            "#,
        )
        .bind(business_id.as_uuid())
        .bind(default_cutoff(now))
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_sqlx_error("business_overdue", e))?;

        row.map(|r| {
            Ok(OverdueSummary {
                business_id,
                overdue_cents: r.try_get("overdue_cents")?,
                oldest_due_at: r.try_get("oldest_due_at")?,
                overdue_orders: r.try_get("overdue_orders")?,
            })
        })
        .transpose()
        .map_err(|e| map_sqlx_error("read_business_overdue", e))
    }

    #[instrument(skip(self, query), fields(page = query.page(), page_size = query.page_size()), err)]
    async fn overdue_businesses(
        &self,
        query: &OverdueQuery,
        now: DateTime<Utc>,
    ) -> Result<OverduePage, StoreError> {
        self.ensure_schema().await?;
        let cutoff = query.cutoff(now);

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(DISTINCT o.business_id)
            FROM orders o
            JOIN businesses b ON b.id = o.business_id
            WHERE o.status = 'posted'
                AND (o.total_cents - o.paid_cents) > 0
                AND o.due_at < $1
                AND ($2::timestamptz IS NULL OR o.due_at >= $2)
            "#,
        )
        .bind(cutoff)
        .bind(query.due_after())
        .fetch_one(self.pool())
        .await
        .map_err(|e| map_sqlx_error("count_overdue_businesses", e))?;

        let rows = sqlx::query(
            r#"
            SELECT
                o.business_id,
                b.name,
                SUM(o.total_cents - o.paid_cents)::bigint AS overdue_cents,
                MIN(o.due_at) AS oldest_due_at,
                COUNT(*) AS overdue_orders
            FROM orders o
            JOIN businesses b ON b.id = o.business_id
            WHERE o.status = 'posted'
                AND (o.total_cents - o.paid_cents) > 0
                AND o.due_at < $1
                AND ($2::timestamptz IS NULL OR o.due_at >= $2)
            GROUP BY o.business_id, b.name
            ORDER BY overdue_cents DESC, o.business_id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(cutoff)
        .bind(query.due_after())
        .bind(query.page_size())
        .bind(query.offset())
        .fetch_all(self.pool())
        .await
        .map_err(|e| map_sqlx_error("overdue_businesses", e))?;

        let items = rows
            .iter()
            .map(read_business)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("read_overdue_business", e))?;

        Ok(OverduePage {
            items,
            page: query.page(),
            page_size: query.page_size(),
            total,
        })
    }
}
