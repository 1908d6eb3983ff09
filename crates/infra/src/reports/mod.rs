//! Overdue receivables reports.
//!
//! An order is overdue when it is still `posted`, has an unpaid remainder
//! (`total_cents - paid_cents > 0`) and its due date lies before the cutoff.
//! Unless the caller supplies one, the cutoff is [`OVERDUE_GRACE_DAYS`] before
//! now.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use creditpost_core::{BusinessId, DomainError, DomainResult};

use crate::store::StoreError;

pub const OVERDUE_GRACE_DAYS: i64 = 30;
pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

pub fn default_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(OVERDUE_GRACE_DAYS)
}

/// Overdue totals of one business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverdueSummary {
    pub business_id: BusinessId,
    pub overdue_cents: i64,
    pub oldest_due_at: DateTime<Utc>,
    pub overdue_orders: i64,
}

/// One row of the cross-business report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverdueBusiness {
    pub business_id: BusinessId,
    pub name: String,
    pub overdue_cents: i64,
    pub oldest_due_at: DateTime<Utc>,
    pub overdue_orders: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverduePage {
    pub items: Vec<OverdueBusiness>,
    pub page: i64,
    pub page_size: i64,
    /// Overdue businesses across all pages.
    pub total: i64,
}

/// Filter and page of the cross-business report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverdueQuery {
    due_before: Option<DateTime<Utc>>,
    due_after: Option<DateTime<Utc>>,
    page: i64,
    page_size: i64,
}

impl OverdueQuery {
    pub fn new(
        due_before: Option<DateTime<Utc>>,
        due_after: Option<DateTime<Utc>>,
        page: Option<i64>,
        page_size: Option<i64>,
    ) -> DomainResult<Self> {
        let page = page.unwrap_or(1);
        if page < 1 {
            return Err(DomainError::validation("page must be a positive integer"));
        }

        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(DomainError::validation(format!(
                "pageSize must be a positive integer up to {MAX_PAGE_SIZE}"
            )));
        }

        Ok(Self {
            due_before,
            due_after,
            page,
            page_size,
        })
    }

    pub fn due_after(&self) -> Option<DateTime<Utc>> {
        self.due_after
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn page_size(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    /// Exclusive upper bound on `due_at`.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.due_before.unwrap_or_else(|| default_cutoff(now))
    }
}

impl Default for OverdueQuery {
    fn default() -> Self {
        Self {
            due_before: None,
            due_after: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[async_trait]
pub trait OverdueReports: Send + Sync {
    /// Overdue totals of `business_id` as of `now`, or `None` when nothing is
    /// overdue.
    async fn business_overdue(
        &self,
        business_id: BusinessId,
        now: DateTime<Utc>,
    ) -> Result<Option<OverdueSummary>, StoreError>;

    /// Businesses with overdue orders, largest overdue amount first.
    async fn overdue_businesses(
        &self,
        query: &OverdueQuery,
        now: DateTime<Utc>,
    ) -> Result<OverduePage, StoreError>;
}
