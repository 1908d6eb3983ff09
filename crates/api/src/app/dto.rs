use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use creditpost_core::{BusinessId, DomainError, DomainResult, IdempotencyKey, OrderId, ProductId};
use creditpost_infra::catalog::{NewBusiness, NewProduct, ProductPatch};
use creditpost_infra::reports::OverdueQuery;
use creditpost_purchasing::{PurchaseItem, PurchaseRequest};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseBody {
    pub business_id: String,
    pub idempotency_key: String,
    pub items: Vec<PurchaseItemBody>,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseItemBody {
    #[serde(alias = "productId")]
    pub product_id: String,
    pub qty: i64,
}

impl PurchaseBody {
    pub fn into_request(self) -> DomainResult<PurchaseRequest> {
        let business_id: BusinessId = self.business_id.parse()?;
        let idempotency_key: IdempotencyKey = self.idempotency_key.parse()?;
        let items = self
            .items
            .into_iter()
            .map(|item| -> DomainResult<PurchaseItem> {
                Ok(PurchaseItem::new(item.product_id.parse()?, item.qty))
            })
            .collect::<DomainResult<Vec<_>>>()?;

        PurchaseRequest::new(business_id, idempotency_key, items)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBusinessBody {
    pub name: String,
    pub credit_limit_cents: i64,
}

impl CreateBusinessBody {
    pub fn into_new_business(self) -> DomainResult<NewBusiness> {
        NewBusiness::new(&self.name, self.credit_limit_cents)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductBody {
    pub business_id: String,
    pub sku: String,
    pub name: String,
    pub stock: i64,
    pub price_cents: i64,
}

impl CreateProductBody {
    pub fn into_new_product(self) -> DomainResult<NewProduct> {
        NewProduct::new(
            self.business_id.parse()?,
            &self.sku,
            &self.name,
            self.stock,
            self.price_cents,
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductBody {
    pub business_id: String,
    pub sku: Option<String>,
    pub name: Option<String>,
    pub stock: Option<i64>,
    pub price_cents: Option<i64>,
}

impl UpdateProductBody {
    pub fn into_patch(self) -> DomainResult<(BusinessId, ProductPatch)> {
        let business_id = self.business_id.parse()?;
        let patch = ProductPatch::new(
            self.sku.as_deref(),
            self.name.as_deref(),
            self.stock,
            self.price_cents,
        )?;
        Ok((business_id, patch))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessOverdueParams {
    pub business_id: Option<String>,
}

impl BusinessOverdueParams {
    pub fn business_id(&self) -> DomainResult<BusinessId> {
        self.business_id
            .as_deref()
            .ok_or_else(|| DomainError::validation("businessId is required"))?
            .parse()
    }
}

/// Query string of `/overdue-businesses`. Kept as text so that malformed
/// numbers and dates produce a validation message naming the parameter.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverdueBusinessesParams {
    pub due_before: Option<String>,
    pub due_after: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

impl OverdueBusinessesParams {
    pub fn into_query(self) -> DomainResult<OverdueQuery> {
        OverdueQuery::new(
            parse_optional(self.due_before.as_deref(), |v| parse_date("dueBefore", v))?,
            parse_optional(self.due_after.as_deref(), |v| parse_date("dueAfter", v))?,
            parse_optional(self.page.as_deref(), |v| parse_int("page", v))?,
            parse_optional(self.page_size.as_deref(), |v| parse_int("pageSize", v))?,
        )
    }
}

fn parse_optional<T>(
    value: Option<&str>,
    parse: impl Fn(&str) -> DomainResult<T>,
) -> DomainResult<Option<T>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => parse(v).map(Some),
    }
}

fn parse_int(field: &str, value: &str) -> DomainResult<i64> {
    value
        .parse::<i64>()
        .map_err(|_| DomainError::validation(format!("{field} must be a positive integer")))
}

/// Accepts RFC 3339 timestamps, `YYYY-MM-DD` (midnight UTC) and offset-less
/// date-times (taken as UTC).
pub fn parse_date(field: &str, value: &str) -> DomainResult<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(DomainError::validation(format!("{field} has an invalid date format")))
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderIdResponse {
    pub order_id: OrderId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessIdResponse {
    pub business_id: BusinessId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductIdResponse {
    pub product_id: ProductId,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    const BUSINESS: &str = "7d8f8c6b-5d2f-4e0a-9c1a-1d4f2c7a3b11";
    const PRODUCT: &str = "3e5a9b2c-1d4f-4b7a-8c9d-1e2f3a4b5c6d";
    const KEY: &str = "0b6f3a52-7f0e-4d8e-9d53-3f1c9e4b2a10";

    #[test]
    fn purchase_body_accepts_both_item_spellings() {
        let body: PurchaseBody = serde_json::from_value(json!({
            "businessId": BUSINESS,
            "idempotencyKey": KEY,
            "items": [
                {"product_id": PRODUCT, "qty": 2},
                {"productId": PRODUCT, "qty": 3}
            ]
        }))
        .unwrap();

        let request = body.into_request().unwrap();
        assert_eq!(request.distinct_products(), 1);
        assert_eq!(request.quantity_of(&PRODUCT.parse().unwrap()), Some(5));
    }

    #[test]
    fn purchase_body_rejects_malformed_ids_and_empty_items() {
        let body = PurchaseBody {
            business_id: "not-a-uuid".into(),
            idempotency_key: KEY.into(),
            items: vec![],
        };
        assert!(body.into_request().is_err());

        let body = PurchaseBody {
            business_id: BUSINESS.into(),
            idempotency_key: KEY.into(),
            items: vec![],
        };
        let err = body.into_request().unwrap_err();
        assert!(err.to_string().contains("non-empty"));
    }

    #[test]
    fn dates_accept_plain_days_and_rfc3339() {
        assert_eq!(
            parse_date("dueBefore", "2025-02-01").unwrap(),
            Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_date("dueBefore", "2025-02-01T10:00:00+02:00").unwrap(),
            Utc.with_ymd_and_hms(2025, 2, 1, 8, 0, 0).unwrap()
        );
        assert_eq!(
            parse_date("dueBefore", "2025-02-01 10:00:00").unwrap(),
            Utc.with_ymd_and_hms(2025, 2, 1, 10, 0, 0).unwrap()
        );

        let err = parse_date("dueAfter", "yesterday").unwrap_err();
        assert!(err.to_string().contains("dueAfter"));
    }

    #[test]
    fn overdue_params_validate_paging() {
        let params = OverdueBusinessesParams {
            page: Some("abc".into()),
            ..Default::default()
        };
        assert!(params.into_query().unwrap_err().to_string().contains("page"));

        let params = OverdueBusinessesParams {
            page_size: Some("500".into()),
            ..Default::default()
        };
        assert!(params.into_query().is_err());

        let query = OverdueBusinessesParams::default().into_query().unwrap();
        assert_eq!(query, OverdueQuery::default());
    }
}
