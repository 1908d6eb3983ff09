use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Query, rejection::QueryRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// Overdue totals of one business, or `null` when nothing is overdue.
pub async fn business_overdue(
    Extension(services): Extension<Arc<AppServices>>,
    params: Result<Query<dto::BusinessOverdueParams>, QueryRejection>,
) -> axum::response::Response {
    let Query(params) = match params {
        Ok(p) => p,
        Err(rejection) => return errors::query_rejection_to_response(rejection),
    };

    let business_id = match params.business_id() {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.business_overdue(business_id, Utc::now()).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn overdue_businesses(
    Extension(services): Extension<Arc<AppServices>>,
    params: Result<Query<dto::OverdueBusinessesParams>, QueryRejection>,
) -> axum::response::Response {
    let Query(params) = match params {
        Ok(p) => p,
        Err(rejection) => return errors::query_rejection_to_response(rejection),
    };

    let query = match params.into_query() {
        Ok(q) => q,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.overdue_businesses(&query, Utc::now()).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
