use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// Post a credit purchase. Replays of an idempotency key return the original
/// order id with the same status code.
pub async fn post_purchase(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::PurchaseBody>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    let request = match body.into_request() {
        Ok(r) => r,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.post_purchase(&request).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(dto::OrderIdResponse {
                order_id: outcome.order_id(),
            }),
        )
            .into_response(),
        Err(e) => errors::posting_error_to_response(e),
    }
}
