use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/", post(create_business))
}

pub async fn create_business(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::CreateBusinessBody>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    let business = match body.into_new_business() {
        Ok(b) => b,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.register_business(&business).await {
        Ok(business_id) => (StatusCode::OK, Json(dto::BusinessIdResponse { business_id })).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}
