use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{patch, post},
};

use creditpost_core::ProductId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product))
        .route("/:product_id", patch(update_product))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::CreateProductBody>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    let product = match body.into_new_product() {
        Ok(p) => p,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.create_product(&product).await {
        Ok(product_id) => (StatusCode::OK, Json(dto::ProductIdResponse { product_id })).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(product_id): Path<String>,
    payload: Result<Json<dto::UpdateProductBody>, JsonRejection>,
) -> axum::response::Response {
    let product_id: ProductId = match product_id.parse() {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    let (business_id, patch) = match body.into_patch() {
        Ok(p) => p,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.update_product(product_id, business_id, &patch).await {
        Ok(()) => (StatusCode::OK, Json(dto::ProductIdResponse { product_id })).into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}
