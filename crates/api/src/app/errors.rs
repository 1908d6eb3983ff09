use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use creditpost_core::DomainError;
use creditpost_infra::catalog::CatalogError;
use creditpost_infra::{PostingError, StoreError};
use creditpost_purchasing::PurchaseRejection;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", err.to_string())
}

pub fn json_rejection_to_response(rejection: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", rejection.body_text())
}

pub fn query_rejection_to_response(rejection: QueryRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", rejection.body_text())
}

/// Message sent for every storage failure; the details only go to the log.
pub const STORE_ERROR_MESSAGE: &str = "internal storage error";

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    tracing::error!(error = %err, "store operation failed");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", STORE_ERROR_MESSAGE)
}

pub fn posting_error_to_response(err: PostingError) -> axum::response::Response {
    match err {
        PostingError::CreditAccountNotFound(_) => {
            json_error(StatusCode::NOT_FOUND, "not_found", err.to_string())
        }
        PostingError::Rejected(rejection) => match rejection {
            PurchaseRejection::UnknownProducts { .. } => {
                json_error(StatusCode::NOT_FOUND, "not_found", rejection.to_string())
            }
            PurchaseRejection::InsufficientStock { .. } => {
                json_error(StatusCode::CONFLICT, "insufficient_stock", rejection.to_string())
            }
            PurchaseRejection::CreditLimitExceeded { .. } => {
                json_error(StatusCode::CONFLICT, "credit_limit_exceeded", rejection.to_string())
            }
            PurchaseRejection::AmountOverflow(_) => {
                json_error(StatusCode::BAD_REQUEST, "validation_error", rejection.to_string())
            }
        },
        PostingError::Store(e) => store_error_to_response(e),
    }
}

pub fn catalog_error_to_response(err: CatalogError) -> axum::response::Response {
    match err {
        CatalogError::BusinessNotFound(_) | CatalogError::ProductNotFound { .. } => {
            json_error(StatusCode::NOT_FOUND, "not_found", err.to_string())
        }
        CatalogError::DuplicateSku { .. } => json_error(StatusCode::CONFLICT, "conflict", err.to_string()),
        CatalogError::Store(e) => store_error_to_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn store_failures_do_not_leak_database_details() {
        let response = store_error_to_response(StoreError::Database(
            "relation \"orders\" does not exist".to_string(),
        ));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "store_error", "message": STORE_ERROR_MESSAGE })
        );

        let response = posting_error_to_response(PostingError::Store(StoreError::CheckViolation(
            "products_stock_check".to_string(),
        )));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["message"], STORE_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn business_rule_failures_keep_their_message() {
        let response = catalog_error_to_response(CatalogError::DuplicateSku {
            business_id: creditpost_core::BusinessId::new(),
            sku: "RED-1".to_string(),
        });
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["error"], "conflict");
        assert!(body["message"].as_str().unwrap().contains("RED-1"));
    }
}
