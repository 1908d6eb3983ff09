use axum::{
    Router,
    routing::{get, post},
};

pub mod businesses;
pub mod overdue;
pub mod products;
pub mod purchase;
pub mod system;

/// Router for every endpoint except `/health`.
pub fn router() -> Router {
    Router::new()
        .route("/purchase", post(purchase::post_purchase))
        .nest("/businesses", businesses::router())
        .nest("/products", products::router())
        .route("/overdue", get(overdue::business_overdue))
        .route("/overdue-businesses", get(overdue::overdue_businesses))
}
