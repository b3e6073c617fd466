use axum::Router;

pub mod orders;
pub mod products;
pub mod system;

/// Router for every `/api` endpoint.
pub fn router() -> Router {
    Router::new()
        .nest("/sales-orders", orders::router())
        .nest("/products", products::router())
}
