//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: composition root (stores, cache, services)
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, build_services};

/// Build the full HTTP router (public entrypoint used by `main.rs` and the
/// black-box tests).
pub fn build_app(services: AppServices) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api", routes::router())
        .fallback(not_found)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}

async fn not_found() -> errors::ApiError {
    errors::ApiError::new(axum::http::StatusCode::NOT_FOUND, "not_found", "no such route")
}
