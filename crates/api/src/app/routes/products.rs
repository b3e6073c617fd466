use axum::{
    Json, Router,
    extract::{Extension, Path},
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    routing::get,
};

use salesdesk_core::ProductId;
use salesdesk_products::UpsertProduct;

use crate::app::dto::ProductView;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(upsert_product))
        .route("/:id", get(get_product))
}

/// 201 when the body had no id (create), 200 for an update.
pub async fn upsert_product(
    Extension(services): Extension<AppServices>,
    body: Result<Json<UpsertProduct>, JsonRejection>,
) -> Result<(StatusCode, Json<ProductView>), ApiError> {
    let Json(body) = body?;
    let status = if body.id.is_none() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    let product = services.catalog.upsert_product(body).await?;
    Ok((status, Json(ProductView::from(&product))))
}

pub async fn list_products(Extension(services): Extension<AppServices>) -> Result<Json<Vec<ProductView>>, ApiError> {
    let products = services.catalog.list_products().await?;
    Ok(Json(products.iter().map(ProductView::from).collect()))
}

pub async fn get_product(
    Extension(services): Extension<AppServices>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<ProductView>, ApiError> {
    let Path(id) = id?;
    let product = services.catalog.get_product(id.parse::<ProductId>()?).await?;
    Ok(Json(ProductView::from(&product)))
}
