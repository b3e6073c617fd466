use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    routing::{get, put},
};

use salesdesk_core::OrderId;
use salesdesk_infra::Page;

use crate::app::dto::{CreateOrderRequest, ListOrdersQuery, OrderView};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/:id", get(get_order))
        .route("/:id/cancel", put(cancel_order))
}

pub async fn create_order(
    Extension(services): Extension<AppServices>,
    body: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderView>), ApiError> {
    let Json(body) = body?;
    let order = services.orders.create_order(body.into()).await?;
    Ok((StatusCode::CREATED, Json(OrderView::from(&order))))
}

pub async fn get_order(
    Extension(services): Extension<AppServices>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<OrderView>, ApiError> {
    let order = services.orders.get_order(parse_id(id)?).await?;
    Ok(Json(OrderView::from(&order)))
}

pub async fn cancel_order(
    Extension(services): Extension<AppServices>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<OrderView>, ApiError> {
    let order = services.orders.cancel_order(parse_id(id)?).await?;
    Ok(Json(OrderView::from(&order)))
}

pub async fn list_orders(
    Extension(services): Extension<AppServices>,
    query: Result<Query<ListOrdersQuery>, QueryRejection>,
) -> Result<Json<Page<OrderView>>, ApiError> {
    let Query(query) = query?;
    let (filter, page) = query.into_parts()?;
    let orders = services.orders.list_orders(&filter, &page).await?;
    Ok(Json(orders.map(|order| OrderView::from(&order))))
}

fn parse_id(id: Result<Path<String>, PathRejection>) -> Result<OrderId, ApiError> {
    let Path(id) = id?;
    Ok(id.parse::<OrderId>()?)
}
