use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use salesdesk_core::{AggregateRoot, Money, OrderId, ProductId};
use salesdesk_infra::{PageRequest, Sort};
use salesdesk_products::Product;
use salesdesk_sales::{CreateOrder, Order, OrderItemRequest, OrderQuery, OrderStatus};

use crate::app::errors::ApiError;

/// Day/month/year, as orders are displayed to clerks.
const VIEW_DATE_FORMAT: &str = "%d/%m/%Y";

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub customer_name: String,
    pub items: Vec<OrderItemDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemDto {
    pub product_name: String,
    pub quantity: i64,
}

impl From<CreateOrderRequest> for CreateOrder {
    fn from(body: CreateOrderRequest) -> Self {
        CreateOrder {
            customer_name: body.customer_name,
            items: body
                .items
                .into_iter()
                .map(|item| OrderItemRequest {
                    product_name: item.product_name,
                    quantity: item.quantity,
                })
                .collect(),
        }
    }
}

/// Query string of `GET /api/sales-orders`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersQuery {
    pub created_start: Option<String>,
    pub created_end: Option<String>,
    pub cancelled_start: Option<String>,
    pub cancelled_end: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub sort: Option<String>,
}

impl ListOrdersQuery {
    pub fn into_parts(self) -> Result<(OrderQuery, PageRequest), ApiError> {
        let query = OrderQuery {
            created_start: parse_instant("createdStart", self.created_start.as_deref())?,
            created_end: parse_instant("createdEnd", self.created_end.as_deref())?,
            cancelled_start: parse_instant("cancelledStart", self.cancelled_start.as_deref())?,
            cancelled_end: parse_instant("cancelledEnd", self.cancelled_end.as_deref())?,
        };
        let sort = self.sort.as_deref().map(Sort::parse).transpose()?;
        let page = PageRequest::new(self.page, self.size, sort)?;
        Ok((query, page))
    }
}

/// RFC 3339, or an ISO-8601 date-time without offset (taken as UTC).
fn parse_instant(param: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(at.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(|_| ApiError::bad_request(format!("{param} must be an ISO-8601 date-time (got '{raw}')")))
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: OrderId,
    pub order_date: String,
    pub customer_name: String,
    pub purchased_items: Vec<PurchasedItemView>,
    pub subtotal: Money,
    pub vat: Money,
    pub total: Money,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchasedItemView {
    pub product_name: String,
    pub price: Money,
    pub quantity: u32,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        let totals = order.totals();
        Self {
            id: order.id_typed(),
            order_date: order.order_date().format(VIEW_DATE_FORMAT).to_string(),
            customer_name: order.customer_name().to_string(),
            purchased_items: order
                .lines()
                .iter()
                .map(|line| PurchasedItemView {
                    product_name: line.product_name.clone(),
                    price: line.unit_price,
                    quantity: line.quantity,
                })
                .collect(),
            subtotal: totals.subtotal,
            vat: totals.vat,
            total: totals.total,
            status: order.status(),
            cancellation_date: order
                .cancellation_date()
                .map(|at| at.format(VIEW_DATE_FORMAT).to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductView {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub version: u64,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id_typed(),
            name: product.name().to_string(),
            price: product.price(),
            version: product.version(),
        }
    }
}
