//! Postgres-backed catalog and order stores.
//!
//! The schema lives in `migrations/0001_sales_schema.sql` and is applied by
//! [`ensure_schema`].
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Duplicate` | Id collision on insert |
//! | Database (other) | Any other | `Backend` | Check constraint, connection loss mid-query, etc. |
//! | PoolClosed | N/A | `Backend` | Connection pool was closed |
//! | Other | N/A | `Backend` | Network errors, decode failures, etc. |
//!
//! Version mismatches and missing rows are detected from `rows_affected()`,
//! not from database errors.
//!
//! ## Round Trips
//!
//! `get` and `find_page` read orders with their lines through one
//! `LEFT JOIN ... json_agg` query. `find_page` adds a single `COUNT(*)` for the
//! total, so a listing costs two queries whatever the page size.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Row};
use tracing::{Span, instrument};
use uuid::Uuid;

use salesdesk_core::{AggregateRoot, DomainError, ExpectedVersion, Money, OrderId, ProductId};
use salesdesk_products::Product;
use salesdesk_sales::{Order, OrderFilter, OrderLine, OrderRecord, OrderStatus};

use super::{OrderStore, ProductStore, StoreError};
use crate::pagination::{Direction, Page, PageRequest, Sort, SortField};

const SCHEMA: &str = include_str!("../../migrations/0001_sales_schema.sql");

/// Open a connection pool.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, StoreError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|e| map_sqlx_error("connect", e))
}

/// Create the tables and indexes if they do not exist yet.
#[instrument(skip(pool), err)]
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;
    Ok(())
}

/// Postgres-backed catalog store.
///
/// ## Name Uniqueness
///
/// `insert` takes a transaction-scoped advisory lock keyed on the lower-cased
/// name, then checks for an existing entry. Two concurrent creates of the
/// same name therefore run one after the other and the second sees the first.
#[derive(Debug, Clone)]
pub struct PostgresProductStore {
    pool: Arc<PgPool>,
}

impl PostgresProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl ProductStore for PostgresProductStore {
    #[instrument(
        skip(self, product),
        fields(product_id = %product.id_typed(), name = %product.name()),
        err
    )]
    async fn insert(&self, product: &Product) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext(lower($1)))")
            .bind(product.name())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("advisory_lock", e))?;

        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM products WHERE lower(name) = lower($1))",
        )
        .bind(product.name())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("check_name", e))?;

        if taken {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::Duplicate(format!(
                "product name '{}' is already taken",
                product.name()
            )));
        }

        sqlx::query("INSERT INTO products (id, name, price, version) VALUES ($1, $2, $3, $4)")
            .bind(product.id_typed().as_uuid())
            .bind(product.name())
            .bind(product.price().amount())
            .bind(product.version() as i64)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_product", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(
        skip(self, product),
        fields(product_id = %product.id_typed(), expected_version = expected.0),
        err
    )]
    async fn update(&self, product: &Product, expected: ExpectedVersion) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = $3, price = $4, version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(product.id_typed().as_uuid())
        .bind(expected.0 as i64)
        .bind(product.name())
        .bind(product.price().amount())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_product", e))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let current: Option<i64> = sqlx::query_scalar("SELECT version FROM products WHERE id = $1")
            .bind(product.id_typed().as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_product_version", e))?;

        Err(match current {
            None => StoreError::NotFound(format!("product {}", product.id_typed())),
            Some(actual) => StoreError::VersionConflict(format!(
                "product {} is at version {actual}, write expected {}",
                product.id_typed(),
                expected.0
            )),
        })
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn get(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query("SELECT id, name, price, version FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?;

        row.map(|r| decode_product(&r)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn find_by_name(&self, name: &str) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, price, version
            FROM products
            WHERE lower(name) = lower($1)
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(name.trim())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_product_by_name", e))?;

        row.map(|r| decode_product(&r)).transpose()
    }

    #[instrument(skip(self), fields(product_count = tracing::field::Empty), err)]
    async fn list(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT id, name, price, version FROM products ORDER BY name COLLATE "C", id"#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        Span::current().record("product_count", rows.len());
        rows.iter().map(decode_product).collect()
    }
}

/// Orders joined with their lines, aggregated per order.
const ORDER_SELECT: &str = r#"
    SELECT
        o.id,
        o.order_date,
        o.customer_name,
        o.subtotal,
        o.vat,
        o.total,
        o.status,
        o.cancellation_date,
        o.version,
        COALESCE(
            json_agg(
                json_build_object(
                    'product_name', i.product_name,
                    'quantity', i.quantity,
                    'unit_price', i.unit_price::text
                )
                ORDER BY i.line_no
            ) FILTER (WHERE i.order_id IS NOT NULL),
            '[]'::json
        ) AS items
    FROM sales_orders o
    LEFT JOIN sales_order_items i ON i.order_id = o.id
"#;

/// Postgres-backed order store.
///
/// Header and lines are written in one transaction; lifecycle updates are
/// conditioned on the stored version.
#[derive(Debug, Clone)]
pub struct PostgresOrderStore {
    pool: Arc<PgPool>,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    qb.push(" WHERE TRUE");
    if let Some(range) = filter.created {
        qb.push(" AND o.order_date BETWEEN ")
            .push_bind(range.start)
            .push(" AND ")
            .push_bind(range.end);
    }
    // NULL never satisfies BETWEEN, so open orders drop out here.
    if let Some(range) = filter.cancelled {
        qb.push(" AND o.cancellation_date BETWEEN ")
            .push_bind(range.start)
            .push(" AND ")
            .push_bind(range.end);
    }
}

fn order_by(sort: Sort) -> &'static str {
    match (sort.field, sort.direction) {
        (SortField::OrderDate, Direction::Asc) => "o.order_date ASC, o.id ASC",
        (SortField::OrderDate, Direction::Desc) => "o.order_date DESC, o.id ASC",
        (SortField::CancellationDate, Direction::Asc) => "o.cancellation_date ASC NULLS LAST, o.id ASC",
        (SortField::CancellationDate, Direction::Desc) => "o.cancellation_date DESC NULLS LAST, o.id ASC",
        (SortField::CustomerName, Direction::Asc) => r#"o.customer_name COLLATE "C" ASC, o.id ASC"#,
        (SortField::CustomerName, Direction::Desc) => r#"o.customer_name COLLATE "C" DESC, o.id ASC"#,
        (SortField::Total, Direction::Asc) => "o.total ASC, o.id ASC",
        (SortField::Total, Direction::Desc) => "o.total DESC, o.id ASC",
        (SortField::Id, Direction::Asc) => "o.id ASC",
        (SortField::Id, Direction::Desc) => "o.id DESC",
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[instrument(
        skip(self, order),
        fields(order_id = %order.id_typed(), line_count = order.lines().len()),
        err
    )]
    async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        let id = Uuid::from(order.id_typed());
        let totals = order.totals();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO sales_orders (
                id,
                order_date,
                customer_name,
                subtotal,
                vat,
                total,
                status,
                cancellation_date,
                version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(id)
        .bind(order.order_date())
        .bind(order.customer_name())
        .bind(totals.subtotal.amount())
        .bind(totals.vat.amount())
        .bind(totals.total.amount())
        .bind(order.status().as_str())
        .bind(order.cancellation_date())
        .bind(order.version() as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        let mut items = QueryBuilder::<Postgres>::new(
            "INSERT INTO sales_order_items (order_id, line_no, product_name, quantity, unit_price) ",
        );
        items.push_values(order.lines().iter().enumerate(), |mut b, (idx, line)| {
            b.push_bind(id)
                .push_bind(idx as i32 + 1)
                .push_bind(line.product_name.clone())
                .push_bind(i64::from(line.quantity))
                .push_bind(line.unit_price.amount());
        });
        items
            .build()
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_order_items", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(
        skip(self, order),
        fields(order_id = %order.id_typed(), expected_version = expected.0),
        err
    )]
    async fn update(&self, order: &Order, expected: ExpectedVersion) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE sales_orders
            SET status = $3, cancellation_date = $4, version = $5
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(order.id_typed().as_uuid())
        .bind(expected.0 as i64)
        .bind(order.status().as_str())
        .bind(order.cancellation_date())
        .bind(order.version() as i64)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_order", e))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let current: Option<i64> = sqlx::query_scalar("SELECT version FROM sales_orders WHERE id = $1")
            .bind(order.id_typed().as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_order_version", e))?;

        Err(match current {
            None => StoreError::NotFound(format!("order {}", order.id_typed())),
            Some(actual) => StoreError::VersionConflict(format!(
                "order {} is at version {actual}, write expected {}",
                order.id_typed(),
                expected.0
            )),
        })
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new(ORDER_SELECT);
        qb.push(" WHERE o.id = ").push_bind(Uuid::from(id));
        qb.push(" GROUP BY o.id");

        let row = qb
            .build()
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_order", e))?;

        match row {
            Some(row) => {
                let order_row = OrderRow::from_row(&row)
                    .map_err(|e| StoreError::Backend(format!("failed to deserialize order row: {e}")))?;
                order_row.into_order().map(Some)
            }
            None => Ok(None),
        }
    }

    #[instrument(
        skip(self),
        fields(page = page.page, size = page.size, order_count = tracing::field::Empty),
        err
    )]
    async fn find_page(&self, filter: &OrderFilter, page: &PageRequest) -> Result<Page<Order>, StoreError> {
        let span = Span::current();

        let mut qb = QueryBuilder::<Postgres>::new(ORDER_SELECT);
        push_filter(&mut qb, filter);
        qb.push(" GROUP BY o.id ORDER BY ");
        qb.push(order_by(page.sort));
        qb.push(" LIMIT ")
            .push_bind(page.limit() as i64)
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);

        let rows = qb
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_orders", e))?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM sales_orders o");
        push_filter(&mut count, filter);
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_orders", e))?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let order_row = OrderRow::from_row(&row)
                .map_err(|e| StoreError::Backend(format!("failed to deserialize order row: {e}")))?;
            orders.push(order_row.into_order()?);
        }

        span.record("order_count", orders.len());
        Ok(Page::new(orders, total.max(0) as u64, page))
    }
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Duplicate(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn corrupt(msg: String) -> StoreError {
    StoreError::Corrupt(DomainError::invariant(msg))
}

fn stored_version(raw: i64, what: &str) -> Result<u64, StoreError> {
    u64::try_from(raw).map_err(|_| corrupt(format!("{what} has negative version {raw}")))
}

// SQLx row types

fn decode_product(row: &PgRow) -> Result<Product, StoreError> {
    let id: Uuid = row
        .try_get("id")
        .map_err(|e| map_sqlx_error("decode_product", e))?;
    let name: String = row
        .try_get("name")
        .map_err(|e| map_sqlx_error("decode_product", e))?;
    let price: Decimal = row
        .try_get("price")
        .map_err(|e| map_sqlx_error("decode_product", e))?;
    let version: i64 = row
        .try_get("version")
        .map_err(|e| map_sqlx_error("decode_product", e))?;

    Ok(Product::restore(
        ProductId::from_uuid(id),
        name,
        Money::new(price),
        stored_version(version, &format!("product {id}"))?,
    ))
}

#[derive(Debug)]
struct OrderRow {
    id: Uuid,
    order_date: DateTime<Utc>,
    customer_name: String,
    subtotal: Decimal,
    vat: Decimal,
    total: Decimal,
    status: String,
    cancellation_date: Option<DateTime<Utc>>,
    version: i64,
    items: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ItemJson {
    product_name: String,
    quantity: i64,
    unit_price: String,
}

impl<'r> FromRow<'r, PgRow> for OrderRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(OrderRow {
            id: row.try_get("id")?,
            order_date: row.try_get("order_date")?,
            customer_name: row.try_get("customer_name")?,
            subtotal: row.try_get("subtotal")?,
            vat: row.try_get("vat")?,
            total: row.try_get("total")?,
            status: row.try_get("status")?,
            cancellation_date: row.try_get("cancellation_date")?,
            version: row.try_get("version")?,
            items: row.try_get("items")?,
        })
    }
}

impl OrderRow {
    fn into_order(self) -> Result<Order, StoreError> {
        let id = self.id;
        let items: Vec<ItemJson> = serde_json::from_value(self.items)
            .map_err(|e| StoreError::Backend(format!("failed to decode lines of order {id}: {e}")))?;

        let lines = items
            .into_iter()
            .map(|item| {
                let quantity = u32::try_from(item.quantity).map_err(|_| {
                    corrupt(format!("order {id} has line quantity {}", item.quantity))
                })?;
                let unit_price = Money::from_str(&item.unit_price).map_err(StoreError::Corrupt)?;
                Ok(OrderLine {
                    product_name: item.product_name,
                    quantity,
                    unit_price,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let status = OrderStatus::from_str(&self.status).map_err(StoreError::Corrupt)?;

        Order::restore(OrderRecord {
            id: OrderId::from_uuid(id),
            order_date: self.order_date,
            customer_name: self.customer_name,
            lines,
            subtotal: Money::new(self.subtotal),
            vat: Money::new(self.vat),
            total: Money::new(self.total),
            status,
            cancellation_date: self.cancellation_date,
            version: stored_version(self.version, &format!("order {id}"))?,
        })
        .map_err(StoreError::Corrupt)
    }
}
