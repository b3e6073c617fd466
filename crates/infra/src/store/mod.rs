//! Persistence boundary for catalog entries and orders.
//!
//! The services only see these traits. Two adapters exist: an in-memory one for
//! tests/dev and a PostgreSQL one.
//!
//! ## Contract
//!
//! - Every method is atomic: it either applies completely or not at all.
//! - `ProductStore::insert` refuses a name whose case-insensitive key is
//!   already taken, and serializes concurrent inserts of the same key.
//! - `update` methods are compare-and-set on the row version: the write only
//!   lands if the stored version still equals the expected one.
//! - `OrderStore::find_page` returns hydrated orders (lines included) in a
//!   bounded number of round trips, independent of the page size.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use salesdesk_core::{DomainError, ExpectedVersion, OrderId, ProductId};
use salesdesk_products::Product;
use salesdesk_sales::{Order, OrderFilter};

use crate::pagination::{Page, PageRequest};

pub use in_memory::{InMemoryOrderStore, InMemoryProductStore};
pub use postgres::{PostgresOrderStore, PostgresProductStore};

/// Store operation error.
///
/// These are **infrastructure errors** as opposed to domain errors; the
/// services translate them into their own taxonomy.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A catalog entry with the same case-insensitive name exists.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// The row version moved on since the writer read it.
    #[error("version conflict: {0}")]
    VersionConflict(String),

    /// The row targeted by an update does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A stored row could not be turned back into a valid aggregate.
    #[error("corrupt record: {0}")]
    Corrupt(DomainError),

    /// Connection, query, or decoding failure in the backend.
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Catalog persistence.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Insert a new entry, failing with `Duplicate` if its name is taken.
    async fn insert(&self, product: &Product) -> Result<(), StoreError>;

    /// Replace the entry with `product` if the stored version equals `expected`.
    ///
    /// The name is not re-checked for uniqueness.
    async fn update(&self, product: &Product, expected: ExpectedVersion) -> Result<(), StoreError>;

    async fn get(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Case-insensitive lookup by name.
    async fn find_by_name(&self, name: &str) -> Result<Option<Product>, StoreError>;

    /// All entries, ordered by name.
    async fn list(&self) -> Result<Vec<Product>, StoreError>;
}

/// Order persistence. Header and lines are always written and read together.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: &Order) -> Result<(), StoreError>;

    /// Persist the lifecycle fields of `order` if the stored version equals `expected`.
    async fn update(&self, order: &Order, expected: ExpectedVersion) -> Result<(), StoreError>;

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// One page of orders matching `filter`, plus the total match count.
    async fn find_page(&self, filter: &OrderFilter, page: &PageRequest) -> Result<Page<Order>, StoreError>;
}

#[async_trait]
impl<S> ProductStore for Arc<S>
where
    S: ProductStore + ?Sized,
{
    async fn insert(&self, product: &Product) -> Result<(), StoreError> {
        (**self).insert(product).await
    }

    async fn update(&self, product: &Product, expected: ExpectedVersion) -> Result<(), StoreError> {
        (**self).update(product, expected).await
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).get(id).await
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Product>, StoreError> {
        (**self).find_by_name(name).await
    }

    async fn list(&self) -> Result<Vec<Product>, StoreError> {
        (**self).list().await
    }
}

#[async_trait]
impl<S> OrderStore for Arc<S>
where
    S: OrderStore + ?Sized,
{
    async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        (**self).insert(order).await
    }

    async fn update(&self, order: &Order, expected: ExpectedVersion) -> Result<(), StoreError> {
        (**self).update(order, expected).await
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        (**self).get(id).await
    }

    async fn find_page(&self, filter: &OrderFilter, page: &PageRequest) -> Result<Page<Order>, StoreError> {
        (**self).find_page(filter, page).await
    }
}
