use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use salesdesk_core::{AggregateRoot, ExpectedVersion, OrderId, ProductId};
use salesdesk_products::{Product, name_key};
use salesdesk_sales::{Order, OrderFilter};

use super::{OrderStore, ProductStore, StoreError};
use crate::pagination::{Direction, Page, PageRequest, SortField};

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

/// In-memory catalog store.
///
/// Intended for tests/dev. Each call takes the lock once, which makes every
/// operation atomic and serializes inserts of the same name.
#[derive(Debug, Default)]
pub struct InMemoryProductStore {
    products: RwLock<HashMap<ProductId, Product>>,
    round_trips: AtomicU64,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of store calls served so far.
    pub fn round_trips(&self) -> u64 {
        self.round_trips.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.round_trips.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn insert(&self, product: &Product) -> Result<(), StoreError> {
        self.touch();
        let mut products = self.products.write().map_err(|_| poisoned())?;

        let key = product.name_key();
        if products.values().any(|p| p.name_key() == key) {
            return Err(StoreError::Duplicate(format!(
                "product name '{}' is already taken",
                product.name()
            )));
        }
        if products.contains_key(&product.id_typed()) {
            return Err(StoreError::Duplicate(format!(
                "product id {} already exists",
                product.id_typed()
            )));
        }

        products.insert(product.id_typed(), product.clone());
        Ok(())
    }

    async fn update(&self, product: &Product, expected: ExpectedVersion) -> Result<(), StoreError> {
        self.touch();
        let mut products = self.products.write().map_err(|_| poisoned())?;

        let stored = products
            .get_mut(&product.id_typed())
            .ok_or_else(|| StoreError::NotFound(format!("product {}", product.id_typed())))?;

        if !expected.matches(stored.version()) {
            return Err(StoreError::VersionConflict(format!(
                "product {} is at version {}, write expected {}",
                product.id_typed(),
                stored.version(),
                expected.0
            )));
        }

        *stored = Product::restore(
            product.id_typed(),
            product.name().to_string(),
            product.price(),
            expected.next(),
        );
        Ok(())
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        self.touch();
        let products = self.products.read().map_err(|_| poisoned())?;
        Ok(products.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Product>, StoreError> {
        self.touch();
        let products = self.products.read().map_err(|_| poisoned())?;
        let key = name_key(name);
        // Renames are not re-checked, so more than one entry can share a key;
        // the lowest id wins, as in the SQL store.
        Ok(products
            .values()
            .filter(|p| p.name_key() == key)
            .min_by_key(|p| p.id_typed())
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Product>, StoreError> {
        self.touch();
        let products = self.products.read().map_err(|_| poisoned())?;
        let mut all: Vec<Product> = products.values().cloned().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()).then(a.id_typed().cmp(&b.id_typed())));
        Ok(all)
    }
}

/// In-memory order store.
///
/// Intended for tests/dev. Not optimized for performance: listing scans every
/// order, but does so in a single call.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<OrderId, Order>>,
    round_trips: AtomicU64,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of store calls served so far.
    pub fn round_trips(&self) -> u64 {
        self.round_trips.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.orders.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn touch(&self) {
        self.round_trips.fetch_add(1, Ordering::SeqCst);
    }
}

/// Same ordering as the SQL store: chosen column, `NULL`s last in both
/// directions, then id ascending.
fn compare_orders(a: &Order, b: &Order, field: SortField, direction: Direction) -> CmpOrdering {
    let directed = |ord: CmpOrdering| match direction {
        Direction::Asc => ord,
        Direction::Desc => ord.reverse(),
    };

    let primary = match field {
        SortField::OrderDate => directed(a.order_date().cmp(&b.order_date())),
        SortField::CustomerName => directed(a.customer_name().cmp(b.customer_name())),
        SortField::Total => directed(a.totals().total.cmp(&b.totals().total)),
        SortField::Id => directed(a.id_typed().cmp(&b.id_typed())),
        SortField::CancellationDate => match (a.cancellation_date(), b.cancellation_date()) {
            (Some(x), Some(y)) => directed(x.cmp(&y)),
            (Some(_), None) => CmpOrdering::Less,
            (None, Some(_)) => CmpOrdering::Greater,
            (None, None) => CmpOrdering::Equal,
        },
    };
    primary.then_with(|| a.id_typed().cmp(&b.id_typed()))
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        self.touch();
        let mut orders = self.orders.write().map_err(|_| poisoned())?;
        if orders.contains_key(&order.id_typed()) {
            return Err(StoreError::Duplicate(format!(
                "order {} already exists",
                order.id_typed()
            )));
        }
        orders.insert(order.id_typed(), order.clone());
        Ok(())
    }

    async fn update(&self, order: &Order, expected: ExpectedVersion) -> Result<(), StoreError> {
        self.touch();
        let mut orders = self.orders.write().map_err(|_| poisoned())?;

        let stored = orders
            .get_mut(&order.id_typed())
            .ok_or_else(|| StoreError::NotFound(format!("order {}", order.id_typed())))?;

        if !expected.matches(stored.version()) {
            return Err(StoreError::VersionConflict(format!(
                "order {} is at version {}, write expected {}",
                order.id_typed(),
                stored.version(),
                expected.0
            )));
        }

        *stored = order.clone();
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        self.touch();
        let orders = self.orders.read().map_err(|_| poisoned())?;
        Ok(orders.get(&id).cloned())
    }

    async fn find_page(&self, filter: &OrderFilter, page: &PageRequest) -> Result<Page<Order>, StoreError> {
        self.touch();
        let orders = self.orders.read().map_err(|_| poisoned())?;

        let mut matching: Vec<&Order> = orders.values().filter(|o| filter.matches(o)).collect();
        matching.sort_by(|a, b| compare_orders(a, b, page.sort.field, page.sort.direction));

        let total = matching.len() as u64;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let content = matching
            .into_iter()
            .skip(offset)
            .take(page.size as usize)
            .cloned()
            .collect();

        Ok(Page::new(content, total, page))
    }
}
