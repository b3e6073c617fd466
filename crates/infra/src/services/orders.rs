use std::sync::Arc;

use tracing::{info, instrument};

use salesdesk_core::{AggregateRoot, Clock, ExpectedVersion, OrderId};
use salesdesk_sales::{CreateOrder, Order, OrderLine, OrderQuery};

use super::{CatalogService, ServiceError, rejected};
use crate::pagination::{Page, PageRequest};
use crate::store::OrderStore;

/// Order creation with price snapshots, cancellation, retrieval, and listing.
#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    catalog: CatalogService,
    clock: Arc<dyn Clock>,
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrderStore>, catalog: CatalogService, clock: Arc<dyn Clock>) -> Self {
        Self {
            orders,
            catalog,
            clock,
        }
    }

    /// Validate, snapshot catalog prices, compute totals, persist in one write.
    ///
    /// Every catalog lookup finishes before the write starts, so a missing
    /// product leaves no trace in the order store.
    #[instrument(skip(self, cmd), fields(customer = %cmd.customer_name, item_count = cmd.items.len()))]
    pub async fn create_order(&self, cmd: CreateOrder) -> Result<Order, ServiceError> {
        self.place(cmd)
            .await
            .map_err(|err| rejected("create_order", err))
    }

    async fn place(&self, cmd: CreateOrder) -> Result<Order, ServiceError> {
        cmd.validate()?;

        let mut lines = Vec::with_capacity(cmd.items.len());
        for item in &cmd.items {
            let product = self.catalog.find_by_name(&item.product_name).await?;
            lines.push(OrderLine {
                product_name: product.name().to_string(),
                quantity: item.checked_quantity()?,
                unit_price: product.price(),
            });
        }

        let order = Order::place(OrderId::new(), &cmd.customer_name, lines, self.clock.now())?;
        self.orders.insert(&order).await?;

        info!(
            order_id = %order.id_typed(),
            total = %order.totals().total,
            "order created"
        );
        Ok(order)
    }

    /// `CREATED → CANCELLED`; a second cancellation is a conflict.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn cancel_order(&self, id: OrderId) -> Result<Order, ServiceError> {
        self.cancel(id)
            .await
            .map_err(|err| rejected("cancel_order", err))
    }

    async fn cancel(&self, id: OrderId) -> Result<Order, ServiceError> {
        let current = self.get_order(id).await?;
        let cancelled = current.cancel(self.clock.now())?;
        self.orders
            .update(&cancelled, ExpectedVersion(current.version()))
            .await?;

        info!(order_id = %id, "order cancelled");
        Ok(cancelled)
    }

    pub async fn get_order(&self, id: OrderId) -> Result<Order, ServiceError> {
        self.orders
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {id} not found")))
    }

    /// Orders matching every supplied date range, lines included.
    pub async fn list_orders(&self, query: &OrderQuery, page: &PageRequest) -> Result<Page<Order>, ServiceError> {
        let filter = query.filter();
        Ok(self.orders.find_page(&filter, page).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use salesdesk_core::{FixedClock, Money};
    use salesdesk_products::UpsertProduct;
    use salesdesk_sales::{OrderItemRequest, OrderStatus};

    use crate::store::{InMemoryOrderStore, InMemoryProductStore};

    struct Harness {
        products: Arc<InMemoryProductStore>,
        orders: Arc<InMemoryOrderStore>,
        clock: Arc<FixedClock>,
        catalog: CatalogService,
        service: OrderService,
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    fn money(s: &str) -> Money {
        s.parse().unwrap()
    }

    async fn harness() -> Harness {
        let products = Arc::new(InMemoryProductStore::new());
        let orders = Arc::new(InMemoryOrderStore::new());
        let clock = Arc::new(FixedClock::at(t0()));
        let catalog = CatalogService::new(products.clone());
        let service = OrderService::new(orders.clone(), catalog.clone(), clock.clone());

        for (name, price) in [("Laptop", "1200.00"), ("Phone", "1500.00"), ("Mouse", "25.50")] {
            catalog
                .upsert_product(UpsertProduct {
                    id: None,
                    name: name.to_string(),
                    price: money(price),
                    version: None,
                })
                .await
                .unwrap();
        }

        Harness {
            products,
            orders,
            clock,
            catalog,
            service,
        }
    }

    fn request(customer: &str, items: &[(&str, i64)]) -> CreateOrder {
        CreateOrder {
            customer_name: customer.to_string(),
            items: items
                .iter()
                .map(|(name, quantity)| OrderItemRequest {
                    product_name: name.to_string(),
                    quantity: *quantity,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn create_order_snapshots_prices_and_computes_totals() {
        let h = harness().await;
        let order = h
            .service
            .create_order(request("Alice", &[("laptop", 1)]))
            .await
            .unwrap();

        assert_eq!(order.status(), OrderStatus::Created);
        assert_eq!(order.order_date(), t0());
        assert_eq!(order.lines()[0].product_name, "Laptop");
        assert_eq!(order.lines()[0].unit_price, money("1200.00"));
        assert_eq!(order.totals().subtotal, money("1200.00"));
        assert_eq!(order.totals().vat, money("240.00"));
        assert_eq!(order.totals().total, money("1440.00"));

        let two_phones = h
            .service
            .create_order(request("Bob", &[("Phone", 2)]))
            .await
            .unwrap();
        assert_eq!(two_phones.totals().subtotal, money("3000.00"));
        assert_eq!(two_phones.totals().vat, money("600.00"));
        assert_eq!(two_phones.totals().total, money("3600.00"));
    }

    #[tokio::test]
    async fn refetch_returns_identical_order() {
        let h = harness().await;
        let created = h
            .service
            .create_order(request("Alice", &[("Laptop", 1), ("Mouse", 3)]))
            .await
            .unwrap();
        let fetched = h.service.get_order(created.id_typed()).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn later_price_change_does_not_touch_existing_orders() {
        let h = harness().await;
        let order = h
            .service
            .create_order(request("Alice", &[("Laptop", 1)]))
            .await
            .unwrap();

        let laptop = h.catalog.find_by_name("Laptop").await.unwrap();
        h.catalog
            .upsert_product(UpsertProduct {
                id: Some(laptop.id_typed()),
                name: "Laptop".to_string(),
                price: money("2000.00"),
                version: Some(laptop.version()),
            })
            .await
            .unwrap();

        let fetched = h.service.get_order(order.id_typed()).await.unwrap();
        assert_eq!(fetched.lines()[0].unit_price, money("1200.00"));
        assert_eq!(fetched.totals().total, money("1440.00"));
    }

    #[tokio::test]
    async fn unknown_product_persists_nothing() {
        let h = harness().await;
        let err = h
            .service
            .create_order(request("Alice", &[("Laptop", 1), ("Tablet", 1)]))
            .await
            .unwrap_err();

        match err {
            ServiceError::NotFound(msg) => assert!(msg.contains("Tablet")),
            other => panic!("Expected NotFound, got {other:?}"),
        }
        assert!(h.orders.is_empty());
        assert_eq!(h.orders.round_trips(), 0);
    }

    #[tokio::test]
    async fn malformed_request_is_rejected_before_any_lookup() {
        let h = harness().await;
        let lookups_before = h.products.round_trips();

        for bad in [
            request(" ", &[("Laptop", 1)]),
            request("Alice", &[]),
            request("Alice", &[("Laptop", 0)]),
            request("Alice", &[("Laptop", -2)]),
            request("Alice", &[("", 1)]),
        ] {
            assert!(matches!(
                h.service.create_order(bad).await,
                Err(ServiceError::Validation(_))
            ));
        }

        assert_eq!(h.products.round_trips(), lookups_before);
        assert!(h.orders.is_empty());
    }

    #[tokio::test]
    async fn cancel_sets_status_and_date_once() {
        let h = harness().await;
        let order = h
            .service
            .create_order(request("Alice", &[("Laptop", 1)]))
            .await
            .unwrap();

        h.clock.advance(Duration::hours(3));
        let cancelled = h.service.cancel_order(order.id_typed()).await.unwrap();
        assert_eq!(cancelled.status(), OrderStatus::Cancelled);
        assert_eq!(cancelled.cancellation_date(), Some(t0() + Duration::hours(3)));
        assert!(cancelled.cancellation_date().unwrap() >= cancelled.order_date());

        h.clock.advance(Duration::hours(1));
        let err = h.service.cancel_order(order.id_typed()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let stored = h.service.get_order(order.id_typed()).await.unwrap();
        assert_eq!(stored, cancelled);
    }

    #[tokio::test]
    async fn cancel_with_clock_behind_order_date_clamps_to_order_date() {
        let h = harness().await;
        let order = h
            .service
            .create_order(request("Alice", &[("Laptop", 1)]))
            .await
            .unwrap();

        h.clock.set(t0() - Duration::minutes(10));
        let cancelled = h.service.cancel_order(order.id_typed()).await.unwrap();
        assert_eq!(cancelled.cancellation_date(), Some(order.order_date()));
    }

    #[tokio::test]
    async fn cancel_and_get_unknown_order_are_not_found() {
        let h = harness().await;
        let id = OrderId::new();
        assert!(matches!(
            h.service.cancel_order(id).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            h.service.get_order(id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_cancels_let_exactly_one_win() {
        let h = harness().await;
        let order = h
            .service
            .create_order(request("Alice", &[("Laptop", 1)]))
            .await
            .unwrap();
        let id = order.id_typed();

        let a = {
            let service = h.service.clone();
            tokio::spawn(async move { service.cancel_order(id).await })
        };
        let b = {
            let service = h.service.clone();
            tokio::spawn(async move { service.cancel_order(id).await })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(ServiceError::Conflict(_))))
        );
        assert_eq!(h.service.get_order(id).await.unwrap().version(), 1);
    }

    async fn orders_on_consecutive_days(h: &Harness, n: i64) -> Vec<Order> {
        let mut placed = Vec::new();
        for day in 0..n {
            h.clock.set(t0() + Duration::days(day));
            placed.push(
                h.service
                    .create_order(request(&format!("Customer {day}"), &[("Mouse", 1)]))
                    .await
                    .unwrap(),
            );
        }
        placed
    }

    #[tokio::test]
    async fn created_range_is_inclusive() {
        let h = harness().await;
        let placed = orders_on_consecutive_days(&h, 5).await;

        let query = OrderQuery {
            created_start: Some(t0() + Duration::days(1)),
            created_end: Some(t0() + Duration::days(3)),
            ..OrderQuery::default()
        };
        let page = h.service.list_orders(&query, &PageRequest::default()).await.unwrap();

        let ids: Vec<OrderId> = page.content.iter().map(|o| o.id_typed()).collect();
        let expected: Vec<OrderId> = placed[1..=3].iter().map(|o| o.id_typed()).collect();
        assert_eq!(ids, expected);
        assert_eq!(page.total_elements, 3);
    }

    #[tokio::test]
    async fn no_ranges_lists_everything_respecting_pagination() {
        let h = harness().await;
        orders_on_consecutive_days(&h, 5).await;

        let page = h
            .service
            .list_orders(&OrderQuery::default(), &PageRequest::new(Some(1), Some(2), None).unwrap())
            .await
            .unwrap();
        assert_eq!(page.total_elements, 5);
        assert_eq!(page.total_pages, 3);
        let names: Vec<&str> = page.content.iter().map(|o| o.customer_name()).collect();
        assert_eq!(names, vec!["Customer 2", "Customer 3"]);
    }

    #[tokio::test]
    async fn cancelled_range_only_returns_cancelled_orders() {
        let h = harness().await;
        let placed = orders_on_consecutive_days(&h, 3).await;
        h.clock.set(t0() + Duration::days(10));
        h.service.cancel_order(placed[0].id_typed()).await.unwrap();

        let query = OrderQuery {
            cancelled_start: Some(t0()),
            cancelled_end: Some(t0() + Duration::days(30)),
            ..OrderQuery::default()
        };
        let page = h.service.list_orders(&query, &PageRequest::default()).await.unwrap();
        assert_eq!(page.content.len(), 1);
        assert_eq!(page.content[0].id_typed(), placed[0].id_typed());
        assert!(page.content[0].is_cancelled());
    }

    #[tokio::test]
    async fn listing_uses_one_store_call_whatever_the_page_size() {
        let h = harness().await;
        orders_on_consecutive_days(&h, 12).await;

        for size in [1, 5, 50] {
            let before = h.orders.round_trips();
            let page = h
                .service
                .list_orders(&OrderQuery::default(), &PageRequest::new(None, Some(size), None).unwrap())
                .await
                .unwrap();
            assert_eq!(h.orders.round_trips() - before, 1);
            assert!(page.content.iter().all(|o| !o.lines().is_empty()));
        }
    }
}
