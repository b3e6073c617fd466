//! Composition root: builds the stores and services once at startup.

use std::sync::Arc;

use salesdesk_core::{Clock, SystemClock};
use salesdesk_infra::store::postgres::{self, PostgresOrderStore, PostgresProductStore};
use salesdesk_infra::store::{InMemoryOrderStore, InMemoryProductStore, OrderStore, ProductStore};
use salesdesk_infra::{CatalogService, OrderService};

use crate::config::{AppConfig, StorageConfig};

/// Services shared by every handler (cloned into each request via `Extension`).
#[derive(Clone)]
pub struct AppServices {
    pub catalog: CatalogService,
    pub orders: OrderService,
}

impl AppServices {
    /// Wire both services over the given stores.
    ///
    /// The order service gets a clone of the catalog service, so both see the
    /// same listing cache.
    pub fn new(products: Arc<dyn ProductStore>, orders: Arc<dyn OrderStore>, clock: Arc<dyn Clock>) -> Self {
        let catalog = CatalogService::new(products);
        let orders = OrderService::new(orders, catalog.clone(), clock);
        Self { catalog, orders }
    }

    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::new(
            Arc::new(InMemoryProductStore::new()),
            Arc::new(InMemoryOrderStore::new()),
            clock,
        )
    }
}

pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match &config.storage {
        StorageConfig::InMemory => {
            tracing::warn!("DATABASE_URL not set; using in-memory stores");
            Ok(AppServices::in_memory(clock))
        }
        StorageConfig::Postgres {
            database_url,
            max_connections,
        } => {
            let pool = postgres::connect(database_url, *max_connections).await?;
            postgres::ensure_schema(&pool).await?;
            tracing::info!(max_connections, "connected to postgres");
            Ok(AppServices::new(
                Arc::new(PostgresProductStore::new(pool.clone())),
                Arc::new(PostgresOrderStore::new(pool)),
                clock,
            ))
        }
    }
}
