use std::sync::Arc;

use tracing::{info, instrument};

use salesdesk_core::{AggregateRoot, ProductId};
use salesdesk_products::{Product, UpsertIntent, UpsertProduct};

use super::{ServiceError, rejected};
use crate::cache::ReadThroughCache;
use crate::store::ProductStore;

/// Catalog writes (duplicate and stale-version detection) and cached reads.
///
/// Clones share the store and the listing cache, so an upsert through any
/// clone invalidates the listing for all of them.
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn ProductStore>,
    cache: Arc<ReadThroughCache<Vec<Product>>>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn ProductStore>) -> Self {
        Self::with_cache(store, Arc::new(ReadThroughCache::new("catalog")))
    }

    pub fn with_cache(store: Arc<dyn ProductStore>, cache: Arc<ReadThroughCache<Vec<Product>>>) -> Self {
        Self { store, cache }
    }

    pub fn cache(&self) -> &ReadThroughCache<Vec<Product>> {
        &self.cache
    }

    /// Create (no id) or update (id + version) a catalog entry.
    ///
    /// A successful write drops the whole listing cache.
    #[instrument(skip(self, cmd), fields(product_id = ?cmd.id, name = %cmd.name))]
    pub async fn upsert_product(&self, cmd: UpsertProduct) -> Result<Product, ServiceError> {
        let product = match self.write(&cmd).await {
            Ok(product) => product,
            Err(err) => return Err(rejected("upsert_product", err)),
        };
        self.cache.invalidate_all();
        Ok(product)
    }

    async fn write(&self, cmd: &UpsertProduct) -> Result<Product, ServiceError> {
        match cmd.intent()? {
            UpsertIntent::Create => {
                if let Some(existing) = self.store.find_by_name(&cmd.name).await? {
                    return Err(ServiceError::Conflict(format!(
                        "product with name '{}' already exists",
                        existing.name()
                    )));
                }
                let product = Product::create(ProductId::new(), &cmd.name, cmd.price)?;
                self.store.insert(&product).await?;
                info!(product_id = %product.id_typed(), price = %product.price(), "product created");
                Ok(product)
            }
            UpsertIntent::Update { id, expected } => {
                let current = self
                    .store
                    .get(id)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound(format!("product {id} not found")))?;
                let revised = current.revise(&cmd.name, cmd.price, expected)?;
                self.store.update(&revised, expected).await?;
                info!(
                    product_id = %id,
                    version = revised.version(),
                    price = %revised.price(),
                    "product updated"
                );
                Ok(revised)
            }
        }
    }

    /// All entries, from the cache when warm.
    pub async fn list_products(&self) -> Result<Vec<Product>, ServiceError> {
        let store = Arc::clone(&self.store);
        Ok(self.cache.get_or_load(|| async move { store.list().await }).await?)
    }

    /// Current state of one entry; never served from the cache.
    pub async fn get_product(&self, id: ProductId) -> Result<Product, ServiceError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {id} not found")))
    }

    /// Case-insensitive lookup; never served from the cache.
    pub async fn find_by_name(&self, name: &str) -> Result<Product, ServiceError> {
        self.store
            .find_by_name(name)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product '{}' not found", name.trim())))
    }
}
