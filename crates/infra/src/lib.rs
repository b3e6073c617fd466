//! Infrastructure layer: stores, the catalog cache, and the services that
//! orchestrate domain rules over them.

pub mod cache;
pub mod pagination;
pub mod services;
pub mod store;

pub use cache::{CacheStats, ReadThroughCache};
pub use pagination::{Direction, Page, PageRequest, Sort, SortField};
pub use services::{CatalogService, OrderService, ServiceError};
pub use store::{OrderStore, ProductStore, StoreError};
