//! Products domain module.
//!
//! Catalog entries and the rules for writing them, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage). Name uniqueness needs
//! a view of the whole catalog and is enforced by the store and `CatalogService`.

pub mod product;

pub use product::{Product, UpsertIntent, UpsertProduct, name_key};
