//! Application services: the only entry points the HTTP layer calls.
//!
//! Each public method is one unit of work against the stores. Domain rules live
//! in the domain crates; services fetch, decide, persist, and log.

pub mod catalog;
pub mod orders;

use thiserror::Error;

use salesdesk_core::DomainError;

use crate::store::StoreError;

pub use catalog::CatalogService;
pub use orders::OrderService;

/// Error returned by every service operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Malformed input, rejected before anything is persisted.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The referenced order or product does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Duplicate name, already-cancelled order, or stale version.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Stored state breaks a domain invariant.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// The store failed (connection, query, decoding).
    #[error("store failure: {0}")]
    Store(String),
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => ServiceError::Validation(msg),
            DomainError::InvalidId(msg) => ServiceError::Validation(msg),
            DomainError::InvariantViolation(msg) => ServiceError::InvariantViolation(msg),
            DomainError::NotFound(msg) => ServiceError::NotFound(msg),
            DomainError::Conflict(msg) => ServiceError::Conflict(msg),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Duplicate(msg) => ServiceError::Conflict(msg),
            StoreError::VersionConflict(msg) => ServiceError::Conflict(format!("stale version: {msg}")),
            StoreError::NotFound(msg) => ServiceError::NotFound(format!("{msg} not found")),
            StoreError::Corrupt(err) => ServiceError::InvariantViolation(err.to_string()),
            StoreError::Backend(msg) => ServiceError::Store(msg),
        }
    }
}

/// Log a rejected operation at the level its kind deserves, then hand it back.
fn rejected(operation: &'static str, err: ServiceError) -> ServiceError {
    match &err {
        ServiceError::Store(_) | ServiceError::InvariantViolation(_) => {
            tracing::error!(operation, error = %err, "operation failed");
        }
        _ => tracing::warn!(operation, error = %err, "operation rejected"),
    }
    err
}
