//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity and are immutable: two instances holding the
/// same values are interchangeable. `Money` and the order totals are value
/// objects; orders and catalog entries are aggregates.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
