//! Aggregate root trait and optimistic concurrency primitives.

use crate::error::{DomainError, DomainResult};

/// Aggregate root marker + minimal interface.
///
/// Aggregates are persisted and fetched as one unit. The version is the row
/// version the store compares before applying a conditional write.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Monotonically increasing version of the aggregate's persisted state.
    ///
    /// Starts at 0 for a freshly created aggregate and grows by exactly one per
    /// successful write.
    fn version(&self) -> u64;
}

/// Version a writer last observed; the write only applies if the stored row
/// is still at this version.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExpectedVersion(pub u64);

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        self.0 == actual
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "stale version (expected: {}, actual: {actual})",
                self.0
            )))
        }
    }

    /// Version the row carries after a successful conditional write.
    pub fn next(self) -> u64 {
        self.0 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_passes_on_equal_versions() {
        assert!(ExpectedVersion(3).check(3).is_ok());
        assert_eq!(ExpectedVersion(3).next(), 4);
    }

    #[test]
    fn check_reports_stale_version_as_conflict() {
        let err = ExpectedVersion(1).check(2).unwrap_err();
        match err {
            DomainError::Conflict(msg) => assert!(msg.contains("stale version")),
            other => panic!("expected Conflict, got {other:?}"),
        }
    }
}
