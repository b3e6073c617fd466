//! Listing filters over the order and cancellation dates.
//!
//! `compose` is the only place that decides which ranges apply; the stores
//! either call [`OrderFilter::matches`] or translate the same filter to SQL.

use chrono::{DateTime, Utc};

use crate::order::Order;

/// Inclusive `[start, end]` interval. An inverted interval contains nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Both bounds or nothing.
    pub fn from_bounds(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Option<Self> {
        match (start, end) {
            (Some(start), Some(end)) => Some(Self { start, end }),
            _ => None,
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }
}

/// Raw listing parameters as they arrive from the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderQuery {
    pub created_start: Option<DateTime<Utc>>,
    pub created_end: Option<DateTime<Utc>>,
    pub cancelled_start: Option<DateTime<Utc>>,
    pub cancelled_end: Option<DateTime<Utc>>,
}

impl OrderQuery {
    pub fn filter(&self) -> OrderFilter {
        compose(
            self.created_start,
            self.created_end,
            self.cancelled_start,
            self.cancelled_end,
        )
    }
}

/// Conjunction of the supplied ranges; `None` means "no constraint".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub created: Option<DateRange>,
    pub cancelled: Option<DateRange>,
}

impl OrderFilter {
    pub fn unconstrained() -> Self {
        Self::default()
    }

    pub fn is_unconstrained(&self) -> bool {
        self.created.is_none() && self.cancelled.is_none()
    }

    /// True if the filter can never match, whatever is stored.
    pub fn matches_nothing(&self) -> bool {
        self.created.is_some_and(|r| r.is_empty()) || self.cancelled.is_some_and(|r| r.is_empty())
    }

    pub fn matches(&self, order: &Order) -> bool {
        if let Some(range) = self.created {
            if !range.contains(order.order_date()) {
                return false;
            }
        }
        if let Some(range) = self.cancelled {
            match order.cancellation_date() {
                Some(at) if range.contains(at) => {}
                _ => return false,
            }
        }
        true
    }
}

/// Build the listing filter from optional bounds.
///
/// A range takes effect only when both of its bounds are present; a lone bound
/// is ignored.
pub fn compose(
    created_start: Option<DateTime<Utc>>,
    created_end: Option<DateTime<Utc>>,
    cancelled_start: Option<DateTime<Utc>>,
    cancelled_end: Option<DateTime<Utc>>,
) -> OrderFilter {
    OrderFilter {
        created: DateRange::from_bounds(created_start, created_end),
        cancelled: DateRange::from_bounds(cancelled_start, cancelled_end),
    }
}
