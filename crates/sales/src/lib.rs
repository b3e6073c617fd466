//! Sales Orders domain module.
//!
//! Orders with price snapshots, their VAT totals, the cancellation lifecycle,
//! and the date-range filter used by listings. Pure domain logic (no IO, no
//! HTTP, no storage).

pub mod order;
pub mod query;
pub mod totals;

pub use order::{CreateOrder, Order, OrderItemRequest, OrderLine, OrderRecord, OrderStatus};
pub use query::{DateRange, OrderFilter, OrderQuery, compose};
pub use totals::{OrderTotals, VAT_RATE};
