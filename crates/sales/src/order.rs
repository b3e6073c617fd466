use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use salesdesk_core::{AggregateRoot, DomainError, DomainResult, Money, OrderId};

use crate::totals::OrderTotals;

/// Timestamps are kept at microsecond precision so they survive a database round trip.
const TIMESTAMP_DIGITS: u16 = 6;

/// Order status lifecycle: `CREATED → CANCELLED`, nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Created,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(OrderStatus::Created),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::invariant(format!("unknown order status '{other}'"))),
        }
    }
}

/// Order line: product name and unit price as they were when the order was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderLine {
    pub fn line_total(&self) -> DomainResult<Money> {
        self.unit_price.times(self.quantity)
    }
}

/// Command: CreateOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOrder {
    pub customer_name: String,
    pub items: Vec<OrderItemRequest>,
}

/// One requested line, before the catalog lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItemRequest {
    pub product_name: String,
    /// Signed so that zero and negative requests can be rejected rather than
    /// failing to deserialize.
    pub quantity: i64,
}

impl OrderItemRequest {
    /// The quantity as stored on an order line.
    pub fn checked_quantity(&self) -> DomainResult<u32> {
        if self.quantity <= 0 {
            return Err(DomainError::validation(format!(
                "quantity for '{}' must be positive (got {})",
                self.product_name, self.quantity
            )));
        }
        u32::try_from(self.quantity).map_err(|_| {
            DomainError::validation(format!(
                "quantity for '{}' is too large (got {})",
                self.product_name, self.quantity
            ))
        })
    }
}

impl CreateOrder {
    /// Shape checks that need no catalog access.
    pub fn validate(&self) -> DomainResult<()> {
        if self.customer_name.trim().is_empty() {
            return Err(DomainError::validation("customer name cannot be empty"));
        }
        if self.items.is_empty() {
            return Err(DomainError::validation("order must contain at least one item"));
        }
        for item in &self.items {
            if item.product_name.trim().is_empty() {
                return Err(DomainError::validation("product name cannot be empty"));
            }
            item.checked_quantity()?;
        }
        Ok(())
    }
}

/// Aggregate root: Order (header, lines, and totals persisted as one unit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    order_date: DateTime<Utc>,
    customer_name: String,
    lines: Vec<OrderLine>,
    totals: OrderTotals,
    status: OrderStatus,
    cancellation_date: Option<DateTime<Utc>>,
    version: u64,
}

/// Flat, store-facing form of an [`Order`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub id: OrderId,
    pub order_date: DateTime<Utc>,
    pub customer_name: String,
    pub lines: Vec<OrderLine>,
    pub subtotal: Money,
    pub vat: Money,
    pub total: Money,
    pub status: OrderStatus,
    pub cancellation_date: Option<DateTime<Utc>>,
    pub version: u64,
}

impl Order {
    /// A new `CREATED` order at version 0 with totals computed from `lines`.
    pub fn place(
        id: OrderId,
        customer_name: &str,
        lines: Vec<OrderLine>,
        order_date: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let customer_name = customer_name.trim();
        if customer_name.is_empty() {
            return Err(DomainError::validation("customer name cannot be empty"));
        }
        if lines.is_empty() {
            return Err(DomainError::validation("order must contain at least one item"));
        }
        if let Some(line) = lines.iter().find(|l| l.quantity == 0) {
            return Err(DomainError::validation(format!(
                "quantity for '{}' must be positive",
                line.product_name
            )));
        }

        let totals = OrderTotals::compute(&lines)?;
        Ok(Self {
            id,
            order_date: order_date.trunc_subsecs(TIMESTAMP_DIGITS),
            customer_name: customer_name.to_string(),
            lines,
            totals,
            status: OrderStatus::Created,
            cancellation_date: None,
            version: 0,
        })
    }

    /// Rebuild an order from stored state, refusing state that breaks an order invariant.
    pub fn restore(record: OrderRecord) -> DomainResult<Self> {
        let id = record.id;
        if record.lines.is_empty() {
            return Err(DomainError::invariant(format!("order {id} has no lines")));
        }

        let expected = OrderTotals::compute(&record.lines)?;
        let stored = OrderTotals {
            subtotal: record.subtotal,
            vat: record.vat,
            total: record.total,
        };
        if stored != expected {
            return Err(DomainError::invariant(format!(
                "order {id} totals {}/{}/{} disagree with its lines ({}/{}/{})",
                stored.subtotal,
                stored.vat,
                stored.total,
                expected.subtotal,
                expected.vat,
                expected.total
            )));
        }

        match (record.status, record.cancellation_date) {
            (OrderStatus::Created, None) => {}
            (OrderStatus::Cancelled, Some(at)) if at >= record.order_date => {}
            (OrderStatus::Cancelled, Some(_)) => {
                return Err(DomainError::invariant(format!(
                    "order {id} was cancelled before it was placed"
                )));
            }
            (status, _) => {
                return Err(DomainError::invariant(format!(
                    "order {id} status {status} disagrees with its cancellation date"
                )));
            }
        }

        Ok(Self {
            id,
            order_date: record.order_date,
            customer_name: record.customer_name,
            lines: record.lines,
            totals: stored,
            status: record.status,
            cancellation_date: record.cancellation_date,
            version: record.version,
        })
    }

    pub fn to_record(&self) -> OrderRecord {
        OrderRecord {
            id: self.id,
            order_date: self.order_date,
            customer_name: self.customer_name.clone(),
            lines: self.lines.clone(),
            subtotal: self.totals.subtotal,
            vat: self.totals.vat,
            total: self.totals.total,
            status: self.status,
            cancellation_date: self.cancellation_date,
            version: self.version,
        }
    }

    /// The order after cancellation at `now`.
    ///
    /// The cancellation date never precedes the order date, even if `now` does
    /// (clock skew between nodes).
    pub fn cancel(&self, now: DateTime<Utc>) -> DomainResult<Self> {
        if self.status == OrderStatus::Cancelled {
            return Err(DomainError::conflict(format!(
                "order {} is already cancelled",
                self.id
            )));
        }

        let at = now.trunc_subsecs(TIMESTAMP_DIGITS).max(self.order_date);
        Ok(Self {
            status: OrderStatus::Cancelled,
            cancellation_date: Some(at),
            version: self.version + 1,
            ..self.clone()
        })
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn order_date(&self) -> DateTime<Utc> {
        self.order_date
    }

    pub fn customer_name(&self) -> &str {
        &self.customer_name
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn totals(&self) -> OrderTotals {
        self.totals
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn cancellation_date(&self) -> Option<DateTime<Utc>> {
        self.cancellation_date
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == OrderStatus::Cancelled
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
