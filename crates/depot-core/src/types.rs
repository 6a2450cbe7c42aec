//! # Domain Types
//!
//! Reference catalog and stock ledger types.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Reference Catalog (read-only to the engine)                           │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │    Product      │   │   Warehouse     │                             │
//! │  │  cost_price     │   │  name           │                             │
//! │  │  min_quantity   │   │  is_active      │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! │                                                                         │
//! │  Stock Ledger (mutated only by transitions and reservations)           │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │   StockEntry    │   │  StockMovement  │                             │
//! │  │  quantity       │◄──│  quantity_delta │  one row per applied delta  │
//! │  │  reserved       │   │  document_id    │                             │
//! │  │  amount_cents   │   │  occurred_at    │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ledger invariant
//! `available = quantity - reserved`. `quantity` may go negative (a tracked
//! warning condition) and `reserved` is never capped by `quantity`.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::document::DocumentKind;
use crate::money::Money;

// =============================================================================
// Actor
// =============================================================================

/// The authenticated identity performing an operation.
///
/// Authentication happens outside the engine; only the id is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Actor {
    pub id: String,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Actor { id: id.into() }
    }

    /// Actor used for work the engine performs on its own behalf.
    pub fn system() -> Self {
        Actor::new("system")
    }
}

// =============================================================================
// Reference Catalog
// =============================================================================

/// How a product is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    /// Pieces, boxes. Quantities are whole items.
    Countable,
    /// Weight or volume. Quantities are in the unit's smallest step
    /// (grams, millilitres).
    Measured,
}

impl Default for UnitType {
    fn default() -> Self {
        UnitType::Countable
    }
}

/// A catalog product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub name: String,
    /// Display unit ("pcs", "kg").
    pub unit: String,
    pub unit_type: UnitType,
    /// Cost price in base currency minor units.
    pub cost_price_cents: i64,
    pub selling_price_cents: i64,
    /// Procurement threshold: stock below this is critical.
    pub min_quantity: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn cost_price(&self) -> Money {
        Money::from_cents(self.cost_price_cents)
    }

    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::from_cents(self.selling_price_cents)
    }
}

/// A stock location.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Warehouse {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Stock Ledger
// =============================================================================

/// Ledger row for one (product, warehouse) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockEntry {
    pub product_id: String,
    pub warehouse_id: String,
    /// On hand. May be negative.
    pub quantity: i64,
    /// Earmarked for confirmed-but-unshipped customer orders.
    pub reserved: i64,
    /// Inventory value in base currency minor units.
    pub amount_cents: i64,
    /// Bumped on every write.
    pub version: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl StockEntry {
    /// The entry of a pair that has never been touched.
    pub fn empty(
        product_id: impl Into<String>,
        warehouse_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        StockEntry {
            product_id: product_id.into(),
            warehouse_id: warehouse_id.into(),
            quantity: 0,
            reserved: 0,
            amount_cents: 0,
            version: 0,
            updated_at: now,
        }
    }

    /// `quantity - reserved`.
    #[inline]
    pub fn available(&self) -> i64 {
        self.quantity - self.reserved
    }

    #[inline]
    pub fn is_negative(&self) -> bool {
        self.quantity < 0
    }

    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

/// One applied ledger delta. The journal that turnover is replayed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub warehouse_id: String,
    pub document_id: String,
    pub document_kind: DocumentKind,
    pub quantity_delta: i64,
    pub amount_delta_cents: i64,
    pub actor_id: String,
    #[ts(as = "String")]
    pub occurred_at: DateTime<Utc>,
}

impl StockMovement {
    #[inline]
    pub fn is_incoming(&self) -> bool {
        self.quantity_delta > 0
    }
}

// =============================================================================
// Report Period
// =============================================================================

/// Inclusive range of calendar days (UTC) bounding a report query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DateRange {
    #[ts(as = "String")]
    pub from: NaiveDate,
    #[ts(as = "String")]
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        DateRange { from, to }
    }

    /// A range covering a single day.
    pub fn day(day: NaiveDate) -> Self {
        DateRange { from: day, to: day }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.from <= day && day <= self.to
    }

    pub fn is_valid(&self) -> bool {
        self.from <= self.to
    }

    /// First instant of the range.
    pub fn start(&self) -> DateTime<Utc> {
        self.from.and_time(NaiveTime::MIN).and_utc()
    }

    /// First instant after the range (exclusive bound).
    pub fn end(&self) -> DateTime<Utc> {
        (self.to + Duration::days(1)).and_time(NaiveTime::MIN).and_utc()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
