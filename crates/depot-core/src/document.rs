//! # Documents
//!
//! Business documents that mutate the stock ledger.
//!
//! ## Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Document                                                               │
//! │  ├── common header: id, number, counterpart, warehouse, date,          │
//! │  │                  currency + rate, status, total, audit fields       │
//! │  ├── lines: Vec<LineItem>   (name snapshot, qty × price)               │
//! │  └── details: DocumentDetails   ← tagged union, one arm per kind       │
//! │                                   holds links to derived documents     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cross-document references are plain ids (`order_id`, `transfer_id`, ...).
//! Documents never embed each other.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::{ExchangeRate, Money};

// =============================================================================
// Document Kind
// =============================================================================

/// Every document variant the engine knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    PurchaseOrder,
    Receipt,
    SupplierReturn,
    CustomerOrder,
    Shipment,
    CustomerReturn,
    InternalOrder,
    Transfer,
    InventoryCount,
    WriteOff,
    Payment,
    SupplierInvoice,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 12] = [
        DocumentKind::PurchaseOrder,
        DocumentKind::Receipt,
        DocumentKind::SupplierReturn,
        DocumentKind::CustomerOrder,
        DocumentKind::Shipment,
        DocumentKind::CustomerReturn,
        DocumentKind::InternalOrder,
        DocumentKind::Transfer,
        DocumentKind::InventoryCount,
        DocumentKind::WriteOff,
        DocumentKind::Payment,
        DocumentKind::SupplierInvoice,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::PurchaseOrder => "purchase_order",
            DocumentKind::Receipt => "receipt",
            DocumentKind::SupplierReturn => "supplier_return",
            DocumentKind::CustomerOrder => "customer_order",
            DocumentKind::Shipment => "shipment",
            DocumentKind::CustomerReturn => "customer_return",
            DocumentKind::InternalOrder => "internal_order",
            DocumentKind::Transfer => "transfer",
            DocumentKind::InventoryCount => "inventory_count",
            DocumentKind::WriteOff => "write_off",
            DocumentKind::Payment => "payment",
            DocumentKind::SupplierInvoice => "supplier_invoice",
        }
    }

    /// Prefix of the human-readable document number.
    pub fn number_prefix(&self) -> &'static str {
        match self {
            DocumentKind::PurchaseOrder => "PO",
            DocumentKind::Receipt => "RC",
            DocumentKind::SupplierReturn => "SR",
            DocumentKind::CustomerOrder => "CO",
            DocumentKind::Shipment => "SH",
            DocumentKind::CustomerReturn => "CR",
            DocumentKind::InternalOrder => "IO",
            DocumentKind::Transfer => "TR",
            DocumentKind::InventoryCount => "IC",
            DocumentKind::WriteOff => "WO",
            DocumentKind::Payment => "PY",
            DocumentKind::SupplierInvoice => "SI",
        }
    }

    /// Who sits on the other side of the document, if anyone.
    pub fn counterpart_role(&self) -> Option<CounterpartRole> {
        match self {
            DocumentKind::PurchaseOrder
            | DocumentKind::Receipt
            | DocumentKind::SupplierReturn
            | DocumentKind::SupplierInvoice => Some(CounterpartRole::Supplier),
            DocumentKind::CustomerOrder
            | DocumentKind::Shipment
            | DocumentKind::CustomerReturn => Some(CounterpartRole::Customer),
            DocumentKind::Payment => None, // direction decides
            DocumentKind::InternalOrder
            | DocumentKind::Transfer
            | DocumentKind::InventoryCount
            | DocumentKind::WriteOff => None,
        }
    }

    /// Whether lines carry a negotiated price (otherwise cost price is used).
    pub fn is_priced(&self) -> bool {
        matches!(
            self,
            DocumentKind::PurchaseOrder
                | DocumentKind::Receipt
                | DocumentKind::SupplierReturn
                | DocumentKind::CustomerOrder
                | DocumentKind::Shipment
                | DocumentKind::CustomerReturn
                | DocumentKind::SupplierInvoice
        )
    }

    /// Whether the document carries line items at all.
    pub fn has_lines(&self) -> bool {
        !matches!(self, DocumentKind::Payment)
    }

    /// Kinds that only the engine creates, as a side effect of a transition.
    pub fn is_derived_only(&self) -> bool {
        matches!(self, DocumentKind::Transfer | DocumentKind::Shipment)
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("Unknown document kind: '{}'", s))
    }
}

/// Side of a trade relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CounterpartRole {
    Supplier,
    Customer,
}

// =============================================================================
// Document Status
// =============================================================================

/// Union of the statuses used across all document machines.
///
/// Which statuses a kind actually uses, and how it moves between them, is
/// declared in [`crate::machine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    Pending,
    New,
    Confirmed,
    Received,
    Shipped,
    Fulfilled,
    Accepted,
    Approved,
    Partial,
    Completed,
    Posted,
    Cancelled,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Pending => "pending",
            DocumentStatus::New => "new",
            DocumentStatus::Confirmed => "confirmed",
            DocumentStatus::Received => "received",
            DocumentStatus::Shipped => "shipped",
            DocumentStatus::Fulfilled => "fulfilled",
            DocumentStatus::Accepted => "accepted",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Partial => "partial",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Posted => "posted",
            DocumentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Line Item
// =============================================================================

/// A document line.
///
/// ## Snapshot Pattern
/// `product_name` is copied from the catalog when the line is written and is
/// never re-synced, so historical documents stay stable.
///
/// `line_total_cents` is always `quantity × unit_price_cents`; it is
/// recomputed on every edit and never accepted from the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineItem {
    pub product_id: String,
    pub product_name: String,
    /// Ordered / requested quantity. For inventory counts: the actual count.
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
    /// Internal orders: quantity actually sent from the source warehouse.
    /// Customer orders: quantity shipped so far, maintained by the engine.
    pub shipped_quantity: Option<i64>,
    /// Inventory counts: ledger quantity the count is compared against.
    pub system_quantity: Option<i64>,
    /// Inventory counts: `actual - system`, frozen at confirmation.
    pub difference: Option<i64>,
}

impl LineItem {
    pub fn new(
        product_id: impl Into<String>,
        product_name: impl Into<String>,
        quantity: i64,
        unit_price_cents: i64,
    ) -> Self {
        let mut line = LineItem {
            product_id: product_id.into(),
            product_name: product_name.into(),
            quantity,
            unit_price_cents,
            line_total_cents: 0,
            shipped_quantity: None,
            system_quantity: None,
            difference: None,
        };
        line.recompute();
        line
    }

    /// Recomputes the line total from its inputs.
    pub fn recompute(&mut self) {
        self.line_total_cents = Money::from_cents(self.unit_price_cents)
            .multiply_quantity(self.quantity)
            .cents();
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }

    /// Quantity an internal-order line moves (shipped, else requested).
    pub fn transfer_quantity(&self) -> i64 {
        self.shipped_quantity.unwrap_or(self.quantity)
    }

    /// Customer-order quantity not shipped yet.
    pub fn unshipped(&self) -> i64 {
        (self.quantity - self.shipped_quantity.unwrap_or(0)).max(0)
    }
}

// =============================================================================
// Document Details
// =============================================================================

/// Direction of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentDirection {
    /// Money received from a customer.
    Incoming,
    /// Money paid to a supplier.
    Outgoing,
}

impl PaymentDirection {
    pub fn counterpart_role(&self) -> CounterpartRole {
        match self {
            PaymentDirection::Incoming => CounterpartRole::Customer,
            PaymentDirection::Outgoing => CounterpartRole::Supplier,
        }
    }
}

/// Variant-specific fields, including derived-document links.
///
/// A link being `Some` is the idempotency guard for the transition that
/// creates the companion document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentDetails {
    PurchaseOrder {
        /// Set exactly once when stock is received.
        #[ts(as = "Option<String>")]
        received_at: Option<DateTime<Utc>>,
        receipt_id: Option<String>,
    },
    Receipt {
        order_id: Option<String>,
        #[ts(as = "Option<String>")]
        confirmed_at: Option<DateTime<Utc>>,
    },
    SupplierReturn {
        receipt_id: Option<String>,
    },
    CustomerOrder {
        reserved: bool,
        paid_cents: i64,
        shipped_cents: i64,
    },
    Shipment {
        order_id: String,
    },
    CustomerReturn {
        order_id: Option<String>,
        #[ts(as = "Option<String>")]
        accepted_at: Option<DateTime<Utc>>,
    },
    InternalOrder {
        destination_warehouse_id: String,
        transfer_id: Option<String>,
    },
    Transfer {
        internal_order_id: String,
        destination_warehouse_id: String,
    },
    InventoryCount {
        #[ts(as = "Option<String>")]
        confirmed_at: Option<DateTime<Utc>>,
        writeoff_id: Option<String>,
        receipt_id: Option<String>,
    },
    WriteOff {
        inventory_count_id: Option<String>,
    },
    Payment {
        direction: PaymentDirection,
        order_id: Option<String>,
    },
    SupplierInvoice {
        receipt_id: Option<String>,
    },
}

impl DocumentDetails {
    pub fn kind(&self) -> DocumentKind {
        match self {
            DocumentDetails::PurchaseOrder { .. } => DocumentKind::PurchaseOrder,
            DocumentDetails::Receipt { .. } => DocumentKind::Receipt,
            DocumentDetails::SupplierReturn { .. } => DocumentKind::SupplierReturn,
            DocumentDetails::CustomerOrder { .. } => DocumentKind::CustomerOrder,
            DocumentDetails::Shipment { .. } => DocumentKind::Shipment,
            DocumentDetails::CustomerReturn { .. } => DocumentKind::CustomerReturn,
            DocumentDetails::InternalOrder { .. } => DocumentKind::InternalOrder,
            DocumentDetails::Transfer { .. } => DocumentKind::Transfer,
            DocumentDetails::InventoryCount { .. } => DocumentKind::InventoryCount,
            DocumentDetails::WriteOff { .. } => DocumentKind::WriteOff,
            DocumentDetails::Payment { .. } => DocumentKind::Payment,
            DocumentDetails::SupplierInvoice { .. } => DocumentKind::SupplierInvoice,
        }
    }
}

// =============================================================================
// Document
// =============================================================================

/// A persisted business document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Document {
    pub id: String,
    /// Sequential human-readable number, e.g. `PO-000042`.
    pub number: String,
    pub status: DocumentStatus,
    /// Supplier or customer id.
    pub counterpart_id: Option<String>,
    /// Source / target warehouse.
    pub warehouse_id: Option<String>,
    #[ts(as = "String")]
    pub date: NaiveDate,
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,
    pub currency: String,
    pub exchange_rate: ExchangeRate,
    pub lines: Vec<LineItem>,
    /// Σ line totals, or the payment amount for payments.
    pub total_cents: i64,
    pub details: DocumentDetails,
    pub notes: Option<String>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency version, bumped on every write.
    pub version: i64,
}

impl Document {
    #[inline]
    pub fn kind(&self) -> DocumentKind {
        self.details.kind()
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Total converted into base currency.
    pub fn base_total(&self) -> Money {
        self.exchange_rate.to_base(self.total())
    }

    /// Recomputes every line total and the document total.
    ///
    /// Payments have no lines; their total is the entered amount.
    pub fn recompute_totals(&mut self) {
        if !self.kind().has_lines() {
            return;
        }
        for line in &mut self.lines {
            line.recompute();
        }
        self.total_cents = self
            .lines
            .iter()
            .fold(0i64, |acc, l| acc.saturating_add(l.line_total_cents));
    }

    /// Warehouse id, or an empty string for documents without one.
    pub fn warehouse(&self) -> &str {
        self.warehouse_id.as_deref().unwrap_or_default()
    }

    /// Destination warehouse for internal orders and transfers.
    pub fn destination_warehouse(&self) -> Option<&str> {
        match &self.details {
            DocumentDetails::InternalOrder {
                destination_warehouse_id,
                ..
            }
            | DocumentDetails::Transfer {
                destination_warehouse_id,
                ..
            } => Some(destination_warehouse_id),
            _ => None,
        }
    }

    /// Counterpart role, resolving payments by direction.
    pub fn counterpart_role(&self) -> Option<CounterpartRole> {
        match &self.details {
            DocumentDetails::Payment { direction, .. } => Some(direction.counterpart_role()),
            other => other.kind().counterpart_role(),
        }
    }

    /// Quantities per product, merged across lines, in first-seen order.
    pub fn quantities_by_product(&self) -> Vec<(String, i64)> {
        merge_quantities(self.lines.iter().map(|l| (l.product_id.as_str(), l.quantity)))
    }
}

/// Sums quantities of repeated products, keeping first-seen order.
pub fn merge_quantities<'a>(items: impl Iterator<Item = (&'a str, i64)>) -> Vec<(String, i64)> {
    let mut merged: Vec<(String, i64)> = Vec::new();
    for (product_id, qty) in items {
        match merged.iter_mut().find(|(id, _)| id == product_id) {
            Some((_, total)) => *total += qty,
            None => merged.push((product_id.to_string(), qty)),
        }
    }
    merged
}

// =============================================================================
// Draft (validated payload)
// =============================================================================

/// A line as submitted by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineDraft {
    pub product_id: String,
    pub quantity: i64,
    /// Required for priced kinds; ignored otherwise (cost price is used).
    pub unit_price_cents: Option<i64>,
    /// Internal orders only.
    pub shipped_quantity: Option<i64>,
    /// Inventory counts only. Taken from the ledger when absent.
    pub system_quantity: Option<i64>,
}

impl LineDraft {
    pub fn new(product_id: impl Into<String>, quantity: i64, unit_price_cents: i64) -> Self {
        LineDraft {
            product_id: product_id.into(),
            quantity,
            unit_price_cents: Some(unit_price_cents),
            ..Default::default()
        }
    }

    /// Line without a negotiated price (internal orders, counts, write-offs).
    pub fn unpriced(product_id: impl Into<String>, quantity: i64) -> Self {
        LineDraft {
            product_id: product_id.into(),
            quantity,
            ..Default::default()
        }
    }
}

/// The payload for creating or editing a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DocumentDraft {
    pub counterpart_id: Option<String>,
    pub warehouse_id: Option<String>,
    /// Internal orders: receiving warehouse.
    pub destination_warehouse_id: Option<String>,
    /// Linked document: the order a receipt / return / payment refers to.
    pub reference_id: Option<String>,
    #[ts(as = "String")]
    pub date: NaiveDate,
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,
    pub currency: String,
    pub exchange_rate: ExchangeRate,
    pub lines: Vec<LineDraft>,
    /// Payments only: amount paid.
    pub amount_cents: Option<i64>,
    /// Payments only.
    pub direction: Option<PaymentDirection>,
    pub notes: Option<String>,
}

impl DocumentDraft {
    /// A draft in the given currency at rate 1.0, dated `date`.
    pub fn new(date: NaiveDate, currency: impl Into<String>) -> Self {
        DocumentDraft {
            counterpart_id: None,
            warehouse_id: None,
            destination_warehouse_id: None,
            reference_id: None,
            date,
            due_date: None,
            currency: currency.into(),
            exchange_rate: ExchangeRate::identity(),
            lines: Vec::new(),
            amount_cents: None,
            direction: None,
            notes: None,
        }
    }

    pub fn counterpart(mut self, id: impl Into<String>) -> Self {
        self.counterpart_id = Some(id.into());
        self
    }

    pub fn warehouse(mut self, id: impl Into<String>) -> Self {
        self.warehouse_id = Some(id.into());
        self
    }

    pub fn destination(mut self, id: impl Into<String>) -> Self {
        self.destination_warehouse_id = Some(id.into());
        self
    }

    pub fn reference(mut self, id: impl Into<String>) -> Self {
        self.reference_id = Some(id.into());
        self
    }

    pub fn due(mut self, date: NaiveDate) -> Self {
        self.due_date = Some(date);
        self
    }

    pub fn rate(mut self, rate: ExchangeRate) -> Self {
        self.exchange_rate = rate;
        self
    }

    pub fn line(mut self, line: LineDraft) -> Self {
        self.lines.push(line);
        self
    }

    pub fn payment(mut self, direction: PaymentDirection, amount_cents: i64) -> Self {
        self.direction = Some(direction);
        self.amount_cents = Some(amount_cents);
        self
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
