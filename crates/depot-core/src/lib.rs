//! # depot-core: Pure Domain Logic for Depot
//!
//! Documents, status machines, stock policy and report arithmetic for the
//! inventory engine, with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Depot Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                depot-engine (Transition Engine)                 │   │
//! │  │    create / update / transition / reserve / reports            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ depot-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────────────┐  │   │
//! │  │   │ document │ │ machine  │ │  policy  │ │     report       │  │   │
//! │  │   │  kinds   │ │  tables  │ │ hard/soft│ │ debt / turnover  │  │   │
//! │  │   │  lines   │ │ effects  │ │ warnings │ │ forecast         │  │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK READS IN LOGIC               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    depot-db (Database Layer)                    │   │
//! │  │        SQLite ledger, journal, documents, reservations          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Catalog and ledger types (Product, Warehouse, StockEntry)
//! - [`document`] - Document kinds, statuses, lines, drafts
//! - [`machine`] - Per-kind transition tables and the generic executor
//! - [`policy`] - Hard-block vs soft-warn stock checks
//! - [`reservation`] - Reservation planning arithmetic
//! - [`report`] - Debts, turnover, procurement forecast
//! - [`money`] - Integer money and fixed-point exchange rates
//! - [`validation`] - Payload validation with field paths
//! - [`error`] - Domain error types

// =============================================================================
// Module Declarations
// =============================================================================

pub mod document;
pub mod error;
pub mod machine;
pub mod money;
pub mod policy;
pub mod report;
pub mod reservation;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use document::{
    merge_quantities, CounterpartRole, Document, DocumentDetails, DocumentDraft, DocumentKind,
    DocumentStatus, LineDraft, LineItem, PaymentDirection,
};
pub use error::{CoreError, CoreResult, ErrorCategory, StockShortfall, ValidationError};
pub use money::{ExchangeRate, Money};
pub use policy::{StockPolicy, StockWarning, WarningKind};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Upper bound on lines per document.
pub const MAX_LINES_PER_DOCUMENT: usize = 500;

/// Upper bound on a line quantity. Keeps `quantity × price` summed over
/// [`MAX_LINES_PER_DOCUMENT`] lines inside `i64`.
pub const MAX_LINE_QUANTITY: i64 = 100_000_000;

/// Upper bound on a unit or catalog price, in minor units.
pub const MAX_PRICE_CENTS: i64 = 100_000_000;

/// Upper bound on a payment amount, in minor units.
pub const MAX_PAYMENT_CENTS: i64 = 1_000_000_000_000_000;

/// Maximum length of free-text notes.
pub const MAX_NOTES_LENGTH: usize = 1000;

/// Days ahead of the due date at which a debt becomes "due soon".
pub const DEFAULT_DUE_SOON_DAYS: i64 = 3;

/// Window of the trailing shipped average used by the forecast.
pub const DEFAULT_TRAILING_DAYS: i64 = 7;
