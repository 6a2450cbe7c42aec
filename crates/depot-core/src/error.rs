//! # Error Types
//!
//! Domain-specific error types for depot-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  depot-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Field-level payload problems                   │
//! │                                                                         │
//! │  depot-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  depot-engine errors                                                   │
//! │  └── EngineError      - What callers see, with an ErrorCategory        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → EngineError → Caller    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Soft conditions (over-reservation, negative resulting stock) are NOT
//! errors. They travel as [`StockWarning`](crate::policy::StockWarning)
//! values next to a successful result.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::document::{DocumentKind, DocumentStatus};

// =============================================================================
// Error Category
// =============================================================================

/// The caller-facing classification of every failure the engine reports.
///
/// Every failure is scoped to one document operation; none is fatal to
/// the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Malformed or incomplete payload.
    ValidationFailed,
    /// Status not reachable from the current state (or document locked).
    InvalidTransition,
    /// Hard stock policy blocked the operation.
    InsufficientStock,
    /// Idempotency guard tripped; nothing was changed.
    AlreadyProcessed,
    /// Referenced document or catalog entry does not exist.
    NotFound,
    /// Persistence failure; the whole operation may be retried.
    StorageUnavailable,
}

// =============================================================================
// Core Error
// =============================================================================

/// Per-line shortfall reported with [`CoreError::InsufficientStock`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockShortfall {
    pub product_id: String,
    pub warehouse_id: String,
    pub requested: i64,
    pub available: i64,
}

impl StockShortfall {
    /// Quantity missing to satisfy the request.
    pub fn shortfall(&self) -> i64 {
        self.requested - self.available
    }
}

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// One or more payload fields are invalid.
    #[error("Validation failed: {}", join_validation(.0))]
    Validation(Vec<ValidationError>),

    /// The target status is not an allowed successor of the current one.
    ///
    /// ## User Workflow
    /// ```text
    /// PurchaseOrder (pending)
    ///      │
    ///      ▼
    /// transition → received
    ///      │
    ///      ▼
    /// InvalidTransition { from: pending, to: received, allowed: [confirmed, cancelled] }
    /// ```
    #[error("{kind} cannot move from {from} to {to} (allowed: {})", join_statuses(.allowed))]
    InvalidTransition {
        kind: DocumentKind,
        from: DocumentStatus,
        to: DocumentStatus,
        allowed: Vec<DocumentStatus>,
    },

    /// The document is past its editable statuses.
    #[error("{kind} {document_id} is {status} and can no longer be changed (editable in: {})", join_statuses(.editable))]
    NotEditable {
        kind: DocumentKind,
        document_id: String,
        status: DocumentStatus,
        editable: Vec<DocumentStatus>,
    },

    /// A hard-block stock policy rejected the operation.
    #[error("Insufficient stock: {}", join_shortfalls(.shortfalls))]
    InsufficientStock { shortfalls: Vec<StockShortfall> },

    /// The customer order already holds a reservation.
    #[error("Order {order_id} is already reserved")]
    AlreadyReserved { order_id: String },

    /// An idempotency guard tripped (derived document or flag already set).
    #[error("{action} was already applied to {document_id}")]
    AlreadyProcessed { document_id: String, action: String },

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates an AlreadyProcessed error.
    pub fn already_processed(document_id: impl Into<String>, action: impl Into<String>) -> Self {
        CoreError::AlreadyProcessed {
            document_id: document_id.into(),
            action: action.into(),
        }
    }

    /// Maps the error onto the caller-facing taxonomy.
    pub fn category(&self) -> ErrorCategory {
        match self {
            CoreError::Validation(_) => ErrorCategory::ValidationFailed,
            CoreError::InvalidTransition { .. } | CoreError::NotEditable { .. } => {
                ErrorCategory::InvalidTransition
            }
            CoreError::InsufficientStock { .. } => ErrorCategory::InsufficientStock,
            CoreError::AlreadyReserved { .. } | CoreError::AlreadyProcessed { .. } => {
                ErrorCategory::AlreadyProcessed
            }
            CoreError::NotFound { .. } => ErrorCategory::NotFound,
        }
    }
}

impl From<ValidationError> for CoreError {
    fn from(err: ValidationError) -> Self {
        CoreError::Validation(vec![err])
    }
}

impl From<Vec<ValidationError>> for CoreError {
    fn from(errs: Vec<ValidationError>) -> Self {
        CoreError::Validation(errs)
    }
}

fn join_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_statuses(statuses: &[DocumentStatus]) -> String {
    if statuses.is_empty() {
        return "none".to_string();
    }
    statuses
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_shortfalls(shortfalls: &[StockShortfall]) -> String {
    shortfalls
        .iter()
        .map(|s| {
            format!(
                "{} at {}: available {}, requested {}",
                s.product_id, s.warehouse_id, s.available, s.requested
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// `field` is a path into the payload, e.g. `lines[2].quantity`, so the
/// UI can highlight the offending input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid currency code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// The field is not accepted for this document kind.
    #[error("{field} is not allowed here: {reason}")]
    NotAllowed { field: String, reason: String },

    /// The referenced catalog entry or document does not exist or is unusable.
    #[error("{field} references unknown or inactive {entity} '{id}'")]
    UnknownReference {
        field: String,
        entity: String,
        id: String,
    },
}

impl ValidationError {
    /// Field path this error refers to.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::TooLong { field, .. }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::MustBePositive { field }
            | ValidationError::InvalidFormat { field, .. }
            | ValidationError::NotAllowed { field, .. }
            | ValidationError::UnknownReference { field, .. } => field,
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
