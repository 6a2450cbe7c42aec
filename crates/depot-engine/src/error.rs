//! # Engine Error Types
//!
//! What callers of the engine see.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Engine Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Business       │  │   Storage       │  │     Configuration       │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  CoreError      │  │  DbError        │  │  InvalidConfig          │ │
//! │  │  → its own      │  │  → NotFound or  │  │  ConfigLoadFailed       │ │
//! │  │    category     │  │    Storage-     │  │  ConfigSaveFailed       │ │
//! │  │                 │  │    Unavailable  │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Only StorageUnavailable is retryable: the whole operation rolled      │
//! │  back, and the idempotency guards make a second attempt safe.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use thiserror::Error;

use depot_core::{CoreError, ErrorCategory, StockWarning, ValidationError};
use depot_db::DbError;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine error covering every failure of a document operation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A business rule rejected the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The storage layer failed; nothing was committed.
    #[error("Storage unavailable: {0}")]
    Storage(#[from] DbError),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid engine configuration.
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Core(err.into())
    }
}

impl From<Vec<ValidationError>> for EngineError {
    fn from(errs: Vec<ValidationError>) -> Self {
        EngineError::Core(errs.into())
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Storage(err.into())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for EngineError {
    fn from(err: toml::ser::Error) -> Self {
        EngineError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl EngineError {
    /// Maps the error onto the caller-facing taxonomy.
    ///
    /// Duplicate keys are the caller's input problem; every other storage
    /// failure (lock timeout, version conflict, lost connection) is
    /// `StorageUnavailable`.
    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::Core(err) => err.category(),
            EngineError::Storage(DbError::NotFound { .. }) => ErrorCategory::NotFound,
            EngineError::Storage(DbError::UniqueViolation { .. }) => {
                ErrorCategory::ValidationFailed
            }
            EngineError::Storage(_) => ErrorCategory::StorageUnavailable,
            EngineError::InvalidConfig(_)
            | EngineError::ConfigLoadFailed(_)
            | EngineError::ConfigSaveFailed(_) => ErrorCategory::ValidationFailed,
        }
    }

    /// Returns true if the whole operation can be retried as is.
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::StorageUnavailable
    }
}

// =============================================================================
// Outcome
// =============================================================================

/// A successful result plus the soft warnings raised while producing it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome<T> {
    pub value: T,
    pub warnings: Vec<StockWarning>,
}

impl<T> Outcome<T> {
    pub fn new(value: T, warnings: Vec<StockWarning>) -> Self {
        Outcome { value, warnings }
    }

    pub fn clean(value: T) -> Self {
        Outcome {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            warnings: self.warnings,
        }
    }
}
