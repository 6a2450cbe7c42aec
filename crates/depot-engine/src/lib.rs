//! # depot-engine: Transition Engine for Depot
//!
//! Document operations over the stock ledger. Every public operation runs in
//! one database transaction: it either commits the status change together
//! with every ledger delta and derived document, or nothing at all.
//!
//! ## Operation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        transition_status(id, to)                        │
//! │                                                                         │
//! │  1. BEGIN + claim (version bump takes the write lock)                  │
//! │  2. machine::plan(kind, from, to)      → InvalidTransition             │
//! │  3. validate stored lines              → ValidationFailed              │
//! │  4. apply effect                                                        │
//! │     ├── ledger deltas (+ movement journal)                             │
//! │     ├── derived document (receipt, transfer, shipment)                 │
//! │     └── reservation holds                                              │
//! │  5. write status, COMMIT                                               │
//! │                                                                         │
//! │  Any error before COMMIT rolls the whole operation back.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use depot_engine::{Engine, EngineConfig};
//! use depot_core::{Actor, DocumentKind, DocumentStatus};
//!
//! let engine = Engine::open(EngineConfig::load_or_default(None)).await?;
//! let receipt = engine.create_document(DocumentKind::Receipt, draft, &actor).await?;
//! let confirmed = engine
//!     .transition_status(&receipt.value.id, DocumentStatus::Confirmed, &actor)
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod engine;
pub mod error;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::EngineConfig;
pub use engine::{Engine, NewProduct};
pub use error::{EngineError, EngineResult, Outcome};
