//! # depot-db: Database Layer for Depot
//!
//! SQLite persistence for the stock ledger, its movement journal, documents
//! and reservations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Depot Data Flow                                  │
//! │                                                                         │
//! │  depot-engine operation (transition, reserve, report)                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     depot-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ Catalog       │    │              │  │   │
//! │  │   │ SqlitePool    │    │ Stock         │    │ 001_initial  │  │   │
//! │  │   │ begin() ──────┼───►│ Movement      │    │ _schema.sql  │  │   │
//! │  │   │               │    │ Document      │    │              │  │   │
//! │  │   │               │    │ Reservation   │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL)                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use depot_db::{Database, DbConfig, StockRepository};
//!
//! let db = Database::new(DbConfig::new("depot.db")).await?;
//! let mut tx = db.begin().await?;
//! let entry = StockRepository::new(&mut tx).adjust("p-1", "main", 10, 10_000).await?;
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::catalog::CatalogRepository;
pub use repository::document::DocumentRepository;
pub use repository::movement::MovementRepository;
pub use repository::reservation::ReservationRepository;
pub use repository::stock::StockRepository;

pub use sqlx::{Sqlite, SqliteConnection, Transaction};
