//! # Repository Module
//!
//! Database repository implementations for Depot.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories over one transaction                    │
//! │                                                                         │
//! │  let mut tx = db.begin().await?;                                       │
//! │       │                                                                 │
//! │       ├── DocumentRepository::new(&mut tx).claim(id)                   │
//! │       ├── StockRepository::new(&mut tx).adjust(p, w, -3, -300)         │
//! │       ├── MovementRepository::new(&mut tx).insert(&movement)           │
//! │       └── DocumentRepository::new(&mut tx).update(&doc)                │
//! │       │                                                                 │
//! │  tx.commit().await?;   ← all or nothing                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CatalogRepository`](catalog::CatalogRepository) - Products and warehouses
//! - [`StockRepository`](stock::StockRepository) - Ledger rows
//! - [`MovementRepository`](movement::MovementRepository) - Delta journal
//! - [`DocumentRepository`](document::DocumentRepository) - Documents, lines, numbers
//! - [`ReservationRepository`](reservation::ReservationRepository) - Per-order holds

pub mod catalog;
pub mod document;
pub mod movement;
pub mod reservation;
pub mod stock;
