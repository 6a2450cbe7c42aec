//! # Engine
//!
//! The [`Engine`] owns the pool and the configuration. Its operations are
//! split by concern:
//!
//! - [`catalog`]: products, warehouses, stock queries
//! - [`documents`]: create / update / delete / read
//! - [`transition`]: status changes and their effects
//! - [`orders`]: reservations and shipments
//! - [`derived`]: write-offs and receipts from confirmed counts
//! - [`reports`]: debts, turnover, procurement forecast

use chrono::{NaiveDate, Utc};
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::EngineResult;
use depot_core::{Actor, Document, DocumentDetails, DocumentStatus, LineItem};
use depot_db::{Database, DocumentRepository};

mod catalog;
mod derived;
mod documents;
mod ledger;
mod orders;
mod reports;
mod transition;

#[cfg(test)]
mod testing;

pub use catalog::NewProduct;

/// Inventory and document consistency engine.
pub struct Engine {
    db: Database,
    config: EngineConfig,
}

impl Engine {
    /// Validates `config`, opens the database and runs migrations.
    pub async fn open(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let db = Database::new(config.db_config()).await?;
        info!(path = ?config.database.path, "Engine ready");
        Ok(Engine { db, config })
    }

    /// Wraps an already opened database.
    pub fn with_database(db: Database, config: EngineConfig) -> Self {
        Engine { db, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn close(&self) {
        self.db.close().await;
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Takes the write lock on a document and loads it at its new version.
pub(crate) async fn claim(conn: &mut SqliteConnection, id: &str) -> EngineResult<Document> {
    let mut docs = DocumentRepository::new(conn);
    docs.claim(id).await?;
    Ok(docs.require(id).await?)
}

/// Writes a claimed document back.
pub(crate) async fn save(conn: &mut SqliteConnection, doc: &mut Document) -> EngineResult<()> {
    doc.updated_at = Utc::now();
    DocumentRepository::new(conn).update(doc).await?;
    Ok(())
}

/// Inserts a document the engine creates on behalf of `source`.
///
/// Header fields are copied from the source; the new document is dated
/// today and starts in `status`.
pub(crate) async fn derive(
    conn: &mut SqliteConnection,
    source: &Document,
    details: DocumentDetails,
    status: DocumentStatus,
    lines: Vec<LineItem>,
    actor: &Actor,
) -> EngineResult<Document> {
    let kind = details.kind();
    let mut docs = DocumentRepository::new(conn);
    let number = docs.next_number(kind).await?;
    let now = Utc::now();

    let mut doc = Document {
        id: Uuid::new_v4().to_string(),
        number,
        status,
        counterpart_id: source.counterpart_id.clone(),
        warehouse_id: source.warehouse_id.clone(),
        date: today(),
        due_date: source.due_date,
        currency: source.currency.clone(),
        exchange_rate: source.exchange_rate,
        lines,
        total_cents: 0,
        details,
        notes: None,
        created_by: actor.id.clone(),
        created_at: now,
        updated_at: now,
        version: 1,
    };
    doc.recompute_totals();
    docs.insert(&doc).await?;

    info!(
        document_id = %doc.id,
        number = %doc.number,
        source_id = %source.id,
        "Derived {} created",
        kind
    );
    Ok(doc)
}

pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}
