//! # Document Repository
//!
//! Documents with their lines. Variant-specific fields live in a JSON
//! `details` column; lines live in `document_lines`.
//!
//! ## Optimistic Versioning
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  claim(id)           UPDATE documents SET version = version + 1        │
//! │                      WHERE id = ? RETURNING version                    │
//! │                      → first write of the transaction, takes the lock  │
//! │                                                                         │
//! │  get(id)             reads the claimed row (version = v)               │
//! │                                                                         │
//! │  update(doc)         UPDATE ... WHERE id = ? AND version = v           │
//! │                      0 rows → DbError::Conflict                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use depot_core::{
    Document, DocumentDetails, DocumentKind, DocumentStatus, ExchangeRate, LineItem,
};

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    id: String,
    number: String,
    status: DocumentStatus,
    counterpart_id: Option<String>,
    warehouse_id: Option<String>,
    date: NaiveDate,
    due_date: Option<NaiveDate>,
    currency: String,
    exchange_rate: i64,
    total_cents: i64,
    details: String,
    notes: Option<String>,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl DocumentRow {
    fn into_document(self, lines: Vec<LineItem>) -> DbResult<Document> {
        let details: DocumentDetails =
            serde_json::from_str(&self.details).map_err(|e| DbError::Corrupt {
                column: "documents.details".to_string(),
                message: format!("{}: {}", self.id, e),
            })?;

        Ok(Document {
            id: self.id,
            number: self.number,
            status: self.status,
            counterpart_id: self.counterpart_id,
            warehouse_id: self.warehouse_id,
            date: self.date,
            due_date: self.due_date,
            currency: self.currency,
            exchange_rate: ExchangeRate::from_scaled(self.exchange_rate),
            lines,
            total_cents: self.total_cents,
            details,
            notes: self.notes,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.version,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LineRow {
    document_id: String,
    product_id: String,
    product_name: String,
    quantity: i64,
    unit_price_cents: i64,
    line_total_cents: i64,
    shipped_quantity: Option<i64>,
    system_quantity: Option<i64>,
    difference: Option<i64>,
}

impl From<LineRow> for LineItem {
    fn from(row: LineRow) -> Self {
        LineItem {
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: row.quantity,
            unit_price_cents: row.unit_price_cents,
            line_total_cents: row.line_total_cents,
            shipped_quantity: row.shipped_quantity,
            system_quantity: row.system_quantity,
            difference: row.difference,
        }
    }
}

const DOCUMENT_COLUMNS: &str = "id, number, status, counterpart_id, warehouse_id, date, due_date, \
     currency, exchange_rate, total_cents, details, notes, created_by, created_at, updated_at, version";

const LINE_COLUMNS: &str = "document_id, product_id, product_name, quantity, unit_price_cents, \
     line_total_cents, shipped_quantity, system_quantity, difference";

fn details_json(doc: &Document) -> DbResult<String> {
    serde_json::to_string(&doc.details).map_err(|e| DbError::Internal(e.to_string()))
}

// =============================================================================
// Repository
// =============================================================================

pub struct DocumentRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> DocumentRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        DocumentRepository { conn }
    }

    /// Inserts a new document and its lines.
    pub async fn insert(&mut self, doc: &Document) -> DbResult<()> {
        debug!(id = %doc.id, number = %doc.number, kind = %doc.kind(), "Inserting document");

        sqlx::query(
            r#"
            INSERT INTO documents (
                id, kind, number, status, counterpart_id, warehouse_id, date, due_date,
                currency, exchange_rate, total_cents, details, notes, created_by,
                created_at, updated_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
        )
        .bind(&doc.id)
        .bind(doc.kind())
        .bind(&doc.number)
        .bind(doc.status)
        .bind(&doc.counterpart_id)
        .bind(&doc.warehouse_id)
        .bind(doc.date)
        .bind(doc.due_date)
        .bind(&doc.currency)
        .bind(doc.exchange_rate.scaled())
        .bind(doc.total_cents)
        .bind(details_json(doc)?)
        .bind(&doc.notes)
        .bind(&doc.created_by)
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .bind(doc.version)
        .execute(&mut *self.conn)
        .await?;

        self.insert_lines(doc).await
    }

    /// Bumps the version of a document, taking the write lock.
    ///
    /// Returns the new version.
    pub async fn claim(&mut self, id: &str) -> DbResult<i64> {
        let version: Option<i64> = sqlx::query_scalar(
            "UPDATE documents SET version = version + 1 WHERE id = ?1 RETURNING version",
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        version.ok_or_else(|| DbError::not_found("Document", id))
    }

    /// Writes back header, details and lines if `doc.version` is current.
    pub async fn update(&mut self, doc: &Document) -> DbResult<()> {
        debug!(id = %doc.id, status = %doc.status, version = doc.version, "Updating document");

        let result = sqlx::query(
            r#"
            UPDATE documents SET
                status = ?3,
                counterpart_id = ?4,
                warehouse_id = ?5,
                date = ?6,
                due_date = ?7,
                currency = ?8,
                exchange_rate = ?9,
                total_cents = ?10,
                details = ?11,
                notes = ?12,
                updated_at = ?13
            WHERE id = ?1 AND version = ?2
            "#,
        )
        .bind(&doc.id)
        .bind(doc.version)
        .bind(doc.status)
        .bind(&doc.counterpart_id)
        .bind(&doc.warehouse_id)
        .bind(doc.date)
        .bind(doc.due_date)
        .bind(&doc.currency)
        .bind(doc.exchange_rate.scaled())
        .bind(doc.total_cents)
        .bind(details_json(doc)?)
        .bind(&doc.notes)
        .bind(doc.updated_at)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict("Document", &doc.id));
        }

        sqlx::query("DELETE FROM document_lines WHERE document_id = ?1")
            .bind(&doc.id)
            .execute(&mut *self.conn)
            .await?;
        self.insert_lines(doc).await
    }

    async fn insert_lines(&mut self, doc: &Document) -> DbResult<()> {
        for (position, line) in doc.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO document_lines (
                    document_id, position, product_id, product_name, quantity,
                    unit_price_cents, line_total_cents, shipped_quantity,
                    system_quantity, difference
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )
            .bind(&doc.id)
            .bind(position as i64)
            .bind(&line.product_id)
            .bind(&line.product_name)
            .bind(line.quantity)
            .bind(line.unit_price_cents)
            .bind(line.line_total_cents)
            .bind(line.shipped_quantity)
            .bind(line.system_quantity)
            .bind(line.difference)
            .execute(&mut *self.conn)
            .await?;
        }
        Ok(())
    }

    /// Gets a document with its lines.
    pub async fn get(&mut self, id: &str) -> DbResult<Option<Document>> {
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1");
        let Some(row) = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?
        else {
            return Ok(None);
        };

        let lines = self.lines_of(id).await?;
        row.into_document(lines).map(Some)
    }

    /// Gets a document or fails with NotFound.
    pub async fn require(&mut self, id: &str) -> DbResult<Document> {
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Document", id))
    }

    async fn lines_of(&mut self, id: &str) -> DbResult<Vec<LineItem>> {
        let sql = format!(
            "SELECT {LINE_COLUMNS} FROM document_lines WHERE document_id = ?1 ORDER BY position"
        );
        let rows = sqlx::query_as::<_, LineRow>(&sql)
            .bind(id)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(rows.into_iter().map(LineItem::from).collect())
    }

    /// Lists documents of a kind (optionally one status), newest first.
    pub async fn list(
        &mut self,
        kind: DocumentKind,
        status: Option<DocumentStatus>,
    ) -> DbResult<Vec<Document>> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents \
             WHERE kind = ?1 AND (?2 IS NULL OR status = ?2) \
             ORDER BY date DESC, number DESC"
        );
        let rows = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(kind)
            .bind(status)
            .fetch_all(&mut *self.conn)
            .await?;
        self.assemble(rows).await
    }

    /// Documents of the given kinds dated within `[from, to]`.
    pub async fn list_between(
        &mut self,
        kinds: &[DocumentKind],
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<Document>> {
        let mut documents = Vec::new();
        for kind in kinds {
            let sql = format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents \
                 WHERE kind = ?1 AND date >= ?2 AND date <= ?3 ORDER BY date, number"
            );
            let rows = sqlx::query_as::<_, DocumentRow>(&sql)
                .bind(*kind)
                .bind(from)
                .bind(to)
                .fetch_all(&mut *self.conn)
                .await?;
            documents.extend(self.assemble(rows).await?);
        }
        Ok(documents)
    }

    async fn assemble(&mut self, rows: Vec<DocumentRow>) -> DbResult<Vec<Document>> {
        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            let lines = self.lines_of(&row.id).await?;
            documents.push(row.into_document(lines)?);
        }
        Ok(documents)
    }

    /// Deletes a document (lines and reservations cascade).
    pub async fn delete(&mut self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting document");

        let result = sqlx::query("DELETE FROM documents WHERE id = ?1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Document", id));
        }
        Ok(())
    }

    /// Allocates the next number for `kind`, e.g. `RC-000007`.
    pub async fn next_number(&mut self, kind: DocumentKind) -> DbResult<String> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO document_sequences (kind, last_value) VALUES (?1, 1)
            ON CONFLICT (kind) DO UPDATE SET last_value = last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(kind)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(format!("{}-{:06}", kind.number_prefix(), value))
    }
}
