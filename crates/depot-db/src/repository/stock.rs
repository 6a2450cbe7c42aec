//! # Stock Repository
//!
//! The stock ledger: one row per (product, warehouse).
//!
//! ## Delta Updates
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  ❌ Absolute update (lost update under concurrency)                │
//! │     UPDATE stock_entries SET quantity = 7 WHERE ...                │
//! │                                                                     │
//! │  ✅ Delta update, single-row atomic                                │
//! │     INSERT ... ON CONFLICT DO UPDATE SET quantity = quantity + ?   │
//! │                                                                     │
//! │  Two transitions touching the same pair serialize on the write     │
//! │  lock; neither can overwrite the other's delta.                    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::debug;

use crate::error::DbResult;
use depot_core::StockEntry;

const ENTRY_COLUMNS: &str =
    "product_id, warehouse_id, quantity, reserved, amount_cents, version, updated_at";

/// Repository for ledger rows.
pub struct StockRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> StockRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        StockRepository { conn }
    }

    /// Adds `quantity_delta` to on-hand and `amount_delta_cents` to value.
    ///
    /// Creates the row on first touch. Returns the row after the update.
    pub async fn adjust(
        &mut self,
        product_id: &str,
        warehouse_id: &str,
        quantity_delta: i64,
        amount_delta_cents: i64,
    ) -> DbResult<StockEntry> {
        debug!(
            product_id = %product_id,
            warehouse_id = %warehouse_id,
            quantity_delta,
            amount_delta_cents,
            "Adjusting stock"
        );

        let sql = format!(
            r#"
            INSERT INTO stock_entries (
                product_id, warehouse_id, quantity, reserved, amount_cents, version, updated_at
            ) VALUES (?1, ?2, ?3, 0, ?4, 1, ?5)
            ON CONFLICT (product_id, warehouse_id) DO UPDATE SET
                quantity = quantity + excluded.quantity,
                amount_cents = amount_cents + excluded.amount_cents,
                version = version + 1,
                updated_at = excluded.updated_at
            RETURNING {ENTRY_COLUMNS}
            "#
        );

        let entry = sqlx::query_as::<_, StockEntry>(&sql)
            .bind(product_id)
            .bind(warehouse_id)
            .bind(quantity_delta)
            .bind(amount_delta_cents)
            .bind(Utc::now())
            .fetch_one(&mut *self.conn)
            .await?;

        Ok(entry)
    }

    /// Adds `reserved_delta` to the reserved quantity.
    ///
    /// A new row starts from `max(delta, 0)`: the insert candidate is
    /// checked against `reserved >= 0` before the conflict clause runs, so
    /// a release must only ever reach the update path. Releasing more than
    /// is reserved fails on the same check.
    pub async fn reserve(
        &mut self,
        product_id: &str,
        warehouse_id: &str,
        reserved_delta: i64,
    ) -> DbResult<StockEntry> {
        debug!(
            product_id = %product_id,
            warehouse_id = %warehouse_id,
            reserved_delta,
            "Adjusting reservation"
        );

        let sql = format!(
            r#"
            INSERT INTO stock_entries (
                product_id, warehouse_id, quantity, reserved, amount_cents, version, updated_at
            ) VALUES (?1, ?2, 0, MAX(?3, 0), 0, 1, ?4)
            ON CONFLICT (product_id, warehouse_id) DO UPDATE SET
                reserved = reserved + ?3,
                version = version + 1,
                updated_at = excluded.updated_at
            RETURNING {ENTRY_COLUMNS}
            "#
        );

        let entry = sqlx::query_as::<_, StockEntry>(&sql)
            .bind(product_id)
            .bind(warehouse_id)
            .bind(reserved_delta)
            .bind(Utc::now())
            .fetch_one(&mut *self.conn)
            .await?;

        Ok(entry)
    }

    /// Gets one ledger row, if the pair was ever touched.
    pub async fn get(&mut self, product_id: &str, warehouse_id: &str) -> DbResult<Option<StockEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM stock_entries WHERE product_id = ?1 AND warehouse_id = ?2"
        );
        let entry = sqlx::query_as::<_, StockEntry>(&sql)
            .bind(product_id)
            .bind(warehouse_id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(entry)
    }

    /// Rows of `product_ids` at one warehouse. Untouched pairs are absent.
    pub async fn get_many(
        &mut self,
        warehouse_id: &str,
        product_ids: &[String],
    ) -> DbResult<Vec<StockEntry>> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {ENTRY_COLUMNS} FROM stock_entries WHERE warehouse_id = "
        ));
        builder.push_bind(warehouse_id);
        builder.push(" AND product_id IN (");
        let mut separated = builder.separated(", ");
        for id in product_ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let entries = builder
            .build_query_as::<StockEntry>()
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(entries)
    }

    /// Lists rows, optionally narrowed to a product and/or a warehouse.
    pub async fn list(
        &mut self,
        product_id: Option<&str>,
        warehouse_id: Option<&str>,
    ) -> DbResult<Vec<StockEntry>> {
        let sql = format!(
            r#"
            SELECT {ENTRY_COLUMNS} FROM stock_entries
            WHERE (?1 IS NULL OR product_id = ?1)
              AND (?2 IS NULL OR warehouse_id = ?2)
            ORDER BY product_id, warehouse_id
            "#
        );
        let entries = sqlx::query_as::<_, StockEntry>(&sql)
            .bind(product_id)
            .bind(warehouse_id)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(entries)
    }
}
