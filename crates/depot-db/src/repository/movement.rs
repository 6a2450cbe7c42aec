//! # Movement Repository
//!
//! Append-only journal of applied ledger deltas. Turnover and the trailing
//! shipped average are computed from it.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use depot_core::StockMovement;

const MOVEMENT_COLUMNS: &str = "id, product_id, warehouse_id, document_id, document_kind, \
     quantity_delta, amount_delta_cents, actor_id, occurred_at";

pub struct MovementRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> MovementRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        MovementRepository { conn }
    }

    pub async fn insert(&mut self, movement: &StockMovement) -> DbResult<()> {
        debug!(
            document_id = %movement.document_id,
            product_id = %movement.product_id,
            quantity_delta = movement.quantity_delta,
            "Recording movement"
        );

        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, product_id, warehouse_id, document_id, document_kind,
                quantity_delta, amount_delta_cents, actor_id, occurred_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.product_id)
        .bind(&movement.warehouse_id)
        .bind(&movement.document_id)
        .bind(movement.document_kind)
        .bind(movement.quantity_delta)
        .bind(movement.amount_delta_cents)
        .bind(&movement.actor_id)
        .bind(movement.occurred_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Every movement at or after `since`, oldest first.
    pub async fn list_since(&mut self, since: DateTime<Utc>) -> DbResult<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE occurred_at >= ?1 ORDER BY occurred_at, id"
        );
        let movements = sqlx::query_as::<_, StockMovement>(&sql)
            .bind(since)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(movements)
    }

    /// Movements caused by one document.
    pub async fn list_for_document(&mut self, document_id: &str) -> DbResult<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE document_id = ?1 ORDER BY occurred_at, id"
        );
        let movements = sqlx::query_as::<_, StockMovement>(&sql)
            .bind(document_id)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(movements)
    }

    /// Σ quantity deltas of one pair; equals the ledger quantity when the
    /// journal is complete.
    pub async fn sum_for_pair(&mut self, product_id: &str, warehouse_id: &str) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity_delta), 0) FROM stock_movements \
             WHERE product_id = ?1 AND warehouse_id = ?2",
        )
        .bind(product_id)
        .bind(warehouse_id)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(total)
    }
}
