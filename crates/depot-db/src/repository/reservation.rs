//! # Reservation Repository
//!
//! What each customer order holds, per product and warehouse. The ledger's
//! `reserved` column is the sum of these rows.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use depot_core::reservation::Hold;

pub struct ReservationRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ReservationRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        ReservationRepository { conn }
    }

    /// Adds to the hold of `order_id` on a product.
    pub async fn add(&mut self, order_id: &str, hold: &Hold) -> DbResult<()> {
        debug!(order_id = %order_id, product_id = %hold.product_id, quantity = hold.quantity, "Recording hold");

        sqlx::query(
            r#"
            INSERT INTO reservations (order_id, product_id, warehouse_id, quantity, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (order_id, product_id, warehouse_id)
            DO UPDATE SET quantity = quantity + excluded.quantity
            "#,
        )
        .bind(order_id)
        .bind(&hold.product_id)
        .bind(&hold.warehouse_id)
        .bind(hold.quantity)
        .bind(Utc::now())
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Holds of one order.
    pub async fn list_for_order(&mut self, order_id: &str) -> DbResult<Vec<Hold>> {
        let holds = sqlx::query_as::<_, Hold>(
            "SELECT product_id, warehouse_id, quantity FROM reservations \
             WHERE order_id = ?1 ORDER BY product_id",
        )
        .bind(order_id)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(holds)
    }

    /// Shrinks a hold by `quantity`; rows reaching zero are removed.
    pub async fn consume(
        &mut self,
        order_id: &str,
        product_id: &str,
        warehouse_id: &str,
        quantity: i64,
    ) -> DbResult<()> {
        sqlx::query(
            "UPDATE reservations SET quantity = quantity - ?4 \
             WHERE order_id = ?1 AND product_id = ?2 AND warehouse_id = ?3",
        )
        .bind(order_id)
        .bind(product_id)
        .bind(warehouse_id)
        .bind(quantity)
        .execute(&mut *self.conn)
        .await?;

        sqlx::query("DELETE FROM reservations WHERE order_id = ?1 AND quantity <= 0")
            .bind(order_id)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    /// Removes every hold of an order.
    pub async fn clear(&mut self, order_id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM reservations WHERE order_id = ?1")
            .bind(order_id)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }
}
