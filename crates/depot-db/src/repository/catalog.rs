//! # Catalog Repository
//!
//! Products and warehouses. The engine only reads them while processing
//! documents; inserts exist for setup and seeding.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use depot_core::{Product, Warehouse};

const PRODUCT_COLUMNS: &str = "id, sku, name, unit, unit_type, cost_price_cents, \
     selling_price_cents, min_quantity, is_active, created_at, updated_at";

/// Repository for the reference catalog.
pub struct CatalogRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> CatalogRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        CatalogRepository { conn }
    }

    pub async fn insert_product(&mut self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, unit, unit_type, cost_price_cents,
                selling_price_cents, min_quantity, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.unit)
        .bind(product.unit_type)
        .bind(product.cost_price_cents)
        .bind(product.selling_price_cents)
        .bind(product.min_quantity)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *self.conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: product.sku.clone(),
            },
            other => other,
        })?;

        Ok(())
    }

    pub async fn insert_warehouse(&mut self, warehouse: &Warehouse) -> DbResult<()> {
        debug!(id = %warehouse.id, name = %warehouse.name, "Inserting warehouse");

        sqlx::query(
            "INSERT INTO warehouses (id, name, is_active, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&warehouse.id)
        .bind(&warehouse.name)
        .bind(warehouse.is_active)
        .bind(warehouse.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Gets a product by ID.
    pub async fn get_product(&mut self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(product)
    }

    /// Gets a warehouse by ID.
    pub async fn get_warehouse(&mut self, id: &str) -> DbResult<Option<Warehouse>> {
        let warehouse = sqlx::query_as::<_, Warehouse>(
            "SELECT id, name, is_active, created_at FROM warehouses WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(warehouse)
    }

    /// Lists products ordered by name.
    pub async fn list_products(&mut self, active_only: bool) -> DbResult<Vec<Product>> {
        let sql = if active_only {
            format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 ORDER BY name")
        } else {
            format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name")
        };
        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(products)
    }

    pub async fn list_warehouses(&mut self) -> DbResult<Vec<Warehouse>> {
        let warehouses = sqlx::query_as::<_, Warehouse>(
            "SELECT id, name, is_active, created_at FROM warehouses ORDER BY name",
        )
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(warehouses)
    }

    /// Activates or deactivates a product.
    pub async fn set_product_active(&mut self, id: &str, active: bool) -> DbResult<()> {
        debug!(id = %id, active, "Setting product active flag");

        let result = sqlx::query("UPDATE products SET is_active = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .bind(Utc::now())
            .execute(&mut *self.conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }

    /// Activates or deactivates a warehouse.
    pub async fn set_warehouse_active(&mut self, id: &str, active: bool) -> DbResult<()> {
        debug!(id = %id, active, "Setting warehouse active flag");

        let result = sqlx::query("UPDATE warehouses SET is_active = ?2 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .execute(&mut *self.conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Warehouse", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use depot_core::UnitType;

    fn product(id: &str, sku: &str) -> Product {
        Product {
            id: id.to_string(),
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            unit: "pcs".to_string(),
            unit_type: UnitType::Countable,
            cost_price_cents: 1_000,
            selling_price_cents: 1_500,
            min_quantity: 2,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_product_round_trip_and_duplicate_sku() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin().await.unwrap();
        let mut repo = CatalogRepository::new(&mut tx);

        repo.insert_product(&product("p-1", "FLOUR")).await.unwrap();
        let loaded = repo.get_product("p-1").await.unwrap().unwrap();
        assert_eq!(loaded.sku, "FLOUR");
        assert_eq!(loaded.unit_type, UnitType::Countable);
        assert!(repo.get_product("missing").await.unwrap().is_none());

        let err = repo.insert_product(&product("p-2", "FLOUR")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref value, .. } if value == "FLOUR"));
    }

    #[tokio::test]
    async fn test_warehouse_active_flag() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin().await.unwrap();
        let mut repo = CatalogRepository::new(&mut tx);

        repo.insert_warehouse(&Warehouse {
            id: "w-1".to_string(),
            name: "Main".to_string(),
            is_active: true,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

        repo.set_warehouse_active("w-1", false).await.unwrap();
        assert!(!repo.get_warehouse("w-1").await.unwrap().unwrap().is_active);
        assert!(repo.set_warehouse_active("nope", true).await.is_err());
    }
}
