//! Reference catalog and stock queries.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::Engine;
use crate::error::EngineResult;
use depot_core::validation::{validate_name, validate_price_cents, validate_sku};
use depot_core::{CoreError, Product, StockEntry, UnitType, ValidationError, Warehouse};
use depot_db::{CatalogRepository, StockRepository};

/// Payload for registering a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub unit: String,
    pub unit_type: UnitType,
    pub cost_price_cents: i64,
    pub selling_price_cents: i64,
    pub min_quantity: i64,
}

impl NewProduct {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let errors: Vec<ValidationError> = [
            validate_sku(&self.sku),
            validate_name("name", &self.name),
            validate_name("unit", &self.unit),
            validate_price_cents("cost_price_cents", self.cost_price_cents),
            validate_price_cents("selling_price_cents", self.selling_price_cents),
        ]
        .into_iter()
        .filter_map(Result::err)
        .chain((self.min_quantity < 0).then(|| ValidationError::OutOfRange {
            field: "min_quantity".to_string(),
            min: 0,
            max: i64::MAX,
        }))
        .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Engine {
    // =========================================================================
    // Catalog
    // =========================================================================

    pub async fn register_warehouse(&self, name: &str) -> EngineResult<Warehouse> {
        validate_name("name", name)?;

        let warehouse = Warehouse {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            is_active: true,
            created_at: Utc::now(),
        };

        let mut tx = self.db.begin().await?;
        CatalogRepository::new(&mut tx)
            .insert_warehouse(&warehouse)
            .await?;
        tx.commit().await?;

        info!(warehouse_id = %warehouse.id, name = %warehouse.name, "Warehouse registered");
        Ok(warehouse)
    }

    /// Registers a product. A duplicate SKU fails as `ValidationFailed`.
    pub async fn register_product(&self, new: NewProduct) -> EngineResult<Product> {
        new.validate()?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: new.sku.trim().to_string(),
            name: new.name.trim().to_string(),
            unit: new.unit,
            unit_type: new.unit_type,
            cost_price_cents: new.cost_price_cents,
            selling_price_cents: new.selling_price_cents,
            min_quantity: new.min_quantity,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.db.begin().await?;
        CatalogRepository::new(&mut tx).insert_product(&product).await?;
        tx.commit().await?;

        info!(product_id = %product.id, sku = %product.sku, "Product registered");
        Ok(product)
    }

    /// Inactive warehouses keep their stock but accept no new documents.
    pub async fn set_warehouse_active(&self, id: &str, active: bool) -> EngineResult<()> {
        let mut tx = self.db.begin().await?;
        CatalogRepository::new(&mut tx)
            .set_warehouse_active(id, active)
            .await?;
        tx.commit().await?;
        info!(warehouse_id = %id, active, "Warehouse activity changed");
        Ok(())
    }

    pub async fn set_product_active(&self, id: &str, active: bool) -> EngineResult<()> {
        let mut tx = self.db.begin().await?;
        CatalogRepository::new(&mut tx)
            .set_product_active(id, active)
            .await?;
        tx.commit().await?;
        info!(product_id = %id, active, "Product activity changed");
        Ok(())
    }

    pub async fn get_product(&self, id: &str) -> EngineResult<Product> {
        let mut conn = self.db.acquire().await?;
        let product = CatalogRepository::new(&mut conn)
            .get_product(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Product", id))?;
        Ok(product)
    }

    pub async fn get_warehouse(&self, id: &str) -> EngineResult<Warehouse> {
        let mut conn = self.db.acquire().await?;
        let warehouse = CatalogRepository::new(&mut conn)
            .get_warehouse(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Warehouse", id))?;
        Ok(warehouse)
    }

    pub async fn list_products(&self, active_only: bool) -> EngineResult<Vec<Product>> {
        let mut conn = self.db.acquire().await?;
        Ok(CatalogRepository::new(&mut conn)
            .list_products(active_only)
            .await?)
    }

    pub async fn list_warehouses(&self) -> EngineResult<Vec<Warehouse>> {
        let mut conn = self.db.acquire().await?;
        Ok(CatalogRepository::new(&mut conn).list_warehouses().await?)
    }

    // =========================================================================
    // Stock
    // =========================================================================

    /// Ledger entry of one pair; a zero entry if the pair was never touched.
    pub async fn stock_at(&self, product_id: &str, warehouse_id: &str) -> EngineResult<StockEntry> {
        let mut conn = self.db.acquire().await?;
        let entry = StockRepository::new(&mut conn)
            .get(product_id, warehouse_id)
            .await?
            .unwrap_or_else(|| StockEntry::empty(product_id, warehouse_id, Utc::now()));
        Ok(entry)
    }

    /// Stock of a product at one warehouse, or at every warehouse holding it.
    pub async fn get_stock(
        &self,
        product_id: &str,
        warehouse_id: Option<&str>,
    ) -> EngineResult<Vec<StockEntry>> {
        match warehouse_id {
            Some(w) => Ok(vec![self.stock_at(product_id, w).await?]),
            None => self.list_stock(Some(product_id), None).await,
        }
    }

    pub async fn list_stock(
        &self,
        product_id: Option<&str>,
        warehouse_id: Option<&str>,
    ) -> EngineResult<Vec<StockEntry>> {
        let mut conn = self.db.acquire().await?;
        Ok(StockRepository::new(&mut conn)
            .list(product_id, warehouse_id)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{engine, FLOUR, MAIN};
    use depot_core::ErrorCategory;

    fn cheese() -> NewProduct {
        NewProduct {
            sku: "CHEESE-01".to_string(),
            name: "Cheese".to_string(),
            unit: "kg".to_string(),
            unit_type: UnitType::Measured,
            cost_price_cents: 4_000,
            selling_price_cents: 5_500,
            min_quantity: 2,
        }
    }

    #[tokio::test]
    async fn test_register_product_and_duplicate_sku() {
        let engine = engine().await;

        let product = engine.register_product(cheese()).await.unwrap();
        assert_eq!(engine.get_product(&product.id).await.unwrap().sku, "CHEESE-01");

        let err = engine.register_product(cheese()).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::ValidationFailed);
    }

    #[tokio::test]
    async fn test_register_product_validates_every_field() {
        let engine = engine().await;
        let bad = NewProduct {
            sku: "bad sku".to_string(),
            cost_price_cents: -1,
            min_quantity: -3,
            ..cheese()
        };

        let err = engine.register_product(bad).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("sku"));
        assert!(message.contains("cost_price_cents"));
        assert!(message.contains("min_quantity"));
    }

    #[tokio::test]
    async fn test_untouched_pair_reads_as_zero() {
        let engine = engine().await;

        let entry = engine.stock_at(FLOUR, MAIN).await.unwrap();
        assert_eq!(entry.quantity, 0);
        assert_eq!(entry.reserved, 0);

        assert!(engine.get_stock(FLOUR, None).await.unwrap().is_empty());
        assert_eq!(engine.get_stock(FLOUR, Some(MAIN)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_catalog_entries() {
        let engine = engine().await;
        let err = engine.get_warehouse("nowhere").await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::NotFound);
        assert_eq!(engine.list_warehouses().await.unwrap().len(), 2);
    }
}
