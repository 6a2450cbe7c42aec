//! Shared fixtures for engine tests.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use super::Engine;
use crate::config::EngineConfig;
use depot_core::{
    Actor, DocumentDraft, DocumentKind, LineDraft, Product, UnitType, Warehouse,
};
use depot_db::{CatalogRepository, Database, DbConfig};

pub const MAIN: &str = "w-main";
pub const BRANCH: &str = "w-branch";
pub const FLOUR: &str = "p-flour";
pub const SUGAR: &str = "p-sugar";

pub const FLOUR_COST: i64 = 800;
pub const SUGAR_COST: i64 = 500;

fn product(id: &str, sku: &str, name: &str, cost: i64, min_quantity: i64) -> Product {
    let now = Utc::now();
    Product {
        id: id.to_string(),
        sku: sku.to_string(),
        name: name.to_string(),
        unit: "pcs".to_string(),
        unit_type: UnitType::Countable,
        cost_price_cents: cost,
        selling_price_cents: cost * 2,
        min_quantity,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn warehouse(id: &str, name: &str) -> Warehouse {
    Warehouse {
        id: id.to_string(),
        name: name.to_string(),
        is_active: true,
        created_at: Utc::now(),
    }
}

/// In-memory engine with two warehouses and two products.
pub async fn engine() -> Engine {
    seeded(DbConfig::in_memory()).await
}

/// Same catalog as [`engine`], in a temporary file with a pool of `connections`.
pub async fn file_engine(connections: u32) -> (Engine, PathBuf) {
    let path = std::env::temp_dir().join(format!("depot-test-{}.db", Uuid::new_v4()));
    let config = DbConfig::new(path.clone())
        .max_connections(connections)
        .busy_timeout(Duration::from_secs(10));
    (seeded(config).await, path)
}

async fn seeded(config: DbConfig) -> Engine {
    let db = Database::new(config).await.unwrap();

    let mut tx = db.begin().await.unwrap();
    let mut catalog = CatalogRepository::new(&mut tx);
    catalog.insert_warehouse(&warehouse(MAIN, "Main")).await.unwrap();
    catalog.insert_warehouse(&warehouse(BRANCH, "Branch")).await.unwrap();
    catalog
        .insert_product(&product(FLOUR, "FLOUR-1KG", "Flour 1kg", FLOUR_COST, 5))
        .await
        .unwrap();
    catalog
        .insert_product(&product(SUGAR, "SUGAR-1KG", "Sugar 1kg", SUGAR_COST, 0))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    Engine::with_database(db, EngineConfig::default())
}

pub fn actor() -> Actor {
    Actor::new("clerk-1")
}

pub fn today() -> NaiveDate {
    super::today()
}

pub fn draft() -> DocumentDraft {
    DocumentDraft::new(today(), "UZS")
}

/// Creates and confirms a receipt of `qty` units at `price` into `warehouse`.
pub async fn stock_up(engine: &Engine, warehouse: &str, product: &str, qty: i64, price: i64) {
    let receipt = engine
        .create_document(
            DocumentKind::Receipt,
            draft()
                .counterpart("supplier-1")
                .warehouse(warehouse)
                .line(LineDraft::new(product, qty, price)),
            &actor(),
        )
        .await
        .unwrap();
    engine
        .transition_status(
            &receipt.value.id,
            depot_core::DocumentStatus::Confirmed,
            &actor(),
        )
        .await
        .unwrap();
}
