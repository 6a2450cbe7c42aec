//! # Seed & Demo Runner
//!
//! Registers a small catalog and walks one document of each main flow
//! through the engine, then prints the reports.
//!
//! ## Usage
//! ```bash
//! # Seed the configured database
//! cargo run -p depot-engine --bin seed
//!
//! # Use a throwaway file
//! cargo run -p depot-engine --bin seed -- --db ./depot_dev.db
//! ```

use std::env;
use std::path::PathBuf;

use chrono::Utc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use depot_core::report::TurnoverFilter;
use depot_core::{
    Actor, CounterpartRole, DateRange, DocumentDraft, DocumentKind, DocumentStatus, LineDraft,
    PaymentDirection, UnitType,
};
use depot_engine::{Engine, EngineConfig, NewProduct};

/// (sku, name, unit, cost, selling, min quantity)
const PRODUCTS: &[(&str, &str, &str, i64, i64, i64)] = &[
    ("FLR-001", "Wheat flour 1st grade", "kg", 800, 1_100, 50),
    ("SUG-001", "White sugar", "kg", 950, 1_300, 30),
    ("OIL-001", "Sunflower oil 1L", "pcs", 2_400, 3_100, 20),
    ("RCE-001", "Rice long grain", "kg", 1_500, 1_950, 25),
];

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,depot=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let mut config_path: Option<PathBuf> = None;
    let mut db_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Depot Seed & Demo Runner");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Engine config file (TOML)");
                println!("  -d, --db <PATH>      Database file path");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = EngineConfig::load_or_default(config_path);
    if let Some(path) = db_path {
        config.database.path = path;
    }
    let currency = config.ledger.base_currency.clone();
    let engine = Engine::open(config).await?;
    let actor = Actor::new("seed");

    if !engine.list_products(false).await?.is_empty() {
        println!("Database already has products, skipping seed.");
        println!("Delete the database file to regenerate.");
        return Ok(());
    }

    // Catalog
    let main = engine.register_warehouse("Main warehouse").await?;
    let branch = engine.register_warehouse("Branch store").await?;

    let mut products = Vec::with_capacity(PRODUCTS.len());
    for (sku, name, unit, cost, selling, min_quantity) in PRODUCTS {
        let product = engine
            .register_product(NewProduct {
                sku: sku.to_string(),
                name: name.to_string(),
                unit: unit.to_string(),
                unit_type: if *unit == "kg" {
                    UnitType::Measured
                } else {
                    UnitType::Countable
                },
                cost_price_cents: *cost,
                selling_price_cents: *selling,
                min_quantity: *min_quantity,
            })
            .await?;
        products.push(product);
    }
    info!(products = products.len(), "Catalog registered");

    let today = Utc::now().date_naive();
    let draft = || DocumentDraft::new(today, currency.as_str());

    // Purchasing: receipt from a supplier, partly paid
    let mut receipt = draft().counterpart("supplier-1").warehouse(&main.id);
    for p in &products {
        receipt = receipt.line(LineDraft::new(&p.id, 100, p.cost_price_cents));
    }
    let receipt = engine
        .create_document(DocumentKind::Receipt, receipt, &actor)
        .await?
        .value;
    engine
        .transition_status(&receipt.id, DocumentStatus::Confirmed, &actor)
        .await?;

    // Payments post on creation
    engine
        .create_document(
            DocumentKind::Payment,
            draft()
                .counterpart("supplier-1")
                .payment(PaymentDirection::Outgoing, receipt.total_cents / 2),
            &actor,
        )
        .await?;

    // Sales: reserve on confirm, ship part of the order
    let flour = &products[0];
    let order = engine
        .create_document(
            DocumentKind::CustomerOrder,
            draft()
                .counterpart("customer-1")
                .warehouse(&main.id)
                .due(today)
                .line(LineDraft::new(&flour.id, 40, flour.selling_price_cents)),
            &actor,
        )
        .await?
        .value;
    engine
        .transition_status(&order.id, DocumentStatus::Confirmed, &actor)
        .await?;
    let shipment = engine
        .create_shipment(&order.id, vec![LineDraft::unpriced(&flour.id, 25)], &actor)
        .await?;
    for warning in &shipment.warnings {
        println!(
            "  warning: {:?} {} requested {} available {}",
            warning.kind, warning.product_id, warning.requested, warning.available
        );
    }

    // Replenish the branch
    let internal = engine
        .create_document(
            DocumentKind::InternalOrder,
            draft()
                .warehouse(&main.id)
                .destination(&branch.id)
                .line(LineDraft::unpriced(&products[1].id, 30)),
            &actor,
        )
        .await?
        .value;
    engine
        .transition_status(&internal.id, DocumentStatus::Approved, &actor)
        .await?;

    println!();
    println!("Stock");
    for entry in engine.list_stock(None, None).await? {
        println!(
            "  {:<36} {:<36} qty {:>6} reserved {:>4} amount {:>10}",
            entry.product_id,
            entry.warehouse_id,
            entry.quantity,
            entry.reserved,
            entry.amount().to_string()
        );
    }

    let period = DateRange::day(today);
    for role in [CounterpartRole::Supplier, CounterpartRole::Customer] {
        println!();
        println!("{:?} debts", role);
        for row in engine.debt_report(role, period).await? {
            println!(
                "  {:<12} total {:>9} paid {:>9} remaining {:>9} {:?}",
                row.counterpart_id, row.total_debt_cents, row.paid_cents, row.remaining_cents, row.status
            );
        }
    }

    let turnover = engine
        .turnover_report(period, &TurnoverFilter::default())
        .await?;
    println!();
    println!("Turnover rows: {}", turnover.len());

    println!();
    println!("Procurement forecast");
    for row in engine.procurement_forecast(None).await? {
        println!(
            "  {:<28} on hand {:>5} need {:>5} {:?}",
            row.product_name, row.quantity, row.need_to_order, row.status
        );
    }

    engine.close().await;
    info!("Seed complete");
    Ok(())
}
