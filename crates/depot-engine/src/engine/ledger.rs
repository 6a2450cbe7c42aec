//! Ledger postings.
//!
//! Every quantity change goes through [`post`], which updates the ledger row
//! and appends the matching journal row in the caller's transaction.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::warn;
use uuid::Uuid;

use crate::error::EngineResult;
use depot_core::policy::check_outgoing;
use depot_core::{
    Actor, CoreError, Document, DocumentKind, StockEntry, StockMovement, StockPolicy, StockWarning,
};
use depot_db::{CatalogRepository, MovementRepository, StockRepository};

/// How incoming stock is valued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Valuation {
    /// Line price converted at the document's exchange rate.
    LinePrice,
    /// Catalog cost price.
    Cost,
}

/// The document and actor a posting is journaled under.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Source<'a> {
    pub document_id: &'a str,
    pub kind: DocumentKind,
    pub actor: &'a Actor,
}

impl<'a> Source<'a> {
    pub fn of(doc: &'a Document, actor: &'a Actor) -> Self {
        Source {
            document_id: &doc.id,
            kind: doc.kind(),
            actor,
        }
    }
}

/// Applies one delta and journals it.
pub(crate) async fn post(
    conn: &mut SqliteConnection,
    source: Source<'_>,
    product_id: &str,
    warehouse_id: &str,
    quantity_delta: i64,
    amount_delta_cents: i64,
) -> EngineResult<StockEntry> {
    let entry = StockRepository::new(&mut *conn)
        .adjust(product_id, warehouse_id, quantity_delta, amount_delta_cents)
        .await?;

    MovementRepository::new(&mut *conn)
        .insert(&StockMovement {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            warehouse_id: warehouse_id.to_string(),
            document_id: source.document_id.to_string(),
            document_kind: source.kind,
            quantity_delta,
            amount_delta_cents,
            actor_id: source.actor.id.clone(),
            occurred_at: Utc::now(),
        })
        .await?;

    if entry.is_negative() {
        warn!(
            product_id = %product_id,
            warehouse_id = %warehouse_id,
            quantity = entry.quantity,
            "Stock went negative"
        );
    }
    Ok(entry)
}

/// Cost price per product id.
pub(crate) async fn cost_prices(
    conn: &mut SqliteConnection,
    product_ids: &[String],
) -> EngineResult<HashMap<String, i64>> {
    let mut catalog = CatalogRepository::new(conn);
    let mut prices = HashMap::new();
    for id in product_ids {
        if prices.contains_key(id) {
            continue;
        }
        let product = catalog
            .get_product(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Product", id))?;
        prices.insert(id.to_string(), product.cost_price_cents);
    }
    Ok(prices)
}

/// Books every line of `doc` into `warehouse_id`.
pub(crate) async fn receive(
    conn: &mut SqliteConnection,
    doc: &Document,
    warehouse_id: &str,
    valuation: Valuation,
    actor: &Actor,
) -> EngineResult<()> {
    let product_ids: Vec<String> = doc.lines.iter().map(|l| l.product_id.clone()).collect();
    let costs = cost_prices(&mut *conn, &product_ids).await?;

    for line in &doc.lines {
        if line.quantity == 0 {
            continue;
        }
        let amount = match valuation {
            Valuation::LinePrice => doc.exchange_rate.to_base(line.line_total()).cents(),
            Valuation::Cost => costs
                .get(&line.product_id)
                .copied()
                .unwrap_or(0)
                .saturating_mul(line.quantity),
        };
        post(
            conn,
            Source::of(doc, actor),
            &line.product_id,
            warehouse_id,
            line.quantity,
            amount,
        )
        .await?;
    }
    Ok(())
}

/// Takes `demands` (merged per product) out of `warehouse_id`, valued at cost.
///
/// The policy check runs against the ledger before any row is touched, so a
/// hard block leaves the ledger unchanged.
pub(crate) async fn issue(
    conn: &mut SqliteConnection,
    doc: &Document,
    warehouse_id: &str,
    demands: &[(String, i64)],
    policy: StockPolicy,
    actor: &Actor,
) -> EngineResult<Vec<StockWarning>> {
    let product_ids: Vec<String> = demands.iter().map(|(id, _)| id.clone()).collect();
    let entries = StockRepository::new(&mut *conn)
        .get_many(warehouse_id, &product_ids)
        .await?;
    let warnings = check_outgoing(policy, warehouse_id, demands, &entries)?;

    let costs = cost_prices(&mut *conn, &product_ids).await?;
    for (product_id, qty) in demands {
        if *qty == 0 {
            continue;
        }
        let cost = costs.get(product_id).copied().unwrap_or(0);
        post(
            conn,
            Source::of(doc, actor),
            product_id,
            warehouse_id,
            -qty,
            cost.saturating_mul(*qty).saturating_neg(),
        )
        .await?;
    }
    Ok(warnings)
}

/// Posts the exact inverse of every movement `document_id` caused.
///
/// Returns a negative-stock warning for each pair that ends up below zero.
pub(crate) async fn reverse(
    conn: &mut SqliteConnection,
    document_id: &str,
    actor: &Actor,
) -> EngineResult<Vec<StockWarning>> {
    let movements = MovementRepository::new(&mut *conn)
        .list_for_document(document_id)
        .await?;

    let mut warnings = Vec::new();
    for m in movements {
        let source = Source {
            document_id,
            kind: m.document_kind,
            actor,
        };
        let entry = post(
            conn,
            source,
            &m.product_id,
            &m.warehouse_id,
            -m.quantity_delta,
            -m.amount_delta_cents,
        )
        .await?;
        if entry.is_negative() {
            warnings.push(StockWarning::negative_stock(
                &m.product_id,
                &m.warehouse_id,
                m.quantity_delta,
                entry.quantity,
            ));
        }
    }
    Ok(warnings)
}
