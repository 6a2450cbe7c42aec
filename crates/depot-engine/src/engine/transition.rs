//! # Status Transitions
//!
//! One generic executor for every kind: the kind's table validates the
//! move, the effect attached to the target status is applied, and the new
//! status is written, all inside the same transaction.
//!
//! ## Effects
//! ```text
//! ┌──────────────────────┬──────────────────────────────────────────────────┐
//! │ Effect               │ Ledger / documents                               │
//! ├──────────────────────┼──────────────────────────────────────────────────┤
//! │ Incoming             │ + every line at the document's warehouse         │
//! │ OutgoingHard         │ - every line, InsufficientStock on shortage      │
//! │ ReceivePurchaseOrder │ derive confirmed Receipt, + its lines (once)     │
//! │ ReserveOrder         │ hold stock for the order (soft)                  │
//! │ ShipRemainder        │ derive Shipment for the unshipped remainder      │
//! │ ReleaseReservation   │ give back the order's holds                      │
//! │ CreateTransfer       │ derive Transfer, - source, + destination (once)  │
//! │ FreezeCount          │ difference = actual - system, per line           │
//! │ PostPayment          │ linked order paid += amount                      │
//! │ ReversePayment       │ linked order paid -= amount                      │
//! └──────────────────────┴──────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::info;

use super::ledger::{self, Valuation};
use super::{claim, derive, orders, save, Engine};
use crate::error::{EngineResult, Outcome};
use depot_core::machine::{self, Effect};
use depot_core::validation::validate_lines;
use depot_core::{
    merge_quantities, Actor, CoreError, Document, DocumentDetails, DocumentKind, DocumentStatus,
    LineItem, StockPolicy, StockWarning, ValidationError,
};

impl Engine {
    /// Moves a document to `target`, applying the effect of entering it.
    pub async fn transition_status(
        &self,
        id: &str,
        target: DocumentStatus,
        actor: &Actor,
    ) -> EngineResult<Outcome<Document>> {
        let mut tx = self.db.begin().await?;
        let mut doc = claim(&mut tx, id).await?;

        let plan = machine::plan(doc.kind(), doc.status, target)?;
        validate_lines(plan.kind, &doc.lines)?;

        let warnings = match plan.effect {
            Some(effect) => apply_effect(&mut tx, &mut doc, effect, actor).await?,
            None => Vec::new(),
        };

        doc.status = target;
        save(&mut tx, &mut doc).await?;
        tx.commit().await?;

        info!(
            document_id = %doc.id,
            number = %doc.number,
            from = %plan.from,
            to = %plan.to,
            warnings = warnings.len(),
            "Status changed"
        );
        Ok(Outcome::new(doc, warnings))
    }
}

/// Applies `effect` to `doc` inside the caller's transaction.
pub(crate) async fn apply_effect(
    conn: &mut SqliteConnection,
    doc: &mut Document,
    effect: Effect,
    actor: &Actor,
) -> EngineResult<Vec<StockWarning>> {
    let warehouse = doc.warehouse().to_string();

    match effect {
        Effect::Incoming => {
            let valuation = if doc.kind() == DocumentKind::Receipt {
                Valuation::LinePrice
            } else {
                Valuation::Cost
            };
            ledger::receive(conn, doc, &warehouse, valuation, actor).await?;

            let now = Utc::now();
            match &mut doc.details {
                DocumentDetails::Receipt { confirmed_at, .. } => *confirmed_at = Some(now),
                DocumentDetails::CustomerReturn { accepted_at, .. } => *accepted_at = Some(now),
                _ => {}
            }
            Ok(Vec::new())
        }

        Effect::OutgoingHard => {
            let demands = doc.quantities_by_product();
            ledger::issue(conn, doc, &warehouse, &demands, StockPolicy::HardBlock, actor).await
        }

        Effect::ReceivePurchaseOrder => receive_purchase_order(conn, doc, actor).await,

        Effect::ReserveOrder => {
            if matches!(doc.details, DocumentDetails::CustomerOrder { reserved: true, .. }) {
                return Ok(Vec::new());
            }
            orders::hold(conn, doc).await
        }

        Effect::ShipRemainder => {
            let remainder: Vec<(String, i64)> =
                merge_quantities(doc.lines.iter().map(|l| (l.product_id.as_str(), l.unshipped())))
                    .into_iter()
                    .filter(|(_, qty)| *qty > 0)
                    .collect();
            if remainder.is_empty() {
                return Ok(Vec::new());
            }
            let (_, warnings) = orders::ship(conn, doc, remainder, actor).await?;
            Ok(warnings)
        }

        Effect::ReleaseReservation => {
            if matches!(doc.details, DocumentDetails::CustomerOrder { reserved: true, .. }) {
                orders::release(conn, doc).await?;
            }
            Ok(Vec::new())
        }

        Effect::CreateTransfer => create_transfer(conn, doc, actor).await,

        Effect::FreezeCount => {
            for line in &mut doc.lines {
                line.difference = Some(line.quantity - line.system_quantity.unwrap_or(0));
            }
            if let DocumentDetails::InventoryCount { confirmed_at, .. } = &mut doc.details {
                *confirmed_at = Some(Utc::now());
            }
            Ok(Vec::new())
        }

        Effect::PostPayment => {
            credit_order(conn, doc, 1).await?;
            Ok(Vec::new())
        }

        Effect::ReversePayment => {
            credit_order(conn, doc, -1).await?;
            Ok(Vec::new())
        }
    }
}

/// Books a purchase order in through one derived, confirmed receipt.
async fn receive_purchase_order(
    conn: &mut SqliteConnection,
    order: &mut Document,
    actor: &Actor,
) -> EngineResult<Vec<StockWarning>> {
    if let DocumentDetails::PurchaseOrder {
        received_at: Some(_),
        ..
    } = order.details
    {
        return Err(CoreError::already_processed(&order.id, "receive").into());
    }

    let now = Utc::now();
    let receipt = derive(
        &mut *conn,
        order,
        DocumentDetails::Receipt {
            order_id: Some(order.id.clone()),
            confirmed_at: Some(now),
        },
        DocumentStatus::Confirmed,
        order.lines.clone(),
        actor,
    )
    .await?;
    ledger::receive(conn, &receipt, receipt.warehouse(), Valuation::LinePrice, actor).await?;

    order.details = DocumentDetails::PurchaseOrder {
        received_at: Some(now),
        receipt_id: Some(receipt.id),
    };
    Ok(Vec::new())
}

/// Moves an internal order's quantities through exactly one transfer.
async fn create_transfer(
    conn: &mut SqliteConnection,
    order: &mut Document,
    actor: &Actor,
) -> EngineResult<Vec<StockWarning>> {
    let DocumentDetails::InternalOrder {
        destination_warehouse_id,
        transfer_id,
    } = &order.details
    else {
        return Ok(Vec::new());
    };
    if transfer_id.is_some() {
        return Err(CoreError::already_processed(&order.id, "create_transfer").into());
    }
    let destination = destination_warehouse_id.clone();

    let lines: Vec<LineItem> = order
        .lines
        .iter()
        .filter(|l| l.transfer_quantity() > 0)
        .map(|l| {
            LineItem::new(
                l.product_id.clone(),
                l.product_name.clone(),
                l.transfer_quantity(),
                l.unit_price_cents,
            )
        })
        .collect();
    if lines.is_empty() {
        return Err(ValidationError::NotAllowed {
            field: "lines".to_string(),
            reason: "no line has a quantity to transfer".to_string(),
        }
        .into());
    }

    let transfer = derive(
        &mut *conn,
        order,
        DocumentDetails::Transfer {
            internal_order_id: order.id.clone(),
            destination_warehouse_id: destination.clone(),
        },
        DocumentStatus::Completed,
        lines,
        actor,
    )
    .await?;

    let demands = transfer.quantities_by_product();
    let warnings = ledger::issue(
        &mut *conn,
        &transfer,
        transfer.warehouse(),
        &demands,
        StockPolicy::SoftWarn,
        actor,
    )
    .await?;
    ledger::receive(conn, &transfer, &destination, Valuation::Cost, actor).await?;

    order.details = DocumentDetails::InternalOrder {
        destination_warehouse_id: destination,
        transfer_id: Some(transfer.id),
    };
    Ok(warnings)
}

/// Adds `sign × payment amount` to the linked customer order's paid total.
async fn credit_order(conn: &mut SqliteConnection, payment: &Document, sign: i64) -> EngineResult<()> {
    let DocumentDetails::Payment {
        order_id: Some(order_id),
        ..
    } = &payment.details
    else {
        return Ok(());
    };

    let mut order = claim(&mut *conn, order_id).await?;
    if let DocumentDetails::CustomerOrder { paid_cents, .. } = &mut order.details {
        *paid_cents += sign * payment.base_total().cents();
    }
    save(conn, &mut order).await?;

    info!(
        order_id = %order.id,
        payment_id = %payment.id,
        amount = sign * payment.base_total().cents(),
        "Order payment posted"
    );
    Ok(())
}
