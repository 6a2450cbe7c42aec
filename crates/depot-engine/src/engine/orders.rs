//! # Reservation Manager
//!
//! Holds are recorded per order in `reservations`, next to the `reserved`
//! counter of each ledger row. Releasing an order gives back exactly its
//! own holds, so concurrent orders on the same product never eat into each
//! other's reservation.
//!
//! ## Reservation Lifecycle
//! ```text
//! reserve_order / confirm
//!     │  hold = min(unshipped, max(available, 0))
//!     │  shortfall → backorder warning, order still reserved
//!     ▼
//! create_shipment / ship
//!     │  consume min(hold, shipped) first, then issue stock (soft)
//!     ▼
//! unreserve_order / cancel
//!        give back whatever the order still holds
//! ```

use sqlx::SqliteConnection;
use tracing::{info, warn};

use super::ledger;
use super::{claim, derive, save, Engine};
use crate::error::{EngineResult, Outcome};
use depot_core::machine;
use depot_core::reservation::{plan_consumption, plan_reservation};
use depot_core::validation::{line_field, validate_shipment_lines};
use depot_core::{
    merge_quantities, Actor, CoreError, Document, DocumentDetails, DocumentKind, DocumentStatus,
    LineDraft, LineItem, StockPolicy, StockWarning, ValidationError,
};
use depot_db::{ReservationRepository, StockRepository};

impl Engine {
    /// Reserves the unshipped quantities of a customer order.
    ///
    /// Shortages do not fail: the order holds what exists and a backorder
    /// warning is returned per under-stocked product.
    pub async fn reserve_order(&self, id: &str, actor: &Actor) -> EngineResult<Outcome<Document>> {
        let mut tx = self.db.begin().await?;
        let mut order = claim(&mut tx, id).await?;
        ensure_customer_order(&order)?;

        let table = machine::table(DocumentKind::CustomerOrder);
        if table.is_terminal(order.status) {
            return Err(CoreError::NotEditable {
                kind: DocumentKind::CustomerOrder,
                document_id: order.id.clone(),
                status: order.status,
                editable: table.editable.to_vec(),
            }
            .into());
        }
        if is_reserved(&order) {
            return Err(CoreError::AlreadyReserved { order_id: order.id }.into());
        }

        let warnings = hold(&mut tx, &mut order).await?;
        save(&mut tx, &mut order).await?;
        tx.commit().await?;

        info!(order_id = %order.id, actor = %actor.id, backorders = warnings.len(), "Order reserved");
        Ok(Outcome::new(order, warnings))
    }

    /// Gives back everything the order still holds.
    pub async fn unreserve_order(&self, id: &str, actor: &Actor) -> EngineResult<Document> {
        let mut tx = self.db.begin().await?;
        let mut order = claim(&mut tx, id).await?;
        ensure_customer_order(&order)?;

        if !is_reserved(&order) {
            return Err(CoreError::already_processed(&order.id, "unreserve").into());
        }

        release(&mut tx, &mut order).await?;
        save(&mut tx, &mut order).await?;
        tx.commit().await?;

        info!(order_id = %order.id, actor = %actor.id, "Order unreserved");
        Ok(order)
    }

    /// Ships part of a confirmed customer order.
    ///
    /// Each product must be on the order and the quantity may not exceed
    /// what is still unshipped.
    pub async fn create_shipment(
        &self,
        order_id: &str,
        lines: Vec<LineDraft>,
        actor: &Actor,
    ) -> EngineResult<Outcome<Document>> {
        validate_shipment_lines(&lines)?;

        let mut tx = self.db.begin().await?;
        let mut order = claim(&mut tx, order_id).await?;
        ensure_customer_order(&order)?;

        if order.status != DocumentStatus::Confirmed {
            return Err(ValidationError::NotAllowed {
                field: "status".to_string(),
                reason: format!("{} is {}, shipments need a confirmed order", order.number, order.status),
            }
            .into());
        }

        let requested = merge_quantities(lines.iter().map(|l| (l.product_id.as_str(), l.quantity)));
        let mut errors = Vec::new();
        for (product_id, qty) in &requested {
            let index = lines
                .iter()
                .position(|l| &l.product_id == product_id)
                .unwrap_or_default();
            let on_order: Vec<&LineItem> = order
                .lines
                .iter()
                .filter(|l| &l.product_id == product_id)
                .collect();
            let unshipped: i64 = on_order.iter().map(|l| l.unshipped()).sum();

            if on_order.is_empty() {
                errors.push(ValidationError::NotAllowed {
                    field: line_field(index, "product_id"),
                    reason: format!("{} is not on order {}", product_id, order.number),
                });
            } else if *qty > unshipped {
                errors.push(ValidationError::OutOfRange {
                    field: line_field(index, "quantity"),
                    min: 1,
                    max: unshipped,
                });
            }
        }
        if !errors.is_empty() {
            return Err(errors.into());
        }

        let (shipment, warnings) = ship(&mut tx, &mut order, requested, actor).await?;
        save(&mut tx, &mut order).await?;
        tx.commit().await?;

        Ok(Outcome::new(shipment, warnings))
    }
}

fn ensure_customer_order(doc: &Document) -> Result<(), ValidationError> {
    if doc.kind() == DocumentKind::CustomerOrder {
        Ok(())
    } else {
        Err(ValidationError::NotAllowed {
            field: "kind".to_string(),
            reason: format!("{} is a {}, not a customer order", doc.number, doc.kind()),
        })
    }
}

fn is_reserved(doc: &Document) -> bool {
    matches!(doc.details, DocumentDetails::CustomerOrder { reserved: true, .. })
}

fn set_reserved(doc: &mut Document, value: bool) {
    if let DocumentDetails::CustomerOrder { reserved, .. } = &mut doc.details {
        *reserved = value;
    }
}

/// Holds the order's unshipped quantities and marks it reserved.
pub(crate) async fn hold(
    conn: &mut SqliteConnection,
    order: &mut Document,
) -> EngineResult<Vec<StockWarning>> {
    let warehouse = order.warehouse().to_string();
    let demands: Vec<(String, i64)> =
        merge_quantities(order.lines.iter().map(|l| (l.product_id.as_str(), l.unshipped())))
            .into_iter()
            .filter(|(_, qty)| *qty > 0)
            .collect();
    let product_ids: Vec<String> = demands.iter().map(|(id, _)| id.clone()).collect();

    let entries = StockRepository::new(&mut *conn)
        .get_many(&warehouse, &product_ids)
        .await?;
    let plan = plan_reservation(&warehouse, &demands, &entries);

    for h in &plan.holds {
        StockRepository::new(&mut *conn)
            .reserve(&h.product_id, &h.warehouse_id, h.quantity)
            .await?;
        ReservationRepository::new(&mut *conn).add(&order.id, h).await?;
    }
    for w in &plan.warnings {
        warn!(
            order_id = %order.id,
            product_id = %w.product_id,
            requested = w.requested,
            available = w.available,
            "Backorder: reserved less than requested"
        );
    }

    set_reserved(order, true);
    info!(order_id = %order.id, held = plan.total_held(), "Stock held");
    Ok(plan.warnings)
}

/// Gives back every hold of the order and clears its reserved flag.
pub(crate) async fn release(conn: &mut SqliteConnection, order: &mut Document) -> EngineResult<()> {
    let holds = ReservationRepository::new(&mut *conn)
        .list_for_order(&order.id)
        .await?;

    for h in &holds {
        StockRepository::new(&mut *conn)
            .reserve(&h.product_id, &h.warehouse_id, -h.quantity)
            .await?;
    }
    ReservationRepository::new(&mut *conn).clear(&order.id).await?;

    set_reserved(order, false);
    info!(order_id = %order.id, holds = holds.len(), "Stock released");
    Ok(())
}

/// Ships `quantities` (merged per product) of `order` through one derived
/// shipment.
///
/// The order's own holds are consumed first; stock then leaves the
/// warehouse under the soft policy. Shipped quantities and the shipped
/// amount are recorded on the order, which the caller saves.
pub(crate) async fn ship(
    conn: &mut SqliteConnection,
    order: &mut Document,
    quantities: Vec<(String, i64)>,
    actor: &Actor,
) -> EngineResult<(Document, Vec<StockWarning>)> {
    let warehouse = order.warehouse().to_string();

    let lines: Vec<LineItem> = quantities
        .iter()
        .filter_map(|(product_id, qty)| {
            order
                .lines
                .iter()
                .find(|l| &l.product_id == product_id)
                .map(|l| LineItem::new(product_id.clone(), l.product_name.clone(), *qty, l.unit_price_cents))
        })
        .collect();

    let shipment = derive(
        &mut *conn,
        order,
        DocumentDetails::Shipment {
            order_id: order.id.clone(),
        },
        DocumentStatus::Completed,
        lines,
        actor,
    )
    .await?;

    let holds = ReservationRepository::new(&mut *conn)
        .list_for_order(&order.id)
        .await?;
    for (product_id, consumed) in plan_consumption(&holds, &quantities) {
        StockRepository::new(&mut *conn)
            .reserve(&product_id, &warehouse, -consumed)
            .await?;
        ReservationRepository::new(&mut *conn)
            .consume(&order.id, &product_id, &warehouse, consumed)
            .await?;
    }

    let warnings = ledger::issue(
        conn,
        &shipment,
        &warehouse,
        &quantities,
        StockPolicy::SoftWarn,
        actor,
    )
    .await?;

    for (product_id, qty) in &quantities {
        let mut left = *qty;
        for line in order.lines.iter_mut().filter(|l| &l.product_id == product_id) {
            let take = left.min(line.unshipped());
            if take > 0 {
                line.shipped_quantity = Some(line.shipped_quantity.unwrap_or(0) + take);
                left -= take;
            }
        }
    }
    if let DocumentDetails::CustomerOrder { shipped_cents, .. } = &mut order.details {
        *shipped_cents += shipment.base_total().cents();
    }

    info!(
        order_id = %order.id,
        shipment_id = %shipment.id,
        total = shipment.total_cents,
        "Order shipped"
    );
    Ok((shipment, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::sync::Arc;

    use crate::engine::testing::{
        actor, draft, engine, file_engine, stock_up, FLOUR, MAIN, SUGAR,
    };
    use depot_core::{DocumentDraft, ErrorCategory, WarningKind};

    fn order_draft(lines: &[(&str, i64)]) -> DocumentDraft {
        lines.iter().fold(
            draft().counterpart("customer-1").warehouse(MAIN),
            |d, (product, qty)| d.line(LineDraft::new(*product, *qty, 1_500)),
        )
    }

    fn assert_send<T: Send>(_: &T) {}

    /// Repeats `op` while it fails with a retryable error.
    async fn settle<T, F, Fut>(mut op: F) -> T
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = EngineResult<T>>,
    {
        for _ in 0..100 {
            match op().await {
                Ok(value) => return value,
                Err(err) if err.is_retryable() => tokio::task::yield_now().await,
                Err(err) => panic!("unexpected error: {}", err),
            }
        }
        panic!("operation kept failing with retryable errors");
    }

    async fn new_order(engine: &Engine, lines: &[(&str, i64)]) -> Document {
        engine
            .create_document(DocumentKind::CustomerOrder, order_draft(lines), &actor())
            .await
            .unwrap()
            .value
    }

    #[tokio::test]
    async fn test_reserve_with_shortage_warns_and_proceeds() {
        let engine = engine().await;
        stock_up(&engine, MAIN, FLOUR, 3, 800).await;
        let order = new_order(&engine, &[(FLOUR, 5)]).await;

        let reserved = engine.reserve_order(&order.id, &actor()).await.unwrap();

        assert_eq!(reserved.warnings.len(), 1);
        assert_eq!(reserved.warnings[0].kind, WarningKind::Backorder);
        assert_eq!(reserved.warnings[0].requested, 5);
        assert_eq!(reserved.warnings[0].available, 3);
        assert!(is_reserved(&reserved.value));
        assert_eq!(engine.stock_at(FLOUR, MAIN).await.unwrap().reserved, 3);

        let err = engine.reserve_order(&order.id, &actor()).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::AlreadyProcessed);
        assert_eq!(engine.stock_at(FLOUR, MAIN).await.unwrap().reserved, 3);
    }

    #[tokio::test]
    async fn test_unreserve_returns_only_own_hold() {
        let engine = engine().await;
        stock_up(&engine, MAIN, FLOUR, 10, 800).await;
        let first = new_order(&engine, &[(FLOUR, 4)]).await;
        let second = new_order(&engine, &[(FLOUR, 8)]).await;

        engine.reserve_order(&first.id, &actor()).await.unwrap();
        let second_res = engine.reserve_order(&second.id, &actor()).await.unwrap();
        assert_eq!(second_res.warnings.len(), 1);
        assert_eq!(engine.stock_at(FLOUR, MAIN).await.unwrap().reserved, 10);

        engine.unreserve_order(&first.id, &actor()).await.unwrap();
        assert_eq!(engine.stock_at(FLOUR, MAIN).await.unwrap().reserved, 6);

        let err = engine.unreserve_order(&first.id, &actor()).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::AlreadyProcessed);
        assert_eq!(engine.stock_at(FLOUR, MAIN).await.unwrap().reserved, 6);
    }

    #[tokio::test]
    async fn test_confirm_reserves_and_cancel_releases() {
        let engine = engine().await;
        stock_up(&engine, MAIN, FLOUR, 10, 800).await;
        let order = new_order(&engine, &[(FLOUR, 4)]).await;

        let confirmed = engine
            .transition_status(&order.id, DocumentStatus::Confirmed, &actor())
            .await
            .unwrap();
        assert!(is_reserved(&confirmed.value));
        assert_eq!(engine.stock_at(FLOUR, MAIN).await.unwrap().reserved, 4);

        let cancelled = engine
            .transition_status(&order.id, DocumentStatus::Cancelled, &actor())
            .await
            .unwrap()
            .value;
        assert!(!is_reserved(&cancelled));
        let entry = engine.stock_at(FLOUR, MAIN).await.unwrap();
        assert_eq!(entry.reserved, 0);
        assert_eq!(entry.quantity, 10);

        let err = engine.reserve_order(&order.id, &actor()).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::InvalidTransition);
    }

    #[tokio::test]
    async fn test_partial_shipment_consumes_reservation() {
        let engine = engine().await;
        stock_up(&engine, MAIN, FLOUR, 10, 800).await;
        let order = new_order(&engine, &[(FLOUR, 6)]).await;
        engine
            .transition_status(&order.id, DocumentStatus::Confirmed, &actor())
            .await
            .unwrap();

        let shipment = engine
            .create_shipment(&order.id, vec![LineDraft::unpriced(FLOUR, 2)], &actor())
            .await
            .unwrap()
            .value;
        assert_eq!(shipment.kind(), DocumentKind::Shipment);
        assert_eq!(shipment.status, DocumentStatus::Completed);
        assert_eq!(shipment.total_cents, 3_000);

        let entry = engine.stock_at(FLOUR, MAIN).await.unwrap();
        assert_eq!(entry.quantity, 8);
        assert_eq!(entry.reserved, 4);

        let shipped = engine
            .transition_status(&order.id, DocumentStatus::Shipped, &actor())
            .await
            .unwrap()
            .value;
        let entry = engine.stock_at(FLOUR, MAIN).await.unwrap();
        assert_eq!(entry.quantity, 4);
        assert_eq!(entry.reserved, 0);

        assert_eq!(shipped.lines[0].unshipped(), 0);
        assert!(matches!(
            shipped.details,
            DocumentDetails::CustomerOrder {
                shipped_cents: 9_000,
                ..
            }
        ));
        assert_eq!(
            engine
                .list_documents(DocumentKind::Shipment, None)
                .await
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn test_shipment_quantity_bounded_by_order() {
        let engine = engine().await;
        let order = new_order(&engine, &[(FLOUR, 2)]).await;

        let err = engine
            .create_shipment(&order.id, vec![LineDraft::unpriced(FLOUR, 1)], &actor())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("status"));

        engine
            .transition_status(&order.id, DocumentStatus::Confirmed, &actor())
            .await
            .unwrap();
        let err = engine
            .create_shipment(
                &order.id,
                vec![LineDraft::unpriced(FLOUR, 3), LineDraft::unpriced(SUGAR, 1)],
                &actor(),
            )
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("lines[0].quantity"));
        assert!(message.contains("lines[1].product_id"));
    }

    #[tokio::test]
    async fn test_shipment_past_stock_only_warns() {
        let engine = engine().await;
        let order = new_order(&engine, &[(SUGAR, 2)]).await;
        let confirmed = engine
            .transition_status(&order.id, DocumentStatus::Confirmed, &actor())
            .await
            .unwrap();
        assert_eq!(confirmed.warnings.len(), 1);

        let shipped = engine
            .transition_status(&order.id, DocumentStatus::Shipped, &actor())
            .await
            .unwrap();
        assert_eq!(shipped.warnings.len(), 1);
        assert_eq!(shipped.warnings[0].kind, WarningKind::NegativeStock);
        assert_eq!(engine.stock_at(SUGAR, MAIN).await.unwrap().quantity, -2);
    }

    #[tokio::test]
    async fn test_engine_futures_are_send() {
        let engine = engine().await;
        let clerk = actor();

        assert_send(&engine.create_document(
            DocumentKind::CustomerOrder,
            order_draft(&[(FLOUR, 1)]),
            &clerk,
        ));
        assert_send(&engine.transition_status("d-1", DocumentStatus::Confirmed, &clerk));
        assert_send(&engine.reserve_order("d-1", &clerk));
        assert_send(&engine.create_shipment(
            "d-1",
            vec![LineDraft::unpriced(FLOUR, 1)],
            &clerk,
        ));
        assert_send(&engine.delete_document("d-1", &clerk));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_orders_keep_reserved_equal_to_holds() {
        let (engine, path) = file_engine(4).await;
        let engine = Arc::new(engine);
        stock_up(&engine, MAIN, FLOUR, 20, 800).await;

        let mut tasks = Vec::new();
        for i in 0..8 {
            let engine = Arc::clone(&engine);
            tasks.push(tokio::spawn(async move {
                let clerk = actor();
                let order = settle(|| {
                    engine.create_document(
                        DocumentKind::CustomerOrder,
                        order_draft(&[(FLOUR, 3)]),
                        &clerk,
                    )
                })
                .await
                .value;
                settle(|| engine.transition_status(&order.id, DocumentStatus::Confirmed, &clerk))
                    .await;
                if i % 2 == 1 {
                    settle(|| {
                        engine.transition_status(&order.id, DocumentStatus::Cancelled, &clerk)
                    })
                    .await;
                }
                order.id
            }));
        }

        let mut order_ids = Vec::new();
        for task in tasks {
            order_ids.push(task.await.unwrap());
        }

        let mut held = 0;
        {
            let mut conn = engine.db.acquire().await.unwrap();
            let mut reservations = ReservationRepository::new(&mut conn);
            for id in &order_ids {
                held += reservations
                    .list_for_order(id)
                    .await
                    .unwrap()
                    .iter()
                    .filter(|h| h.product_id == FLOUR && h.warehouse_id == MAIN)
                    .map(|h| h.quantity)
                    .sum::<i64>();
            }
        }

        let entry = engine.stock_at(FLOUR, MAIN).await.unwrap();
        assert_eq!(entry.reserved, held);
        assert_eq!(entry.quantity, 20);
        assert!(entry.reserved > 0 && entry.reserved <= 12);

        engine.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }
}
