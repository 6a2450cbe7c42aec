//! Companion documents of a confirmed inventory count.
//!
//! The differences frozen at confirmation drive both: shortages become a
//! write-off, surpluses a receipt. Each is created at most once per count,
//! guarded by the link stored on the count. A write-off may not take more
//! than the warehouse has available.

use chrono::Utc;
use tracing::info;

use super::ledger::{self, Valuation};
use super::{claim, derive, save, Engine};
use crate::error::{EngineResult, Outcome};
use depot_core::{
    Actor, CoreError, Document, DocumentDetails, DocumentStatus, LineItem, StockPolicy,
    ValidationError,
};

/// Which side of the count a companion document settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Shortage,
    Surplus,
}

impl Side {
    fn action(self) -> &'static str {
        match self {
            Side::Shortage => "create_writeoff",
            Side::Surplus => "create_receipt",
        }
    }

    fn noun(self) -> &'static str {
        match self {
            Side::Shortage => "shortage",
            Side::Surplus => "surplus",
        }
    }
}

impl Engine {
    /// Writes off every line the count found short, exactly once.
    pub async fn create_writeoff(&self, count_id: &str, actor: &Actor) -> EngineResult<Outcome<Document>> {
        self.settle_count(count_id, Side::Shortage, actor).await
    }

    /// Receives every line the count found in surplus, exactly once.
    pub async fn create_receipt(&self, count_id: &str, actor: &Actor) -> EngineResult<Outcome<Document>> {
        self.settle_count(count_id, Side::Surplus, actor).await
    }

    async fn settle_count(
        &self,
        count_id: &str,
        side: Side,
        actor: &Actor,
    ) -> EngineResult<Outcome<Document>> {
        let mut tx = self.db.begin().await?;
        let mut count = claim(&mut tx, count_id).await?;

        let DocumentDetails::InventoryCount {
            writeoff_id,
            receipt_id,
            ..
        } = &count.details
        else {
            return Err(ValidationError::NotAllowed {
                field: "kind".to_string(),
                reason: format!("{} is a {}, not an inventory count", count.number, count.kind()),
            }
            .into());
        };
        if count.status != DocumentStatus::Confirmed {
            return Err(ValidationError::NotAllowed {
                field: "status".to_string(),
                reason: format!("{} is {}, differences are frozen on confirmation", count.number, count.status),
            }
            .into());
        }
        let existing = match side {
            Side::Shortage => writeoff_id,
            Side::Surplus => receipt_id,
        };
        if existing.is_some() {
            return Err(CoreError::already_processed(&count.id, side.action()).into());
        }

        let lines: Vec<LineItem> = count
            .lines
            .iter()
            .filter_map(|l| {
                let difference = l.difference.unwrap_or(0);
                let qty = match side {
                    Side::Shortage => -difference,
                    Side::Surplus => difference,
                };
                (qty > 0).then(|| {
                    LineItem::new(l.product_id.clone(), l.product_name.clone(), qty, l.unit_price_cents)
                })
            })
            .collect();
        if lines.is_empty() {
            return Err(ValidationError::NotAllowed {
                field: "lines".to_string(),
                reason: format!("{} has no {} to settle", count.number, side.noun()),
            }
            .into());
        }

        let warehouse = count.warehouse().to_string();
        let (companion, warnings) = match side {
            Side::Shortage => {
                let writeoff = derive(
                    &mut tx,
                    &count,
                    DocumentDetails::WriteOff {
                        inventory_count_id: Some(count.id.clone()),
                    },
                    DocumentStatus::Confirmed,
                    lines,
                    actor,
                )
                .await?;
                let demands = writeoff.quantities_by_product();
                let warnings = ledger::issue(
                    &mut tx,
                    &writeoff,
                    &warehouse,
                    &demands,
                    StockPolicy::HardBlock,
                    actor,
                )
                .await?;
                (writeoff, warnings)
            }
            Side::Surplus => {
                let receipt = derive(
                    &mut tx,
                    &count,
                    DocumentDetails::Receipt {
                        order_id: None,
                        confirmed_at: Some(Utc::now()),
                    },
                    DocumentStatus::Confirmed,
                    lines,
                    actor,
                )
                .await?;
                ledger::receive(&mut tx, &receipt, &warehouse, Valuation::Cost, actor).await?;
                (receipt, Vec::new())
            }
        };

        if let DocumentDetails::InventoryCount {
            writeoff_id,
            receipt_id,
            ..
        } = &mut count.details
        {
            match side {
                Side::Shortage => *writeoff_id = Some(companion.id.clone()),
                Side::Surplus => *receipt_id = Some(companion.id.clone()),
            }
        }
        save(&mut tx, &mut count).await?;
        tx.commit().await?;

        info!(
            count_id = %count.id,
            document_id = %companion.id,
            number = %companion.number,
            "Count {} settled",
            side.noun()
        );
        Ok(Outcome::new(companion, warnings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{actor, draft, engine, stock_up, FLOUR, FLOUR_COST, MAIN, SUGAR};
    use depot_core::{DocumentKind, ErrorCategory, LineDraft};

    async fn confirmed_count(engine: &Engine, lines: Vec<LineDraft>) -> Document {
        let count = engine
            .create_document(
                DocumentKind::InventoryCount,
                lines.into_iter().fold(draft().warehouse(MAIN), |d, l| d.line(l)),
                &actor(),
            )
            .await
            .unwrap()
            .value;
        engine
            .transition_status(&count.id, DocumentStatus::Confirmed, &actor())
            .await
            .unwrap()
            .value
    }

    #[tokio::test]
    async fn test_writeoff_from_count_applies_once() {
        let engine = engine().await;
        stock_up(&engine, MAIN, FLOUR, 20, FLOUR_COST).await;

        let count = confirmed_count(&engine, vec![LineDraft::unpriced(FLOUR, 15)]).await;
        assert_eq!(count.lines[0].system_quantity, Some(20));
        assert_eq!(count.lines[0].difference, Some(-5));

        let writeoff = engine.create_writeoff(&count.id, &actor()).await.unwrap().value;
        assert_eq!(writeoff.kind(), DocumentKind::WriteOff);
        assert_eq!(writeoff.lines[0].quantity, 5);
        assert_eq!(engine.stock_at(FLOUR, MAIN).await.unwrap().quantity, 15);

        let err = engine.create_writeoff(&count.id, &actor()).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::AlreadyProcessed);
        assert_eq!(engine.stock_at(FLOUR, MAIN).await.unwrap().quantity, 15);
        assert_eq!(
            engine
                .list_documents(DocumentKind::WriteOff, None)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_difference_frozen_at_confirmation() {
        let engine = engine().await;
        stock_up(&engine, MAIN, FLOUR, 20, FLOUR_COST).await;
        let count = confirmed_count(&engine, vec![LineDraft::unpriced(FLOUR, 15)]).await;

        stock_up(&engine, MAIN, FLOUR, 7, FLOUR_COST).await;
        engine.create_writeoff(&count.id, &actor()).await.unwrap();

        let stored = engine.get_document(&count.id).await.unwrap();
        assert_eq!(stored.lines[0].difference, Some(-5));
        assert_eq!(engine.stock_at(FLOUR, MAIN).await.unwrap().quantity, 22);
    }

    #[tokio::test]
    async fn test_receipt_from_surplus_at_cost() {
        let engine = engine().await;
        let mut line = LineDraft::unpriced(SUGAR, 6);
        line.system_quantity = Some(2);
        let count = confirmed_count(&engine, vec![line, LineDraft::unpriced(FLOUR, 0)]).await;

        let receipt = engine.create_receipt(&count.id, &actor()).await.unwrap().value;
        assert_eq!(receipt.status, DocumentStatus::Confirmed);
        assert_eq!(receipt.lines.len(), 1);

        let entry = engine.stock_at(SUGAR, MAIN).await.unwrap();
        assert_eq!(entry.quantity, 4);
        assert_eq!(entry.amount_cents, 4 * 500);

        let err = engine.create_writeoff(&count.id, &actor()).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::ValidationFailed);
    }

    #[tokio::test]
    async fn test_writeoff_beyond_available_is_blocked() {
        let engine = engine().await;
        stock_up(&engine, MAIN, FLOUR, 3, FLOUR_COST).await;
        let mut line = LineDraft::unpriced(FLOUR, 0);
        line.system_quantity = Some(5);
        let count = confirmed_count(&engine, vec![line]).await;

        let err = engine.create_writeoff(&count.id, &actor()).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::InsufficientStock);
        assert_eq!(engine.stock_at(FLOUR, MAIN).await.unwrap().quantity, 3);

        let stored = engine.get_document(&count.id).await.unwrap();
        assert!(matches!(
            stored.details,
            DocumentDetails::InventoryCount { writeoff_id: None, .. }
        ));
    }

    #[tokio::test]
    async fn test_draft_count_cannot_be_settled() {
        let engine = engine().await;
        let count = engine
            .create_document(
                DocumentKind::InventoryCount,
                draft().warehouse(MAIN).line(LineDraft::unpriced(FLOUR, 1)),
                &actor(),
            )
            .await
            .unwrap()
            .value;

        let err = engine.create_receipt(&count.id, &actor()).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::ValidationFailed);
        assert!(err.to_string().contains("status"));
    }
}
