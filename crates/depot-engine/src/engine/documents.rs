//! # Document Store Operations
//!
//! ## Create Flow
//! ```text
//! draft ──► validate_draft (shape) ──► BEGIN + next_number
//!                                          │
//!                                          ▼
//!                         check_references (warehouses, linked document)
//!                                          │
//!                                          ▼
//!                  build_lines (catalog snapshot, prices, system quantities)
//!                                          │
//!                                          ▼
//!                  on_create effect (supplier return, payment) ──► INSERT
//! ```
//!
//! Editing and deleting are only allowed in the statuses the kind's table
//! lists as editable. Confirmed receipts are the exception for deletion:
//! their ledger effect is reversed first.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use super::{claim, ledger, orders, save, transition, Engine};
use crate::error::{EngineResult, Outcome};
use depot_core::machine;
use depot_core::validation::{line_field, validate_draft};
use depot_core::{
    Actor, CoreError, Document, DocumentDetails, DocumentDraft, DocumentKind, DocumentStatus,
    ExchangeRate, LineItem, PaymentDirection, StockWarning, ValidationError,
};
use depot_db::{CatalogRepository, DbError, DocumentRepository, StockRepository};

impl Engine {
    /// Creates a document in its kind's initial status.
    ///
    /// Supplier returns leave stock immediately (hard block on shortage);
    /// payments linked to a customer order credit its paid amount.
    pub async fn create_document(
        &self,
        kind: DocumentKind,
        draft: DocumentDraft,
        actor: &Actor,
    ) -> EngineResult<Outcome<Document>> {
        validate_draft(kind, &draft)?;
        self.check_base_rate(&draft)?;

        let mut tx = self.db.begin().await?;
        let number = DocumentRepository::new(&mut tx).next_number(kind).await?;

        let mut errors = check_references(&mut tx, kind, &draft).await?;
        let lines = build_lines(&mut tx, kind, &draft, &mut errors).await?;
        if !errors.is_empty() {
            return Err(errors.into());
        }
        let table = machine::table(kind);

        let now = Utc::now();
        let mut doc = Document {
            id: Uuid::new_v4().to_string(),
            number,
            status: table.initial,
            counterpart_id: draft.counterpart_id.clone(),
            warehouse_id: draft.warehouse_id.clone(),
            date: draft.date,
            due_date: draft.due_date,
            currency: draft.currency.clone(),
            exchange_rate: draft.exchange_rate,
            lines,
            total_cents: draft.amount_cents.unwrap_or(0),
            details: initial_details(kind, &draft)?,
            notes: draft.notes.clone(),
            created_by: actor.id.clone(),
            created_at: now,
            updated_at: now,
            version: 1,
        };
        doc.recompute_totals();

        let warnings = match table.on_create {
            Some(effect) => transition::apply_effect(&mut tx, &mut doc, effect, actor).await?,
            None => Vec::new(),
        };

        DocumentRepository::new(&mut tx).insert(&doc).await?;
        tx.commit().await?;

        info!(
            document_id = %doc.id,
            number = %doc.number,
            kind = %kind,
            total = doc.total_cents,
            "Document created"
        );
        Ok(Outcome::new(doc, warnings))
    }

    /// Replaces header and lines of an editable document.
    ///
    /// With `expected_version`, the edit fails as a storage conflict when
    /// someone else wrote the document since the caller read it. A reserved
    /// customer order is released and reserved again for its new lines.
    pub async fn update_document(
        &self,
        id: &str,
        draft: DocumentDraft,
        expected_version: Option<i64>,
        actor: &Actor,
    ) -> EngineResult<Outcome<Document>> {
        let mut tx = self.db.begin().await?;
        let mut doc = claim(&mut tx, id).await?;

        if let Some(expected) = expected_version {
            if doc.version - 1 != expected {
                return Err(DbError::conflict("Document", id).into());
            }
        }

        let kind = doc.kind();
        ensure_editable(&doc)?;
        validate_draft(kind, &draft)?;
        self.check_base_rate(&draft)?;
        let mut errors = check_references(&mut tx, kind, &draft).await?;
        let lines = build_lines(&mut tx, kind, &draft, &mut errors).await?;
        if !errors.is_empty() {
            return Err(errors.into());
        }

        let was_reserved = is_reserved(&doc);
        if was_reserved {
            orders::release(&mut tx, &mut doc).await?;
        }

        doc.lines = lines;
        if kind != DocumentKind::CustomerOrder {
            doc.details = initial_details(kind, &draft)?;
        }
        doc.counterpart_id = draft.counterpart_id;
        doc.warehouse_id = draft.warehouse_id;
        doc.date = draft.date;
        doc.due_date = draft.due_date;
        doc.currency = draft.currency;
        doc.exchange_rate = draft.exchange_rate;
        doc.notes = draft.notes;
        doc.recompute_totals();

        let warnings = if was_reserved {
            orders::hold(&mut tx, &mut doc).await?
        } else {
            Vec::new()
        };

        save(&mut tx, &mut doc).await?;
        tx.commit().await?;

        info!(
            document_id = %doc.id,
            number = %doc.number,
            actor = %actor.id,
            version = doc.version,
            "Document updated"
        );
        Ok(Outcome::new(doc, warnings))
    }

    /// Deletes a document.
    ///
    /// A confirmed receipt is removed with a compensating negative delta;
    /// the warnings list every pair that went negative because of it.
    pub async fn delete_document(&self, id: &str, actor: &Actor) -> EngineResult<Outcome<()>> {
        let mut tx = self.db.begin().await?;
        let mut doc = claim(&mut tx, id).await?;

        let posted = doc.kind() == DocumentKind::Receipt && doc.status == DocumentStatus::Confirmed;
        let warnings: Vec<StockWarning> = if posted {
            ledger::reverse(&mut tx, &doc.id, actor).await?
        } else {
            ensure_editable(&doc)?;
            if is_reserved(&doc) {
                orders::release(&mut tx, &mut doc).await?;
            }
            Vec::new()
        };

        DocumentRepository::new(&mut tx).delete(&doc.id).await?;
        tx.commit().await?;

        info!(
            document_id = %doc.id,
            number = %doc.number,
            actor = %actor.id,
            reversed = posted,
            "Document deleted"
        );
        Ok(Outcome::new((), warnings))
    }

    pub async fn get_document(&self, id: &str) -> EngineResult<Document> {
        let mut conn = self.db.acquire().await?;
        let doc = DocumentRepository::new(&mut conn)
            .get(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Document", id))?;
        Ok(doc)
    }

    /// Documents of one kind, newest first.
    pub async fn list_documents(
        &self,
        kind: DocumentKind,
        status: Option<DocumentStatus>,
    ) -> EngineResult<Vec<Document>> {
        let mut conn = self.db.acquire().await?;
        Ok(DocumentRepository::new(&mut conn).list(kind, status).await?)
    }

    /// Documents in the base currency must use the identity rate.
    fn check_base_rate(&self, draft: &DocumentDraft) -> Result<(), ValidationError> {
        if draft.currency == self.config.ledger.base_currency
            && draft.exchange_rate != ExchangeRate::identity()
        {
            return Err(ValidationError::NotAllowed {
                field: "exchange_rate".to_string(),
                reason: format!("{} is the base currency", draft.currency),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn ensure_editable(doc: &Document) -> Result<(), CoreError> {
    let table = machine::table(doc.kind());
    if table.is_editable(doc.status) {
        Ok(())
    } else {
        Err(CoreError::NotEditable {
            kind: doc.kind(),
            document_id: doc.id.clone(),
            status: doc.status,
            editable: table.editable.to_vec(),
        })
    }
}

fn is_reserved(doc: &Document) -> bool {
    matches!(doc.details, DocumentDetails::CustomerOrder { reserved: true, .. })
}

/// Kind a linked document must have.
fn reference_kind(kind: DocumentKind) -> Option<DocumentKind> {
    match kind {
        DocumentKind::Receipt => Some(DocumentKind::PurchaseOrder),
        DocumentKind::SupplierReturn | DocumentKind::SupplierInvoice => Some(DocumentKind::Receipt),
        DocumentKind::CustomerReturn | DocumentKind::Payment => Some(DocumentKind::CustomerOrder),
        _ => None,
    }
}

/// Warehouses must exist and be active; a linked document must exist and
/// have the kind the draft's kind links to. Returns every violation found.
async fn check_references(
    conn: &mut SqliteConnection,
    kind: DocumentKind,
    draft: &DocumentDraft,
) -> EngineResult<Vec<ValidationError>> {
    let mut errors = Vec::new();

    let warehouses = [
        ("warehouse_id", draft.warehouse_id.as_deref()),
        ("destination_warehouse_id", draft.destination_warehouse_id.as_deref()),
    ];
    for (field, id) in warehouses {
        let Some(id) = id else { continue };
        let usable = CatalogRepository::new(&mut *conn)
            .get_warehouse(id)
            .await?
            .is_some_and(|w| w.is_active);
        if !usable {
            errors.push(ValidationError::UnknownReference {
                field: field.to_string(),
                entity: "Warehouse".to_string(),
                id: id.to_string(),
            });
        }
    }

    if let (Some(reference_id), Some(expected)) = (draft.reference_id.as_deref(), reference_kind(kind)) {
        match DocumentRepository::new(&mut *conn).get(reference_id).await? {
            None => errors.push(ValidationError::UnknownReference {
                field: "reference_id".to_string(),
                entity: expected.to_string(),
                id: reference_id.to_string(),
            }),
            Some(linked) if linked.kind() != expected => errors.push(ValidationError::NotAllowed {
                field: "reference_id".to_string(),
                reason: format!("{} must link to a {}, not a {}", kind, expected, linked.kind()),
            }),
            Some(_) => {}
        }
        if kind == DocumentKind::Payment && draft.direction != Some(PaymentDirection::Incoming) {
            errors.push(ValidationError::NotAllowed {
                field: "direction".to_string(),
                reason: "payments against a customer order are incoming".to_string(),
            });
        }
    }

    Ok(errors)
}

/// Resolves draft lines against the catalog.
///
/// Names are snapshotted; unpriced kinds take the cost price; inventory
/// counts without a system quantity read it from the ledger. Unknown
/// products are appended to `errors`.
async fn build_lines(
    conn: &mut SqliteConnection,
    kind: DocumentKind,
    draft: &DocumentDraft,
    errors: &mut Vec<ValidationError>,
) -> EngineResult<Vec<LineItem>> {
    let mut lines = Vec::with_capacity(draft.lines.len());

    for (i, line) in draft.lines.iter().enumerate() {
        let product = CatalogRepository::new(&mut *conn)
            .get_product(&line.product_id)
            .await?
            .filter(|p| p.is_active);
        let Some(product) = product else {
            errors.push(ValidationError::UnknownReference {
                field: line_field(i, "product_id"),
                entity: "Product".to_string(),
                id: line.product_id.clone(),
            });
            continue;
        };

        let price = if kind.is_priced() {
            line.unit_price_cents.unwrap_or_default()
        } else {
            product.cost_price_cents
        };
        let mut item = LineItem::new(product.id, product.name, line.quantity, price);

        match kind {
            DocumentKind::InternalOrder => item.shipped_quantity = line.shipped_quantity,
            DocumentKind::InventoryCount => {
                let system = match line.system_quantity {
                    Some(q) => q,
                    None => StockRepository::new(&mut *conn)
                        .get(&item.product_id, draft.warehouse_id.as_deref().unwrap_or_default())
                        .await?
                        .map_or(0, |e| e.quantity),
                };
                item.system_quantity = Some(system);
            }
            _ => {}
        }
        lines.push(item);
    }

    Ok(lines)
}

fn initial_details(kind: DocumentKind, draft: &DocumentDraft) -> Result<DocumentDetails, ValidationError> {
    let reference = draft.reference_id.clone();
    let details = match kind {
        DocumentKind::PurchaseOrder => DocumentDetails::PurchaseOrder {
            received_at: None,
            receipt_id: None,
        },
        DocumentKind::Receipt => DocumentDetails::Receipt {
            order_id: reference,
            confirmed_at: None,
        },
        DocumentKind::SupplierReturn => DocumentDetails::SupplierReturn {
            receipt_id: reference,
        },
        DocumentKind::CustomerOrder => DocumentDetails::CustomerOrder {
            reserved: false,
            paid_cents: 0,
            shipped_cents: 0,
        },
        DocumentKind::CustomerReturn => DocumentDetails::CustomerReturn {
            order_id: reference,
            accepted_at: None,
        },
        DocumentKind::InternalOrder => DocumentDetails::InternalOrder {
            destination_warehouse_id: draft.destination_warehouse_id.clone().unwrap_or_default(),
            transfer_id: None,
        },
        DocumentKind::InventoryCount => DocumentDetails::InventoryCount {
            confirmed_at: None,
            writeoff_id: None,
            receipt_id: None,
        },
        DocumentKind::WriteOff => DocumentDetails::WriteOff {
            inventory_count_id: None,
        },
        DocumentKind::Payment => DocumentDetails::Payment {
            direction: draft.direction.unwrap_or(PaymentDirection::Incoming),
            order_id: reference,
        },
        DocumentKind::SupplierInvoice => DocumentDetails::SupplierInvoice {
            receipt_id: reference,
        },
        DocumentKind::Shipment | DocumentKind::Transfer => {
            return Err(ValidationError::NotAllowed {
                field: "kind".to_string(),
                reason: format!("{} documents are created by the engine only", kind),
            })
        }
    };
    Ok(details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{actor, draft, engine, stock_up, BRANCH, FLOUR, MAIN, SUGAR};
    use depot_core::{ErrorCategory, LineDraft};

    fn order_draft(qty: i64) -> DocumentDraft {
        draft()
            .counterpart("customer-1")
            .warehouse(MAIN)
            .line(LineDraft::new(FLOUR, qty, 1_500))
    }

    #[tokio::test]
    async fn test_create_numbers_and_snapshots() {
        let engine = engine().await;

        let first = engine
            .create_document(DocumentKind::CustomerOrder, order_draft(2), &actor())
            .await
            .unwrap()
            .value;
        let second = engine
            .create_document(DocumentKind::CustomerOrder, order_draft(3), &actor())
            .await
            .unwrap()
            .value;

        assert_eq!(first.number, "CO-000001");
        assert_eq!(second.number, "CO-000002");
        assert_eq!(first.status, DocumentStatus::Pending);
        assert_eq!(first.lines[0].product_name, "Flour 1kg");
        assert_eq!(first.total_cents, 3_000);
        let stored = engine.get_document(&first.id).await.unwrap();
        assert_eq!(stored.number, first.number);
        assert_eq!(stored.lines, first.lines);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_unpriced_kinds_use_cost_price() {
        let engine = engine().await;
        let count = engine
            .create_document(
                DocumentKind::InventoryCount,
                draft().warehouse(MAIN).line(LineDraft::unpriced(SUGAR, 4)),
                &actor(),
            )
            .await
            .unwrap()
            .value;

        assert_eq!(count.lines[0].unit_price_cents, 500);
        assert_eq!(count.lines[0].system_quantity, Some(0));
        assert_eq!(count.total_cents, 2_000);
    }

    #[tokio::test]
    async fn test_inactive_warehouse_rejected() {
        let engine = engine().await;
        engine.set_warehouse_active(BRANCH, false).await.unwrap();

        let err = engine
            .create_document(
                DocumentKind::InternalOrder,
                draft()
                    .warehouse(MAIN)
                    .destination(BRANCH)
                    .line(LineDraft::unpriced(FLOUR, 1)),
                &actor(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.category(), ErrorCategory::ValidationFailed);
        assert!(err.to_string().contains("destination_warehouse_id"));
        assert!(engine
            .list_documents(DocumentKind::InternalOrder, None)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_unknown_product_and_reference() {
        let engine = engine().await;
        let err = engine
            .create_document(
                DocumentKind::Receipt,
                draft()
                    .counterpart("supplier-1")
                    .warehouse(MAIN)
                    .reference("no-such-order")
                    .line(LineDraft::new("p-ghost", 1, 100)),
                &actor(),
            )
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("reference_id"));
        assert!(message.contains("lines[0].product_id"));
    }

    #[tokio::test]
    async fn test_oversized_quantity_is_rejected_not_wrapped() {
        let engine = engine().await;
        let err = engine
            .create_document(
                DocumentKind::CustomerOrder,
                draft()
                    .counterpart("customer-1")
                    .warehouse(MAIN)
                    .line(LineDraft::new(FLOUR, i64::MAX / 2, 1_000)),
                &actor(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.category(), ErrorCategory::ValidationFailed);
        assert!(err.to_string().contains("lines[0].quantity"));
    }

    #[tokio::test]
    async fn test_base_currency_needs_identity_rate() {
        let engine = engine().await;
        let err = engine
            .create_document(
                DocumentKind::CustomerOrder,
                order_draft(1).rate(ExchangeRate::from_scaled(20_000)),
                &actor(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exchange_rate"));
    }

    #[tokio::test]
    async fn test_update_with_stale_version_conflicts() {
        let engine = engine().await;
        let order = engine
            .create_document(DocumentKind::CustomerOrder, order_draft(2), &actor())
            .await
            .unwrap()
            .value;

        let edited = engine
            .update_document(&order.id, order_draft(4), Some(order.version), &actor())
            .await
            .unwrap()
            .value;
        assert_eq!(edited.total_cents, 6_000);
        assert_eq!(edited.version, order.version + 1);

        let err = engine
            .update_document(&order.id, order_draft(5), Some(order.version), &actor())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(engine.get_document(&order.id).await.unwrap().total_cents, 6_000);
    }

    #[tokio::test]
    async fn test_update_rereserves_reserved_order() {
        let engine = engine().await;
        stock_up(&engine, MAIN, FLOUR, 10, 800).await;

        let order = engine
            .create_document(DocumentKind::CustomerOrder, order_draft(4), &actor())
            .await
            .unwrap()
            .value;
        engine.reserve_order(&order.id, &actor()).await.unwrap();
        assert_eq!(engine.stock_at(FLOUR, MAIN).await.unwrap().reserved, 4);

        let edited = engine
            .update_document(&order.id, order_draft(12), None, &actor())
            .await
            .unwrap();
        assert_eq!(edited.warnings.len(), 1);
        assert_eq!(engine.stock_at(FLOUR, MAIN).await.unwrap().reserved, 10);
    }

    #[tokio::test]
    async fn test_confirmed_document_not_editable() {
        let engine = engine().await;
        stock_up(&engine, MAIN, FLOUR, 10, 800).await;
        let receipts = engine
            .list_documents(DocumentKind::Receipt, Some(DocumentStatus::Confirmed))
            .await
            .unwrap();
        let receipt = &receipts[0];

        let err = engine
            .update_document(
                &receipt.id,
                draft()
                    .counterpart("supplier-1")
                    .warehouse(MAIN)
                    .line(LineDraft::new(FLOUR, 1, 800)),
                None,
                &actor(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::InvalidTransition);
    }

    #[tokio::test]
    async fn test_delete_confirmed_receipt_compensates() {
        let engine = engine().await;
        stock_up(&engine, MAIN, FLOUR, 10, 800).await;
        let receipt_id = engine
            .list_documents(DocumentKind::Receipt, None)
            .await
            .unwrap()[0]
            .id
            .clone();

        let writeoff = engine
            .create_document(
                DocumentKind::WriteOff,
                draft().warehouse(MAIN).line(LineDraft::unpriced(FLOUR, 4)),
                &actor(),
            )
            .await
            .unwrap()
            .value;
        engine
            .transition_status(&writeoff.id, DocumentStatus::Confirmed, &actor())
            .await
            .unwrap();

        let deleted = engine.delete_document(&receipt_id, &actor()).await.unwrap();
        assert_eq!(deleted.warnings.len(), 1);

        let entry = engine.stock_at(FLOUR, MAIN).await.unwrap();
        assert_eq!(entry.quantity, -4);
        assert_eq!(entry.amount_cents, -3_200);
        assert_eq!(
            engine.get_document(&receipt_id).await.unwrap_err().category(),
            ErrorCategory::NotFound
        );
    }

    #[tokio::test]
    async fn test_delete_draft_has_no_ledger_effect() {
        let engine = engine().await;
        let receipt = engine
            .create_document(
                DocumentKind::Receipt,
                draft()
                    .counterpart("supplier-1")
                    .warehouse(MAIN)
                    .line(LineDraft::new(FLOUR, 5, 900)),
                &actor(),
            )
            .await
            .unwrap()
            .value;

        let deleted = engine.delete_document(&receipt.id, &actor()).await.unwrap();
        assert!(!deleted.has_warnings());
        assert_eq!(engine.stock_at(FLOUR, MAIN).await.unwrap().quantity, 0);
    }
}
