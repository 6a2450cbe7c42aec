//! # Validation Module
//!
//! Payload validation for documents and catalog entries.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Shape (THIS MODULE, pure)                                    │
//! │  ├── required header fields per kind                                   │
//! │  ├── line completeness: product, quantity > 0, price > 0               │
//! │  └── every problem collected, each with a field path                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: References (depot-engine, inside the transaction)            │
//! │  ├── products exist and are active                                     │
//! │  └── warehouses exist and are active                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use chrono::NaiveDate;
//! use depot_core::document::{DocumentDraft, DocumentKind, LineDraft};
//! use depot_core::validation::validate_draft;
//!
//! let day = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
//! let draft = DocumentDraft::new(day, "UZS")
//!     .counterpart("supplier-1")
//!     .warehouse("main")
//!     .line(LineDraft::new("flour", 10, 0));
//!
//! let errors = validate_draft(DocumentKind::Receipt, &draft).unwrap_err();
//! assert_eq!(errors[0].field(), "lines[0].unit_price_cents");
//! ```

use crate::document::{DocumentDraft, DocumentKind, LineDraft, LineItem};
use crate::error::ValidationError;
use crate::money::ExchangeRate;
use crate::{
    MAX_LINES_PER_DOCUMENT, MAX_LINE_QUANTITY, MAX_NOTES_LENGTH, MAX_PAYMENT_CENTS, MAX_PRICE_CENTS,
};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Only alphanumeric characters, hyphens, underscores
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();
    if sku.is_empty() {
        return Err(required("sku"));
    }
    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }
    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }
    Ok(())
}

/// Validates a display name (product, warehouse). 1..=200 characters.
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(required(field));
    }
    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }
    Ok(())
}

/// Validates an ISO 4217 style currency code: three ASCII uppercase letters.
///
/// ```rust
/// use depot_core::validation::validate_currency;
///
/// assert!(validate_currency("UZS").is_ok());
/// assert!(validate_currency("usd").is_err());
/// ```
pub fn validate_currency(code: &str) -> ValidationResult<()> {
    if code.trim().is_empty() {
        return Err(required("currency"));
    }
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ValidationError::InvalidFormat {
            field: "currency".to_string(),
            reason: "must be a three-letter uppercase code".to_string(),
        });
    }
    Ok(())
}

/// Validates an exchange rate (strictly positive).
pub fn validate_exchange_rate(rate: ExchangeRate) -> ValidationResult<()> {
    if !rate.is_valid() {
        return Err(ValidationError::MustBePositive {
            field: "exchange_rate".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a price in minor units. Zero is allowed for catalog prices.
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }
    Ok(())
}

fn quantity_out_of_range(index: usize, min: i64) -> ValidationError {
    ValidationError::OutOfRange {
        field: line_field(index, "quantity"),
        min,
        max: MAX_LINE_QUANTITY,
    }
}

// =============================================================================
// Document Drafts
// =============================================================================

/// Validates a document payload for `kind`, collecting every problem.
///
/// ## Rules
/// - Derived-only kinds (transfers, shipments) cannot be submitted directly
/// - Warehouse required for every kind that touches the ledger
/// - Counterpart required for supplier/customer documents and payments
/// - Lines: at least one; product required; quantity > 0 (counts: ≥ 0);
///   priced kinds need a price > 0
/// - Internal orders: destination required and different from the source
/// - Payments: no lines, amount > 0, direction required
pub fn validate_draft(kind: DocumentKind, draft: &DocumentDraft) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if kind.is_derived_only() {
        errors.push(ValidationError::NotAllowed {
            field: "kind".to_string(),
            reason: format!("{} documents are created by the engine only", kind),
        });
        return Err(errors);
    }

    push_err(&mut errors, validate_currency(&draft.currency));
    push_err(&mut errors, validate_exchange_rate(draft.exchange_rate));

    if let Some(due) = draft.due_date {
        if due < draft.date {
            errors.push(ValidationError::InvalidFormat {
                field: "due_date".to_string(),
                reason: "must not be before the document date".to_string(),
            });
        }
    }

    if let Some(notes) = &draft.notes {
        if notes.chars().count() > MAX_NOTES_LENGTH {
            errors.push(ValidationError::TooLong {
                field: "notes".to_string(),
                max: MAX_NOTES_LENGTH,
            });
        }
    }

    if needs_warehouse(kind) && is_blank(draft.warehouse_id.as_deref()) {
        errors.push(required("warehouse_id"));
    }

    let needs_counterpart = kind.counterpart_role().is_some() || kind == DocumentKind::Payment;
    if needs_counterpart && is_blank(draft.counterpart_id.as_deref()) {
        errors.push(required("counterpart_id"));
    }

    check_destination(kind, draft, &mut errors);
    check_reference(kind, draft, &mut errors);

    if kind == DocumentKind::Payment {
        check_payment(draft, &mut errors);
    } else {
        check_lines(kind, &draft.lines, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validates the lines of a partial shipment request.
pub fn validate_shipment_lines(lines: &[LineDraft]) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    if lines.is_empty() {
        errors.push(required("lines"));
    }
    for (i, line) in lines.iter().enumerate() {
        if line.product_id.trim().is_empty() {
            errors.push(required(&line_field(i, "product_id")));
        }
        if line.quantity <= 0 {
            errors.push(ValidationError::MustBePositive {
                field: line_field(i, "quantity"),
            });
        } else if line.quantity > MAX_LINE_QUANTITY {
            errors.push(quantity_out_of_range(i, 1));
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Checks that stored lines are complete before a ledger effect runs.
///
/// Catches documents whose lines were emptied or zeroed after creation.
pub fn validate_lines(kind: DocumentKind, lines: &[LineItem]) -> Result<(), Vec<ValidationError>> {
    if !kind.has_lines() {
        return Ok(());
    }
    let mut errors = Vec::new();
    if lines.is_empty() {
        errors.push(required("lines"));
    }
    for (i, line) in lines.iter().enumerate() {
        if line.product_id.trim().is_empty() {
            errors.push(required(&line_field(i, "product_id")));
        }
        let min_quantity = if kind == DocumentKind::InventoryCount { 0 } else { 1 };
        if line.quantity < min_quantity {
            errors.push(ValidationError::MustBePositive {
                field: line_field(i, "quantity"),
            });
        } else if line.quantity > MAX_LINE_QUANTITY {
            errors.push(quantity_out_of_range(i, min_quantity));
        }
        if kind.is_priced() && line.unit_price_cents <= 0 {
            errors.push(ValidationError::MustBePositive {
                field: line_field(i, "unit_price_cents"),
            });
        } else if line.unit_price_cents > MAX_PRICE_CENTS {
            errors.push(ValidationError::OutOfRange {
                field: line_field(i, "unit_price_cents"),
                min: 1,
                max: MAX_PRICE_CENTS,
            });
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Field path of a line attribute, e.g. `lines[2].quantity`.
pub fn line_field(index: usize, attr: &str) -> String {
    format!("lines[{}].{}", index, attr)
}

fn needs_warehouse(kind: DocumentKind) -> bool {
    !matches!(kind, DocumentKind::Payment | DocumentKind::SupplierInvoice)
}

fn check_destination(kind: DocumentKind, draft: &DocumentDraft, errors: &mut Vec<ValidationError>) {
    let destination = draft.destination_warehouse_id.as_deref();
    if kind != DocumentKind::InternalOrder {
        if destination.is_some() {
            errors.push(ValidationError::NotAllowed {
                field: "destination_warehouse_id".to_string(),
                reason: format!("{} has no destination warehouse", kind),
            });
        }
        return;
    }
    match destination {
        None => errors.push(required("destination_warehouse_id")),
        Some(d) if d.trim().is_empty() => errors.push(required("destination_warehouse_id")),
        Some(d) if Some(d) == draft.warehouse_id.as_deref() => {
            errors.push(ValidationError::NotAllowed {
                field: "destination_warehouse_id".to_string(),
                reason: "must differ from the source warehouse".to_string(),
            })
        }
        Some(_) => {}
    }
}

fn check_reference(kind: DocumentKind, draft: &DocumentDraft, errors: &mut Vec<ValidationError>) {
    let accepts_reference = matches!(
        kind,
        DocumentKind::Receipt
            | DocumentKind::SupplierReturn
            | DocumentKind::CustomerReturn
            | DocumentKind::Payment
            | DocumentKind::SupplierInvoice
    );
    match draft.reference_id.as_deref() {
        Some(_) if !accepts_reference => errors.push(ValidationError::NotAllowed {
            field: "reference_id".to_string(),
            reason: format!("{} does not link to another document", kind),
        }),
        Some(r) if r.trim().is_empty() => errors.push(required("reference_id")),
        _ => {}
    }
}

fn check_payment(draft: &DocumentDraft, errors: &mut Vec<ValidationError>) {
    if !draft.lines.is_empty() {
        errors.push(ValidationError::NotAllowed {
            field: "lines".to_string(),
            reason: "payments carry an amount, not lines".to_string(),
        });
    }
    match draft.amount_cents {
        None => errors.push(required("amount_cents")),
        Some(cents) if cents <= 0 => errors.push(ValidationError::MustBePositive {
            field: "amount_cents".to_string(),
        }),
        Some(cents) if cents > MAX_PAYMENT_CENTS => errors.push(ValidationError::OutOfRange {
            field: "amount_cents".to_string(),
            min: 1,
            max: MAX_PAYMENT_CENTS,
        }),
        Some(_) => {}
    }
    if draft.direction.is_none() {
        errors.push(required("direction"));
    }
}

fn check_lines(kind: DocumentKind, lines: &[LineDraft], errors: &mut Vec<ValidationError>) {
    if lines.is_empty() {
        errors.push(required("lines"));
        return;
    }
    if lines.len() > MAX_LINES_PER_DOCUMENT {
        errors.push(ValidationError::OutOfRange {
            field: "lines".to_string(),
            min: 1,
            max: MAX_LINES_PER_DOCUMENT as i64,
        });
    }

    for (i, line) in lines.iter().enumerate() {
        if line.product_id.trim().is_empty() {
            errors.push(required(&line_field(i, "product_id")));
        }

        if kind == DocumentKind::InventoryCount {
            // a count of zero is a legitimate observation
            if !(0..=MAX_LINE_QUANTITY).contains(&line.quantity) {
                errors.push(quantity_out_of_range(i, 0));
            }
            if let Some(system) = line.system_quantity {
                if !(-MAX_LINE_QUANTITY..=MAX_LINE_QUANTITY).contains(&system) {
                    errors.push(ValidationError::OutOfRange {
                        field: line_field(i, "system_quantity"),
                        min: -MAX_LINE_QUANTITY,
                        max: MAX_LINE_QUANTITY,
                    });
                }
            }
        } else if line.quantity <= 0 {
            errors.push(ValidationError::MustBePositive {
                field: line_field(i, "quantity"),
            });
        } else if line.quantity > MAX_LINE_QUANTITY {
            errors.push(quantity_out_of_range(i, 1));
        }

        if kind.is_priced() {
            match line.unit_price_cents {
                None => errors.push(required(&line_field(i, "unit_price_cents"))),
                Some(p) if p <= 0 => errors.push(ValidationError::MustBePositive {
                    field: line_field(i, "unit_price_cents"),
                }),
                Some(p) if p > MAX_PRICE_CENTS => errors.push(ValidationError::OutOfRange {
                    field: line_field(i, "unit_price_cents"),
                    min: 1,
                    max: MAX_PRICE_CENTS,
                }),
                Some(_) => {}
            }
        }

        match line.shipped_quantity {
            Some(_) if kind != DocumentKind::InternalOrder => {
                errors.push(ValidationError::NotAllowed {
                    field: line_field(i, "shipped_quantity"),
                    reason: format!("{} lines have no shipped quantity", kind),
                })
            }
            Some(s) if s < 0 || s > line.quantity => errors.push(ValidationError::OutOfRange {
                field: line_field(i, "shipped_quantity"),
                min: 0,
                max: line.quantity.max(0),
            }),
            _ => {}
        }

        if line.system_quantity.is_some() && kind != DocumentKind::InventoryCount {
            errors.push(ValidationError::NotAllowed {
                field: line_field(i, "system_quantity"),
                reason: format!("{} lines have no system quantity", kind),
            });
        }
    }
}

fn required(field: &str) -> ValidationError {
    ValidationError::Required {
        field: field.to_string(),
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

fn push_err(errors: &mut Vec<ValidationError>, result: ValidationResult<()>) {
    if let Err(e) = result {
        errors.push(e);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PaymentDirection;
    use chrono::NaiveDate;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn fields(errors: &[ValidationError]) -> Vec<&str> {
        errors.iter().map(|e| e.field()).collect()
    }

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("FLOUR-1KG").is_ok());
        assert!(validate_sku("").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_currency() {
        assert!(validate_currency("USD").is_ok());
        assert!(validate_currency("").is_err());
        assert!(validate_currency("US").is_err());
        assert!(validate_currency("usd").is_err());
    }

    #[test]
    fn test_receipt_requires_priced_lines() {
        let draft = DocumentDraft::new(day(), "UZS")
            .counterpart("s-1")
            .warehouse("w-1")
            .line(LineDraft::new("p-1", 10, 1_000))
            .line(LineDraft::unpriced("p-2", 0))
            .line(LineDraft::new("", 1, 5));

        let errors = validate_draft(DocumentKind::Receipt, &draft).unwrap_err();
        assert_eq!(
            fields(&errors),
            vec![
                "lines[1].quantity",
                "lines[1].unit_price_cents",
                "lines[2].product_id"
            ]
        );
    }

    #[test]
    fn test_oversized_amounts_rejected() {
        let draft = DocumentDraft::new(day(), "UZS")
            .counterpart("c-1")
            .warehouse("w-1")
            .line(LineDraft::new("p-1", i64::MAX / 2, 1_000))
            .line(LineDraft::new("p-2", 5, i64::MAX))
            .line(LineDraft::new("p-3", MAX_LINE_QUANTITY, MAX_PRICE_CENTS));

        let errors = validate_draft(DocumentKind::CustomerOrder, &draft).unwrap_err();
        assert_eq!(
            fields(&errors),
            vec!["lines[0].quantity", "lines[1].unit_price_cents"]
        );
        assert!(matches!(errors[0], ValidationError::OutOfRange { max, .. } if max == MAX_LINE_QUANTITY));

        let payment = DocumentDraft::new(day(), "UZS")
            .counterpart("s-1")
            .payment(PaymentDirection::Incoming, i64::MAX);
        let errors = validate_draft(DocumentKind::Payment, &payment).unwrap_err();
        assert_eq!(fields(&errors), vec!["amount_cents"]);

        assert!(validate_price_cents("cost_price_cents", MAX_PRICE_CENTS).is_ok());
        assert!(validate_price_cents("cost_price_cents", MAX_PRICE_CENTS + 1).is_err());
    }

    #[test]
    fn test_empty_lines_rejected() {
        let draft = DocumentDraft::new(day(), "UZS").counterpart("c-1").warehouse("w-1");
        let errors = validate_draft(DocumentKind::CustomerOrder, &draft).unwrap_err();
        assert_eq!(fields(&errors), vec!["lines"]);
    }

    #[test]
    fn test_inventory_count_accepts_zero_actual() {
        let draft = DocumentDraft::new(day(), "UZS")
            .warehouse("w-1")
            .line(LineDraft::unpriced("p-1", 0));
        assert!(validate_draft(DocumentKind::InventoryCount, &draft).is_ok());
    }

    #[test]
    fn test_internal_order_destination_rules() {
        let same = DocumentDraft::new(day(), "UZS")
            .warehouse("w-1")
            .destination("w-1")
            .line(LineDraft::unpriced("p-1", 3));
        let errors = validate_draft(DocumentKind::InternalOrder, &same).unwrap_err();
        assert_eq!(fields(&errors), vec!["destination_warehouse_id"]);

        let missing = DocumentDraft::new(day(), "UZS")
            .warehouse("w-1")
            .line(LineDraft::unpriced("p-1", 3));
        assert!(validate_draft(DocumentKind::InternalOrder, &missing).is_err());
    }

    #[test]
    fn test_payment_shape() {
        let ok = DocumentDraft::new(day(), "UZS")
            .counterpart("s-1")
            .payment(PaymentDirection::Outgoing, 5_000);
        assert!(validate_draft(DocumentKind::Payment, &ok).is_ok());

        let bad = DocumentDraft::new(day(), "UZS")
            .counterpart("s-1")
            .line(LineDraft::new("p-1", 1, 1));
        let errors = validate_draft(DocumentKind::Payment, &bad).unwrap_err();
        assert_eq!(fields(&errors), vec!["lines", "amount_cents", "direction"]);
    }

    #[test]
    fn test_derived_kinds_cannot_be_submitted() {
        let draft = DocumentDraft::new(day(), "UZS").warehouse("w-1");
        let errors = validate_draft(DocumentKind::Transfer, &draft).unwrap_err();
        assert_eq!(fields(&errors), vec!["kind"]);
    }

    #[test]
    fn test_due_date_before_date() {
        let draft = DocumentDraft::new(day(), "UZS")
            .counterpart("s-1")
            .due(NaiveDate::from_ymd_opt(2026, 2, 1).unwrap())
            .line(LineDraft::new("p-1", 1, 100));
        let errors = validate_draft(DocumentKind::SupplierInvoice, &draft).unwrap_err();
        assert_eq!(fields(&errors), vec!["due_date"]);
    }

    #[test]
    fn test_shipment_lines() {
        assert!(validate_shipment_lines(&[LineDraft::unpriced("p-1", 2)]).is_ok());
        let errors = validate_shipment_lines(&[LineDraft::unpriced("p-1", 0)]).unwrap_err();
        assert_eq!(fields(&errors), vec!["lines[0].quantity"]);
    }

    #[test]
    fn test_stored_lines_checked_before_posting() {
        let lines = vec![LineItem::new("p-1", "Flour", 3, 100)];
        assert!(validate_lines(DocumentKind::Receipt, &lines).is_ok());
        assert!(validate_lines(DocumentKind::Payment, &[]).is_ok());

        let errors = validate_lines(DocumentKind::WriteOff, &[]).unwrap_err();
        assert_eq!(fields(&errors), vec!["lines"]);

        let zero = vec![LineItem::new("p-1", "Flour", 0, 0)];
        assert!(validate_lines(DocumentKind::InventoryCount, &zero).is_ok());
        let errors = validate_lines(DocumentKind::Receipt, &zero).unwrap_err();
        assert_eq!(
            fields(&errors),
            vec!["lines[0].quantity", "lines[0].unit_price_cents"]
        );
    }
}
