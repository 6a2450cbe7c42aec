//! Counterpart debts.
//!
//! ```text
//! supplier:  remaining = Σ confirmed receipts − Σ posted outgoing payments
//!                                              − Σ confirmed supplier returns
//! customer:  remaining = Σ shipments          − Σ posted incoming payments
//!                                              − Σ accepted customer returns
//! ```
//!
//! All amounts are converted to base currency per document. `remaining`
//! is never clamped: a negative value is an overpayment.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

use crate::document::{CounterpartRole, Document, DocumentKind, DocumentStatus};
use crate::types::DateRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DebtStatus {
    Overdue,
    DueSoon,
    Ok,
}

/// Debt of one counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DebtRow {
    pub counterpart_id: String,
    pub role: CounterpartRole,
    /// Σ receipts (supplier) or Σ shipments (customer).
    pub total_debt_cents: i64,
    pub paid_cents: i64,
    pub returned_cents: i64,
    pub remaining_cents: i64,
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,
    pub status: DebtStatus,
    pub document_count: usize,
}

/// How a document moves a counterpart's balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effect {
    Debit,
    Paid,
    Returned,
    /// Contributes a due date only (posted supplier invoices).
    DueOnly,
}

fn classify(role: CounterpartRole, doc: &Document) -> Option<Effect> {
    if doc.counterpart_role() != Some(role) {
        return None;
    }
    match (doc.kind(), doc.status) {
        (DocumentKind::Receipt, DocumentStatus::Confirmed) => Some(Effect::Debit),
        (DocumentKind::Shipment, DocumentStatus::Completed) => Some(Effect::Debit),
        (DocumentKind::Payment, DocumentStatus::Posted) => Some(Effect::Paid),
        (DocumentKind::SupplierReturn, DocumentStatus::Confirmed) => Some(Effect::Returned),
        (DocumentKind::CustomerReturn, DocumentStatus::Accepted) => Some(Effect::Returned),
        (DocumentKind::SupplierInvoice, DocumentStatus::Posted) => Some(Effect::DueOnly),
        _ => None,
    }
}

/// Status for a remaining balance due on `due_date`.
pub fn debt_status(
    remaining_cents: i64,
    due_date: Option<NaiveDate>,
    today: NaiveDate,
    due_soon_days: i64,
) -> DebtStatus {
    match due_date {
        Some(due) if remaining_cents > 0 && due < today => DebtStatus::Overdue,
        Some(due) if remaining_cents > 0 && due <= today + Duration::days(due_soon_days) => {
            DebtStatus::DueSoon
        }
        _ => DebtStatus::Ok,
    }
}

/// Builds one row per counterpart of `role` from documents dated in `range`.
///
/// Documents of the other side, other statuses, or without a counterpart are
/// ignored. Rows are ordered by counterpart id.
pub fn debt_report(
    role: CounterpartRole,
    documents: &[Document],
    range: DateRange,
    today: NaiveDate,
    due_soon_days: i64,
) -> Vec<DebtRow> {
    let mut rows: BTreeMap<String, DebtRow> = BTreeMap::new();

    for doc in documents.iter().filter(|d| range.contains(d.date)) {
        let Some(effect) = classify(role, doc) else {
            continue;
        };
        let Some(counterpart) = doc.counterpart_id.as_deref() else {
            continue;
        };

        let row = rows
            .entry(counterpart.to_string())
            .or_insert_with(|| DebtRow {
                counterpart_id: counterpart.to_string(),
                role,
                total_debt_cents: 0,
                paid_cents: 0,
                returned_cents: 0,
                remaining_cents: 0,
                due_date: None,
                status: DebtStatus::Ok,
                document_count: 0,
            });

        let amount = doc.base_total().cents();
        match effect {
            Effect::Debit => row.total_debt_cents += amount,
            Effect::Paid => row.paid_cents += amount,
            Effect::Returned => row.returned_cents += amount,
            Effect::DueOnly => {}
        }
        if matches!(effect, Effect::Debit | Effect::DueOnly) {
            if let Some(due) = doc.due_date {
                row.due_date = Some(row.due_date.map_or(due, |d| d.min(due)));
            }
        }
        row.document_count += 1;
    }

    rows.into_values()
        .map(|mut row| {
            row.remaining_cents = row.total_debt_cents - row.paid_cents - row.returned_cents;
            row.status = debt_status(row.remaining_cents, row.due_date, today, due_soon_days);
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentDetails, PaymentDirection};
    use crate::money::ExchangeRate;
    use chrono::Utc;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn doc(details: DocumentDetails, status: DocumentStatus, counterpart: &str, total: i64) -> Document {
        Document {
            id: uuid::Uuid::new_v4().to_string(),
            number: "X-000001".to_string(),
            status,
            counterpart_id: Some(counterpart.to_string()),
            warehouse_id: Some("w-1".to_string()),
            date: day(5),
            due_date: None,
            currency: "UZS".to_string(),
            exchange_rate: ExchangeRate::identity(),
            lines: Vec::new(),
            total_cents: total,
            details,
            notes: None,
            created_by: "tester".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            version: 1,
        }
    }

    fn receipt(counterpart: &str, total: i64) -> Document {
        doc(
            DocumentDetails::Receipt {
                order_id: None,
                confirmed_at: None,
            },
            DocumentStatus::Confirmed,
            counterpart,
            total,
        )
    }

    fn payment(direction: PaymentDirection, counterpart: &str, total: i64) -> Document {
        doc(
            DocumentDetails::Payment {
                direction,
                order_id: None,
            },
            DocumentStatus::Posted,
            counterpart,
            total,
        )
    }

    #[test]
    fn test_supplier_debt_formula() {
        let mut r = receipt("s-1", 10_000);
        r.due_date = Some(day(20));
        let docs = vec![
            r,
            payment(PaymentDirection::Outgoing, "s-1", 4_000),
            doc(
                DocumentDetails::SupplierReturn { receipt_id: None },
                DocumentStatus::Confirmed,
                "s-1",
                1_000,
            ),
            // customer payment does not touch supplier debt
            payment(PaymentDirection::Incoming, "s-1", 999),
            // draft receipt is not a debt yet
            doc(
                DocumentDetails::Receipt {
                    order_id: None,
                    confirmed_at: None,
                },
                DocumentStatus::Draft,
                "s-1",
                50_000,
            ),
        ];

        let rows = debt_report(
            CounterpartRole::Supplier,
            &docs,
            DateRange::new(day(1), day(31)),
            day(10),
            3,
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_debt_cents, 10_000);
        assert_eq!(rows[0].paid_cents, 4_000);
        assert_eq!(rows[0].returned_cents, 1_000);
        assert_eq!(rows[0].remaining_cents, 5_000);
        assert_eq!(rows[0].status, DebtStatus::Ok);
    }

    #[test]
    fn test_overpayment_is_not_clamped() {
        let docs = vec![
            receipt("s-1", 1_000),
            payment(PaymentDirection::Outgoing, "s-1", 1_500),
        ];
        let rows = debt_report(
            CounterpartRole::Supplier,
            &docs,
            DateRange::new(day(1), day(31)),
            day(10),
            3,
        );
        assert_eq!(rows[0].remaining_cents, -500);
        assert_eq!(rows[0].status, DebtStatus::Ok);
    }

    #[test]
    fn test_status_thresholds() {
        assert_eq!(debt_status(100, Some(day(9)), day(10), 3), DebtStatus::Overdue);
        assert_eq!(debt_status(100, Some(day(13)), day(10), 3), DebtStatus::DueSoon);
        assert_eq!(debt_status(100, Some(day(14)), day(10), 3), DebtStatus::Ok);
        assert_eq!(debt_status(0, Some(day(1)), day(10), 3), DebtStatus::Ok);
        assert_eq!(debt_status(100, None, day(10), 3), DebtStatus::Ok);
    }

    #[test]
    fn test_foreign_currency_converted() {
        let mut r = receipt("s-1", 100);
        r.currency = "USD".to_string();
        r.exchange_rate = ExchangeRate::from_scaled(125_000); // 12.5
        let rows = debt_report(
            CounterpartRole::Supplier,
            &[r],
            DateRange::new(day(1), day(31)),
            day(10),
            3,
        );
        assert_eq!(rows[0].total_debt_cents, 1_250);
    }
}
