//! Stock turnover per (product, warehouse) over a period.
//!
//! Opening balances are not stored. They are reconstructed from the
//! current ledger by undoing every movement at or after the period start:
//!
//! ```text
//! opening  = current − Σ movements[occurred_at ≥ start]
//! incoming = Σ positive movements in [start, end)
//! outgoing = Σ |negative movements| in [start, end)
//! closing  = opening + incoming − outgoing
//! ```
//!
//! When the period ends now, `closing` equals the current ledger.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

use crate::types::{DateRange, StockEntry, StockMovement};

/// Optional narrowing of a turnover report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TurnoverFilter {
    pub product_id: Option<String>,
    pub warehouse_id: Option<String>,
}

impl TurnoverFilter {
    pub fn matches(&self, product_id: &str, warehouse_id: &str) -> bool {
        self.product_id.as_deref().map_or(true, |p| p == product_id)
            && self.warehouse_id.as_deref().map_or(true, |w| w == warehouse_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TurnoverRow {
    pub product_id: String,
    pub warehouse_id: String,
    pub opening_quantity: i64,
    pub opening_amount_cents: i64,
    pub incoming_quantity: i64,
    pub incoming_amount_cents: i64,
    pub outgoing_quantity: i64,
    pub outgoing_amount_cents: i64,
    pub closing_quantity: i64,
    pub closing_amount_cents: i64,
}

impl TurnoverRow {
    fn is_empty(&self) -> bool {
        self.opening_quantity == 0
            && self.opening_amount_cents == 0
            && self.incoming_quantity == 0
            && self.outgoing_quantity == 0
            && self.closing_quantity == 0
            && self.closing_amount_cents == 0
    }
}

/// Builds the turnover report.
///
/// `movements` must contain every movement with `occurred_at ≥ range.start()`
/// (including those after the period end) for the opening reconstruction.
/// Rows with no balance and no activity are omitted; rows are ordered by
/// (product, warehouse).
pub fn turnover_report(
    range: DateRange,
    filter: &TurnoverFilter,
    entries: &[StockEntry],
    movements: &[StockMovement],
) -> Vec<TurnoverRow> {
    let start = range.start();
    let end = range.end();
    let mut rows: BTreeMap<(String, String), TurnoverRow> = BTreeMap::new();

    for entry in entries {
        if let Some(row) = row_for(&mut rows, filter, &entry.product_id, &entry.warehouse_id) {
            row.opening_quantity += entry.quantity;
            row.opening_amount_cents += entry.amount_cents;
        }
    }

    for m in movements.iter().filter(|m| m.occurred_at >= start) {
        let Some(row) = row_for(&mut rows, filter, &m.product_id, &m.warehouse_id) else {
            continue;
        };
        row.opening_quantity -= m.quantity_delta;
        row.opening_amount_cents -= m.amount_delta_cents;

        if m.occurred_at < end {
            if m.quantity_delta > 0 {
                row.incoming_quantity += m.quantity_delta;
                row.incoming_amount_cents += m.amount_delta_cents;
            } else {
                row.outgoing_quantity -= m.quantity_delta;
                row.outgoing_amount_cents -= m.amount_delta_cents;
            }
        }
    }

    rows.into_values()
        .map(|mut row| {
            row.closing_quantity = row.opening_quantity + row.incoming_quantity - row.outgoing_quantity;
            row.closing_amount_cents =
                row.opening_amount_cents + row.incoming_amount_cents - row.outgoing_amount_cents;
            row
        })
        .filter(|row| !row.is_empty())
        .collect()
}

fn row_for<'a>(
    rows: &'a mut BTreeMap<(String, String), TurnoverRow>,
    filter: &TurnoverFilter,
    product_id: &str,
    warehouse_id: &str,
) -> Option<&'a mut TurnoverRow> {
    if !filter.matches(product_id, warehouse_id) {
        return None;
    }
    Some(
        rows.entry((product_id.to_string(), warehouse_id.to_string()))
            .or_insert_with(|| TurnoverRow {
                product_id: product_id.to_string(),
                warehouse_id: warehouse_id.to_string(),
                ..Default::default()
            }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentKind;
    use chrono::{DateTime, NaiveDate, Utc};

    fn at(d: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2026, 3, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc()
    }

    fn movement(product: &str, delta: i64, amount: i64, d: u32) -> StockMovement {
        StockMovement {
            id: uuid::Uuid::new_v4().to_string(),
            product_id: product.to_string(),
            warehouse_id: "w-1".to_string(),
            document_id: "doc".to_string(),
            document_kind: DocumentKind::Receipt,
            quantity_delta: delta,
            amount_delta_cents: amount,
            actor_id: "tester".to_string(),
            occurred_at: at(d),
        }
    }

    fn entry(product: &str, quantity: i64, amount: i64) -> StockEntry {
        let mut e = StockEntry::empty(product, "w-1", Utc::now());
        e.quantity = quantity;
        e.amount_cents = amount;
        e
    }

    #[test]
    fn test_opening_reconstructed_from_current() {
        // before: +10 on the 1st; period 10..=20: +5, -3; after: -2 on the 25th
        let movements = vec![
            movement("p", 10, 10_000, 1),
            movement("p", 5, 5_000, 12),
            movement("p", -3, -3_000, 15),
            movement("p", -2, -2_000, 25),
        ];
        let entries = vec![entry("p", 10, 10_000)];
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 20).unwrap(),
        );

        let rows = turnover_report(range, &TurnoverFilter::default(), &entries, &movements[1..]);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.opening_quantity, 10);
        assert_eq!(row.incoming_quantity, 5);
        assert_eq!(row.outgoing_quantity, 3);
        assert_eq!(row.closing_quantity, 12);
        assert_eq!(row.closing_amount_cents, 12_000);
    }

    #[test]
    fn test_period_ending_now_closes_at_current() {
        let movements = vec![movement("p", 7, 700, 2), movement("p", -4, -400, 3)];
        let entries = vec![entry("p", 3, 300)];
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
        );
        let rows = turnover_report(range, &TurnoverFilter::default(), &entries, &movements);
        assert_eq!(rows[0].opening_quantity, 0);
        assert_eq!(rows[0].closing_quantity, entries[0].quantity);
        assert_eq!(rows[0].closing_amount_cents, entries[0].amount_cents);
    }

    #[test]
    fn test_filter_and_empty_rows() {
        let entries = vec![entry("p", 3, 300), entry("idle", 0, 0)];
        let filter = TurnoverFilter {
            product_id: Some("p".to_string()),
            warehouse_id: None,
        };
        let range = DateRange::day(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        let rows = turnover_report(range, &filter, &entries, &[]);
        assert_eq!(rows.len(), 1);

        let rows = turnover_report(range, &TurnoverFilter::default(), &entries, &[]);
        assert_eq!(rows.len(), 1, "idle pair with zero balance is omitted");
    }
}
