//! # Reservation Arithmetic
//!
//! Pure planning for reserving, consuming and releasing stock held for a
//! customer order. The engine persists what these functions decide.
//!
//! ## Lifecycle of a hold
//! ```text
//! reserve(order)          held[p] = min(requested[p], max(available[p], 0))
//!      │                  warn for every p with held[p] < requested[p]
//!      ▼
//! ship(order, qty[p])     consumed[p] = min(held[p], qty[p])
//!      │                  reserved -= consumed, quantity -= qty
//!      ▼
//! unreserve(order)        reserved -= held[p] (what is left of it, never more)
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::policy::StockWarning;
use crate::types::StockEntry;

/// Quantity of one product held by one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Hold {
    pub product_id: String,
    pub warehouse_id: String,
    pub quantity: i64,
}

/// Result of planning a reservation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservationPlan {
    /// Holds to record. Products with nothing available are omitted.
    pub holds: Vec<Hold>,
    /// One backorder warning per under-stocked product.
    pub warnings: Vec<StockWarning>,
}

impl ReservationPlan {
    pub fn total_held(&self) -> i64 {
        self.holds.iter().map(|h| h.quantity).sum()
    }
}

/// Plans a reservation of `demands` (merged per product) at `warehouse_id`.
///
/// Fully covered lines hold their whole quantity. Under-stocked lines hold
/// whatever is available and produce a backorder warning; the order still
/// counts as reserved.
pub fn plan_reservation(
    warehouse_id: &str,
    demands: &[(String, i64)],
    entries: &[StockEntry],
) -> ReservationPlan {
    let mut plan = ReservationPlan::default();

    for (product_id, requested) in demands {
        let available = entries
            .iter()
            .find(|e| &e.product_id == product_id && e.warehouse_id == warehouse_id)
            .map_or(0, StockEntry::available);

        let held = (*requested).min(available.max(0));
        if held < *requested {
            plan.warnings.push(StockWarning::backorder(
                product_id,
                warehouse_id,
                *requested,
                available,
            ));
        }
        if held > 0 {
            plan.holds.push(Hold {
                product_id: product_id.clone(),
                warehouse_id: warehouse_id.to_string(),
                quantity: held,
            });
        }
    }

    plan
}

/// How much of an order's hold a shipment of `shipping` units consumes.
#[inline]
pub fn consumed_by_shipment(held: i64, shipping: i64) -> i64 {
    held.min(shipping).max(0)
}

/// Holds remaining for an order after shipping `shipped` (merged per product).
///
/// Returns `(product_id, consumed)` for each product whose hold shrinks.
pub fn plan_consumption(holds: &[Hold], shipped: &[(String, i64)]) -> Vec<(String, i64)> {
    shipped
        .iter()
        .filter_map(|(product_id, qty)| {
            let held = holds
                .iter()
                .filter(|h| &h.product_id == product_id)
                .map(|h| h.quantity)
                .sum::<i64>();
            let consumed = consumed_by_shipment(held, *qty);
            (consumed > 0).then(|| (product_id.clone(), consumed))
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
