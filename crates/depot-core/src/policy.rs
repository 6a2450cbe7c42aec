//! # Stock Policy
//!
//! Whether an outgoing movement may drive availability below zero.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  HardBlock  supplier returns, write-offs                                │
//! │             requested > available  →  InsufficientStock (no change)    │
//! │                                                                         │
//! │  SoftWarn   customer orders, shipments, transfers, receipt reversal    │
//! │             resulting quantity < 0 →  StockWarning (change applied)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The policy is chosen per operation by the caller. It is never inferred
//! from the stock numbers.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, StockShortfall};
use crate::types::StockEntry;

/// Per-operation stock policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockPolicy {
    /// Reject when any line exceeds available stock.
    HardBlock,
    /// Apply and report a warning for each line that ends up negative.
    SoftWarn,
}

/// What a [`StockWarning`] is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// On-hand quantity went below zero.
    NegativeStock,
    /// A reservation could only be partly covered.
    Backorder,
}

/// A soft condition reported next to a successful result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockWarning {
    pub kind: WarningKind,
    pub product_id: String,
    pub warehouse_id: String,
    pub requested: i64,
    /// Available (backorder) or resulting on-hand (negative stock).
    pub available: i64,
}

impl StockWarning {
    pub fn backorder(product_id: &str, warehouse_id: &str, requested: i64, available: i64) -> Self {
        StockWarning {
            kind: WarningKind::Backorder,
            product_id: product_id.to_string(),
            warehouse_id: warehouse_id.to_string(),
            requested,
            available,
        }
    }

    pub fn negative_stock(product_id: &str, warehouse_id: &str, requested: i64, resulting: i64) -> Self {
        StockWarning {
            kind: WarningKind::NegativeStock,
            product_id: product_id.to_string(),
            warehouse_id: warehouse_id.to_string(),
            requested,
            available: resulting,
        }
    }

    /// Quantity not covered.
    pub fn shortfall(&self) -> i64 {
        match self.kind {
            WarningKind::Backorder => self.requested - self.available.max(0),
            WarningKind::NegativeStock => -self.available,
        }
    }
}

/// Checks outgoing `demands` (merged per product) against the entries of
/// one warehouse.
///
/// Missing entries count as zero stock. With [`StockPolicy::HardBlock`]
/// every shortfall is reported in a single `InsufficientStock` error;
/// with [`StockPolicy::SoftWarn`] the result lists one warning per product
/// whose on-hand quantity would go negative.
pub fn check_outgoing(
    policy: StockPolicy,
    warehouse_id: &str,
    demands: &[(String, i64)],
    entries: &[StockEntry],
) -> CoreResult<Vec<StockWarning>> {
    let lookup = |product_id: &str| {
        entries
            .iter()
            .find(|e| e.product_id == product_id && e.warehouse_id == warehouse_id)
    };

    match policy {
        StockPolicy::HardBlock => {
            let shortfalls: Vec<StockShortfall> = demands
                .iter()
                .filter_map(|(product_id, requested)| {
                    let available = lookup(product_id).map_or(0, StockEntry::available);
                    (*requested > available).then(|| StockShortfall {
                        product_id: product_id.clone(),
                        warehouse_id: warehouse_id.to_string(),
                        requested: *requested,
                        available,
                    })
                })
                .collect();
            if shortfalls.is_empty() {
                Ok(Vec::new())
            } else {
                Err(CoreError::InsufficientStock { shortfalls })
            }
        }
        StockPolicy::SoftWarn => Ok(demands
            .iter()
            .filter_map(|(product_id, requested)| {
                let on_hand = lookup(product_id).map_or(0, |e| e.quantity);
                let resulting = on_hand - requested;
                (resulting < 0).then(|| {
                    StockWarning::negative_stock(product_id, warehouse_id, *requested, resulting)
                })
            })
            .collect()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(product: &str, quantity: i64, reserved: i64) -> StockEntry {
        let mut e = StockEntry::empty(product, "w-1", Utc::now());
        e.quantity = quantity;
        e.reserved = reserved;
        e
    }

    #[test]
    fn test_hard_block_reports_every_shortfall() {
        let entries = vec![entry("a", 5, 0), entry("b", 10, 4)];
        let demands = vec![("a".to_string(), 8), ("b".to_string(), 6), ("c".to_string(), 1)];

        let err = check_outgoing(StockPolicy::HardBlock, "w-1", &demands, &entries).unwrap_err();
        match err {
            CoreError::InsufficientStock { shortfalls } => {
                assert_eq!(shortfalls.len(), 2);
                assert_eq!(shortfalls[0].product_id, "a");
                assert_eq!(shortfalls[0].available, 5);
                assert_eq!(shortfalls[1].product_id, "c");
                assert_eq!(shortfalls[1].available, 0);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_hard_block_counts_reserved_as_unavailable() {
        let entries = vec![entry("a", 10, 6)];
        let demands = vec![("a".to_string(), 5)];
        assert!(check_outgoing(StockPolicy::HardBlock, "w-1", &demands, &entries).is_err());

        let demands = vec![("a".to_string(), 4)];
        assert!(check_outgoing(StockPolicy::HardBlock, "w-1", &demands, &entries)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_soft_warn_never_fails() {
        let entries = vec![entry("a", 2, 0)];
        let demands = vec![("a".to_string(), 5), ("b".to_string(), 0)];
        let warnings = check_outgoing(StockPolicy::SoftWarn, "w-1", &demands, &entries).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::NegativeStock);
        assert_eq!(warnings[0].available, -3);
        assert_eq!(warnings[0].shortfall(), 3);
    }
}
