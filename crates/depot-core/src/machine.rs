//! # Status Machines
//!
//! One generic executor driven by per-kind transition tables.
//!
//! ## Tables, not subclasses
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  TransitionTable { kind, initial, editable, edges, on_enter }           │
//! │                                                                         │
//! │  PurchaseOrder                                                          │
//! │    pending ──► confirmed ──► received                                  │
//! │       │            │                                                    │
//! │       └──► cancelled ◄──┘        cancelled ──► pending (reopen)        │
//! │                                                                         │
//! │  on_enter(received) = ReceivePurchaseOrder                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Adding a document kind means declaring a table. The executor
//! ([`TransitionTable::check`]) never special-cases a kind; the engine
//! dispatches on the [`Effect`] the table attaches to the target status.

use crate::document::{DocumentKind, DocumentStatus};
use crate::error::{CoreError, CoreResult};

use DocumentStatus::*;

// =============================================================================
// Effects
// =============================================================================

/// Side effect applied when a document enters a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Positive ledger delta for every line at the document's warehouse.
    Incoming,
    /// Negative ledger delta for every line, hard-blocked on shortage.
    OutgoingHard,
    /// Derive a confirmed receipt and book it into stock (exactly once).
    ReceivePurchaseOrder,
    /// Reserve the order's lines if not yet reserved (soft policy).
    ReserveOrder,
    /// Ship the unshipped remainder through one derived shipment.
    ShipRemainder,
    /// Release whatever this order still holds reserved.
    ReleaseReservation,
    /// Derive exactly one transfer and move stock between warehouses.
    CreateTransfer,
    /// Freeze `difference = actual - system` on every line.
    FreezeCount,
    /// Credit the linked customer order's paid amount.
    PostPayment,
    /// Undo [`Effect::PostPayment`].
    ReversePayment,
}

// =============================================================================
// Transition Table
// =============================================================================

/// Declarative status machine for one document kind.
#[derive(Debug)]
pub struct TransitionTable {
    pub kind: DocumentKind,
    /// Status a freshly created document starts in.
    pub initial: DocumentStatus,
    /// Statuses in which lines and header may be edited or the document deleted.
    pub editable: &'static [DocumentStatus],
    /// `(from, allowed successors)`.
    pub edges: &'static [(DocumentStatus, &'static [DocumentStatus])],
    /// Effects applied on entering a status.
    pub on_enter: &'static [(DocumentStatus, Effect)],
    /// Effect applied once at creation (documents born in a ledger status).
    pub on_create: Option<Effect>,
}

impl TransitionTable {
    /// Allowed successors of `from`.
    pub fn allowed(&self, from: DocumentStatus) -> &'static [DocumentStatus] {
        self.edges
            .iter()
            .find(|(status, _)| *status == from)
            .map(|(_, next)| *next)
            .unwrap_or(&[])
    }

    /// Validates `from → to`.
    pub fn check(&self, from: DocumentStatus, to: DocumentStatus) -> CoreResult<()> {
        let allowed = self.allowed(from);
        if allowed.contains(&to) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                kind: self.kind,
                from,
                to,
                allowed: allowed.to_vec(),
            })
        }
    }

    pub fn is_editable(&self, status: DocumentStatus) -> bool {
        self.editable.contains(&status)
    }

    /// No outgoing edges.
    pub fn is_terminal(&self, status: DocumentStatus) -> bool {
        self.allowed(status).is_empty()
    }

    /// Effect attached to entering `status`, if any.
    pub fn effect_on_enter(&self, status: DocumentStatus) -> Option<Effect> {
        self.on_enter
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, effect)| *effect)
    }
}

// =============================================================================
// Tables
// =============================================================================

static PURCHASE_ORDER: TransitionTable = TransitionTable {
    kind: DocumentKind::PurchaseOrder,
    initial: Pending,
    editable: &[Pending],
    edges: &[
        (Pending, &[Confirmed, Cancelled]),
        (Confirmed, &[Received, Cancelled]),
        (Cancelled, &[Pending]),
    ],
    on_enter: &[(Received, Effect::ReceivePurchaseOrder)],
    on_create: None,
};

static RECEIPT: TransitionTable = TransitionTable {
    kind: DocumentKind::Receipt,
    initial: Draft,
    editable: &[Draft],
    edges: &[(Draft, &[Confirmed])],
    on_enter: &[(Confirmed, Effect::Incoming)],
    on_create: None,
};

static SUPPLIER_RETURN: TransitionTable = TransitionTable {
    kind: DocumentKind::SupplierReturn,
    initial: Confirmed,
    editable: &[],
    edges: &[],
    on_enter: &[],
    on_create: Some(Effect::OutgoingHard),
};

static CUSTOMER_ORDER: TransitionTable = TransitionTable {
    kind: DocumentKind::CustomerOrder,
    initial: Pending,
    editable: &[Pending],
    edges: &[
        (Pending, &[Confirmed, Cancelled]),
        (Confirmed, &[Shipped, Cancelled]),
        (Shipped, &[Fulfilled, Cancelled]),
    ],
    on_enter: &[
        (Confirmed, Effect::ReserveOrder),
        (Shipped, Effect::ShipRemainder),
        (Cancelled, Effect::ReleaseReservation),
    ],
    on_create: None,
};

static SHIPMENT: TransitionTable = TransitionTable {
    kind: DocumentKind::Shipment,
    initial: Completed,
    editable: &[],
    edges: &[],
    on_enter: &[],
    on_create: None,
};

static CUSTOMER_RETURN: TransitionTable = TransitionTable {
    kind: DocumentKind::CustomerReturn,
    initial: Pending,
    editable: &[Pending],
    edges: &[(Pending, &[Accepted, Cancelled])],
    on_enter: &[(Accepted, Effect::Incoming)],
    on_create: None,
};

static INTERNAL_ORDER: TransitionTable = TransitionTable {
    kind: DocumentKind::InternalOrder,
    initial: New,
    editable: &[New],
    edges: &[
        (New, &[Approved, Cancelled]),
        (Approved, &[Partial, Completed]),
        (Partial, &[Completed]),
        (Cancelled, &[New]),
    ],
    on_enter: &[(Approved, Effect::CreateTransfer)],
    on_create: None,
};

static TRANSFER: TransitionTable = TransitionTable {
    kind: DocumentKind::Transfer,
    initial: Completed,
    editable: &[],
    edges: &[],
    on_enter: &[],
    on_create: None,
};

static INVENTORY_COUNT: TransitionTable = TransitionTable {
    kind: DocumentKind::InventoryCount,
    initial: Draft,
    editable: &[Draft],
    edges: &[(Draft, &[Confirmed])],
    on_enter: &[(Confirmed, Effect::FreezeCount)],
    on_create: None,
};

static WRITE_OFF: TransitionTable = TransitionTable {
    kind: DocumentKind::WriteOff,
    initial: Draft,
    editable: &[Draft],
    edges: &[(Draft, &[Confirmed, Cancelled])],
    on_enter: &[(Confirmed, Effect::OutgoingHard)],
    on_create: None,
};

static PAYMENT: TransitionTable = TransitionTable {
    kind: DocumentKind::Payment,
    initial: Posted,
    editable: &[],
    edges: &[(Posted, &[Cancelled])],
    on_enter: &[(Cancelled, Effect::ReversePayment)],
    on_create: Some(Effect::PostPayment),
};

static SUPPLIER_INVOICE: TransitionTable = TransitionTable {
    kind: DocumentKind::SupplierInvoice,
    initial: Draft,
    editable: &[Draft],
    edges: &[(Draft, &[Posted, Cancelled]), (Posted, &[Cancelled])],
    on_enter: &[],
    on_create: None,
};

/// Transition table for a kind.
pub fn table(kind: DocumentKind) -> &'static TransitionTable {
    match kind {
        DocumentKind::PurchaseOrder => &PURCHASE_ORDER,
        DocumentKind::Receipt => &RECEIPT,
        DocumentKind::SupplierReturn => &SUPPLIER_RETURN,
        DocumentKind::CustomerOrder => &CUSTOMER_ORDER,
        DocumentKind::Shipment => &SHIPMENT,
        DocumentKind::CustomerReturn => &CUSTOMER_RETURN,
        DocumentKind::InternalOrder => &INTERNAL_ORDER,
        DocumentKind::Transfer => &TRANSFER,
        DocumentKind::InventoryCount => &INVENTORY_COUNT,
        DocumentKind::WriteOff => &WRITE_OFF,
        DocumentKind::Payment => &PAYMENT,
        DocumentKind::SupplierInvoice => &SUPPLIER_INVOICE,
    }
}

/// Plan for one status change: the validated target and the effect to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionPlan {
    pub kind: DocumentKind,
    pub from: DocumentStatus,
    pub to: DocumentStatus,
    pub effect: Option<Effect>,
}

/// Validates `from → to` for `kind` and returns what must happen.
pub fn plan(kind: DocumentKind, from: DocumentStatus, to: DocumentStatus) -> CoreResult<TransitionPlan> {
    let table = table(kind);
    table.check(from, to)?;
    Ok(TransitionPlan {
        kind,
        from,
        to,
        effect: table.effect_on_enter(to),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn reachable(t: &TransitionTable) -> Vec<DocumentStatus> {
        let mut seen = vec![t.initial];
        let mut i = 0;
        while i < seen.len() {
            for next in t.allowed(seen[i]) {
                if !seen.contains(next) {
                    seen.push(*next);
                }
            }
            i += 1;
        }
        seen
    }

    #[test]
    fn test_every_kind_has_a_table_for_itself() {
        for kind in DocumentKind::ALL {
            assert_eq!(table(kind).kind, kind);
        }
    }

    #[test]
    fn test_no_unreachable_states() {
        for kind in DocumentKind::ALL {
            let t = table(kind);
            let seen = reachable(t);
            for (from, _) in t.edges {
                assert!(seen.contains(from), "{kind}: {from} has edges but is unreachable");
            }
            for s in t.editable {
                assert!(seen.contains(s), "{kind}: {s} is editable but unreachable");
            }
            for (s, _) in t.on_enter {
                assert!(seen.contains(s), "{kind}: {s} has an effect but is unreachable");
            }
        }
    }

    #[test]
    fn test_purchase_order_machine() {
        let po = table(DocumentKind::PurchaseOrder);
        assert_eq!(po.initial, Pending);
        assert!(po.check(Pending, Confirmed).is_ok());
        assert!(po.check(Confirmed, Received).is_ok());
        assert!(po.check(Confirmed, Cancelled).is_ok());
        assert!(po.check(Cancelled, Pending).is_ok());
        assert!(po.is_terminal(Received));
        assert!(!po.is_editable(Draft));
        assert!(po.allowed(Draft).is_empty());

        let err = po.check(Pending, Received).unwrap_err();
        match err {
            CoreError::InvalidTransition { allowed, .. } => {
                assert_eq!(allowed, vec![Confirmed, Cancelled]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_customer_order_cancellable_from_any_non_terminal() {
        let co = table(DocumentKind::CustomerOrder);
        for from in [Pending, Confirmed, Shipped] {
            assert!(co.check(from, Cancelled).is_ok(), "{from} → cancelled");
        }
        assert!(co.check(Fulfilled, Cancelled).is_err());
        assert!(co.is_terminal(Fulfilled));
    }

    #[test]
    fn test_internal_order_reopen() {
        let io = table(DocumentKind::InternalOrder);
        assert!(io.check(New, Cancelled).is_ok());
        assert!(io.check(Cancelled, New).is_ok());
        assert!(io.check(Approved, Cancelled).is_err());
        assert!(io.check(Approved, Approved).is_err());
        assert_eq!(io.effect_on_enter(Approved), Some(Effect::CreateTransfer));
    }

    #[test]
    fn test_plan_carries_effect() {
        let p = plan(DocumentKind::Receipt, Draft, Confirmed).unwrap();
        assert_eq!(p.effect, Some(Effect::Incoming));

        let p = plan(DocumentKind::CustomerOrder, Pending, Cancelled).unwrap();
        assert_eq!(p.effect, Some(Effect::ReleaseReservation));
    }

    #[test]
    fn test_supplier_return_is_born_terminal() {
        let sr = table(DocumentKind::SupplierReturn);
        assert!(sr.is_terminal(sr.initial));
        assert_eq!(sr.on_create, Some(Effect::OutgoingHard));
        assert!(!sr.is_editable(sr.initial));
    }

    #[test]
    fn test_payment_posts_on_create_and_reverses_on_cancel() {
        let py = table(DocumentKind::Payment);
        assert_eq!(py.initial, Posted);
        assert_eq!(py.on_create, Some(Effect::PostPayment));
        assert_eq!(py.effect_on_enter(Cancelled), Some(Effect::ReversePayment));
        assert!(py.is_terminal(Cancelled));
    }
}
