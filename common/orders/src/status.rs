//! Payment-driven order status transitions.
//!
//! not_paid -> paid | payment_failed
//! paid | processing | shipped -> cancelled (refund)
//! Nothing moves back to paid once failed or cancelled.
use serde::Serialize;

use crate::model::OrderStatus;

/// Gateway notification status reduced to what it means for the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentSignal {
    Succeeded,
    Failed,
    Refunded,
    /// Intermediate gateway states (NEW, FORM_SHOWED, AUTHORIZING, ...).
    Informational,
}

impl PaymentSignal {
    pub fn from_gateway_status(status: &str) -> PaymentSignal {
        match status.trim().to_ascii_uppercase().as_str() {
            "AUTHORIZED" | "CONFIRMED" => PaymentSignal::Succeeded,
            "REJECTED" | "CANCELLED" | "CANCELED" | "AUTH_FAIL" | "DEADLINE_EXPIRED" => PaymentSignal::Failed,
            "REFUNDED" | "PARTIAL_REFUNDED" => PaymentSignal::Refunded,
            _ => PaymentSignal::Informational,
        }
    }

    pub fn target(&self) -> Option<OrderStatus> {
        match self {
            PaymentSignal::Succeeded => Some(OrderStatus::Paid),
            PaymentSignal::Failed => Some(OrderStatus::PaymentFailed),
            PaymentSignal::Refunded => Some(OrderStatus::Cancelled),
            PaymentSignal::Informational => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentSignal::Succeeded => "succeeded",
            PaymentSignal::Failed => "failed",
            PaymentSignal::Refunded => "refunded",
            PaymentSignal::Informational => "informational",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Apply(OrderStatus),
    /// Target equals the current status: a replayed notification.
    AlreadyApplied,
    /// No transition defined from the current status.
    Ignored,
    /// The signal carries no status change.
    NoChange,
}

pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
    match (from, to) {
        (OrderStatus::NotPaid, OrderStatus::Paid | OrderStatus::PaymentFailed) => true,
        (OrderStatus::Paid | OrderStatus::Processing | OrderStatus::Shipped, OrderStatus::Cancelled) => true,
        _ => false,
    }
}

pub fn next_status(current: OrderStatus, signal: PaymentSignal) -> Transition {
    let Some(target) = signal.target() else {
        return Transition::NoChange;
    };
    if target == current {
        return Transition::AlreadyApplied;
    }
    if is_valid_transition(current, target) {
        Transition::Apply(target)
    } else {
        Transition::Ignored
    }
}

/// What a store did with one payment notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Reconciliation {
    Applied { from: OrderStatus, to: OrderStatus },
    AlreadyApplied { status: OrderStatus },
    Ignored { status: OrderStatus, signal: PaymentSignal },
    NoChange { status: OrderStatus },
    OrderMissing,
}

impl Reconciliation {
    pub fn from_transition(current: OrderStatus, signal: PaymentSignal, transition: Transition) -> Self {
        match transition {
            Transition::Apply(to) => Reconciliation::Applied { from: current, to },
            Transition::AlreadyApplied => Reconciliation::AlreadyApplied { status: current },
            Transition::Ignored => Reconciliation::Ignored { status: current, signal },
            Transition::NoChange => Reconciliation::NoChange { status: current },
        }
    }

    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Reconciliation::Applied { .. } => "applied",
            Reconciliation::AlreadyApplied { .. } => "replay",
            Reconciliation::Ignored { .. } => "ignored",
            Reconciliation::NoChange { .. } => "no_change",
            Reconciliation::OrderMissing => "order_missing",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    #[test]
    fn gateway_vocabulary() {
        assert_eq!(PaymentSignal::from_gateway_status("CONFIRMED"), PaymentSignal::Succeeded);
        assert_eq!(PaymentSignal::from_gateway_status("authorized"), PaymentSignal::Succeeded);
        assert_eq!(PaymentSignal::from_gateway_status("DEADLINE_EXPIRED"), PaymentSignal::Failed);
        assert_eq!(PaymentSignal::from_gateway_status("PARTIAL_REFUNDED"), PaymentSignal::Refunded);
        assert_eq!(PaymentSignal::from_gateway_status("FORM_SHOWED"), PaymentSignal::Informational);
    }

    #[test]
    fn payment_transitions() {
        assert_eq!(next_status(NotPaid, PaymentSignal::Succeeded), Transition::Apply(Paid));
        assert_eq!(next_status(NotPaid, PaymentSignal::Failed), Transition::Apply(PaymentFailed));
        assert_eq!(next_status(Shipped, PaymentSignal::Refunded), Transition::Apply(Cancelled));
        assert_eq!(next_status(Paid, PaymentSignal::Succeeded), Transition::AlreadyApplied);
        assert_eq!(next_status(PaymentFailed, PaymentSignal::Failed), Transition::AlreadyApplied);
        assert_eq!(next_status(Paid, PaymentSignal::Informational), Transition::NoChange);
    }

    #[test]
    fn no_resurrection_to_paid() {
        assert_eq!(next_status(PaymentFailed, PaymentSignal::Succeeded), Transition::Ignored);
        assert_eq!(next_status(Cancelled, PaymentSignal::Succeeded), Transition::Ignored);
        assert_eq!(next_status(Paid, PaymentSignal::Failed), Transition::Ignored);
        assert_eq!(next_status(NotPaid, PaymentSignal::Refunded), Transition::Ignored);
        assert_eq!(next_status(Delivered, PaymentSignal::Refunded), Transition::Ignored);
    }
}
