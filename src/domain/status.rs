use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Raised when a status column holds a token this build does not know.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown status token: {0}")]
pub struct UnknownStatus(pub String);

/// Delivery-side lifecycle of an order. The forward path is strictly
/// linear; CANCELLED is the only branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Created,
    Paid,
    PickupAssigned,
    PickedUp,
    AtCr,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Created,
        OrderStatus::Paid,
        OrderStatus::PickupAssigned,
        OrderStatus::PickedUp,
        OrderStatus::AtCr,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::Paid => "PAID",
            OrderStatus::PickupAssigned => "PICKUP_ASSIGNED",
            OrderStatus::PickedUp => "PICKED_UP",
            OrderStatus::AtCr => "AT_CR",
            OrderStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// The single allowed forward step, if any.
    pub fn next(self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Created => Some(OrderStatus::Paid),
            OrderStatus::Paid => Some(OrderStatus::PickupAssigned),
            OrderStatus::PickupAssigned => Some(OrderStatus::PickedUp),
            OrderStatus::PickedUp => Some(OrderStatus::AtCr),
            OrderStatus::AtCr => Some(OrderStatus::OutForDelivery),
            OrderStatus::OutForDelivery => Some(OrderStatus::Delivered),
            OrderStatus::Delivered | OrderStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Payment axis, tracked independently of delivery progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
    Refunded,
    PartiallyRefunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 5] = [
        PaymentStatus::Pending,
        PaymentStatus::Success,
        PaymentStatus::Failed,
        PaymentStatus::Refunded,
        PaymentStatus::PartiallyRefunded,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
            PaymentStatus::PartiallyRefunded => "PARTIALLY_REFUNDED",
        }
    }

    /// Once money has been (partially) returned the order can no longer be
    /// cancelled through the status endpoint; refunds own that path.
    pub fn allows_cancellation(self) -> bool {
        !matches!(
            self,
            PaymentStatus::Refunded | PaymentStatus::PartiallyRefunded
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentStatus::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("order is {0} and cannot change state")]
    Terminal(OrderStatus),
    #[error("cannot move from {from} to {to}")]
    NotNextStep { from: OrderStatus, to: OrderStatus },
    #[error("cannot cancel an order whose payment is {0}")]
    NotCancellable(PaymentStatus),
}

/// Accepts exactly the single forward step, or CANCELLED from any
/// non-terminal state while the payment has not moved past a refundable
/// point. Everything else is rejected with the reason.
pub fn validate_transition(
    current: OrderStatus,
    requested: OrderStatus,
    payment: PaymentStatus,
) -> Result<(), TransitionError> {
    if current.is_terminal() {
        return Err(TransitionError::Terminal(current));
    }
    if requested == OrderStatus::Cancelled {
        if payment.allows_cancellation() {
            return Ok(());
        }
        return Err(TransitionError::NotCancellable(payment));
    }
    if current.next() == Some(requested) {
        Ok(())
    } else {
        Err(TransitionError::NotNextStep {
            from: current,
            to: requested,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_path_is_linear() {
        let path = [
            OrderStatus::Created,
            OrderStatus::Paid,
            OrderStatus::PickupAssigned,
            OrderStatus::PickedUp,
            OrderStatus::AtCr,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
        ];
        for pair in path.windows(2) {
            assert_eq!(pair[0].next(), Some(pair[1]));
            assert!(validate_transition(pair[0], pair[1], PaymentStatus::Pending).is_ok());
        }
    }

    #[test]
    fn exhaustive_triples_accept_only_forward_and_cancel() {
        for current in OrderStatus::ALL {
            for requested in OrderStatus::ALL {
                for payment in PaymentStatus::ALL {
                    let verdict = validate_transition(current, requested, payment);
                    let expected_ok = if current.is_terminal() {
                        false
                    } else if requested == OrderStatus::Cancelled {
                        payment.allows_cancellation()
                    } else {
                        current.next() == Some(requested)
                    };
                    assert_eq!(
                        verdict.is_ok(),
                        expected_ok,
                        "{current} -> {requested} under {payment}: {verdict:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn delivered_is_terminal() {
        assert_eq!(
            validate_transition(
                OrderStatus::Delivered,
                OrderStatus::Created,
                PaymentStatus::Success
            ),
            Err(TransitionError::Terminal(OrderStatus::Delivered))
        );
    }

    #[test]
    fn cancelled_cannot_be_reanimated() {
        assert_eq!(
            validate_transition(
                OrderStatus::Cancelled,
                OrderStatus::Paid,
                PaymentStatus::Pending
            ),
            Err(TransitionError::Terminal(OrderStatus::Cancelled))
        );
    }

    #[test]
    fn skipping_a_step_is_rejected() {
        assert_eq!(
            validate_transition(
                OrderStatus::Paid,
                OrderStatus::AtCr,
                PaymentStatus::Success
            ),
            Err(TransitionError::NotNextStep {
                from: OrderStatus::Paid,
                to: OrderStatus::AtCr,
            })
        );
    }

    #[test]
    fn refunded_orders_cannot_be_cancelled() {
        for payment in [PaymentStatus::Refunded, PaymentStatus::PartiallyRefunded] {
            assert_eq!(
                validate_transition(OrderStatus::Paid, OrderStatus::Cancelled, payment),
                Err(TransitionError::NotCancellable(payment))
            );
        }
    }

    #[test]
    fn cancellation_allowed_while_refundable() {
        for current in [
            OrderStatus::Created,
            OrderStatus::Paid,
            OrderStatus::PickupAssigned,
            OrderStatus::OutForDelivery,
        ] {
            for payment in [
                PaymentStatus::Pending,
                PaymentStatus::Success,
                PaymentStatus::Failed,
            ] {
                assert!(
                    validate_transition(current, OrderStatus::Cancelled, payment).is_ok(),
                    "{current} under {payment}"
                );
            }
        }
    }

    #[test]
    fn tokens_round_trip() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        for payment in PaymentStatus::ALL {
            assert_eq!(payment.as_str().parse::<PaymentStatus>().unwrap(), payment);
        }
        assert!("SHIPPED".parse::<OrderStatus>().is_err());
    }
}
