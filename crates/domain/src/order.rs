//! Order aggregate and its lifecycle state machine.

use chrono::{DateTime, Utc};
use common::OrderId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::Money;

/// The state of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// PendingPayment ──┬──► Paid
///                  ├──► PaymentFailed ──► Cancelled
///                  └──► Cancelled
/// ```
///
/// `Paid` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderState {
    /// Order was created and awaits a payment outcome.
    #[default]
    #[serde(rename = "PENDING_PAYMENT")]
    PendingPayment,

    /// Payment succeeded (terminal state).
    #[serde(rename = "PAID")]
    Paid,

    /// Payment was declined; the order may still be cancelled.
    #[serde(rename = "PAYMENT_FAILED")]
    PaymentFailed,

    /// Order was cancelled (terminal state).
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

impl OrderState {
    /// Returns true if the state machine allows moving to `target`.
    pub fn can_transition_to(&self, target: OrderState) -> bool {
        match self {
            OrderState::PendingPayment => matches!(
                target,
                OrderState::Paid | OrderState::PaymentFailed | OrderState::Cancelled
            ),
            OrderState::PaymentFailed => matches!(target, OrderState::Cancelled),
            OrderState::Paid | OrderState::Cancelled => false,
        }
    }

    /// Returns true if the order can be cancelled in this state.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderState::PendingPayment | OrderState::PaymentFailed)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderState::Paid | OrderState::Cancelled)
    }

    /// Returns the state name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::PendingPayment => "PENDING_PAYMENT",
            OrderState::Paid => "PAID",
            OrderState::PaymentFailed => "PAYMENT_FAILED",
            OrderState::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderState {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING_PAYMENT" => Ok(OrderState::PendingPayment),
            "PAID" => Ok(OrderState::Paid),
            "PAYMENT_FAILED" => Ok(OrderState::PaymentFailed),
            "CANCELLED" => Ok(OrderState::Cancelled),
            other => Err(OrderError::UnknownState(other.to_string())),
        }
    }
}

/// Errors raised by the order aggregate.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    /// The requested move is not in the transition table.
    #[error("Cannot transition from {from} to {to}")]
    InvalidTransition { from: OrderState, to: OrderState },

    /// Cancellation is only legal from PendingPayment or PaymentFailed.
    #[error("Cannot cancel order in state {state}")]
    CannotCancel { state: OrderState },

    /// Order totals must be strictly positive.
    #[error("Order total must be strictly positive, got {0}")]
    InvalidAmount(Money),

    /// A stored state value did not match any known variant.
    #[error("Unknown order state: {0}")]
    UnknownState(String),
}

/// Order aggregate root.
///
/// Each order is exclusively owned by its row in the order store;
/// instances of this type are transient projections of that row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    state: OrderState,
    total_amount: Money,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a fresh order in `PendingPayment` with a storage-assigned id.
    ///
    /// Fails if the total amount is not strictly positive.
    pub fn new(id: OrderId, total_amount: Money, now: DateTime<Utc>) -> Result<Self, OrderError> {
        if !total_amount.is_positive() {
            return Err(OrderError::InvalidAmount(total_amount));
        }
        Ok(Self {
            id,
            state: OrderState::PendingPayment,
            total_amount,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rehydrates an order from stored fields. Used by storage backends.
    pub fn from_parts(
        id: OrderId,
        state: OrderState,
        total_amount: Money,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            state,
            total_amount,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn state(&self) -> OrderState {
        self.state
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Moves the order to `target` if the transition table allows it.
    ///
    /// Every legal transition stamps `updated_at` with the transition time.
    pub fn transition(&mut self, target: OrderState, now: DateTime<Utc>) -> Result<(), OrderError> {
        if !self.state.can_transition_to(target) {
            return Err(OrderError::InvalidTransition {
                from: self.state,
                to: target,
            });
        }
        self.state = target;
        self.updated_at = now;
        Ok(())
    }

    /// Records a successful payment outcome.
    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.transition(OrderState::Paid, now)
    }

    /// Records a declined payment outcome.
    pub fn mark_payment_failed(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.transition(OrderState::PaymentFailed, now)
    }

    /// Cancels the order.
    ///
    /// Legal only from `PendingPayment` or `PaymentFailed`.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        if !self.state.can_cancel() {
            return Err(OrderError::CannotCancel { state: self.state });
        }
        self.state = OrderState::Cancelled;
        self.updated_at = now;
        Ok(())
    }
}
