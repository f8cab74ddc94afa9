//! Service error types.

use common::OrderId;
use domain::{OrderError, OrderState, OutboxError};
use store::StoreError;
use thiserror::Error;

use crate::channel::ChannelError;

/// Errors that can occur during service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Order not found.
    #[error("Order {0} not found")]
    OrderNotFound(OrderId),

    /// Business precondition violated: only orders awaiting payment can
    /// be charged.
    #[error("Order {id} is not in PENDING_PAYMENT state: current state is {state}")]
    InvalidOrderState { id: OrderId, state: OrderState },

    /// Order state machine rule violated.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Outbox ledger rule violated.
    #[error("Outbox error: {0}")]
    Outbox(#[from] OutboxError),

    /// Storage failure; the unit of work was rolled back.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// The notification channel rejected a push.
    #[error("Notification channel error: {0}")]
    Channel(#[from] ChannelError),

    /// The payment gateway could not produce an outcome.
    #[error("Payment gateway error: {0}")]
    Gateway(String),
}
