//! Outbox event ledger model.
//!
//! An [`OutboxEvent`] is an at-most-once-emitted record of a fact that
//! happened to an order, written in the same transaction as the order
//! mutation itself and later drained to a notification channel by the
//! worker. Ledger rows are never deleted.

use chrono::{DateTime, Utc};
use common::{OrderId, OutboxEventId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::Money;
use crate::order::{Order, OrderState};

/// The closed set of facts the ledger can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutboxEventType {
    /// Payment succeeded and the order moved to `Paid`.
    #[serde(rename = "ORDER_PAID")]
    OrderPaid,

    /// Payment was declined and the order moved to `PaymentFailed`.
    #[serde(rename = "PAYMENT_FAILED")]
    PaymentFailed,
}

impl OutboxEventType {
    /// Returns the type tag as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxEventType::OrderPaid => "ORDER_PAID",
            OutboxEventType::PaymentFailed => "PAYMENT_FAILED",
        }
    }
}

impl std::fmt::Display for OutboxEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OutboxEventType {
    type Err = OutboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ORDER_PAID" => Ok(OutboxEventType::OrderPaid),
            "PAYMENT_FAILED" => Ok(OutboxEventType::PaymentFailed),
            other => Err(OutboxError::UnknownEventType(other.to_string())),
        }
    }
}

/// Delivery status of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OutboxEventStatus {
    /// Awaiting delivery by the worker.
    #[default]
    #[serde(rename = "PENDING")]
    Pending,

    /// Delivered (or recognized as already delivered) and settled.
    #[serde(rename = "PROCESSED")]
    Processed,
}

impl OutboxEventStatus {
    /// Returns the status as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxEventStatus::Pending => "PENDING",
            OutboxEventStatus::Processed => "PROCESSED",
        }
    }
}

impl std::fmt::Display for OutboxEventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OutboxEventStatus {
    type Err = OutboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OutboxEventStatus::Pending),
            "PROCESSED" => Ok(OutboxEventStatus::Processed),
            other => Err(OutboxError::UnknownStatus(other.to_string())),
        }
    }
}

/// Errors raised by the outbox ledger model.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OutboxError {
    /// Status only ever moves `Pending -> Processed`.
    #[error("Cannot mark event as processed: current status is {status}")]
    AlreadyProcessed { status: OutboxEventStatus },

    /// A stored type tag did not match any known variant.
    #[error("Unknown outbox event type: {0}")]
    UnknownEventType(String),

    /// A stored status value did not match any known variant.
    #[error("Unknown outbox event status: {0}")]
    UnknownStatus(String),
}

/// Structured snapshot of the order at the moment the fact was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxPayload {
    pub order_id: OrderId,
    pub state: OrderState,
    pub total_amount_cents: i64,
}

impl OutboxPayload {
    /// Captures the resulting state and amount of `order`.
    pub fn snapshot(order: &Order) -> Self {
        Self {
            order_id: order.id(),
            state: order.state(),
            total_amount_cents: order.total_amount().cents(),
        }
    }

    pub fn total_amount(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }
}

/// A ledger entry not yet persisted; identity is assigned by storage.
#[derive(Debug, Clone)]
pub struct NewOutboxEvent {
    pub aggregate_id: OrderId,
    pub event_type: OutboxEventType,
    pub payload: OutboxPayload,
}

impl NewOutboxEvent {
    /// Builds a ledger entry recording `event_type` for `order`,
    /// snapshotting its current state and amount.
    pub fn for_order(order: &Order, event_type: OutboxEventType) -> Self {
        Self {
            aggregate_id: order.id(),
            event_type,
            payload: OutboxPayload::snapshot(order),
        }
    }
}

/// A persisted outbox ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEvent {
    id: OutboxEventId,
    aggregate_id: OrderId,
    event_type: OutboxEventType,
    payload: OutboxPayload,
    status: OutboxEventStatus,
    created_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

impl OutboxEvent {
    /// Rehydrates an event from stored fields. Used by storage backends.
    pub fn from_parts(
        id: OutboxEventId,
        aggregate_id: OrderId,
        event_type: OutboxEventType,
        payload: OutboxPayload,
        status: OutboxEventStatus,
        created_at: DateTime<Utc>,
        processed_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            aggregate_id,
            event_type,
            payload,
            status,
            created_at,
            processed_at,
        }
    }

    pub fn id(&self) -> OutboxEventId {
        self.id
    }

    pub fn aggregate_id(&self) -> OrderId {
        self.aggregate_id
    }

    pub fn event_type(&self) -> OutboxEventType {
        self.event_type
    }

    pub fn payload(&self) -> &OutboxPayload {
        &self.payload
    }

    pub fn status(&self) -> OutboxEventStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn processed_at(&self) -> Option<DateTime<Utc>> {
        self.processed_at
    }

    /// Settles the entry after delivery.
    ///
    /// Fails unless the entry is still `Pending`; the status moves
    /// `Pending -> Processed` exactly once.
    pub fn mark_processed(&mut self, now: DateTime<Utc>) -> Result<(), OutboxError> {
        if self.status != OutboxEventStatus::Pending {
            return Err(OutboxError::AlreadyProcessed {
                status: self.status,
            });
        }
        self.status = OutboxEventStatus::Processed;
        self.processed_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> OutboxEvent {
        let order = Order::new(OrderId::new(9), Money::from_cents(10_000), Utc::now()).unwrap();
        let new = NewOutboxEvent::for_order(&order, OutboxEventType::OrderPaid);
        OutboxEvent::from_parts(
            OutboxEventId::new(1),
            new.aggregate_id,
            new.event_type,
            new.payload,
            OutboxEventStatus::Pending,
            order.created_at(),
            None,
        )
    }

    #[test]
    fn snapshot_captures_state_and_amount() {
        let mut order =
            Order::new(OrderId::new(3), Money::from_cents(25_000), Utc::now()).unwrap();
        order.mark_paid(Utc::now()).unwrap();

        let payload = OutboxPayload::snapshot(&order);
        assert_eq!(payload.order_id, OrderId::new(3));
        assert_eq!(payload.state, OrderState::Paid);
        assert_eq!(payload.total_amount(), Money::from_cents(25_000));
    }

    #[test]
    fn mark_processed_sets_timestamp() {
        let mut event = sample_event();
        let now = event.created_at() + chrono::Duration::seconds(2);

        event.mark_processed(now).unwrap();
        assert_eq!(event.status(), OutboxEventStatus::Processed);
        assert_eq!(event.processed_at(), Some(now));
        assert!(event.processed_at().unwrap() >= event.created_at());
    }

    #[test]
    fn mark_processed_twice_fails() {
        let mut event = sample_event();
        event.mark_processed(Utc::now()).unwrap();

        let err = event.mark_processed(Utc::now()).unwrap_err();
        assert_eq!(
            err,
            OutboxError::AlreadyProcessed {
                status: OutboxEventStatus::Processed
            }
        );
    }

    #[test]
    fn type_tags_round_trip() {
        for ty in [OutboxEventType::OrderPaid, OutboxEventType::PaymentFailed] {
            assert_eq!(ty.as_str().parse::<OutboxEventType>().unwrap(), ty);
        }
        assert!("ORDER_SHIPPED".parse::<OutboxEventType>().is_err());
    }

    #[test]
    fn payload_serializes_with_stored_names() {
        let payload = OutboxPayload {
            order_id: OrderId::new(5),
            state: OrderState::Paid,
            total_amount_cents: 10_000,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "order_id": 5,
                "state": "PAID",
                "total_amount_cents": 10_000,
            })
        );
    }
}
