//! Notification channel trait and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{OrderId, OutboxEventId};
use domain::{OutboxEvent, OutboxEventType, OutboxPayload};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by a notification channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The channel could not accept the message.
    #[error("Notification channel unavailable: {0}")]
    Unavailable(String),
}

/// The structured message pushed for one delivered ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub outbox_event_id: OutboxEventId,
    pub order_id: OrderId,
    #[serde(rename = "type")]
    pub event_type: OutboxEventType,
    pub payload: OutboxPayload,
}

impl NotificationMessage {
    /// Builds the message for a ledger entry.
    pub fn from_event(event: &OutboxEvent) -> Self {
        Self {
            outbox_event_id: event.id(),
            order_id: event.aggregate_id(),
            event_type: event.event_type(),
            payload: event.payload().clone(),
        }
    }
}

/// Trait for the external queue notifications are pushed into.
///
/// Delivery is fire-and-forget from the worker's perspective; the
/// channel's own durability is outside this crate's responsibility.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Pushes one message onto the channel.
    async fn push(&self, message: NotificationMessage) -> Result<(), ChannelError>;
}

#[derive(Debug, Default)]
struct InMemoryChannelState {
    messages: Vec<NotificationMessage>,
    fail_on_push: bool,
}

/// In-memory notification channel for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationChannel {
    state: Arc<RwLock<InMemoryChannelState>>,
}

impl InMemoryNotificationChannel {
    /// Creates a new empty in-memory channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the channel to reject every subsequent push.
    pub fn set_fail_on_push(&self, fail: bool) {
        self.state.write().unwrap().fail_on_push = fail;
    }

    /// Returns the number of messages pushed so far.
    pub fn message_count(&self) -> usize {
        self.state.read().unwrap().messages.len()
    }

    /// Returns a copy of all pushed messages, oldest first.
    pub fn messages(&self) -> Vec<NotificationMessage> {
        self.state.read().unwrap().messages.clone()
    }
}

#[async_trait]
impl NotificationChannel for InMemoryNotificationChannel {
    async fn push(&self, message: NotificationMessage) -> Result<(), ChannelError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_push {
            return Err(ChannelError::Unavailable("push rejected".to_string()));
        }
        state.messages.push(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::{Money, Order, OrderState};

    fn paid_event() -> OutboxEvent {
        let mut order = Order::new(OrderId::new(1), Money::from_cents(500), Utc::now()).unwrap();
        order.mark_paid(Utc::now()).unwrap();
        OutboxEvent::from_parts(
            OutboxEventId::new(10),
            order.id(),
            OutboxEventType::OrderPaid,
            OutboxPayload::snapshot(&order),
            domain::OutboxEventStatus::Pending,
            Utc::now(),
            None,
        )
    }

    #[tokio::test]
    async fn push_and_read_back() {
        let channel = InMemoryNotificationChannel::new();
        let event = paid_event();

        channel
            .push(NotificationMessage::from_event(&event))
            .await
            .unwrap();

        assert_eq!(channel.message_count(), 1);
        let message = &channel.messages()[0];
        assert_eq!(message.outbox_event_id, event.id());
        assert_eq!(message.order_id, OrderId::new(1));
        assert_eq!(message.event_type, OutboxEventType::OrderPaid);
        assert_eq!(message.payload.state, OrderState::Paid);
    }

    #[tokio::test]
    async fn fail_on_push_rejects_without_recording() {
        let channel = InMemoryNotificationChannel::new();
        channel.set_fail_on_push(true);

        let result = channel
            .push(NotificationMessage::from_event(&paid_event()))
            .await;
        assert!(result.is_err());
        assert_eq!(channel.message_count(), 0);
    }

    #[test]
    fn message_serializes_with_wire_field_names() {
        let event = paid_event();
        let json = serde_json::to_value(NotificationMessage::from_event(&event)).unwrap();
        assert_eq!(json["outbox_event_id"], 10);
        assert_eq!(json["order_id"], 1);
        assert_eq!(json["type"], "ORDER_PAID");
        assert_eq!(json["payload"]["total_amount_cents"], 500);
    }
}
