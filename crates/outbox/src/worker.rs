//! Outbox worker: drains the ledger into the notification channel.

use chrono::Utc;
use common::OrderId;
use domain::{OutboxEvent, OutboxEventType};
use store::{NewNotification, Storage, StorageSession, StoreError};

use crate::channel::{NotificationChannel, NotificationMessage};
use crate::error::ServiceError;

/// Human-readable notification text for one ledger entry.
///
/// Total over the event-type domain by exhaustive match.
pub fn notification_message(event_type: OutboxEventType, order_id: OrderId) -> String {
    match event_type {
        OutboxEventType::OrderPaid => {
            format!("Order {order_id} has been paid successfully")
        }
        OutboxEventType::PaymentFailed => {
            format!("Payment failed for order {order_id}")
        }
    }
}

/// Drains pending outbox events, one per invocation, in creation order.
///
/// Delivery is at-least-once toward the channel; the dedup marker,
/// guarded by a storage uniqueness constraint, makes it effectively
/// once from the consumer's perspective.
pub struct OutboxWorker<S: Storage, C: NotificationChannel> {
    storage: S,
    channel: C,
}

impl<S: Storage, C: NotificationChannel> OutboxWorker<S, C> {
    /// Creates a new worker.
    pub fn new(storage: S, channel: C) -> Self {
        Self { storage, channel }
    }

    /// Claims and delivers the oldest pending event.
    ///
    /// Returns the event that was settled, or `None` if the ledger has
    /// no pending entries (including the case where a concurrent worker
    /// holds the claim on the only candidate). Any failure leaves the
    /// event `PENDING` for a future retry.
    #[tracing::instrument(skip(self))]
    pub async fn process_next_event(&self) -> Result<Option<OutboxEvent>, ServiceError> {
        let mut session = self.storage.begin().await?;
        match self.process_in(&mut session).await {
            Ok(Some(event)) => {
                session.commit().await?;
                metrics::counter!("outbox_events_processed_total").increment(1);
                Ok(Some(event))
            }
            Ok(None) => {
                session.rollback().await?;
                Ok(None)
            }
            Err(e) => {
                session.rollback().await?;
                tracing::error!(error = %e, "outbox event processing failed");
                Err(e)
            }
        }
    }

    async fn process_in(
        &self,
        session: &mut S::Session,
    ) -> Result<Option<OutboxEvent>, ServiceError> {
        let Some(mut event) = session.lock_next_pending_event().await? else {
            return Ok(None);
        };

        // A marker means a prior attempt delivered this event but
        // crashed before settling it: settle it now without touching
        // the channel again.
        if session.notification_exists(event.id()).await? {
            event.mark_processed(Utc::now())?;
            session.update_outbox_event(&event).await?;
            metrics::counter!("outbox_events_skipped_total").increment(1);
            tracing::info!(
                event_id = %event.id(),
                "outbox event already delivered, settling without re-push"
            );
            return Ok(Some(event));
        }

        event.mark_processed(Utc::now())?;
        session.update_outbox_event(&event).await?;

        self.channel
            .push(NotificationMessage::from_event(&event))
            .await?;

        let notification = NewNotification {
            outbox_event_id: event.id(),
            order_id: event.aggregate_id(),
            notification_type: event.event_type(),
            message: notification_message(event.event_type(), event.aggregate_id()),
        };
        match session.insert_notification(notification).await {
            Ok(_) => {}
            // A concurrent worker won the insert race; the notification
            // is considered delivered by whoever inserted first.
            Err(StoreError::DuplicateKey { .. }) => {
                tracing::info!(
                    event_id = %event.id(),
                    "dedup marker already recorded by a concurrent worker"
                );
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            event_id = %event.id(),
            order_id = %event.aggregate_id(),
            event_type = %event.event_type(),
            "outbox event delivered"
        );
        Ok(Some(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_text_is_fixed_per_event_type() {
        assert_eq!(
            notification_message(OutboxEventType::OrderPaid, OrderId::new(12)),
            "Order 12 has been paid successfully"
        );
        assert_eq!(
            notification_message(OutboxEventType::PaymentFailed, OrderId::new(12)),
            "Payment failed for order 12"
        );
    }
}
