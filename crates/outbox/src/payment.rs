//! Payment processing: the transition that pairs an order mutation with
//! an outbox ledger append in one atomic unit of work.

use chrono::Utc;
use common::OrderId;
use domain::{NewOutboxEvent, Order, OrderState, OutboxEvent, OutboxEventType};
use store::{Storage, StorageSession};

use crate::error::ServiceError;
use crate::gateway::PaymentGateway;

/// Orchestrates payment processing.
///
/// The order mutation and the outbox append commit together or not at
/// all; the notification channel is never touched here. Delivery is the
/// [`OutboxWorker`](crate::OutboxWorker)'s job.
pub struct PaymentService<S: Storage, G: PaymentGateway> {
    storage: S,
    gateway: G,
}

impl<S: Storage, G: PaymentGateway> PaymentService<S, G> {
    /// Creates a new payment service.
    pub fn new(storage: S, gateway: G) -> Self {
        Self { storage, gateway }
    }

    /// Processes the payment for an order awaiting payment.
    ///
    /// Re-reads the order inside the unit of work with a locking read,
    /// obtains the gateway outcome, applies `Paid` or `PaymentFailed`,
    /// and appends the matching outbox event. Any error rolls the whole
    /// unit of work back and surfaces to the caller.
    #[tracing::instrument(skip(self))]
    pub async fn process_payment(
        &self,
        order_id: OrderId,
    ) -> Result<(Order, OutboxEvent), ServiceError> {
        let mut session = self.storage.begin().await?;
        match self.process_in(&mut session, order_id).await {
            Ok((order, event)) => {
                session.commit().await?;
                metrics::counter!("payments_processed_total").increment(1);
                if order.state() == OrderState::PaymentFailed {
                    metrics::counter!("payments_declined_total").increment(1);
                }
                tracing::info!(
                    %order_id,
                    event_type = %event.event_type(),
                    "payment processed"
                );
                Ok((order, event))
            }
            Err(e) => {
                session.rollback().await?;
                tracing::error!(%order_id, error = %e, "payment processing failed");
                Err(e)
            }
        }
    }

    async fn process_in(
        &self,
        session: &mut S::Session,
        order_id: OrderId,
    ) -> Result<(Order, OutboxEvent), ServiceError> {
        let mut order = session
            .order_for_update(order_id)
            .await?
            .ok_or(ServiceError::OrderNotFound(order_id))?;

        // Business precondition, checked before the gateway is invoked
        // so an order is never charged twice.
        if order.state() != OrderState::PendingPayment {
            return Err(ServiceError::InvalidOrderState {
                id: order_id,
                state: order.state(),
            });
        }

        let authorized = self.gateway.authorize(&order).await?;

        let now = Utc::now();
        let event_type = if authorized {
            order.mark_paid(now)?;
            OutboxEventType::OrderPaid
        } else {
            order.mark_payment_failed(now)?;
            OutboxEventType::PaymentFailed
        };

        session.update_order(&order).await?;
        let event = session
            .insert_outbox_event(NewOutboxEvent::for_order(&order, event_type), now)
            .await?;

        Ok((order, event))
    }
}
