//! Order creation, cancellation, and reads.

use chrono::Utc;
use common::OrderId;
use domain::{Money, Order, OrderError};
use store::{Storage, StorageSession};

use crate::error::ServiceError;

/// Service for managing order lifecycles outside of payment processing.
pub struct OrderService<S: Storage> {
    storage: S,
}

impl<S: Storage> OrderService<S> {
    /// Creates a new order service over the given storage backend.
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Creates a new order in `PendingPayment`.
    ///
    /// The total amount must be strictly positive.
    #[tracing::instrument(skip(self))]
    pub async fn create_order(&self, total_amount: Money) -> Result<Order, ServiceError> {
        if !total_amount.is_positive() {
            return Err(OrderError::InvalidAmount(total_amount).into());
        }

        let mut session = self.storage.begin().await?;
        match session.insert_order(total_amount, Utc::now()).await {
            Ok(order) => {
                session.commit().await?;
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(order_id = %order.id(), %total_amount, "order created");
                Ok(order)
            }
            Err(e) => {
                session.rollback().await?;
                Err(e.into())
            }
        }
    }

    /// Loads an order by ID. Returns `None` if it does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, ServiceError> {
        let mut session = self.storage.begin().await?;
        let order = session.find_order(order_id).await;
        session.rollback().await?;
        Ok(order?)
    }

    /// Cancels an order.
    ///
    /// Legal only from `PendingPayment` or `PaymentFailed`; fails with
    /// `CannotCancel` otherwise.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<Order, ServiceError> {
        let mut session = self.storage.begin().await?;
        match Self::cancel_in(&mut session, order_id).await {
            Ok(order) => {
                session.commit().await?;
                tracing::info!(order_id = %order.id(), "order cancelled");
                Ok(order)
            }
            Err(e) => {
                session.rollback().await?;
                Err(e)
            }
        }
    }

    async fn cancel_in(session: &mut S::Session, order_id: OrderId) -> Result<Order, ServiceError> {
        let mut order = session
            .order_for_update(order_id)
            .await?
            .ok_or(ServiceError::OrderNotFound(order_id))?;
        order.cancel(Utc::now())?;
        session.update_order(&order).await?;
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::OrderState;
    use store::InMemoryStorage;

    fn service() -> OrderService<InMemoryStorage> {
        OrderService::new(InMemoryStorage::new())
    }

    #[tokio::test]
    async fn create_order_starts_pending() {
        let service = service();
        let order = service
            .create_order(Money::from_cents(10_000))
            .await
            .unwrap();
        assert_eq!(order.state(), OrderState::PendingPayment);
        assert_eq!(order.total_amount(), Money::from_cents(10_000));
    }

    #[tokio::test]
    async fn create_order_rejects_non_positive_amount() {
        let service = service();
        let err = service.create_order(Money::from_cents(0)).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Order(OrderError::InvalidAmount(_))
        ));
    }

    #[tokio::test]
    async fn get_missing_order_returns_none() {
        let service = service();
        assert!(service.get_order(OrderId::new(99)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cancel_pending_order() {
        let service = service();
        let order = service.create_order(Money::from_cents(500)).await.unwrap();

        let cancelled = service.cancel_order(order.id()).await.unwrap();
        assert_eq!(cancelled.state(), OrderState::Cancelled);

        let reloaded = service.get_order(order.id()).await.unwrap().unwrap();
        assert_eq!(reloaded.state(), OrderState::Cancelled);
    }

    #[tokio::test]
    async fn cancel_missing_order_fails() {
        let service = service();
        let err = service.cancel_order(OrderId::new(7)).await.unwrap_err();
        assert!(matches!(err, ServiceError::OrderNotFound(_)));
    }
}
