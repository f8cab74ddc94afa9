use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{NotificationId, OrderId, OutboxEventId};
use domain::{Money, NewOutboxEvent, Order, OrderState, OutboxEvent, OutboxEventStatus};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Result, StoreError,
    store::{NewNotification, NotificationRecord, Storage, StorageSession},
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    next_order_id: i64,
    next_event_id: i64,
    next_notification_id: i64,
    orders: BTreeMap<i64, Order>,
    events: BTreeMap<i64, OutboxEvent>,
    notifications: BTreeMap<i64, NotificationRecord>,
}

/// In-memory storage backend for tests and local development.
///
/// Sessions take the single state mutex for their whole lifetime and
/// work on a staged copy, so concurrent units of work are fully
/// serialized: stronger than, but compatible with, the isolation the
/// PostgreSQL backend provides.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStorage {
    /// Creates a new empty in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads an order outside of any session.
    pub async fn order(&self, id: OrderId) -> Option<Order> {
        self.state.lock().await.orders.get(&id.as_i64()).cloned()
    }

    /// Reads a ledger entry outside of any session.
    pub async fn event(&self, id: OutboxEventId) -> Option<OutboxEvent> {
        self.state.lock().await.events.get(&id.as_i64()).cloned()
    }

    /// Returns the total number of ledger entries.
    pub async fn event_count(&self) -> usize {
        self.state.lock().await.events.len()
    }

    /// Returns the number of dedup markers for one ledger entry.
    pub async fn notification_count_for_event(&self, event_id: OutboxEventId) -> usize {
        self.state
            .lock()
            .await
            .notifications
            .values()
            .filter(|n| n.outbox_event_id == event_id)
            .count()
    }

    /// Returns the total number of dedup markers.
    pub async fn notification_count(&self) -> usize {
        self.state.lock().await.notifications.len()
    }

    /// Forces a ledger entry back to `PENDING`, as an operator would.
    ///
    /// Only exists to exercise the worker's idempotency short-circuit;
    /// no code path regresses an event under normal operation.
    pub async fn reset_event_to_pending(&self, id: OutboxEventId) {
        let mut state = self.state.lock().await;
        if let Some(event) = state.events.get(&id.as_i64()) {
            let reset = OutboxEvent::from_parts(
                event.id(),
                event.aggregate_id(),
                event.event_type(),
                event.payload().clone(),
                OutboxEventStatus::Pending,
                event.created_at(),
                None,
            );
            state.events.insert(id.as_i64(), reset);
        }
    }
}

/// A unit of work against [`InMemoryStorage`].
pub struct InMemorySession {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl Storage for InMemoryStorage {
    type Session = InMemorySession;

    async fn begin(&self) -> Result<Self::Session> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();
        Ok(InMemorySession { guard, staged })
    }
}

#[async_trait]
impl StorageSession for InMemorySession {
    async fn insert_order(&mut self, total_amount: Money, now: DateTime<Utc>) -> Result<Order> {
        self.staged.next_order_id += 1;
        let order = Order::from_parts(
            OrderId::new(self.staged.next_order_id),
            OrderState::PendingPayment,
            total_amount,
            now,
            now,
        );
        self.staged.orders.insert(order.id().as_i64(), order.clone());
        Ok(order)
    }

    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.staged.orders.get(&id.as_i64()).cloned())
    }

    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>> {
        // The session already holds the global mutex, so every read is
        // an exclusive read.
        self.find_order(id).await
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        self.staged.orders.insert(order.id().as_i64(), order.clone());
        Ok(())
    }

    async fn insert_outbox_event(
        &mut self,
        event: NewOutboxEvent,
        now: DateTime<Utc>,
    ) -> Result<OutboxEvent> {
        self.staged.next_event_id += 1;
        let event = OutboxEvent::from_parts(
            OutboxEventId::new(self.staged.next_event_id),
            event.aggregate_id,
            event.event_type,
            event.payload,
            OutboxEventStatus::Pending,
            now,
            None,
        );
        self.staged.events.insert(event.id().as_i64(), event.clone());
        Ok(event)
    }

    async fn lock_next_pending_event(&mut self) -> Result<Option<OutboxEvent>> {
        let next = self
            .staged
            .events
            .values()
            .filter(|e| e.status() == OutboxEventStatus::Pending)
            .min_by_key(|e| (e.created_at(), e.id()))
            .cloned();
        Ok(next)
    }

    async fn update_outbox_event(&mut self, event: &OutboxEvent) -> Result<()> {
        self.staged.events.insert(event.id().as_i64(), event.clone());
        Ok(())
    }

    async fn notification_exists(&mut self, event_id: OutboxEventId) -> Result<bool> {
        Ok(self
            .staged
            .notifications
            .values()
            .any(|n| n.outbox_event_id == event_id))
    }

    async fn insert_notification(
        &mut self,
        notification: NewNotification,
    ) -> Result<NotificationId> {
        if self
            .staged
            .notifications
            .values()
            .any(|n| n.outbox_event_id == notification.outbox_event_id)
        {
            return Err(StoreError::DuplicateKey {
                constraint: "unique_outbox_event".to_string(),
            });
        }

        self.staged.next_notification_id += 1;
        let id = NotificationId::new(self.staged.next_notification_id);
        self.staged.notifications.insert(
            id.as_i64(),
            NotificationRecord {
                id,
                outbox_event_id: notification.outbox_event_id,
                order_id: notification.order_id,
                notification_type: notification.notification_type,
                message: notification.message,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn commit(mut self) -> Result<()> {
        *self.guard = self.staged;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        // Dropping the staged copy discards every write of the session.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::OutboxEventType;

    async fn insert_paid_event(
        session: &mut InMemorySession,
        order: &Order,
        now: DateTime<Utc>,
    ) -> OutboxEvent {
        session
            .insert_outbox_event(
                NewOutboxEvent::for_order(order, OutboxEventType::OrderPaid),
                now,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn commit_makes_writes_visible() {
        let storage = InMemoryStorage::new();

        let mut session = storage.begin().await.unwrap();
        let order = session
            .insert_order(Money::from_cents(1000), Utc::now())
            .await
            .unwrap();
        session.commit().await.unwrap();

        let found = storage.order(order.id()).await.unwrap();
        assert_eq!(found.state(), OrderState::PendingPayment);
        assert_eq!(found.total_amount(), Money::from_cents(1000));
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let storage = InMemoryStorage::new();

        let mut session = storage.begin().await.unwrap();
        let order = session
            .insert_order(Money::from_cents(1000), Utc::now())
            .await
            .unwrap();
        session.rollback().await.unwrap();

        assert!(storage.order(order.id()).await.is_none());
    }

    #[tokio::test]
    async fn pending_events_are_claimed_fifo() {
        let storage = InMemoryStorage::new();
        let base = Utc::now();

        let mut session = storage.begin().await.unwrap();
        let o1 = session
            .insert_order(Money::from_cents(100), base)
            .await
            .unwrap();
        let o2 = session
            .insert_order(Money::from_cents(200), base)
            .await
            .unwrap();
        let e1 = insert_paid_event(&mut session, &o1, base).await;
        let _e2 = insert_paid_event(&mut session, &o2, base + chrono::Duration::seconds(1)).await;
        session.commit().await.unwrap();

        let mut session = storage.begin().await.unwrap();
        let claimed = session.lock_next_pending_event().await.unwrap().unwrap();
        assert_eq!(claimed.id(), e1.id());
        session.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn creation_time_ties_break_by_identity() {
        let storage = InMemoryStorage::new();
        let now = Utc::now();

        let mut session = storage.begin().await.unwrap();
        let order = session
            .insert_order(Money::from_cents(100), now)
            .await
            .unwrap();
        let e1 = insert_paid_event(&mut session, &order, now).await;
        let _e2 = insert_paid_event(&mut session, &order, now).await;
        session.commit().await.unwrap();

        let mut session = storage.begin().await.unwrap();
        let claimed = session.lock_next_pending_event().await.unwrap().unwrap();
        assert_eq!(claimed.id(), e1.id());
        session.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn processed_events_are_not_claimed() {
        let storage = InMemoryStorage::new();
        let now = Utc::now();

        let mut session = storage.begin().await.unwrap();
        let order = session
            .insert_order(Money::from_cents(100), now)
            .await
            .unwrap();
        let mut event = insert_paid_event(&mut session, &order, now).await;
        event.mark_processed(now).unwrap();
        session.update_outbox_event(&event).await.unwrap();
        session.commit().await.unwrap();

        let mut session = storage.begin().await.unwrap();
        assert!(session.lock_next_pending_event().await.unwrap().is_none());
        session.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_notification_is_a_distinguishable_error() {
        let storage = InMemoryStorage::new();
        let now = Utc::now();

        let mut session = storage.begin().await.unwrap();
        let order = session
            .insert_order(Money::from_cents(100), now)
            .await
            .unwrap();
        let event = insert_paid_event(&mut session, &order, now).await;

        let notification = NewNotification {
            outbox_event_id: event.id(),
            order_id: order.id(),
            notification_type: OutboxEventType::OrderPaid,
            message: "Order 1 has been paid successfully".to_string(),
        };
        session
            .insert_notification(notification.clone())
            .await
            .unwrap();

        let err = session.insert_notification(notification).await.unwrap_err();
        assert!(err.is_duplicate_key());
        session.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn reset_event_to_pending_clears_processed_at() {
        let storage = InMemoryStorage::new();
        let now = Utc::now();

        let mut session = storage.begin().await.unwrap();
        let order = session
            .insert_order(Money::from_cents(100), now)
            .await
            .unwrap();
        let mut event = insert_paid_event(&mut session, &order, now).await;
        event.mark_processed(now).unwrap();
        session.update_outbox_event(&event).await.unwrap();
        session.commit().await.unwrap();

        storage.reset_event_to_pending(event.id()).await;
        let reset = storage.event(event.id()).await.unwrap();
        assert_eq!(reset.status(), OutboxEventStatus::Pending);
        assert!(reset.processed_at().is_none());
    }
}
