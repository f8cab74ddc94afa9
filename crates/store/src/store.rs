//! Storage contracts shared by all backends.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{NotificationId, OrderId, OutboxEventId};
use domain::{Money, NewOutboxEvent, Order, OutboxEvent, OutboxEventType};

use crate::Result;

/// A notification dedup marker not yet persisted.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub outbox_event_id: OutboxEventId,
    pub order_id: OrderId,
    pub notification_type: OutboxEventType,
    pub message: String,
}

/// A persisted notification dedup marker.
#[derive(Debug, Clone)]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub outbox_event_id: OutboxEventId,
    pub order_id: OrderId,
    pub notification_type: OutboxEventType,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Handle to a storage backend.
///
/// Backends are cheap to clone and safe to share across tasks; all
/// mutual exclusion between concurrent units of work comes from the
/// backend's transaction isolation and uniqueness constraints.
#[async_trait]
pub trait Storage: Send + Sync {
    type Session: StorageSession + Send;

    /// Opens a new atomic unit of work.
    async fn begin(&self) -> Result<Self::Session>;
}

/// One atomic unit of work against storage.
///
/// Every session ends in exactly one of [`commit`](Self::commit) or
/// [`rollback`](Self::rollback); dropping an unfinished session must
/// behave like a rollback. Reads taken inside a session participate in
/// its isolation: `order_for_update` and `lock_next_pending_event` are
/// locking reads that exclude concurrent writers until the session ends.
#[async_trait]
pub trait StorageSession: Send {
    /// Inserts a fresh order in `PendingPayment`, assigning its identity.
    ///
    /// Callers validate the total amount; backends additionally enforce
    /// positivity where the schema supports it.
    async fn insert_order(&mut self, total_amount: Money, now: DateTime<Utc>) -> Result<Order>;

    /// Reads an order without locking it. Returns `None` if absent.
    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Reads an order and locks its row for the rest of the session.
    ///
    /// Serializes concurrent check-then-write sequences on the same
    /// order, so only one of two racing payment attempts can observe
    /// `PendingPayment`.
    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Whole-row update of an order by identity.
    async fn update_order(&mut self, order: &Order) -> Result<()>;

    /// Appends an entry to the outbox ledger, assigning its identity.
    async fn insert_outbox_event(
        &mut self,
        event: NewOutboxEvent,
        now: DateTime<Utc>,
    ) -> Result<OutboxEvent>;

    /// Claims the oldest `PENDING` ledger entry, FIFO by
    /// `(created_at, id)` ascending.
    ///
    /// The claim is a locking read with skip-locked semantics: an entry
    /// already claimed by a concurrent session is invisible here, so
    /// the loser of a race observes "no event available" rather than a
    /// double claim.
    async fn lock_next_pending_event(&mut self) -> Result<Option<OutboxEvent>>;

    /// Persists an entry's status and processed timestamp by identity.
    async fn update_outbox_event(&mut self, event: &OutboxEvent) -> Result<()>;

    /// Returns true if a dedup marker exists for the given ledger entry.
    async fn notification_exists(&mut self, event_id: OutboxEventId) -> Result<bool>;

    /// Inserts a dedup marker, assigning its identity.
    ///
    /// Fails with [`StoreError::DuplicateKey`](crate::StoreError::DuplicateKey)
    /// if a marker for the same ledger entry already exists; the unique
    /// constraint at the storage layer is the source of truth, not any
    /// prior `notification_exists` check.
    async fn insert_notification(&mut self, notification: NewNotification)
    -> Result<NotificationId>;

    /// Commits the unit of work.
    async fn commit(self) -> Result<()>;

    /// Abandons the unit of work, undoing all of its writes.
    async fn rollback(self) -> Result<()>;
}
