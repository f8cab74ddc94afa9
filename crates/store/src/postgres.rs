use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{NotificationId, OrderId, OutboxEventId};
use domain::{
    Money, NewOutboxEvent, Order, OrderState, OutboxEvent, OutboxEventStatus, OutboxEventType,
    OutboxPayload,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use crate::{
    Result, StoreError,
    store::{NewNotification, Storage, StorageSession},
};

/// Name of the unique constraint guarding one marker per ledger entry.
const UNIQUE_OUTBOX_EVENT: &str = "unique_outbox_event";

/// PostgreSQL-backed storage.
#[derive(Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Creates a storage handle over an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database at `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPool::connect(url).await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }
}

/// A unit of work backed by a PostgreSQL transaction.
pub struct PostgresSession {
    tx: Transaction<'static, Postgres>,
}

impl PostgresSession {
    fn row_to_order(row: &PgRow) -> Result<Order> {
        let state: OrderState = row
            .try_get::<String, _>("state")?
            .parse()
            .map_err(|e: domain::OrderError| StoreError::Decode(e.to_string()))?;

        Ok(Order::from_parts(
            OrderId::new(row.try_get("id")?),
            state,
            Money::from_cents(row.try_get("total_amount_cents")?),
            row.try_get("created_at")?,
            row.try_get("updated_at")?,
        ))
    }

    fn row_to_event(row: &PgRow) -> Result<OutboxEvent> {
        let event_type: OutboxEventType = row
            .try_get::<String, _>("type")?
            .parse()
            .map_err(|e: domain::OutboxError| StoreError::Decode(e.to_string()))?;
        let status: OutboxEventStatus = row
            .try_get::<String, _>("status")?
            .parse()
            .map_err(|e: domain::OutboxError| StoreError::Decode(e.to_string()))?;
        let payload: OutboxPayload = serde_json::from_value(row.try_get("payload")?)?;

        Ok(OutboxEvent::from_parts(
            OutboxEventId::new(row.try_get("id")?),
            OrderId::new(row.try_get("aggregate_id")?),
            event_type,
            payload,
            status,
            row.try_get("created_at")?,
            row.try_get::<Option<DateTime<Utc>>, _>("processed_at")?,
        ))
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    type Session = PostgresSession;

    async fn begin(&self) -> Result<Self::Session> {
        let tx = self.pool.begin().await?;
        Ok(PostgresSession { tx })
    }
}

#[async_trait]
impl StorageSession for PostgresSession {
    async fn insert_order(&mut self, total_amount: Money, now: DateTime<Utc>) -> Result<Order> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (state, total_amount_cents, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            RETURNING id
            "#,
        )
        .bind(OrderState::PendingPayment.as_str())
        .bind(total_amount.cents())
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(Order::from_parts(
            OrderId::new(id),
            OrderState::PendingPayment,
            total_amount,
            now,
            now,
        ))
    }

    async fn find_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT id, state, total_amount_cents, created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(Self::row_to_order).transpose()
    }

    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT id, state, total_amount_cents, created_at, updated_at
            FROM orders
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(Self::row_to_order).transpose()
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE orders
            SET state = $1, updated_at = $2
            WHERE id = $3
            "#,
        )
        .bind(order.state().as_str())
        .bind(order.updated_at())
        .bind(order.id().as_i64())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_outbox_event(
        &mut self,
        event: NewOutboxEvent,
        now: DateTime<Utc>,
    ) -> Result<OutboxEvent> {
        let payload = serde_json::to_value(&event.payload)?;
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO outbox_events (aggregate_id, type, payload, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(event.aggregate_id.as_i64())
        .bind(event.event_type.as_str())
        .bind(payload)
        .bind(OutboxEventStatus::Pending.as_str())
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(OutboxEvent::from_parts(
            OutboxEventId::new(id),
            event.aggregate_id,
            event.event_type,
            event.payload,
            OutboxEventStatus::Pending,
            now,
            None,
        ))
    }

    async fn lock_next_pending_event(&mut self) -> Result<Option<OutboxEvent>> {
        // SKIP LOCKED keeps a claimed row invisible to concurrent
        // workers; the loser of a race sees no pending event instead of
        // blocking on or double-claiming this one.
        let row = sqlx::query(
            r#"
            SELECT id, aggregate_id, type, payload, status, created_at, processed_at
            FROM outbox_events
            WHERE status = $1
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(OutboxEventStatus::Pending.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(Self::row_to_event).transpose()
    }

    async fn update_outbox_event(&mut self, event: &OutboxEvent) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE outbox_events
            SET status = $1, processed_at = $2
            WHERE id = $3
            "#,
        )
        .bind(event.status().as_str())
        .bind(event.processed_at())
        .bind(event.id().as_i64())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn notification_exists(&mut self, event_id: OutboxEventId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM order_notifications WHERE outbox_event_id = $1)",
        )
        .bind(event_id.as_i64())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(exists)
    }

    async fn insert_notification(
        &mut self,
        notification: NewNotification,
    ) -> Result<NotificationId> {
        // ON CONFLICT DO NOTHING keeps the transaction usable after a
        // lost insert race; an aborted statement would poison the whole
        // unit of work.
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO order_notifications (outbox_event_id, order_id, notification_type, message)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (outbox_event_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(notification.outbox_event_id.as_i64())
        .bind(notification.order_id.as_i64())
        .bind(notification.notification_type.as_str())
        .bind(&notification.message)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some(UNIQUE_OUTBOX_EVENT)
            {
                return StoreError::DuplicateKey {
                    constraint: UNIQUE_OUTBOX_EVENT.to_string(),
                };
            }
            StoreError::Database(e)
        })?;

        match id {
            Some(id) => Ok(NotificationId::new(id)),
            None => Err(StoreError::DuplicateKey {
                constraint: UNIQUE_OUTBOX_EVENT.to_string(),
            }),
        }
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
