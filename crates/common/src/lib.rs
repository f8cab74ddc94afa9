//! Shared types for the outbox order service.

pub mod types;

pub use types::{NotificationId, OrderId, OutboxEventId};
