//! Domain layer for the outbox order service.
//!
//! This crate provides the core domain model:
//! - Order aggregate with an explicit lifecycle state machine
//! - OutboxEvent ledger entries paired atomically with order mutations
//! - Money value type for order totals
//!
//! The domain performs no I/O; persistence lives in the `store` crate.

pub mod money;
pub mod order;
pub mod outbox;

pub use money::Money;
pub use order::{Order, OrderError, OrderState};
pub use outbox::{
    NewOutboxEvent, OutboxError, OutboxEvent, OutboxEventStatus, OutboxEventType, OutboxPayload,
};
