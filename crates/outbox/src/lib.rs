//! Transactional-outbox services for the order system.
//!
//! This crate provides:
//! - [`OrderService`] for order creation, cancellation, and reads
//! - [`PaymentService`] which pairs the payment-outcome transition with
//!   an outbox ledger append in one atomic unit of work
//! - [`OutboxWorker`] which drains the ledger into a notification
//!   channel with effectively-once delivery
//! - the [`PaymentGateway`] and [`NotificationChannel`] seams with
//!   simulator/in-memory implementations

pub mod channel;
pub mod error;
pub mod gateway;
pub mod orders;
pub mod payment;
pub mod worker;

pub use channel::{
    ChannelError, InMemoryNotificationChannel, NotificationChannel, NotificationMessage,
};
pub use error::ServiceError;
pub use gateway::{PaymentGateway, SimulatedGateway};
pub use orders::OrderService;
pub use payment::PaymentService;
pub use worker::OutboxWorker;
