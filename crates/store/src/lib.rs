//! Storage layer for the outbox order service.
//!
//! Exposes the [`Storage`] / [`StorageSession`] contracts the services
//! are written against, an in-memory backend for tests and local
//! development, and the PostgreSQL production backend.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemorySession, InMemoryStorage};
pub use postgres::{PostgresSession, PostgresStorage};
pub use store::{NewNotification, NotificationRecord, Storage, StorageSession};
