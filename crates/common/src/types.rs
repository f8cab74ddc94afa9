use serde::{Deserialize, Serialize};

/// Unique identifier for an order row.
///
/// Wraps the storage-assigned sequence value to provide type safety and
/// prevent mixing up order ids with other numeric identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(i64);

impl OrderId {
    /// Creates an order ID from a storage-assigned value.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the underlying value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for OrderId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<OrderId> for i64 {
    fn from(id: OrderId) -> Self {
        id.0
    }
}

/// Unique identifier for an outbox ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutboxEventId(i64);

impl OutboxEventId {
    /// Creates an event ID from a storage-assigned value.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the underlying value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for OutboxEventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for OutboxEventId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<OutboxEventId> for i64 {
    fn from(id: OutboxEventId) -> Self {
        id.0
    }
}

/// Unique identifier for a notification dedup marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(i64);

impl NotificationId {
    /// Creates a notification ID from a storage-assigned value.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the underlying value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for NotificationId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_id_preserves_value() {
        let id = OrderId::new(42);
        assert_eq!(id.as_i64(), 42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn order_id_serialization_is_transparent() {
        let id = OrderId::new(7);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "7");
        let back: OrderId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn event_ids_order_by_value() {
        assert!(OutboxEventId::new(1) < OutboxEventId::new(2));
    }
}
