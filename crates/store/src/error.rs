use thiserror::Error;

/// Errors that can occur when interacting with storage.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated.
    ///
    /// Recoverable for the notification dedup marker (a concurrent
    /// worker won the race); a hard conflict everywhere else.
    #[error("Unique constraint violated: {constraint}")]
    DuplicateKey { constraint: String },

    /// A database error occurred; the outcome of the unit of work is unknown.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value did not match any known domain variant.
    #[error("Stored value could not be decoded: {0}")]
    Decode(String),
}

impl StoreError {
    /// Returns true if this error is a uniqueness-constraint violation.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, StoreError::DuplicateKey { .. })
    }
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
