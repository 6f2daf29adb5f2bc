use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique key was already taken, usually by a concurrent commit.
    #[error("Conflict on {entity} {key}")]
    Conflict { entity: &'static str, key: String },

    /// A row expected by an update was missing.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// A stored value could not be mapped back to its record type.
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    /// The backend refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn conflict(entity: &'static str, key: impl ToString) -> Self {
        StoreError::Conflict {
            entity,
            key: key.to_string(),
        }
    }

    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Returns true if the error is a lost race that may succeed on retry.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
