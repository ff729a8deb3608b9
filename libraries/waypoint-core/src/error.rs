/// Core error types for Waypoint
use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Result type alias for key-value store operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Core error type for Waypoint
#[derive(Error, Debug)]
pub enum CoreError {
    /// Tour data failed validation
    #[error("Invalid tour: {0}")]
    InvalidTour(String),

    /// Entity not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Storage errors
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Serialization errors
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Create an invalid tour error
    pub fn invalid_tour(msg: impl Into<String>) -> Self {
        Self::InvalidTour(msg.into())
    }

    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

/// Errors raised by a persistent key-value store
#[derive(Error, Debug)]
pub enum StorageError {
    /// The store cannot be reached (quota exceeded, private mode, missing directory)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// I/O errors from file-backed stores
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A stored value could not be (de)serialized
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    /// Create an unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}
