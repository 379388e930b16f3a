use thiserror::Error;
use uuid::Uuid;

/// Errors raised by a durable store implementation
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record not found")]
    NotFound,

    /// Another device already owns this `(key, platform)` pair
    #[error("Device key already registered for this platform")]
    UniquenessViolation,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised when handing work to the scheduling substrate
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Task queue is closed")]
    Closed,

    #[error("Task serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Notification max age value is not defined")]
    MissingMaxAge,

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Top-level error for dispatch operations surfaced to callers
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Notification not found: {0}")]
    NotificationNotFound(Uuid),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
