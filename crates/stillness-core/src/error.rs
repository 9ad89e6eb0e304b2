//! Core error types for stillness-core.
//!
//! Scheduling problems (permission denied, capacity) are recovered inside the
//! lifecycle coordinator and only surface as [`NotifyError`] from the
//! scheduler capability itself. Storage failures propagate to the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for stillness-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Notification capability errors
    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    /// Widget capability errors
    #[error("Widget error: {0}")]
    Widget(#[from] WidgetError),

    /// No event with the given id
    #[error("Event not found: {0}")]
    EventNotFound(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Durable store errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Stored payload could not be decoded
    #[error("Stored data is corrupt: {0}")]
    Corrupt(String),

    /// Write was rejected by the backend
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors raised while accepting user input.
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// A premium-only choice was made without the premium unlock
    #[error("'{feature}' requires the premium unlock")]
    PremiumRequired { feature: String },
}

/// Errors reported by a notification scheduling capability.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The user or platform refused notification permission
    #[error("Notification permission denied")]
    PermissionDenied,

    /// The platform cap on concurrently scheduled triggers was hit
    #[error("Notification capacity exceeded ({limit} scheduled)")]
    CapacityExceeded { limit: usize },

    /// The trigger cannot be expressed on this platform
    #[error("Unsupported trigger: {0}")]
    Unsupported(String),

    /// Backend failure
    #[error("Notification backend failed: {0}")]
    Backend(String),
}

/// Widget host errors.
#[derive(Error, Debug)]
pub enum WidgetError {
    /// No widget host on this platform / build
    #[error("Widget host unavailable: {0}")]
    Unavailable(String),

    /// The host rejected a read or write
    #[error("Failed to update widget: {0}")]
    HostFailed(String),

    /// Stored payload could not be decoded
    #[error("Invalid widget payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StorageError::Locked
                } else {
                    StorageError::QueryFailed(err.to_string())
                }
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Storage(err.into())
    }
}

impl From<rusqlite::Error> for NotifyError {
    fn from(err: rusqlite::Error) -> Self {
        NotifyError::Backend(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
