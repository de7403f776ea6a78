//! Core error types for birthdays-core.
//!
//! This module defines the error hierarchy using thiserror. Most failures in
//! the reminder pipeline are absorbed (logged and defaulted) by their callers;
//! these types describe the ones that are surfaced.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for birthdays-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Notification service errors
    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

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

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
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

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A row referenced by id does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
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

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Could not determine the data directory
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Month outside 1..=12
    #[error("Invalid month: {0} (expected 1-12)")]
    InvalidMonth(u32),

    /// Day outside the month's range (February allows 29)
    #[error("Invalid day {day} for month {month}")]
    InvalidDay { month: u32, day: u32 },

    /// Offset cannot be represented (negative or otherwise malformed input)
    #[error("Invalid reminder offset: {0}")]
    InvalidOffset(i64),

    /// Reminder preference outside the allowed set
    #[error("Unsupported days-before value: {0} (expected one of 0, 1, 3, 7)")]
    UnsupportedDaysBefore(u32),

    /// Empty display name
    #[error("Name must not be empty")]
    EmptyName,

    /// Share code was not found or is malformed
    #[error("Unknown share code: {0}")]
    UnknownShareCode(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Errors reported by a [`NotificationService`](crate::notify::NotificationService).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    /// Wiping the registry failed; nothing new was scheduled.
    #[error("Failed to cancel scheduled notifications: {0}")]
    CancelFailed(String),

    /// A single schedule call was rejected.
    #[error("Failed to schedule notification '{key}': {message}")]
    ScheduleFailed { key: String, message: String },

    /// Querying or requesting permission failed.
    #[error("Permission query failed: {0}")]
    PermissionQueryFailed(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
