//! Core error types for jolt-core.
//!
//! Validation errors are returned at the call boundary, dispatch failures are
//! collected per contact, and only a double session start is treated as an
//! integration error.

use std::path::PathBuf;
use thiserror::Error;

use crate::escalation::EscalationState;

/// Core error type for jolt-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Contact registry errors
    #[error("Contact error: {0}")]
    Contact(#[from] ContactError),

    /// Escalation session errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

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

    /// The data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Why a contact failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidContact {
    #[error("name cannot be empty")]
    EmptyName,

    #[error("'{0}' is not a valid mobile number")]
    InvalidNumber(String),

    /// Names are stored in a delimited list, so the delimiters are reserved.
    #[error("name '{name}' contains reserved character '{ch}'")]
    ReservedCharacter { name: String, ch: char },
}

/// Contact registry errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContactError {
    /// The exact `(name, phone_number)` pair is already registered.
    #[error("contact already exists: {name} ({phone_number})")]
    Duplicate { name: String, phone_number: String },

    #[error("invalid contact: {0}")]
    Invalid(#[from] InvalidContact),

    #[error("contact not found: {name}")]
    NotFound { name: String },
}

/// Escalation session errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    /// A new escalation was started while another one was still live.
    #[error("an escalation is already active (state: {state})")]
    SessionAlreadyActive { state: EscalationState },

    /// The requested intent is not legal in the current state.
    #[error("cannot {action} while {from}")]
    InvalidTransition {
        from: EscalationState,
        action: &'static str,
    },

    /// The session task has shut down.
    #[error("session is closed")]
    Closed,
}

/// Per-contact delivery failure reason.
#[derive(Error, Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DispatchErrorKind {
    /// The messaging/telephony transport is not reachable.
    #[error("transport unavailable")]
    TransportUnavailable,

    /// The transport refused the destination number.
    #[error("invalid number")]
    InvalidNumber,

    /// Any other transport-side refusal.
    #[error("rejected: {0}")]
    Rejected(String),
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

impl From<InvalidContact> for CoreError {
    fn from(err: InvalidContact) -> Self {
        CoreError::Contact(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
