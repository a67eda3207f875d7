//! Core error types for stepalarm-core.
//!
//! Detector- and source-level problems are reported to the engine as
//! events, not errors. The types here cover what a caller can get wrong
//! (bad schedule requests, unknown alarms, broken config files) and the
//! failures an adapter reports at a boundary.

use std::path::PathBuf;
use thiserror::Error;

use crate::alarm::AlarmId;
use crate::sensing::SourceTag;

/// Core error type for stepalarm-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A signal source refused a subscription
    #[error("Signal source error: {0}")]
    Source(#[from] SourceError),

    /// Operation addressed an alarm that does not exist
    #[error("Alarm not found: {0}")]
    AlarmNotFound(AlarmId),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
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

    /// Key does not exist in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Config directory could not be determined or created
    #[error("Configuration directory unavailable: {0}")]
    DirectoryUnavailable(String),
}

/// Validation errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Goal must be a positive number of units
    #[error("Invalid goal {goal}: an alarm needs at least one step or blink")]
    InvalidGoal { goal: u32 },
}

/// Reasons a signal source cannot deliver samples.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The hardware capability is absent on this host
    #[error("{0} is not supported on this device")]
    Unsupported(SourceTag),

    /// The user or platform denied access
    #[error("permission denied for {0}")]
    PermissionDenied(SourceTag),
}

impl SourceError {
    /// The source that reported the problem.
    pub fn tag(&self) -> SourceTag {
        match self {
            SourceError::Unsupported(tag) | SourceError::PermissionDenied(tag) => *tag,
        }
    }
}

/// Failures reported by an alert adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlertError {
    /// The configured clip could not be played
    #[error("failed to play tone '{handle}': {message}")]
    ClipFailed { handle: String, message: String },
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
