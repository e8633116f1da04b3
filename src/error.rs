//! This module defines all error types used throughout the application.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    /// IO errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A state carries a `Resource` but its type cannot be rewritten
    #[error("Unsupported resource type: {state_type} (state {state})")]
    UnsupportedStateType { state: String, state_type: String },

    /// A declared definition is not a state machine document
    #[error("Invalid definition for state machine {name}: {message}")]
    InvalidDefinition { name: String, message: String },

    /// A `Task` state has no function mapped to it
    #[error("No function mapped for Task state {state}")]
    UnmappedTaskState { state: String },

    /// The emulator never answered the health probe
    #[error("Step Functions emulator unreachable at {endpoint} after {attempts} attempts: {reason}")]
    EmulatorUnreachable {
        endpoint: String,
        attempts: u32,
        reason: String,
    },

    /// A single create-state-machine call failed
    #[error("Failed to register state machine {name}: {reason}")]
    RegistrationFailed { name: String, reason: String },

    /// Emulator control API returned an error response
    #[error("Emulator API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Supervisor used out of order
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    /// Session aborted before the emulator became ready
    #[error("Cancelled")]
    Cancelled,

    /// Service manifest parsing errors
    #[error("Manifest parsing error in {file:?}: {message}")]
    ManifestParse { file: PathBuf, message: String },

    /// Definition (de)serialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with custom message
    #[error("{0}")]
    Custom(String),

    /// Wrapped anyhow errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a custom error with a message
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Create a lifecycle error
    pub fn lifecycle(msg: impl Into<String>) -> Self {
        Self::Lifecycle(msg.into())
    }

    /// Check if error is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Errors raised while rewriting a definition, before any emulator call
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedStateType { .. }
                | Error::UnmappedTaskState { .. }
                | Error::InvalidDefinition { .. }
        )
    }
}

// Implement From traits for common external error types

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::ManifestParse {
            file: PathBuf::from("unknown"),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err.to_string())
    }
}

// Helper macros for creating errors

/// Create a custom error with formatting
#[macro_export]
macro_rules! custom_error {
    ($($arg:tt)*) => {
        $crate::error::Error::Custom(format!($($arg)*))
    };
}

/// Bail with a custom error message
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::custom_error!($($arg)*))
    };
}

/// Ensure a condition is true or return error
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::custom("test error");
        assert_eq!(err.to_string(), "test error");

        let err = Error::UnsupportedStateType {
            state: "Wait5".to_string(),
            state_type: "Wait".to_string(),
        };
        assert_eq!(err.to_string(), "Unsupported resource type: Wait (state Wait5)");
        assert!(err.is_resolution());
    }

    #[test]
    fn test_cancelled() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(!Error::custom("other").is_cancelled());
    }

    #[test]
    fn test_macros() {
        fn check(flag: bool) -> Result<()> {
            crate::ensure!(flag, "flag was {}", flag);
            Ok(())
        }

        assert!(check(true).is_ok());
        assert_eq!(check(false).unwrap_err().to_string(), "flag was false");
    }
}
