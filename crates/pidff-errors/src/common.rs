//! Top-level error type and its classification.

use core::fmt;

use crate::{DeviceError, StateError, ValidationError};

/// Top-level error type wrapping every PID sub-error.
#[derive(Debug, thiserror::Error)]
pub enum PidffError {
    /// Parameter validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Effect or device state machine guard failures
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Device and transport errors
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PidffError {
    /// Family the error belongs to; drives CLI exit codes.
    pub fn category(&self) -> ErrorCategory {
        match self {
            PidffError::Validation(_) => ErrorCategory::Validation,
            PidffError::State(_) => ErrorCategory::State,
            PidffError::Device(_) => ErrorCategory::Device,
            PidffError::Io(_) => ErrorCategory::IO,
            PidffError::Config(_) => ErrorCategory::Config,
        }
    }

    /// Severity of the wrapped error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PidffError::Validation(e) => e.severity(),
            PidffError::State(e) => e.severity(),
            PidffError::Device(e) => e.severity(),
            PidffError::Io(_) | PidffError::Config(_) => ErrorSeverity::Error,
        }
    }

    /// Anything short of critical leaves the device usable.
    pub fn is_recoverable(&self) -> bool {
        self.severity() < ErrorSeverity::Critical
    }

    /// Configuration error from a message.
    pub fn config(msg: impl Into<String>) -> Self {
        PidffError::Config(msg.into())
    }

    /// Returns the validation error, if this is one.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            PidffError::Validation(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the state error, if this is one.
    pub fn as_state(&self) -> Option<&StateError> {
        match self {
            PidffError::State(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the device error, if this is one.
    pub fn as_device(&self) -> Option<&DeviceError> {
        match self {
            PidffError::Device(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PidffError {
    fn from(e: std::io::Error) -> Self {
        PidffError::Io(e)
    }
}

/// Broad family of a [`PidffError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCategory {
    /// Parameter validation errors
    Validation = 0,
    /// State machine guard failures
    State = 1,
    /// Device and transport errors
    Device = 2,
    /// Configuration errors
    Config = 3,
    /// I/O errors
    IO = 4,
}

impl ErrorCategory {
    /// Name used in logs and CLI output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "Validation",
            Self::State => "State",
            Self::Device => "Device",
            Self::Config => "Config",
            Self::IO => "IO",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ErrorSeverity {
    /// Nothing to act on.
    Info = 0,
    /// The call did nothing useful but nothing broke.
    Warning = 1,
    /// The call failed; device state is unchanged.
    Error = 2,
    /// Critical, the device may be in an unknown state
    Critical = 3,
}

impl ErrorSeverity {
    /// Upper-case tag used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARN",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
