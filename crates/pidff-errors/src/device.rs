//! Device and transport errors.
//!
//! Distinct from validation failures: these mean the device itself refused
//! a request or the report channel failed.

use crate::common::ErrorSeverity;

/// Device and transport errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// The device reported its effect pool full
    #[error("Device effect pool is exhausted")]
    PoolExhausted,

    /// The block load report carried an error status
    #[error("Block load failed with status {0}")]
    BlockLoadFailed(u32),

    /// The device rejected a report
    #[error("Device rejected {kind} report {report_id}")]
    ReportRejected {
        /// Report kind (output or feature)
        kind: &'static str,
        /// Report id
        report_id: u8,
    },

    /// The transport failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// A report the operation requires is absent from the descriptor
    #[error("Device has no {0} report")]
    MissingReport(&'static str),

    /// A report read back has the wrong length
    #[error("Report {report_id} has {actual} bytes, expected {expected}")]
    InvalidLength {
        /// Report id
        report_id: u8,
        /// Expected byte count
        expected: usize,
        /// Actual byte count
        actual: usize,
    },

    /// The descriptor cannot drive a PID device
    #[error("Invalid report descriptor: {0}")]
    Descriptor(String),

    /// A bounded wait ran out
    #[error("Timed out after {timeout_ms}ms waiting for {operation}")]
    Timeout {
        /// What was waited for
        operation: &'static str,
        /// Timeout in milliseconds
        timeout_ms: u64,
    },
}

impl DeviceError {
    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            DeviceError::PoolExhausted | DeviceError::Timeout { .. } => ErrorSeverity::Warning,
            DeviceError::BlockLoadFailed(_)
            | DeviceError::ReportRejected { .. }
            | DeviceError::MissingReport(_)
            | DeviceError::InvalidLength { .. } => ErrorSeverity::Error,
            DeviceError::Transport(_) | DeviceError::Descriptor(_) => ErrorSeverity::Critical,
        }
    }

    /// Check if the caller may retry the same call later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DeviceError::PoolExhausted | DeviceError::Timeout { .. } | DeviceError::ReportRejected { .. }
        )
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        DeviceError::Transport(message.into())
    }

    /// Create a descriptor error.
    pub fn descriptor(message: impl Into<String>) -> Self {
        DeviceError::Descriptor(message.into())
    }
}
