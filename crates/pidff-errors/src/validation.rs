//! Parameter validation errors.
//!
//! Raised before any report is assembled: a request that fails validation
//! never reaches the transport.

use core::fmt;

use crate::common::ErrorSeverity;

/// Validation error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Value out of range
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Field name
        field: String,
        /// The invalid value
        value: String,
        /// Minimum allowed value
        min: String,
        /// Maximum allowed value
        max: String,
    },

    /// A parameter block has the wrong shape for the effect type
    #[error("Invalid shape for '{field}': {reason}")]
    InvalidShape {
        /// Parameter group name
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// Direction component count does not match the axis count
    #[error("Direction has {directions} components but the effect has {axes} axes")]
    AxisDirectionMismatch {
        /// Number of axes supplied
        axes: usize,
        /// Number of direction components supplied
        directions: usize,
    },

    /// Direction representation not usable with the axis count
    #[error("{mode} direction is not supported with {axes} axes")]
    UnsupportedDirection {
        /// Representation name
        mode: &'static str,
        /// Number of axes on the effect
        axes: usize,
    },

    /// Cartesian direction with every component zero
    #[error("Cartesian direction must have at least one non-zero component")]
    ZeroDirection,

    /// Parameter not available with the requested API version or device
    #[error("Parameter '{0}' is not supported")]
    UnsupportedParameter(String),

    /// Unknown or conflicting flag bits
    #[error("Invalid flags {flags:#x} for {operation}")]
    InvalidFlags {
        /// Operation name
        operation: &'static str,
        /// Offending flag bits
        flags: u32,
    },

    /// Effect type not offered by the device
    #[error("Effect type '{0}' is not supported by the device")]
    UnsupportedEffectType(String),

    /// Axis not present on the device
    #[error("Axis {0} is not an actuator axis of the device")]
    UnknownAxis(u32),
}

impl ValidationError {
    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Error
    }

    /// Create an out of range error for a numeric value.
    pub fn out_of_range<T: fmt::Display>(field: impl Into<String>, value: T, min: T, max: T) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    /// Create an invalid shape error.
    pub fn invalid_shape(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidShape {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an unsupported parameter error.
    pub fn unsupported(parameter: impl Into<String>) -> Self {
        ValidationError::UnsupportedParameter(parameter.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_message() {
        let err = ValidationError::out_of_range("gain", 12_000, 0, 10_000);
        assert_eq!(err.to_string(), "gain value 12000 is out of range [0, 10000]");
    }

    #[test]
    fn test_axis_direction_mismatch_message() {
        let err = ValidationError::AxisDirectionMismatch {
            axes: 2,
            directions: 3,
        };
        assert_eq!(
            err.to_string(),
            "Direction has 3 components but the effect has 2 axes"
        );
    }

    #[test]
    fn test_invalid_flags_uses_hex() {
        let err = ValidationError::InvalidFlags {
            operation: "start",
            flags: 0xdead_beef,
        };
        assert!(err.to_string().contains("0xdeadbeef"));
    }

    #[test]
    fn test_validation_error_severity() {
        assert_eq!(ValidationError::ZeroDirection.severity(), ErrorSeverity::Error);
    }

    #[test]
    fn test_validation_error_equality() {
        assert_eq!(
            ValidationError::unsupported("start delay"),
            ValidationError::UnsupportedParameter("start delay".to_string())
        );
    }
}
