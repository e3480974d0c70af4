//! State machine guard failures.
//!
//! These are local checks against the effect or device state; they are
//! never retried automatically.

use crate::common::ErrorSeverity;

/// Effect and device state errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// The effect holds no device block
    #[error("Effect is not downloaded")]
    NotDownloaded,

    /// The device is not acquired in exclusive mode
    #[error("Device is not exclusively acquired")]
    NotExclusivelyAcquired,

    /// The device is not acquired at all
    #[error("Device is not acquired")]
    NotAcquired,

    /// The device is acquired and the call requires it not to be
    #[error("Device is acquired")]
    Acquired,

    /// The effect is already bound to a type
    #[error("Effect is already initialized")]
    AlreadyInitialized,

    /// The effect has no type yet
    #[error("Effect is not initialized")]
    NotInitialized,

    /// Mandatory parameters were never supplied
    #[error("Effect parameters are incomplete")]
    IncompleteEffect,

    /// The effect is playing and the call requires it stopped
    #[error("Effect is still playing")]
    StillPlaying,

    /// The effect handle does not name a live effect
    #[error("Unknown effect handle")]
    UnknownEffect,
}

impl StateError {
    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            StateError::UnknownEffect => ErrorSeverity::Error,
            _ => ErrorSeverity::Warning,
        }
    }
}
