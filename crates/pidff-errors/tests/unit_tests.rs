//! Unit tests for the error taxonomy.
//!
//! Covers Display output, classification and `From` conversions across
//! the sub-error types.

use pidff_errors::prelude::*;

mod classification {
    use super::*;

    #[test]
    fn test_every_state_error_is_recoverable() {
        let variants = [
            StateError::NotDownloaded,
            StateError::NotExclusivelyAcquired,
            StateError::NotAcquired,
            StateError::Acquired,
            StateError::AlreadyInitialized,
            StateError::NotInitialized,
            StateError::IncompleteEffect,
            StateError::StillPlaying,
            StateError::UnknownEffect,
        ];
        for variant in variants {
            let err: PidffError = variant.into();
            assert_eq!(err.category(), ErrorCategory::State);
            assert!(err.is_recoverable(), "{variant:?} should be recoverable");
        }
    }

    #[test]
    fn test_transport_failure_is_not_recoverable() {
        let err: PidffError = DeviceError::transport("endpoint stalled").into();
        assert_eq!(err.category(), ErrorCategory::Device);
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_pool_exhausted_is_distinct_from_validation() {
        let pool: PidffError = DeviceError::PoolExhausted.into();
        let shape: PidffError = ValidationError::ZeroDirection.into();
        assert_ne!(pool.category(), shape.category());
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "descriptor.json");
        let err: PidffError = io.into();
        assert_eq!(err.category(), ErrorCategory::IO);
        assert!(err.to_string().contains("descriptor.json"));
    }
}

mod display {
    use super::*;

    #[test]
    fn test_wrapped_messages_carry_prefix() {
        let err: PidffError = StateError::NotDownloaded.into();
        assert_eq!(err.to_string(), "State error: Effect is not downloaded");

        let err: PidffError = ValidationError::UnsupportedDirection {
            mode: "polar",
            axes: 3,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Validation error: polar direction is not supported with 3 axes"
        );
    }

    #[test]
    fn test_block_load_status_in_message() {
        let err: PidffError = DeviceError::BlockLoadFailed(3).into();
        assert_eq!(err.to_string(), "Device error: Block load failed with status 3");
    }
}
