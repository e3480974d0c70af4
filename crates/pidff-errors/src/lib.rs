//! Error types for the USB HID PID force feedback layer
//!
//! Every fallible call in the PID layer reports one of four kinds of failure:
//!
//! - [`validation`]: a parameter set with the wrong shape. Always raised
//!   before any report reaches the transport.
//! - [`state`]: a guard of the effect or device state machine failed
//!   (not downloaded, not acquired, already initialized).
//! - [`device`]: the device or the transport refused or failed a report,
//!   including pool exhaustion.
//! - configuration and I/O errors, carried by [`PidffError`] directly.
//!
//! Redundant calls ("no effect", "download skipped") are not errors. They
//! are returned as outcome values by the calling crate.
//!
//! # Example
//!
//! ```
//! use pidff_errors::prelude::*;
//!
//! fn check_gain(gain: u32) -> PidffResult<u32> {
//!     if gain > 10_000 {
//!         return Err(ValidationError::out_of_range("gain", gain, 0, 10_000).into());
//!     }
//!     Ok(gain)
//! }
//!
//! assert!(check_gain(12_000).is_err());
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod common;
pub mod device;
pub mod prelude;
pub mod state;
pub mod validation;

pub use common::{ErrorCategory, ErrorSeverity, PidffError};
pub use device::DeviceError;
pub use state::StateError;
pub use validation::ValidationError;

/// A specialized `Result` type for PID operations.
pub type PidffResult<T> = std::result::Result<T, PidffError>;
