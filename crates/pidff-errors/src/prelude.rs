//! Commonly used error types in one import.
//!
//! ```
//! use pidff_errors::prelude::*;
//!
//! fn start(downloaded: bool) -> PidffResult<()> {
//!     if !downloaded {
//!         return Err(StateError::NotDownloaded.into());
//!     }
//!     Ok(())
//! }
//!
//! assert_eq!(
//!     start(false).map_err(|e| e.category()).err(),
//!     Some(ErrorCategory::State)
//! );
//! ```

pub use crate::{
    PidffResult,
    common::{ErrorCategory, ErrorSeverity, PidffError},
    device::DeviceError,
    state::StateError,
    validation::ValidationError,
};
