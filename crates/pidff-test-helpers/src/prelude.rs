//! Convenience re-exports for common test utilities.
//!
//! ```rust,ignore
//! use pidff_test_helpers::prelude::*;
//! ```

pub use crate::must::{must, must_some, must_with};

#[cfg(feature = "fixtures")]
pub use crate::fixtures::{
    JOYSTICK_AXES, block_load_full, block_load_success, device_managed_joystick,
    host_managed_joystick, host_state_report, managed_state_report, periodic_scenario_params,
    pool_report, spring_params, spring_records,
};

pub use pidff_hid_common::mock::MockHidTransport;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;
