//! USB HID PID force feedback translation layer
//!
//! Turns a device-independent effect model into the output and feature
//! reports a PID force feedback device expects, and tracks device and
//! effect state from the device's input reports.
//!
//! The pieces, leaves first:
//!
//! - [`units`]: scaling between application units and a field's logical
//!   range, plus the direction representations.
//! - [`field_map`]: per-device table from PID usage to report, bit offset
//!   and converter, built once from a parsed [`descriptor`].
//! - [`effect`]: effect parameters, the [`EffectEncoder`] that turns a
//!   parameter change into an ordered [`ReportPlan`], and the per-effect
//!   state machine.
//! - [`state`]: the [`DeviceStateTracker`] fed by input reports.
//! - [`pool`]: effect block allocation, device- or host-managed.
//! - [`device`]: [`PidDevice`], which owns all of the above for one device.
//!
//! # Example
//!
//! ```
//! use openracing_pidff_common::prelude::*;
//! use pidff_hid_common::mock::MockHidTransport;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let descriptor = DescriptorBuilder::new()
//!     .usage_page(page::PID)
//!     .usage_of(pid::SET_EFFECT_REPORT)
//!     .collection(CollectionKind::Logical)
//!     .report_id(1)
//!     .usage_of(pid::EFFECT_BLOCK_INDEX)
//!     .logical(1, 8)
//!     .report_size(8)
//!     .report_count(1)
//!     .output(ItemFlags::DATA_VAR)
//!     .end_collection()
//!     .usage_of(pid::EFFECT_OPERATION_REPORT)
//!     .collection(CollectionKind::Logical)
//!     .report_id(2)
//!     .usage_of(pid::EFFECT_BLOCK_INDEX)
//!     .output(ItemFlags::DATA_VAR)
//!     .end_collection()
//!     .build()?;
//!
//! let device = PidDevice::open(MockHidTransport::new(), &descriptor, DeviceConfig::default())?;
//! device.acquire(AccessMode::Exclusive)?;
//! assert_eq!(device.ffload()?, 0);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod block;
pub mod config;
pub mod descriptor;
pub mod device;
pub mod effect;
pub mod field_map;
pub mod pool;
pub mod prelude;
pub mod state;
mod transport;
pub mod units;
pub mod usage;

pub use block::{BlockIndex, BlockSet};
pub use config::{DeviceConfig, PoolModeSetting};
pub use descriptor::{DescriptorBuilder, ReportDescriptor, ReportKind};
pub use device::{AccessMode, EffectHandle, EffectInfo, PidDevice};
pub use effect::{EffectEncoder, ReportPlan};
pub use field_map::{FieldDescriptor, PidCapabilities, ReportFieldMap, ReportLayout};
pub use pool::{PoolManager, PoolMode};
pub use state::{DeviceStateFlags, DeviceStateSnapshot, DeviceStateTracker, EffectPlayState};
pub use units::UnitConverter;
pub use units::direction::{Direction, DirectionKind};
pub use usage::Usage;
