//! Common imports for driving a PID device.

pub use crate::config::{DeviceConfig, PoolModeSetting};
pub use crate::descriptor::{CollectionKind, DescriptorBuilder, ItemFlags, ReportDescriptor};
pub use crate::device::{AccessMode, EffectHandle, PidDevice};
pub use crate::effect::{
    ConditionKind, ConditionRecord, DeviceCommand, DownloadState, EffectDuration,
    EffectParamFlags, EffectParameters, EffectStatus, EffectType, Envelope, INFINITE_ITERATIONS,
    Lifecycle, Outcome, SetOutcome, StartFlags, TriggerButton, TypeSpecific, Waveform,
};
pub use crate::state::DeviceStateFlags;
pub use crate::units::direction::{Direction, DirectionKind};
pub use crate::usage::{Usage, generic, page, pid};
pub use pidff_errors::{PidffError, PidffResult};
