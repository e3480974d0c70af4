//! Effects: parameter model, report encoding and the per-effect state
//! machine.

pub mod encoder;
pub mod object;
pub mod params;

pub use encoder::{
    DeviceCommand, DownloadRequest, EffectEncoder, EffectOperation, PlannedReport, ReportLabel,
    ReportPlan,
};
pub use object::{DownloadState, EffectObject, EffectStatus, Lifecycle, Outcome, SetOutcome};
pub use params::{
    ConditionKind, ConditionRecord, CustomForce, EffectCapabilities, EffectDuration,
    EffectParamFlags, EffectParameters, EffectType, Envelope, INFINITE_ITERATIONS, MAX_LEVEL,
    StartFlags, TriggerButton, TypeSpecific, Waveform,
};
