//! Effect types and parameter blocks.

use core::fmt;

use bitflags::bitflags;
use pidff_errors::{PidffResult, ValidationError};
use serde::{Deserialize, Serialize};

use crate::units::direction::{Direction, DirectionKind};
use crate::usage::{Usage, pid};

/// Full scale of gains, magnitudes, levels and saturations.
pub const MAX_LEVEL: u32 = 10_000;
/// Passed as an iteration count, plays until stopped.
pub const INFINITE_ITERATIONS: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Waveform {
    Square,
    Sine,
    Triangle,
    SawtoothUp,
    SawtoothDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    Spring,
    Damper,
    Inertia,
    Friction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectType {
    ConstantForce,
    Ramp,
    Periodic(Waveform),
    Condition(ConditionKind),
    CustomForce,
}

/// Parameter groups an effect type makes use of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EffectCapabilities {
    pub envelope: bool,
    pub direction: bool,
    pub start_delay: bool,
    pub type_specific: bool,
}

impl EffectType {
    pub const ALL: [Self; 12] = [
        Self::ConstantForce,
        Self::Ramp,
        Self::Periodic(Waveform::Square),
        Self::Periodic(Waveform::Sine),
        Self::Periodic(Waveform::Triangle),
        Self::Periodic(Waveform::SawtoothUp),
        Self::Periodic(Waveform::SawtoothDown),
        Self::Condition(ConditionKind::Spring),
        Self::Condition(ConditionKind::Damper),
        Self::Condition(ConditionKind::Inertia),
        Self::Condition(ConditionKind::Friction),
        Self::CustomForce,
    ];

    pub fn usage(self) -> Usage {
        match self {
            Self::ConstantForce => pid::ET_CONSTANT_FORCE,
            Self::Ramp => pid::ET_RAMP,
            Self::Periodic(Waveform::Square) => pid::ET_SQUARE,
            Self::Periodic(Waveform::Sine) => pid::ET_SINE,
            Self::Periodic(Waveform::Triangle) => pid::ET_TRIANGLE,
            Self::Periodic(Waveform::SawtoothUp) => pid::ET_SAWTOOTH_UP,
            Self::Periodic(Waveform::SawtoothDown) => pid::ET_SAWTOOTH_DOWN,
            Self::Condition(ConditionKind::Spring) => pid::ET_SPRING,
            Self::Condition(ConditionKind::Damper) => pid::ET_DAMPER,
            Self::Condition(ConditionKind::Inertia) => pid::ET_INERTIA,
            Self::Condition(ConditionKind::Friction) => pid::ET_FRICTION,
            Self::CustomForce => pid::ET_CUSTOM_FORCE_DATA,
        }
    }

    pub fn from_usage(usage: Usage) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.usage() == usage)
    }

    pub fn capabilities(self) -> EffectCapabilities {
        EffectCapabilities {
            envelope: !matches!(self, Self::Condition(_)),
            direction: true,
            start_delay: true,
            type_specific: true,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::ConstantForce => "constant force",
            Self::Ramp => "ramp",
            Self::Periodic(Waveform::Square) => "square",
            Self::Periodic(Waveform::Sine) => "sine",
            Self::Periodic(Waveform::Triangle) => "triangle",
            Self::Periodic(Waveform::SawtoothUp) => "sawtooth up",
            Self::Periodic(Waveform::SawtoothDown) => "sawtooth down",
            Self::Condition(ConditionKind::Spring) => "spring",
            Self::Condition(ConditionKind::Damper) => "damper",
            Self::Condition(ConditionKind::Inertia) => "inertia",
            Self::Condition(ConditionKind::Friction) => "friction",
            Self::CustomForce => "custom force",
        }
    }
}

impl fmt::Display for EffectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionRecord {
    pub offset: i32,
    pub positive_coefficient: i32,
    pub negative_coefficient: i32,
    pub positive_saturation: u32,
    pub negative_saturation: u32,
    pub dead_band: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomForce {
    pub channels: u32,
    /// Milliseconds between samples; 0 uses the effect sample period.
    pub sample_period: u32,
    /// Interleaved per channel, each in `-10000..=10000`.
    pub samples: Vec<i32>,
}

/// Parameter block that depends on the effect type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeSpecific {
    Constant {
        magnitude: i32,
    },
    Ramp {
        start: i32,
        end: i32,
    },
    Periodic {
        magnitude: u32,
        offset: i32,
        /// Hundredths of a degree.
        phase: u32,
        /// Milliseconds.
        period: u32,
    },
    /// One record for all axes, or one per axis.
    Condition(Vec<ConditionRecord>),
    Custom(CustomForce),
}

fn check_level(field: &str, value: u32) -> PidffResult<()> {
    if value > MAX_LEVEL {
        return Err(ValidationError::out_of_range(field, value, 0, MAX_LEVEL).into());
    }
    Ok(())
}

fn check_signed(field: &str, value: i32) -> PidffResult<()> {
    let max = i32::try_from(MAX_LEVEL).unwrap_or(i32::MAX);
    if !(-max..=max).contains(&value) {
        return Err(ValidationError::out_of_range(field, value, -max, max).into());
    }
    Ok(())
}

impl TypeSpecific {
    fn matches(&self, effect_type: EffectType) -> bool {
        matches!(
            (self, effect_type),
            (Self::Constant { .. }, EffectType::ConstantForce)
                | (Self::Ramp { .. }, EffectType::Ramp)
                | (Self::Periodic { .. }, EffectType::Periodic(_))
                | (Self::Condition(_), EffectType::Condition(_))
                | (Self::Custom(_), EffectType::CustomForce)
        )
    }

    pub fn validate(&self, effect_type: EffectType) -> PidffResult<()> {
        if !self.matches(effect_type) {
            return Err(ValidationError::invalid_shape(
                "type_specific",
                format!("parameter block does not fit a {effect_type} effect"),
            )
            .into());
        }
        match self {
            Self::Constant { magnitude } => check_signed("magnitude", *magnitude),
            Self::Ramp { start, end } => {
                check_signed("ramp start", *start)?;
                check_signed("ramp end", *end)
            }
            Self::Periodic {
                magnitude,
                offset,
                phase,
                ..
            } => {
                check_level("magnitude", *magnitude)?;
                check_signed("offset", *offset)?;
                if *phase >= 36_000 {
                    return Err(ValidationError::out_of_range("phase", *phase, 0, 35_999).into());
                }
                Ok(())
            }
            Self::Condition(records) => {
                if records.is_empty() {
                    return Err(ValidationError::invalid_shape(
                        "type_specific",
                        "a condition needs at least one record",
                    )
                    .into());
                }
                for record in records {
                    check_signed("offset", record.offset)?;
                    check_signed("positive coefficient", record.positive_coefficient)?;
                    check_signed("negative coefficient", record.negative_coefficient)?;
                    check_level("positive saturation", record.positive_saturation)?;
                    check_level("negative saturation", record.negative_saturation)?;
                    check_level("dead band", record.dead_band)?;
                }
                Ok(())
            }
            Self::Custom(custom) => {
                if custom.channels == 0
                    || custom.samples.is_empty()
                    || custom.samples.len() % custom.channels as usize != 0
                {
                    return Err(ValidationError::invalid_shape(
                        "type_specific",
                        "custom force samples must fill whole channel frames",
                    )
                    .into());
                }
                custom
                    .samples
                    .iter()
                    .try_for_each(|s| check_signed("custom force sample", *s))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub attack_level: u32,
    /// Milliseconds.
    pub attack_time: u32,
    pub fade_level: u32,
    /// Milliseconds.
    pub fade_time: u32,
}

impl Envelope {
    pub fn validate(&self) -> PidffResult<()> {
        check_level("attack level", self.attack_level)?;
        check_level("fade level", self.fade_level)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectDuration {
    /// Milliseconds.
    Finite(u32),
    Infinite,
}

impl Default for EffectDuration {
    fn default() -> Self {
        Self::Finite(0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerButton {
    #[default]
    None,
    /// Zero-based button number.
    Button(u32),
}

bitflags! {
    /// Parameter groups and action flags of a set-parameters call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EffectParamFlags: u32 {
        const DURATION = 0x0000_0001;
        const SAMPLE_PERIOD = 0x0000_0002;
        const GAIN = 0x0000_0004;
        const TRIGGER_BUTTON = 0x0000_0008;
        const TRIGGER_REPEAT_INTERVAL = 0x0000_0010;
        const AXES = 0x0000_0020;
        const DIRECTION = 0x0000_0040;
        const ENVELOPE = 0x0000_0080;
        const TYPE_SPECIFIC_PARAMS = 0x0000_0100;
        const START_DELAY = 0x0000_0200;
        const START = 0x2000_0000;
        const NO_RESTART = 0x4000_0000;
        const NO_DOWNLOAD = 0x8000_0000;
    }
}

impl EffectParamFlags {
    /// Every group known before start delays existed.
    pub const ALL_PARAMS_DX5: Self = Self::from_bits_retain(0x0000_01ff);
    pub const ALL_PARAMS: Self = Self::from_bits_retain(0x0000_03ff);
    pub const ACTIONS: Self = Self::START.union(Self::NO_RESTART).union(Self::NO_DOWNLOAD);

    /// Parameter groups only, without action flags.
    pub fn groups(self) -> Self {
        self.intersection(Self::ALL_PARAMS)
    }

    /// Groups that travel in the set-effect report.
    pub fn set_effect_groups() -> Self {
        Self::DURATION
            | Self::SAMPLE_PERIOD
            | Self::GAIN
            | Self::TRIGGER_BUTTON
            | Self::TRIGGER_REPEAT_INTERVAL
            | Self::AXES
            | Self::DIRECTION
            | Self::START_DELAY
    }

    /// Bits outside every defined flag.
    pub fn unknown_bits(self) -> u32 {
        self.bits() & !Self::all().bits()
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct StartFlags: u32 {
        /// Stop every other effect first.
        const SOLO = 0x0000_0001;
        /// Do not send pending parameter changes before starting.
        const NO_DOWNLOAD = 0x8000_0000;
    }
}

/// The full parameter set of one effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectParameters {
    pub duration: EffectDuration,
    /// Milliseconds; 0 is the device default.
    pub sample_period: u32,
    pub gain: u32,
    pub trigger_button: TriggerButton,
    /// Milliseconds.
    pub trigger_repeat_interval: u32,
    pub axes: Vec<Usage>,
    pub direction: Option<Direction>,
    pub envelope: Option<Envelope>,
    pub type_specific: Option<TypeSpecific>,
    /// Milliseconds.
    pub start_delay: u32,
}

impl Default for EffectParameters {
    fn default() -> Self {
        Self {
            duration: EffectDuration::default(),
            sample_period: 0,
            gain: MAX_LEVEL,
            trigger_button: TriggerButton::None,
            trigger_repeat_interval: 0,
            axes: Vec::new(),
            direction: None,
            envelope: None,
            type_specific: None,
            start_delay: 0,
        }
    }
}

impl EffectParameters {
    /// Copies the groups named in `flags` from `source`.
    pub fn copy_groups(&mut self, source: &Self, flags: EffectParamFlags) {
        if flags.contains(EffectParamFlags::DURATION) {
            self.duration = source.duration;
        }
        if flags.contains(EffectParamFlags::SAMPLE_PERIOD) {
            self.sample_period = source.sample_period;
        }
        if flags.contains(EffectParamFlags::GAIN) {
            self.gain = source.gain;
        }
        if flags.contains(EffectParamFlags::TRIGGER_BUTTON) {
            self.trigger_button = source.trigger_button;
        }
        if flags.contains(EffectParamFlags::TRIGGER_REPEAT_INTERVAL) {
            self.trigger_repeat_interval = source.trigger_repeat_interval;
        }
        if flags.contains(EffectParamFlags::AXES) {
            self.axes.clone_from(&source.axes);
        }
        if flags.contains(EffectParamFlags::DIRECTION) {
            self.direction.clone_from(&source.direction);
        }
        if flags.contains(EffectParamFlags::ENVELOPE) {
            self.envelope = source.envelope;
        }
        if flags.contains(EffectParamFlags::TYPE_SPECIFIC_PARAMS) {
            self.type_specific.clone_from(&source.type_specific);
        }
        if flags.contains(EffectParamFlags::START_DELAY) {
            self.start_delay = source.start_delay;
        }
    }

    /// Groups whose values differ between `self` and `other`.
    pub fn changed_groups(&self, other: &Self) -> EffectParamFlags {
        let mut changed = EffectParamFlags::empty();
        changed.set(EffectParamFlags::DURATION, self.duration != other.duration);
        changed.set(
            EffectParamFlags::SAMPLE_PERIOD,
            self.sample_period != other.sample_period,
        );
        changed.set(EffectParamFlags::GAIN, self.gain != other.gain);
        changed.set(
            EffectParamFlags::TRIGGER_BUTTON,
            self.trigger_button != other.trigger_button,
        );
        changed.set(
            EffectParamFlags::TRIGGER_REPEAT_INTERVAL,
            self.trigger_repeat_interval != other.trigger_repeat_interval,
        );
        changed.set(EffectParamFlags::AXES, self.axes != other.axes);
        changed.set(EffectParamFlags::DIRECTION, self.direction != other.direction);
        changed.set(EffectParamFlags::ENVELOPE, self.envelope != other.envelope);
        changed.set(
            EffectParamFlags::TYPE_SPECIFIC_PARAMS,
            self.type_specific != other.type_specific,
        );
        changed.set(EffectParamFlags::START_DELAY, self.start_delay != other.start_delay);
        changed
    }

    /// Direction in the requested representation, if one is set.
    pub fn direction_as(&self, kind: DirectionKind) -> PidffResult<Option<Direction>> {
        self.direction
            .as_ref()
            .map(|d| d.convert(kind, self.axes.len()))
            .transpose()
    }

    /// Spherical angles for encoding; all zero when no direction is set.
    pub fn spherical_direction(&self) -> PidffResult<Vec<i32>> {
        match &self.direction {
            Some(direction) => direction.to_spherical(self.axes.len()),
            None => Ok(vec![0; self.axes.len()]),
        }
    }
}
