//! One force feedback effect and its life cycle against a device block.

use pidff_errors::{PidffResult, StateError, ValidationError};
use pidff_hid_common::HidTransport;
use serde::Serialize;
use tracing::{debug, warn};

use crate::block::BlockIndex;
use crate::effect::encoder::{
    DownloadRequest, EffectEncoder, EffectOperation, START_DELAY_API_VERSION,
};
use crate::effect::params::{
    EffectParamFlags, EffectParameters, EffectType, MAX_LEVEL, StartFlags, TriggerButton,
};
use crate::field_map::ReportFieldMap;
use crate::pool::PoolManager;
use crate::state::DeviceStateTracker;
use crate::units::direction::DirectionKind;
use crate::usage::Usage;

/// Result of a call that can succeed without doing anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Done,
    /// The call was redundant.
    NoEffect,
}

/// Result of [`set_parameters`](crate::PidDevice::set_parameters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SetOutcome {
    Downloaded,
    /// Stored locally; no report was sent.
    DownloadSkipped,
    /// Stored locally; mandatory groups are still missing.
    Incomplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadState {
    NotDownloaded,
    Downloaded,
    /// The block holds an older parameter set.
    DownloadedIncomplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Created,
    Initialized,
    ParametersSet,
    Downloaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EffectStatus {
    pub playing: bool,
    /// Always false: every effect runs on the device.
    pub emulated: bool,
}

/// Device resources an effect call works against.
pub(crate) struct EffectContext<'a> {
    pub map: &'a ReportFieldMap,
    pub transport: &'a mut dyn HidTransport,
    pub pool: &'a mut PoolManager,
    pub tracker: &'a DeviceStateTracker,
    pub exclusive: bool,
    pub api_version: u32,
}

impl EffectContext<'_> {
    fn require_exclusive(&self) -> PidffResult<()> {
        if self.exclusive {
            Ok(())
        } else {
            Err(StateError::NotExclusivelyAcquired.into())
        }
    }
}

fn axis_code(axis: Usage) -> u32 {
    (u32::from(axis.page) << 16) | u32::from(axis.id)
}

#[derive(Debug, Clone, Default)]
pub struct EffectObject {
    effect_type: Option<EffectType>,
    params: EffectParameters,
    /// What the device block holds.
    device_params: Option<EffectParameters>,
    block: Option<BlockIndex>,
}

impl EffectObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn effect_type(&self) -> Option<EffectType> {
        self.effect_type
    }

    pub fn block(&self) -> Option<BlockIndex> {
        self.block
    }

    /// The last parameters requested, downloaded or not.
    pub fn parameters(&self) -> &EffectParameters {
        &self.params
    }

    pub fn download_state(&self) -> DownloadState {
        match (&self.block, &self.device_params) {
            (Some(_), Some(held)) if *held == self.params => DownloadState::Downloaded,
            (Some(_), _) => DownloadState::DownloadedIncomplete,
            (None, _) => DownloadState::NotDownloaded,
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        match (self.effect_type, self.block) {
            (None, _) => Lifecycle::Created,
            (Some(_), Some(_)) => Lifecycle::Downloaded,
            (Some(_), None) if self.is_complete() => Lifecycle::ParametersSet,
            (Some(_), None) => Lifecycle::Initialized,
        }
    }

    /// Type-specific block and at least one axis are present.
    pub fn is_complete(&self) -> bool {
        self.effect_type.is_some()
            && self.params.type_specific.is_some()
            && !self.params.axes.is_empty()
    }

    /// Binds the effect to a type. Rebinding is only possible while no
    /// block is held and drops the type-specific parameters.
    pub fn initialize(
        &mut self,
        effect_type: EffectType,
        supported: &[Usage],
    ) -> PidffResult<Outcome> {
        if !supported.contains(&effect_type.usage()) {
            return Err(ValidationError::UnsupportedEffectType(effect_type.to_string()).into());
        }
        match self.effect_type {
            Some(current) if current == effect_type => Ok(Outcome::NoEffect),
            Some(_) if self.block.is_some() => Err(StateError::AlreadyInitialized.into()),
            _ => {
                if self.effect_type.is_some() {
                    self.params.type_specific = None;
                }
                self.effect_type = Some(effect_type);
                Ok(Outcome::Done)
            }
        }
    }

    fn require_type(&self) -> PidffResult<EffectType> {
        self.effect_type
            .ok_or_else(|| StateError::NotInitialized.into())
    }

    /// Copies the groups in `flags` into a candidate parameter set and
    /// checks it against the device.
    fn candidate(
        &self,
        effect_type: EffectType,
        source: &EffectParameters,
        flags: EffectParamFlags,
        map: &ReportFieldMap,
        api_version: u32,
    ) -> PidffResult<EffectParameters> {
        let caps = map.capabilities();
        if flags.contains(EffectParamFlags::START_DELAY) && api_version < START_DELAY_API_VERSION
        {
            return Err(ValidationError::unsupported("start delay").into());
        }

        let mut next = self.params.clone();
        next.copy_groups(source, flags);

        if flags.contains(EffectParamFlags::AXES) {
            if !self.params.axes.is_empty() && self.params.axes != next.axes {
                return Err(StateError::AlreadyInitialized.into());
            }
            if next.axes.is_empty() {
                return Err(ValidationError::invalid_shape("axes", "at least one axis is required").into());
            }
            if let Some(unknown) = next.axes.iter().find(|a| !caps.axes.contains(a)) {
                return Err(ValidationError::UnknownAxis(axis_code(*unknown)).into());
            }
        }
        if flags.contains(EffectParamFlags::DIRECTION)
            && let Some(direction) = &next.direction
        {
            direction.validate(next.axes.len())?;
        }
        if flags.contains(EffectParamFlags::GAIN) && next.gain > MAX_LEVEL {
            return Err(ValidationError::out_of_range("gain", next.gain, 0, MAX_LEVEL).into());
        }
        if flags.contains(EffectParamFlags::TRIGGER_BUTTON)
            && let TriggerButton::Button(button) = next.trigger_button
            && let Some((min, max)) = caps.trigger_button_range
        {
            let logical = i64::from(button) + 1;
            if logical < i64::from(min) || logical > i64::from(max) {
                let max_button = u32::try_from(max.saturating_sub(1)).unwrap_or(0);
                return Err(
                    ValidationError::out_of_range("trigger button", button, 0, max_button).into(),
                );
            }
        }
        if flags.contains(EffectParamFlags::ENVELOPE)
            && let Some(envelope) = &next.envelope
        {
            envelope.validate()?;
        }
        if flags.contains(EffectParamFlags::TYPE_SPECIFIC_PARAMS)
            && let Some(block) = &next.type_specific
        {
            block.validate(effect_type)?;
        }
        Ok(next)
    }

    /// Stores the requested groups and downloads them unless told not to.
    pub(crate) fn set_parameters(
        &mut self,
        ctx: &mut EffectContext<'_>,
        source: &EffectParameters,
        flags: EffectParamFlags,
    ) -> PidffResult<SetOutcome> {
        let effect_type = self.require_type()?;
        let unknown = flags.unknown_bits();
        if unknown != 0 {
            return Err(ValidationError::InvalidFlags {
                operation: "set parameters",
                flags: unknown,
            }
            .into());
        }
        let mut groups = flags.groups();
        if ctx.api_version < START_DELAY_API_VERSION && groups.contains(EffectParamFlags::ALL_PARAMS) {
            groups = EffectParamFlags::ALL_PARAMS_DX5;
        }

        self.params = self.candidate(effect_type, source, groups, ctx.map, ctx.api_version)?;
        debug!(%effect_type, ?groups, "parameters stored");

        if flags.contains(EffectParamFlags::NO_DOWNLOAD) || !ctx.exclusive {
            return Ok(SetOutcome::DownloadSkipped);
        }
        if !self.is_complete() {
            return Ok(SetOutcome::Incomplete);
        }
        self.download(ctx)?;

        if flags.contains(EffectParamFlags::START) {
            let playing = self
                .block
                .and_then(|b| ctx.tracker.effect_state(b).ok())
                .is_some_and(|s| s.is_playing());
            if !(playing && flags.contains(EffectParamFlags::NO_RESTART)) {
                self.start(ctx, 1, StartFlags::empty())?;
            }
        }
        Ok(SetOutcome::Downloaded)
    }

    /// The requested groups; the direction converted to `kind`.
    pub fn get_parameters(
        &self,
        flags: EffectParamFlags,
        kind: DirectionKind,
    ) -> PidffResult<EffectParameters> {
        self.require_type()?;
        let groups = flags.groups();
        let mut out = EffectParameters {
            gain: 0,
            ..EffectParameters::default()
        };
        out.copy_groups(&self.params, groups);
        if groups.contains(EffectParamFlags::DIRECTION) {
            out.direction = self.params.direction_as(kind)?;
        }
        Ok(out)
    }

    /// Writes whatever the block does not hold yet, allocating one first.
    pub(crate) fn download(&mut self, ctx: &mut EffectContext<'_>) -> PidffResult<Outcome> {
        let effect_type = self.require_type()?;
        ctx.require_exclusive()?;
        if !self.is_complete() {
            return Err(StateError::IncompleteEffect.into());
        }
        if self.download_state() == DownloadState::Downloaded {
            return Ok(Outcome::NoEffect);
        }

        let (block, fresh) = match self.block {
            Some(block) => (block, false),
            None => (ctx.pool.allocate(&mut *ctx.transport, effect_type)?, true),
        };
        let request = DownloadRequest {
            effect_type,
            block,
            params: &self.params,
            previous: if fresh { None } else { self.device_params.as_ref() },
            api_version: ctx.api_version,
        };
        let sent = EffectEncoder::new(ctx.map)
            .download(&request)
            .and_then(|plan| plan.send(&mut *ctx.transport));
        if let Err(err) = sent {
            if fresh && let Err(free_err) = ctx.pool.free(&mut *ctx.transport, block) {
                warn!(%block, error = %free_err, "block free after failed download failed");
                ctx.pool.forget(block);
            }
            return Err(err);
        }

        self.block = Some(block);
        self.device_params = Some(self.params.clone());
        ctx.tracker.block_allocated(block);
        debug!(%effect_type, %block, "effect downloaded");
        Ok(Outcome::Done)
    }

    /// Stops the effect if it plays and gives its block back.
    pub(crate) fn unload(&mut self, ctx: &mut EffectContext<'_>) -> PidffResult<Outcome> {
        let Some(block) = self.block else {
            return Ok(Outcome::NoEffect);
        };
        ctx.require_exclusive()?;
        if ctx.tracker.effect_state(block).is_ok_and(|s| s.is_playing()) {
            EffectEncoder::new(ctx.map)
                .effect_operation(block, EffectOperation::Stop, 0)?
                .send(&mut *ctx.transport)?;
        }
        ctx.pool.free(&mut *ctx.transport, block)?;
        ctx.tracker.block_freed(block);
        self.invalidate();
        debug!(%block, "effect unloaded");
        Ok(Outcome::Done)
    }

    pub(crate) fn start(
        &mut self,
        ctx: &mut EffectContext<'_>,
        iterations: u32,
        flags: StartFlags,
    ) -> PidffResult<Outcome> {
        ctx.require_exclusive()?;
        let unknown = flags.bits() & !StartFlags::all().bits();
        if unknown != 0 {
            return Err(ValidationError::InvalidFlags {
                operation: "start",
                flags: unknown,
            }
            .into());
        }
        let Some(block) = self.block else {
            return Err(StateError::NotDownloaded.into());
        };
        if self.download_state() == DownloadState::DownloadedIncomplete
            && !flags.contains(StartFlags::NO_DOWNLOAD)
        {
            self.download(ctx)?;
        }

        let solo = flags.contains(StartFlags::SOLO);
        let operation = if solo {
            EffectOperation::StartSolo
        } else {
            EffectOperation::Start
        };
        EffectEncoder::new(ctx.map)
            .effect_operation(block, operation, iterations)?
            .send(&mut *ctx.transport)?;
        if solo {
            ctx.tracker.mark_solo(block);
        } else {
            ctx.tracker.mark_playing(block, true);
        }
        Ok(Outcome::Done)
    }

    pub(crate) fn stop(&mut self, ctx: &mut EffectContext<'_>) -> PidffResult<Outcome> {
        ctx.require_exclusive()?;
        let Some(block) = self.block else {
            return Err(StateError::NotDownloaded.into());
        };
        EffectEncoder::new(ctx.map)
            .effect_operation(block, EffectOperation::Stop, 0)?
            .send(&mut *ctx.transport)?;
        ctx.tracker.mark_playing(block, false);
        Ok(Outcome::Done)
    }

    pub(crate) fn status(&self, ctx: &EffectContext<'_>) -> PidffResult<EffectStatus> {
        ctx.require_exclusive()?;
        let Some(block) = self.block else {
            return Err(StateError::NotDownloaded.into());
        };
        Ok(EffectStatus {
            playing: ctx.tracker.effect_state(block)?.is_playing(),
            emulated: false,
        })
    }

    /// Forgets the device block without a device transaction, after the
    /// device dropped it on its own.
    pub(crate) fn invalidate(&mut self) {
        self.block = None;
        self.device_params = None;
    }

    /// Unloads if possible. The block leaves the local tables either way,
    /// since no handle will be left to free it later.
    pub(crate) fn release(&mut self, ctx: &mut EffectContext<'_>) -> PidffResult<()> {
        let unloaded = if ctx.exclusive {
            self.unload(ctx).map(|_| ())
        } else {
            Ok(())
        };
        if let Some(block) = self.block {
            ctx.pool.forget(block);
            ctx.tracker.block_freed(block);
        }
        self.invalidate();
        unloaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{CollectionKind, DescriptorBuilder, ItemFlags};
    use crate::effect::params::{TypeSpecific, Waveform};
    use crate::pool::PoolMode;
    use crate::units::direction::Direction;
    use crate::usage::{generic, page, pid};
    use pidff_hid_common::mock::MockHidTransport;
    use std::sync::Arc;

    const SINE: EffectType = EffectType::Periodic(Waveform::Sine);

    /// Two axes, sine only, with a periodic and an operation report.
    fn map() -> PidffResult<Arc<ReportFieldMap>> {
        let descriptor = DescriptorBuilder::new()
            .usage_page(page::PID)
            .usage_of(pid::SET_EFFECT_REPORT)
            .collection(CollectionKind::Logical)
            .report_id(1)
            .usage_of(pid::EFFECT_BLOCK_INDEX)
            .logical(1, 4)
            .report_size(8)
            .report_count(1)
            .output(ItemFlags::DATA_VAR)
            .usage_of(pid::EFFECT_TYPE)
            .collection(CollectionKind::NamedArray)
            .usage_of(pid::ET_SINE)
            .logical(1, 1)
            .output(ItemFlags::DATA_ARRAY)
            .end_collection()
            .usage_of(pid::AXES_ENABLE)
            .collection(CollectionKind::Logical)
            .usage_page(page::GENERIC_DESKTOP)
            .usage_of(generic::X)
            .usage_of(generic::Y)
            .logical(0, 1)
            .report_size(1)
            .report_count(2)
            .output(ItemFlags::DATA_VAR)
            .end_collection()
            .report_count(6)
            .output(ItemFlags::PADDING)
            .usage_page(page::PID)
            .usage_of(pid::TRIGGER_BUTTON)
            .logical(1, 4)
            .report_size(8)
            .report_count(1)
            .output(ItemFlags::DATA_VAR)
            .end_collection()
            .usage_of(pid::SET_PERIODIC_REPORT)
            .collection(CollectionKind::Logical)
            .report_id(2)
            .usage_of(pid::EFFECT_BLOCK_INDEX)
            .output(ItemFlags::DATA_VAR)
            .usage_of(pid::MAGNITUDE)
            .logical(0, 100)
            .physical(0, 10_000)
            .output(ItemFlags::DATA_VAR)
            .end_collection()
            .usage_of(pid::EFFECT_OPERATION_REPORT)
            .collection(CollectionKind::Logical)
            .report_id(3)
            .usage_of(pid::EFFECT_BLOCK_INDEX)
            .logical(1, 4)
            .physical(0, 0)
            .output(ItemFlags::DATA_VAR)
            .usage_of(pid::EFFECT_OPERATION)
            .collection(CollectionKind::NamedArray)
            .usage_of(pid::OP_EFFECT_START)
            .usage_of(pid::OP_EFFECT_START_SOLO)
            .usage_of(pid::OP_EFFECT_STOP)
            .logical(1, 3)
            .output(ItemFlags::DATA_ARRAY)
            .end_collection()
            .usage_of(pid::LOOP_COUNT)
            .logical(0, 255)
            .output(ItemFlags::DATA_VAR)
            .end_collection()
            .build()?;
        Ok(Arc::new(ReportFieldMap::from_descriptor(&descriptor)?))
    }

    struct Rig {
        map: Arc<ReportFieldMap>,
        transport: MockHidTransport,
        pool: PoolManager,
        tracker: DeviceStateTracker,
        exclusive: bool,
    }

    impl Rig {
        fn new() -> PidffResult<Self> {
            let map = map()?;
            Ok(Self {
                pool: PoolManager::new(Arc::clone(&map), PoolMode::HostManaged, None),
                tracker: DeviceStateTracker::new(Arc::clone(&map)),
                transport: MockHidTransport::new(),
                exclusive: true,
                map,
            })
        }

        fn ctx(&mut self) -> EffectContext<'_> {
            EffectContext {
                map: &self.map,
                transport: &mut self.transport,
                pool: &mut self.pool,
                tracker: &self.tracker,
                exclusive: self.exclusive,
                api_version: 0x0800,
            }
        }

        fn sine(&self) -> PidffResult<EffectObject> {
            let mut effect = EffectObject::new();
            effect.initialize(SINE, &self.map.capabilities().effect_types)?;
            Ok(effect)
        }
    }

    fn full_params() -> EffectParameters {
        EffectParameters {
            axes: vec![generic::X],
            type_specific: Some(TypeSpecific::Periodic {
                magnitude: 5_000,
                offset: 0,
                phase: 0,
                period: 0,
            }),
            ..EffectParameters::default()
        }
    }

    #[test]
    fn test_unsupported_type_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let rig = Rig::new()?;
        let mut effect = EffectObject::new();
        let err = effect
            .initialize(EffectType::Ramp, &rig.map.capabilities().effect_types)
            .err()
            .ok_or("ramp must be rejected")?;
        assert!(matches!(
            err.as_validation(),
            Some(ValidationError::UnsupportedEffectType(_))
        ));
        assert_eq!(effect.lifecycle(), Lifecycle::Created);
        Ok(())
    }

    #[test]
    fn test_lifecycle_through_download_and_unload() -> Result<(), Box<dyn std::error::Error>> {
        let mut rig = Rig::new()?;
        let mut effect = rig.sine()?;
        assert_eq!(effect.lifecycle(), Lifecycle::Initialized);

        let outcome = effect.set_parameters(
            &mut rig.ctx(),
            &full_params(),
            EffectParamFlags::AXES | EffectParamFlags::TYPE_SPECIFIC_PARAMS | EffectParamFlags::NO_DOWNLOAD,
        )?;
        assert_eq!(outcome, SetOutcome::DownloadSkipped);
        assert_eq!(effect.lifecycle(), Lifecycle::ParametersSet);
        assert!(rig.transport.history().is_empty());

        assert_eq!(effect.download(&mut rig.ctx())?, Outcome::Done);
        assert_eq!(effect.lifecycle(), Lifecycle::Downloaded);
        assert_eq!(effect.block(), Some(BlockIndex(1)));
        assert_eq!(
            rig.transport.output_reports(),
            vec![vec![2, 1, 50], vec![1, 1, 1, 0b01, 0]]
        );
        assert_eq!(effect.download(&mut rig.ctx())?, Outcome::NoEffect);

        assert_eq!(effect.unload(&mut rig.ctx())?, Outcome::Done);
        assert_eq!(effect.lifecycle(), Lifecycle::ParametersSet);
        assert_eq!(effect.unload(&mut rig.ctx())?, Outcome::NoEffect);
        Ok(())
    }

    #[test]
    fn test_incomplete_download_sends_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let mut rig = Rig::new()?;
        let mut effect = rig.sine()?;
        let outcome = effect.set_parameters(&mut rig.ctx(), &full_params(), EffectParamFlags::AXES)?;
        assert_eq!(outcome, SetOutcome::Incomplete);
        let err = effect.download(&mut rig.ctx()).err().ok_or("expected failure")?;
        assert_eq!(err.as_state(), Some(&StateError::IncompleteEffect));
        assert!(rig.transport.history().is_empty());
        assert!(rig.pool.allocated().is_empty());
        Ok(())
    }

    #[test]
    fn test_start_requires_download() -> Result<(), Box<dyn std::error::Error>> {
        let mut rig = Rig::new()?;
        let mut effect = rig.sine()?;
        let err = effect
            .start(&mut rig.ctx(), 1, StartFlags::empty())
            .err()
            .ok_or("expected failure")?;
        assert_eq!(err.as_state(), Some(&StateError::NotDownloaded));

        effect.set_parameters(&mut rig.ctx(), &full_params(), EffectParamFlags::ALL_PARAMS)?;
        effect.start(&mut rig.ctx(), 2, StartFlags::empty())?;
        assert!(effect.status(&rig.ctx())?.playing);

        effect.unload(&mut rig.ctx())?;
        let err = effect
            .start(&mut rig.ctx(), 1, StartFlags::empty())
            .err()
            .ok_or("expected failure")?;
        assert_eq!(err.as_state(), Some(&StateError::NotDownloaded));
        assert_eq!(
            rig.transport.output_reports().get(2..),
            Some(&[vec![3, 1, 1, 1], vec![3, 1, 3, 0]][..])
        );
        Ok(())
    }

    #[test]
    fn test_shared_access_skips_download() -> Result<(), Box<dyn std::error::Error>> {
        let mut rig = Rig::new()?;
        rig.exclusive = false;
        let mut effect = rig.sine()?;
        let outcome =
            effect.set_parameters(&mut rig.ctx(), &full_params(), EffectParamFlags::ALL_PARAMS)?;
        assert_eq!(outcome, SetOutcome::DownloadSkipped);
        let err = effect.download(&mut rig.ctx()).err().ok_or("expected failure")?;
        assert_eq!(err.as_state(), Some(&StateError::NotExclusivelyAcquired));
        Ok(())
    }

    #[test]
    fn test_axes_are_fixed_once_set() -> Result<(), Box<dyn std::error::Error>> {
        let mut rig = Rig::new()?;
        let mut effect = rig.sine()?;
        effect.set_parameters(&mut rig.ctx(), &full_params(), EffectParamFlags::AXES)?;

        let mut other = full_params();
        other.axes = vec![generic::Y];
        let err = effect
            .set_parameters(&mut rig.ctx(), &other, EffectParamFlags::AXES)
            .err()
            .ok_or("expected failure")?;
        assert_eq!(err.as_state(), Some(&StateError::AlreadyInitialized));

        other.axes = vec![generic::RZ];
        let mut fresh = rig.sine()?;
        let err = fresh
            .set_parameters(&mut rig.ctx(), &other, EffectParamFlags::AXES)
            .err()
            .ok_or("expected failure")?;
        assert!(matches!(err.as_validation(), Some(ValidationError::UnknownAxis(_))));
        Ok(())
    }

    #[test]
    fn test_validation_leaves_parameters_untouched() -> Result<(), Box<dyn std::error::Error>> {
        let mut rig = Rig::new()?;
        let mut effect = rig.sine()?;
        effect.set_parameters(&mut rig.ctx(), &full_params(), EffectParamFlags::AXES)?;

        let bad = EffectParameters {
            gain: 20_000,
            direction: Some(Direction::Polar(9_000)),
            ..full_params()
        };
        assert!(
            effect
                .set_parameters(&mut rig.ctx(), &bad, EffectParamFlags::GAIN)
                .is_err()
        );
        assert!(
            effect
                .set_parameters(&mut rig.ctx(), &bad, EffectParamFlags::DIRECTION)
                .is_err()
        );
        let trigger = EffectParameters {
            trigger_button: TriggerButton::Button(9),
            ..full_params()
        };
        assert!(
            effect
                .set_parameters(&mut rig.ctx(), &trigger, EffectParamFlags::TRIGGER_BUTTON)
                .is_err()
        );
        assert_eq!(effect.parameters().gain, MAX_LEVEL);
        assert_eq!(effect.parameters().direction, None);
        Ok(())
    }

    #[test]
    fn test_flags_are_checked() -> Result<(), Box<dyn std::error::Error>> {
        let mut rig = Rig::new()?;
        let mut effect = rig.sine()?;
        let err = effect
            .set_parameters(
                &mut rig.ctx(),
                &full_params(),
                EffectParamFlags::from_bits_retain(0x0001_0000),
            )
            .err()
            .ok_or("expected failure")?;
        assert!(matches!(
            err.as_validation(),
            Some(ValidationError::InvalidFlags { flags: 0x0001_0000, .. })
        ));

        effect.set_parameters(&mut rig.ctx(), &full_params(), EffectParamFlags::ALL_PARAMS)?;
        let err = effect
            .start(&mut rig.ctx(), 1, StartFlags::from_bits_retain(0x4))
            .err()
            .ok_or("expected failure")?;
        assert!(err.as_validation().is_some());
        Ok(())
    }

    #[test]
    fn test_get_parameters_returns_requested_groups() -> Result<(), Box<dyn std::error::Error>> {
        let mut rig = Rig::new()?;
        assert!(
            EffectObject::new()
                .get_parameters(EffectParamFlags::DURATION, DirectionKind::Polar)
                .is_err()
        );

        let mut effect = rig.sine()?;
        let params = EffectParameters {
            axes: vec![generic::X, generic::Y],
            direction: Some(Direction::Cartesian(vec![0, 1])),
            ..full_params()
        };
        effect.set_parameters(
            &mut rig.ctx(),
            &params,
            EffectParamFlags::AXES | EffectParamFlags::DIRECTION | EffectParamFlags::NO_DOWNLOAD,
        )?;
        let got = effect.get_parameters(EffectParamFlags::DIRECTION, DirectionKind::Polar)?;
        assert_eq!(got.direction, Some(Direction::Polar(18_000)));
        assert!(got.axes.is_empty());
        assert_eq!(got.type_specific, None);
        Ok(())
    }

    #[test]
    fn test_reinitialize_only_without_block() -> Result<(), Box<dyn std::error::Error>> {
        let mut rig = Rig::new()?;
        let mut effect = rig.sine()?;
        let supported = rig.map.capabilities().effect_types.clone();
        assert_eq!(effect.initialize(SINE, &supported)?, Outcome::NoEffect);
        effect.set_parameters(&mut rig.ctx(), &full_params(), EffectParamFlags::ALL_PARAMS)?;
        assert_eq!(effect.download_state(), DownloadState::Downloaded);

        let mut more = full_params();
        more.gain = 1_000;
        effect.set_parameters(&mut rig.ctx(), &more, EffectParamFlags::GAIN | EffectParamFlags::NO_DOWNLOAD)?;
        assert_eq!(effect.download_state(), DownloadState::DownloadedIncomplete);

        effect.invalidate();
        assert_eq!(effect.download_state(), DownloadState::NotDownloaded);
        Ok(())
    }
}
