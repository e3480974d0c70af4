//! Effect parameters to ordered report plans.
//!
//! The encoder turns parameter groups into report buffers using the field
//! map and never touches the transport; [`ReportPlan::send`] does that.
//!
//! A download plan is ordered type-specific blocks first, then the
//! envelope, then the set-effect report that ties them to the effect
//! block. Fields absent from the descriptor are skipped.

use core::fmt;

use pidff_errors::{DeviceError, PidffError, PidffResult, StateError, ValidationError};
use pidff_hid_common::{HidTransport, ReportTransfer, ReportWriter};
use serde::{Deserialize, Serialize};

use crate::block::BlockIndex;
use crate::descriptor::ReportKind;
use crate::effect::params::{
    ConditionRecord, CustomForce, EffectDuration, EffectParamFlags, EffectParameters, EffectType,
    Envelope, INFINITE_ITERATIONS, TriggerButton, TypeSpecific,
};
use crate::field_map::{FieldDescriptor, ReportFieldMap};
use crate::transport::{hex, write_report};
use crate::units::direction::device_angles;
use crate::usage::{Usage, pid};

/// First API version with start delays.
pub const START_DELAY_API_VERSION: u32 = 0x0700;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectOperation {
    Start,
    StartSolo,
    Stop,
}

impl EffectOperation {
    pub fn usage(self) -> Usage {
        match self {
            Self::Start => pid::OP_EFFECT_START,
            Self::StartSolo => pid::OP_EFFECT_START_SOLO,
            Self::Stop => pid::OP_EFFECT_STOP,
        }
    }
}

/// Device-wide control operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceCommand {
    Reset,
    StopAll,
    Pause,
    Continue,
    SetActuatorsOn,
    SetActuatorsOff,
}

impl DeviceCommand {
    pub fn usage(self) -> Usage {
        match self {
            Self::Reset => pid::DC_DEVICE_RESET,
            Self::StopAll => pid::DC_STOP_ALL_EFFECTS,
            Self::Pause => pid::DC_DEVICE_PAUSE,
            Self::Continue => pid::DC_DEVICE_CONTINUE,
            Self::SetActuatorsOn => pid::DC_ENABLE_ACTUATORS,
            Self::SetActuatorsOff => pid::DC_DISABLE_ACTUATORS,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Reset => "reset",
            Self::StopAll => "stop all",
            Self::Pause => "pause",
            Self::Continue => "continue",
            Self::SetActuatorsOn => "actuators on",
            Self::SetActuatorsOff => "actuators off",
        }
    }
}

/// What a planned report carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportLabel {
    SetEffect,
    SetEnvelope,
    SetCondition { record: usize },
    SetPeriodic,
    SetConstantForce,
    SetRampForce,
    SetCustomForce,
    CustomForceData { offset: usize },
    EffectOperation(EffectOperation),
    DeviceControl(DeviceCommand),
    DeviceGain,
    BlockFree,
    CreateNewEffect,
}

impl fmt::Display for ReportLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetEffect => f.write_str("set effect"),
            Self::SetEnvelope => f.write_str("set envelope"),
            Self::SetCondition { record } => write!(f, "set condition #{record}"),
            Self::SetPeriodic => f.write_str("set periodic"),
            Self::SetConstantForce => f.write_str("set constant force"),
            Self::SetRampForce => f.write_str("set ramp force"),
            Self::SetCustomForce => f.write_str("set custom force"),
            Self::CustomForceData { offset } => write!(f, "custom force data @{offset}"),
            Self::EffectOperation(EffectOperation::Start) => f.write_str("effect start"),
            Self::EffectOperation(EffectOperation::StartSolo) => f.write_str("effect start solo"),
            Self::EffectOperation(EffectOperation::Stop) => f.write_str("effect stop"),
            Self::DeviceControl(command) => write!(f, "device control {}", command.name()),
            Self::DeviceGain => f.write_str("device gain"),
            Self::BlockFree => f.write_str("block free"),
            Self::CreateNewEffect => f.write_str("create new effect"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedReport {
    pub label: ReportLabel,
    #[serde(skip)]
    pub transfer: ReportTransfer,
    pub data: Vec<u8>,
}

impl PlannedReport {
    pub fn report_id(&self) -> u8 {
        self.data.first().copied().unwrap_or(0)
    }

    pub fn send(&self, transport: &mut dyn HidTransport) -> PidffResult<()> {
        write_report(transport, self.transfer, &self.data)
    }
}

impl fmt::Display for PlannedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, hex(&self.data))
    }
}

/// Reports to send, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportPlan {
    reports: Vec<PlannedReport>,
}

impl ReportPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, report: PlannedReport) {
        self.reports.push(report);
    }

    pub fn extend(&mut self, other: ReportPlan) {
        self.reports.extend(other.reports);
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn reports(&self) -> &[PlannedReport] {
        &self.reports
    }

    pub fn labels(&self) -> Vec<ReportLabel> {
        self.reports.iter().map(|r| r.label).collect()
    }

    /// Writes every report in order, stopping at the first failure.
    pub fn send(&self, transport: &mut dyn HidTransport) -> PidffResult<()> {
        self.reports.iter().try_for_each(|r| r.send(transport))
    }
}

impl fmt::Display for ReportPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for report in &self.reports {
            writeln!(f, "{report}")?;
        }
        Ok(())
    }
}

/// Input to [`EffectEncoder::download`].
#[derive(Debug, Clone, Copy)]
pub struct DownloadRequest<'a> {
    pub effect_type: EffectType,
    pub block: BlockIndex,
    pub params: &'a EffectParameters,
    /// Parameters the block already holds; `None` sends every group.
    pub previous: Option<&'a EffectParameters>,
    pub api_version: u32,
}

impl DownloadRequest<'_> {
    pub fn changed(&self) -> EffectParamFlags {
        match self.previous {
            Some(previous) => previous.changed_groups(self.params),
            None => EffectParamFlags::ALL_PARAMS,
        }
    }
}

/// Fills one report through the field map.
struct ReportBuilder<'m> {
    map: &'m ReportFieldMap,
    report_usage: Usage,
    transfer: ReportTransfer,
    writer: ReportWriter,
}

impl<'m> ReportBuilder<'m> {
    fn new(map: &'m ReportFieldMap, report_usage: Usage, name: &'static str) -> PidffResult<Self> {
        let layout = map
            .report(report_usage)
            .ok_or(DeviceError::MissingReport(name))?;
        let transfer = match layout.kind {
            ReportKind::Output => ReportTransfer::Output,
            ReportKind::Feature => ReportTransfer::SetFeature,
            ReportKind::Input => {
                return Err(DeviceError::descriptor(format!("{name} is an input report")).into());
            }
        };
        Ok(Self {
            map,
            report_usage,
            transfer,
            writer: ReportWriter::new(layout.report_id, layout.byte_len()),
        })
    }

    fn field(&self, usage: Usage, index: usize) -> Option<&'m FieldDescriptor> {
        self.map.lookup_indexed(self.report_usage, usage, index)
    }

    fn raw(&mut self, usage: Usage, index: usize, raw: u32) -> PidffResult<&mut Self> {
        if let Some(field) = self.field(usage, index) {
            field.write_raw(&mut self.writer, raw)?;
        }
        Ok(self)
    }

    fn logical(&mut self, usage: Usage, index: usize, logical: i32) -> PidffResult<&mut Self> {
        match self.field(usage, index) {
            Some(field) => {
                let conv = field.converter();
                let (lmin, lmax) = conv.logical_range();
                self.raw(usage, index, conv.logical_to_raw(logical.clamp(lmin, lmax.max(lmin))))
            }
            None => Ok(self),
        }
    }

    fn value(&mut self, usage: Usage, index: usize, value: i64) -> PidffResult<&mut Self> {
        match self.field(usage, index) {
            Some(field) => self.raw(usage, index, field.converter().to_raw(value)),
            None => Ok(self),
        }
    }

    fn block(&mut self, block: BlockIndex) -> PidffResult<&mut Self> {
        self.logical(pid::EFFECT_BLOCK_INDEX, 0, i32::from(block))
    }

    /// Writes the array value choosing `selector`; `missing` is returned
    /// when the device does not offer it.
    fn select(
        &mut self,
        usage: Usage,
        selector: Usage,
        missing: impl FnOnce() -> PidffError,
    ) -> PidffResult<&mut Self> {
        let logical = self
            .field(usage, 0)
            .and_then(|f| f.selector_value(selector))
            .ok_or_else(missing)?;
        self.logical(usage, 0, logical)
    }

    fn finish(self, label: ReportLabel) -> PlannedReport {
        PlannedReport {
            label,
            transfer: self.transfer,
            data: self.writer.into_bytes(),
        }
    }
}

fn millis(value: u32) -> i64 {
    i64::from(value)
}

/// Builds report plans for one device.
#[derive(Debug, Clone, Copy)]
pub struct EffectEncoder<'m> {
    map: &'m ReportFieldMap,
}

impl<'m> EffectEncoder<'m> {
    pub fn new(map: &'m ReportFieldMap) -> Self {
        Self { map }
    }

    /// Reports that bring the block up to date with `request.params`.
    ///
    /// Returns an empty plan when nothing changed.
    pub fn download(&self, request: &DownloadRequest<'_>) -> PidffResult<ReportPlan> {
        let changed = request.changed();
        let params = request.params;
        let mut plan = ReportPlan::new();

        let conditions = matches!(request.effect_type, EffectType::Condition(_));
        let type_specific_changed = changed.contains(EffectParamFlags::TYPE_SPECIFIC_PARAMS)
            || (conditions && changed.contains(EffectParamFlags::AXES));
        if type_specific_changed {
            let block = params
                .type_specific
                .as_ref()
                .ok_or(StateError::IncompleteEffect)?;
            block.validate(request.effect_type)?;
            self.type_specific(&mut plan, request, block)?;
        }

        if changed.contains(EffectParamFlags::ENVELOPE)
            && request.effect_type.capabilities().envelope
            && self.map.has_report(pid::SET_ENVELOPE_REPORT)
        {
            let had_envelope = request.previous.is_some_and(|p| p.envelope.is_some());
            match params.envelope {
                Some(envelope) => plan.push(self.envelope(request.block, &envelope)?),
                None if had_envelope => plan.push(self.envelope(request.block, &Envelope::default())?),
                None => {}
            }
        }

        if changed.intersects(EffectParamFlags::set_effect_groups()) {
            plan.push(self.set_effect(request)?);
        }
        Ok(plan)
    }

    fn type_specific(
        &self,
        plan: &mut ReportPlan,
        request: &DownloadRequest<'_>,
        block: &TypeSpecific,
    ) -> PidffResult<()> {
        let index = request.block;
        match block {
            TypeSpecific::Constant { magnitude } => {
                let mut report =
                    ReportBuilder::new(self.map, pid::SET_CONSTANT_FORCE_REPORT, "set constant force")?;
                report.block(index)?.value(pid::MAGNITUDE, 0, i64::from(*magnitude))?;
                plan.push(report.finish(ReportLabel::SetConstantForce));
            }
            TypeSpecific::Ramp { start, end } => {
                let mut report =
                    ReportBuilder::new(self.map, pid::SET_RAMP_FORCE_REPORT, "set ramp force")?;
                report
                    .block(index)?
                    .value(pid::RAMP_START, 0, i64::from(*start))?
                    .value(pid::RAMP_END, 0, i64::from(*end))?;
                plan.push(report.finish(ReportLabel::SetRampForce));
            }
            TypeSpecific::Periodic {
                magnitude,
                offset,
                phase,
                period,
            } => {
                let mut report =
                    ReportBuilder::new(self.map, pid::SET_PERIODIC_REPORT, "set periodic")?;
                report
                    .block(index)?
                    .value(pid::MAGNITUDE, 0, i64::from(*magnitude))?
                    .value(pid::OFFSET, 0, i64::from(*offset))?
                    .value(pid::PHASE, 0, i64::from(*phase))?
                    .value(pid::PERIOD, 0, millis(*period))?;
                plan.push(report.finish(ReportLabel::SetPeriodic));
            }
            TypeSpecific::Condition(records) => {
                let count = records.len().min(request.params.axes.len().max(1));
                for (record_index, record) in records.iter().take(count).enumerate() {
                    plan.push(self.condition(index, record_index, record)?);
                }
            }
            TypeSpecific::Custom(custom) => self.custom_force(plan, index, custom)?,
        }
        Ok(())
    }

    fn condition(
        &self,
        block: BlockIndex,
        record_index: usize,
        record: &ConditionRecord,
    ) -> PidffResult<PlannedReport> {
        let mut report = ReportBuilder::new(self.map, pid::SET_CONDITION_REPORT, "set condition")?;
        let offset = i32::try_from(record_index).unwrap_or(i32::MAX);
        report
            .block(block)?
            .logical(pid::PARAMETER_BLOCK_OFFSET, 0, offset)?
            .value(pid::CP_OFFSET, 0, i64::from(record.offset))?
            .value(pid::POSITIVE_COEFFICIENT, 0, i64::from(record.positive_coefficient))?
            .value(pid::NEGATIVE_COEFFICIENT, 0, i64::from(record.negative_coefficient))?
            .value(pid::POSITIVE_SATURATION, 0, i64::from(record.positive_saturation))?
            .value(pid::NEGATIVE_SATURATION, 0, i64::from(record.negative_saturation))?
            .value(pid::DEAD_BAND, 0, i64::from(record.dead_band))?;
        Ok(report.finish(ReportLabel::SetCondition {
            record: record_index,
        }))
    }

    fn custom_force(
        &self,
        plan: &mut ReportPlan,
        block: BlockIndex,
        custom: &CustomForce,
    ) -> PidffResult<()> {
        let per_report = self
            .map
            .lookup_all(pid::CUSTOM_FORCE_DATA_REPORT, pid::CUSTOM_FORCE_DATA)
            .count();
        if per_report == 0 {
            return Err(DeviceError::MissingReport("custom force data").into());
        }
        for (chunk_index, chunk) in custom.samples.chunks(per_report).enumerate() {
            let offset = chunk_index.saturating_mul(per_report);
            let mut report =
                ReportBuilder::new(self.map, pid::CUSTOM_FORCE_DATA_REPORT, "custom force data")?;
            report.block(block)?.logical(
                pid::CUSTOM_FORCE_DATA_OFFSET,
                0,
                i32::try_from(offset).unwrap_or(i32::MAX),
            )?;
            for (slot, sample) in chunk.iter().enumerate() {
                report.value(pid::CUSTOM_FORCE_DATA, slot, i64::from(*sample))?;
            }
            plan.push(report.finish(ReportLabel::CustomForceData { offset }));
        }

        let mut report =
            ReportBuilder::new(self.map, pid::SET_CUSTOM_FORCE_REPORT, "set custom force")?;
        report
            .block(block)?
            .logical(
                pid::SAMPLE_COUNT,
                0,
                i32::try_from(custom.samples.len()).unwrap_or(i32::MAX),
            )?
            .logical(pid::CUSTOM_FORCE_DATA_OFFSET, 0, 0)?
            .value(pid::SAMPLE_PERIOD, 0, millis(custom.sample_period))?;
        plan.push(report.finish(ReportLabel::SetCustomForce));
        Ok(())
    }

    fn envelope(&self, block: BlockIndex, envelope: &Envelope) -> PidffResult<PlannedReport> {
        let mut report = ReportBuilder::new(self.map, pid::SET_ENVELOPE_REPORT, "set envelope")?;
        report
            .block(block)?
            .value(pid::ATTACK_LEVEL, 0, i64::from(envelope.attack_level))?
            .value(pid::FADE_LEVEL, 0, i64::from(envelope.fade_level))?
            .value(pid::ATTACK_TIME, 0, millis(envelope.attack_time))?
            .value(pid::FADE_TIME, 0, millis(envelope.fade_time))?;
        Ok(report.finish(ReportLabel::SetEnvelope))
    }

    fn set_effect(&self, request: &DownloadRequest<'_>) -> PidffResult<PlannedReport> {
        let params = request.params;
        let mut report = ReportBuilder::new(self.map, pid::SET_EFFECT_REPORT, "set effect")?;
        let effect_type = request.effect_type;
        report.block(request.block)?.select(
            pid::EFFECT_TYPE,
            effect_type.usage(),
            || ValidationError::UnsupportedEffectType(effect_type.to_string()).into(),
        )?;

        match params.duration {
            EffectDuration::Finite(ms) => {
                report.value(pid::DURATION, 0, millis(ms))?;
            }
            EffectDuration::Infinite => {
                if let Some(field) = report.field(pid::DURATION, 0) {
                    report.raw(pid::DURATION, 0, field.converter().all_ones_raw())?;
                }
            }
        }
        report
            .value(pid::SAMPLE_PERIOD, 0, millis(params.sample_period))?
            .value(pid::GAIN, 0, i64::from(params.gain))?
            .value(
                pid::TRIGGER_REPEAT_INTERVAL,
                0,
                millis(params.trigger_repeat_interval),
            )?;

        let start_delay = if request.api_version >= START_DELAY_API_VERSION {
            params.start_delay
        } else {
            0
        };
        report.value(pid::START_DELAY, 0, millis(start_delay))?;

        match params.trigger_button {
            TriggerButton::Button(button) => {
                let logical = i32::try_from(button).unwrap_or(i32::MAX).saturating_add(1);
                report.logical(pid::TRIGGER_BUTTON, 0, logical)?;
            }
            TriggerButton::None => {
                if let Some(field) = report.field(pid::TRIGGER_BUTTON, 0) {
                    report.raw(pid::TRIGGER_BUTTON, 0, field.converter().null_raw())?;
                }
            }
        }

        let direction_enable = report.field(pid::DIRECTION_ENABLE, 0).is_some();
        if params.axes.len() >= 2 && direction_enable {
            report.logical(pid::DIRECTION_ENABLE, 0, 1)?;
        } else {
            let enables: Vec<usize> = self
                .map
                .lookup_all(pid::SET_EFFECT_REPORT, pid::AXES_ENABLE)
                .filter(|f| f.member.is_some_and(|m| params.axes.contains(&m)))
                .map(|f| f.index)
                .collect();
            for index in enables {
                report.logical(pid::AXES_ENABLE, index, 1)?;
            }
        }

        let slots = self
            .map
            .lookup_all(pid::SET_EFFECT_REPORT, pid::DIRECTION)
            .count();
        if slots > 0 && !params.axes.is_empty() {
            let spherical = params.spherical_direction()?;
            for (slot, angle) in device_angles(&spherical, slots).into_iter().enumerate() {
                report.value(pid::DIRECTION, slot, i64::from(angle))?;
            }
        }
        Ok(report.finish(ReportLabel::SetEffect))
    }

    /// Start, solo start or stop of one block.
    ///
    /// `iterations` counts plays; the loop count field receives one less,
    /// and [`INFINITE_ITERATIONS`] the field's logical maximum.
    pub fn effect_operation(
        &self,
        block: BlockIndex,
        operation: EffectOperation,
        iterations: u32,
    ) -> PidffResult<PlannedReport> {
        let mut report =
            ReportBuilder::new(self.map, pid::EFFECT_OPERATION_REPORT, "effect operation")?;
        report.block(block)?.select(pid::EFFECT_OPERATION, operation.usage(), || {
            DeviceError::MissingReport("effect operation selector").into()
        })?;
        if operation != EffectOperation::Stop {
            let loop_count = match (iterations, report.field(pid::LOOP_COUNT, 0)) {
                (INFINITE_ITERATIONS, Some(field)) => field.logical_max,
                (n, _) => i32::try_from(n.saturating_sub(1)).unwrap_or(i32::MAX),
            };
            report.logical(pid::LOOP_COUNT, 0, loop_count)?;
        }
        Ok(report.finish(ReportLabel::EffectOperation(operation)))
    }

    pub fn device_control(&self, command: DeviceCommand) -> PidffResult<PlannedReport> {
        let mut report =
            ReportBuilder::new(self.map, pid::DEVICE_CONTROL_REPORT, "device control")?;
        report.select(pid::DEVICE_CONTROL, command.usage(), || {
            ValidationError::unsupported(format!("device control {}", command.name())).into()
        })?;
        Ok(report.finish(ReportLabel::DeviceControl(command)))
    }

    pub fn supports_command(&self, command: DeviceCommand) -> bool {
        self.map
            .capabilities()
            .device_controls
            .contains(&command.usage())
    }

    /// `None` when the device has no gain report.
    pub fn device_gain(&self, gain: u32) -> PidffResult<Option<PlannedReport>> {
        if !self.map.has_report(pid::DEVICE_GAIN_REPORT) {
            return Ok(None);
        }
        let mut report = ReportBuilder::new(self.map, pid::DEVICE_GAIN_REPORT, "device gain")?;
        report.value(pid::DEVICE_GAIN, 0, i64::from(gain))?;
        Ok(Some(report.finish(ReportLabel::DeviceGain)))
    }

    pub fn block_free(&self, block: BlockIndex) -> PidffResult<PlannedReport> {
        let mut report = ReportBuilder::new(self.map, pid::BLOCK_FREE_REPORT, "block free")?;
        report.block(block)?;
        Ok(report.finish(ReportLabel::BlockFree))
    }

    pub fn create_new_effect(&self, effect_type: EffectType) -> PidffResult<PlannedReport> {
        let mut report =
            ReportBuilder::new(self.map, pid::CREATE_NEW_EFFECT_REPORT, "create new effect")?;
        report.select(pid::EFFECT_TYPE, effect_type.usage(), || {
            ValidationError::UnsupportedEffectType(effect_type.to_string()).into()
        })?;
        Ok(report.finish(ReportLabel::CreateNewEffect))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{CollectionKind, DescriptorBuilder, ItemFlags};
    use crate::effect::params::Waveform;
    use crate::units::direction::Direction;
    use crate::usage::{generic, ordinal, page};

    /// Set-effect, periodic, envelope and effect-operation reports of a
    /// small three-axis device.
    fn map() -> PidffResult<ReportFieldMap> {
        let descriptor = DescriptorBuilder::new()
            .usage_page(page::PID)
            .usage_of(pid::EFFECT_OPERATION_REPORT)
            .collection(CollectionKind::Logical)
            .report_id(2)
            .usage_of(pid::EFFECT_BLOCK_INDEX)
            .logical(0, 0x7f)
            .report_size(8)
            .report_count(1)
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
            .logical(0, 0x7f)
            .output(ItemFlags::DATA_VAR)
            .end_collection()
            .usage_of(pid::SET_EFFECT_REPORT)
            .collection(CollectionKind::Logical)
            .report_id(3)
            .usage_of(pid::EFFECT_BLOCK_INDEX)
            .logical(0, 0x7f)
            .output(ItemFlags::DATA_VAR)
            .usage_of(pid::EFFECT_TYPE)
            .collection(CollectionKind::NamedArray)
            .usage_of(pid::ET_SQUARE)
            .usage_of(pid::ET_SINE)
            .logical(1, 2)
            .output(ItemFlags::DATA_ARRAY)
            .end_collection()
            .usage_of(pid::AXES_ENABLE)
            .collection(CollectionKind::Logical)
            .usage_of(generic::X)
            .usage_of(generic::Y)
            .usage_of(generic::Z)
            .logical(0, 1)
            .report_size(1)
            .report_count(3)
            .output(ItemFlags::DATA_VAR)
            .end_collection()
            .usage_of(pid::DIRECTION_ENABLE)
            .report_count(1)
            .output(ItemFlags::DATA_VAR)
            .report_count(4)
            .output(ItemFlags::PADDING)
            .usage_of(pid::DURATION)
            .logical(0, 0x7fff)
            .physical(0, 0x7fff)
            .unit(0x1003)
            .unit_exponent(-3)
            .report_size(16)
            .report_count(1)
            .output(ItemFlags::DATA_VAR)
            .unit(0)
            .unit_exponent(0)
            .physical(0, 0)
            .usage_of(pid::TRIGGER_BUTTON)
            .logical(1, 8)
            .report_size(8)
            .output(ItemFlags::DATA_VAR)
            .usage_of(pid::DIRECTION)
            .collection(CollectionKind::Logical)
            .usage_of(ordinal(1))
            .usage_of(ordinal(2))
            .logical(0, 255)
            .physical(0, 36_000)
            .report_count(2)
            .output(ItemFlags::DATA_VAR)
            .end_collection()
            .end_collection()
            .usage_of(pid::SET_PERIODIC_REPORT)
            .collection(CollectionKind::Logical)
            .report_id(5)
            .usage_of(pid::MAGNITUDE)
            .logical(0, 255)
            .physical(0, 10_000)
            .report_count(1)
            .output(ItemFlags::DATA_VAR)
            .end_collection()
            .usage_of(pid::SET_ENVELOPE_REPORT)
            .collection(CollectionKind::Logical)
            .report_id(6)
            .usage_of(pid::ATTACK_LEVEL)
            .usage_of(pid::FADE_LEVEL)
            .report_count(2)
            .output(ItemFlags::DATA_VAR)
            .usage_of(pid::ATTACK_TIME)
            .usage_of(pid::FADE_TIME)
            .logical(0, 0x7fff)
            .physical(0, 0x7fff)
            .unit(0x1003)
            .unit_exponent(-3)
            .report_size(16)
            .output(ItemFlags::DATA_VAR)
            .end_collection()
            .build()?;
        ReportFieldMap::from_descriptor(&descriptor)
    }

    fn sine_params() -> EffectParameters {
        EffectParameters {
            duration: EffectDuration::Finite(1000),
            axes: vec![generic::X, generic::Y, generic::Z],
            direction: Some(Direction::Spherical(vec![3000, 0, 0])),
            envelope: Some(Envelope {
                attack_level: 1000,
                attack_time: 2000,
                fade_level: 3000,
                fade_time: 4000,
            }),
            type_specific: Some(TypeSpecific::Periodic {
                magnitude: 1000,
                offset: 0,
                phase: 0,
                period: 0,
            }),
            ..EffectParameters::default()
        }
    }

    fn request<'a>(params: &'a EffectParameters, previous: Option<&'a EffectParameters>) -> DownloadRequest<'a> {
        DownloadRequest {
            effect_type: EffectType::Periodic(Waveform::Sine),
            block: BlockIndex(1),
            params,
            previous,
            api_version: 0x0800,
        }
    }

    #[test]
    fn test_first_download_sends_every_block() -> Result<(), Box<dyn std::error::Error>> {
        let map = map()?;
        let params = sine_params();
        let plan = EffectEncoder::new(&map).download(&request(&params, None))?;
        insta::assert_snapshot!(plan.to_string(), @r"
        set periodic: 05 19
        set envelope: 06 19 4c d0 07 a0 0f
        set effect: 03 01 02 08 e8 03 00 55 00
        ");
        Ok(())
    }

    #[test]
    fn test_redownload_sends_changed_blocks_only() -> Result<(), Box<dyn std::error::Error>> {
        let map = map()?;
        let previous = sine_params();
        let mut params = previous.clone();
        params.duration = EffectDuration::Infinite;
        let plan = EffectEncoder::new(&map).download(&request(&params, Some(&previous)))?;
        assert_eq!(plan.labels(), vec![ReportLabel::SetEffect]);
        assert_eq!(
            plan.reports().first().map(|r| r.data.clone()),
            Some(vec![0x03, 0x01, 0x02, 0x08, 0xff, 0xff, 0x00, 0x55, 0x00])
        );

        let unchanged = EffectEncoder::new(&map).download(&request(&previous, Some(&previous)))?;
        assert!(unchanged.is_empty());
        Ok(())
    }

    #[test]
    fn test_removed_envelope_is_zeroed() -> Result<(), Box<dyn std::error::Error>> {
        let map = map()?;
        let previous = sine_params();
        let mut params = previous.clone();
        params.envelope = None;
        let plan = EffectEncoder::new(&map).download(&request(&params, Some(&previous)))?;
        assert_eq!(plan.to_string(), "set envelope: 06 00 00 00 00 00 00\n");
        Ok(())
    }

    #[test]
    fn test_single_axis_uses_enable_bits_and_trigger() -> Result<(), Box<dyn std::error::Error>> {
        let map = map()?;
        let params = EffectParameters {
            axes: vec![generic::Y],
            trigger_button: TriggerButton::Button(1),
            direction: Some(Direction::Cartesian(vec![-1])),
            ..sine_params()
        };
        let plan = EffectEncoder::new(&map).download(&request(&params, None))?;
        let set_effect = plan.reports().last().ok_or("no set effect")?;
        // Y enable bit, trigger 2, first direction slot 270 degrees.
        assert_eq!(set_effect.data, vec![0x03, 0x01, 0x02, 0x02, 0xe8, 0x03, 0x02, 0xbf, 0x00]);
        Ok(())
    }

    #[test]
    fn test_missing_type_specific_is_incomplete() -> Result<(), Box<dyn std::error::Error>> {
        let map = map()?;
        let params = EffectParameters {
            type_specific: None,
            ..sine_params()
        };
        let err = EffectEncoder::new(&map)
            .download(&request(&params, None))
            .err()
            .ok_or("expected failure")?;
        assert_eq!(err.as_state(), Some(&StateError::IncompleteEffect));
        Ok(())
    }

    #[test]
    fn test_unsupported_type_and_missing_reports() -> Result<(), Box<dyn std::error::Error>> {
        let map = map()?;
        let encoder = EffectEncoder::new(&map);
        let params = sine_params();
        let spring = DownloadRequest {
            effect_type: EffectType::Periodic(Waveform::Triangle),
            ..request(&params, None)
        };
        assert!(encoder.download(&spring).is_err());
        assert!(encoder.device_control(DeviceCommand::Reset).is_err());
        assert_eq!(encoder.device_gain(5000)?, None);
        assert!(encoder.block_free(BlockIndex(1)).is_err());
        Ok(())
    }

    #[test]
    fn test_effect_operations() -> Result<(), Box<dyn std::error::Error>> {
        let map = map()?;
        let encoder = EffectEncoder::new(&map);
        let block = BlockIndex(1);
        assert_eq!(encoder.effect_operation(block, EffectOperation::Start, 1)?.data, vec![2, 1, 1, 0]);
        assert_eq!(encoder.effect_operation(block, EffectOperation::StartSolo, 3)?.data, vec![2, 1, 2, 2]);
        assert_eq!(
            encoder
                .effect_operation(block, EffectOperation::Start, INFINITE_ITERATIONS)?
                .data,
            vec![2, 1, 1, 0x7f]
        );
        assert_eq!(encoder.effect_operation(block, EffectOperation::Start, 0)?.data, vec![2, 1, 1, 0]);
        assert_eq!(encoder.effect_operation(block, EffectOperation::Stop, 5)?.data, vec![2, 1, 3, 0]);
        Ok(())
    }
}
