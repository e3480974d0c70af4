//! Report field map.
//!
//! Flattens a [`ReportDescriptor`] into addressable fields keyed by
//! (report usage, field usage, index), with the bit position, size and
//! ranges needed to encode or decode each one. Built once per device;
//! read-only afterwards.

use std::collections::{BTreeMap, HashMap};

use pidff_errors::{DeviceError, PidffError, PidffResult};
use pidff_hid_common::{HidCommonError, MAX_FIELD_BITS, ReportReader, ReportWriter, payload_len};
use serde::Serialize;
use tracing::debug;

use crate::descriptor::{Collection, CollectionKind, ReportDescriptor, ReportItem, ReportKind};
use crate::units::{Quantity, UnitConverter};
use crate::usage::{Usage, pid};

/// One addressable field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    /// Lookup usage. For ordinal members and axis enable bits this is the
    /// owning collection usage (DIRECTION, AXES_ENABLE, ...); for selector
    /// arrays it is the named-array usage.
    pub usage: Usage,
    /// Usage the descriptor declared when it differs from `usage`.
    pub member: Option<Usage>,
    /// Position among fields with the same report and lookup usage, from 0.
    pub index: usize,
    pub report_usage: Option<Usage>,
    pub kind: ReportKind,
    pub report_id: u8,
    pub bit_offset: u32,
    pub bit_size: u32,
    pub logical_min: i32,
    pub logical_max: i32,
    pub physical_min: i32,
    pub physical_max: i32,
    pub unit: u32,
    pub unit_exponent: i8,
    /// Usages an array field selects between, in logical order.
    pub selectors: Vec<Usage>,
}

impl FieldDescriptor {
    pub fn is_signed(&self) -> bool {
        self.logical_min < 0
    }

    pub fn is_selector(&self) -> bool {
        !self.selectors.is_empty()
    }

    /// Logical value that selects `usage` in an array field.
    pub fn selector_value(&self, usage: Usage) -> Option<i32> {
        let position = self.selectors.iter().position(|u| *u == usage)?;
        i32::try_from(position)
            .ok()
            .and_then(|p| self.logical_min.checked_add(p))
    }

    /// Usage selected by a logical value read from an array field.
    pub fn selector_at(&self, logical: i32) -> Option<Usage> {
        let position = usize::try_from(logical.checked_sub(self.logical_min)?).ok()?;
        self.selectors.get(position).copied()
    }

    pub fn converter(&self) -> UnitConverter {
        UnitConverter::for_field(self, Quantity::for_usage(self.usage))
    }

    fn codec_error(&self, err: HidCommonError) -> PidffError {
        DeviceError::descriptor(format!("{} in report {}: {err}", self.usage, self.report_id)).into()
    }

    pub fn write_raw(&self, writer: &mut ReportWriter, raw: u32) -> PidffResult<()> {
        writer
            .set_bits(self.bit_offset, self.bit_size, raw)
            .map(|_| ())
            .map_err(|e| self.codec_error(e))
    }

    /// Reads the field's logical value, sign-extended for signed ranges.
    pub fn read_logical(&self, reader: &ReportReader<'_>) -> PidffResult<i32> {
        let raw = reader
            .bits(self.bit_offset, self.bit_size)
            .map_err(|e| self.codec_error(e))?;
        Ok(self.converter().raw_to_logical(raw))
    }
}

/// Size and identity of one report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportLayout {
    pub kind: ReportKind,
    pub report_id: u8,
    pub report_usage: Option<Usage>,
    pub bit_len: u32,
}

impl ReportLayout {
    /// Buffer length including the report id byte.
    pub fn byte_len(&self) -> usize {
        1 + payload_len(self.bit_len)
    }
}

/// Features of the device derived from its field map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PidCapabilities {
    /// CREATE_NEW_EFFECT and BLOCK_LOAD feature reports are both present.
    pub device_managed_pool: bool,
    pub start_delay: bool,
    pub effect_gain: bool,
    pub trigger_repeat_interval: bool,
    /// EFFECT_TYPE selectors of the set-effect report.
    pub effect_types: Vec<Usage>,
    /// Actuator axes in AXES_ENABLE order.
    pub axes: Vec<Usage>,
    pub direction_slots: usize,
    pub direction_enable: bool,
    /// DEVICE_CONTROL selectors.
    pub device_controls: Vec<Usage>,
    pub pool_report: bool,
    pub state_report_ids: Vec<u8>,
    /// Logical range of EFFECT_BLOCK_INDEX in the set-effect report.
    pub block_index_range: Option<(i32, i32)>,
    /// Logical range of TRIGGER_BUTTON in the set-effect report.
    pub trigger_button_range: Option<(i32, i32)>,
}

type FieldKey = (Option<Usage>, Usage);

#[derive(Debug, Clone, Default)]
pub struct ReportFieldMap {
    fields: Vec<FieldDescriptor>,
    reports: Vec<ReportLayout>,
    by_key: HashMap<FieldKey, Vec<usize>>,
    capabilities: PidCapabilities,
}

#[derive(Default)]
struct Scope {
    report_usage: Option<Usage>,
    group: Option<Usage>,
}

impl Scope {
    fn from_stack(stack: &[&Collection]) -> Self {
        let mut scope = Self::default();
        for collection in stack {
            let Some(usage) = collection.usage else {
                continue;
            };
            if pid::is_report_usage(usage) {
                scope.report_usage = Some(usage);
                scope.group = None;
            } else if matches!(
                collection.kind,
                CollectionKind::Logical | CollectionKind::NamedArray
            ) {
                scope.group = Some(usage);
            }
        }
        scope
    }

    /// Ordinals and axis enable bits are addressed through their collection.
    fn groups_member(&self, usage: Usage) -> Option<Usage> {
        let group = self.group?;
        (usage.is_ordinal() || group == pid::AXES_ENABLE).then_some(group)
    }
}

impl ReportFieldMap {
    pub fn from_descriptor(descriptor: &ReportDescriptor) -> PidffResult<Self> {
        let mut map = Self::default();
        let mut offsets: BTreeMap<(ReportKind, u8), u32> = BTreeMap::new();
        let mut failure = None;

        descriptor.walk(|stack, item| {
            if failure.is_some() {
                return;
            }
            let scope = Scope::from_stack(stack);
            let offset = offsets.entry((item.kind, item.report_id)).or_insert(0);
            if let Err(e) = map.add_item(&scope, item, offset) {
                failure = Some(e);
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }

        for ((kind, report_id), bit_len) in offsets {
            let report_usage = map
                .fields
                .iter()
                .find(|f| f.kind == kind && f.report_id == report_id)
                .and_then(|f| f.report_usage);
            map.reports.push(ReportLayout {
                kind,
                report_id,
                report_usage,
                bit_len,
            });
        }
        map.capabilities = map.derive_capabilities();
        debug!(
            fields = map.fields.len(),
            reports = map.reports.len(),
            device_managed = map.capabilities.device_managed_pool,
            "built report field map"
        );
        Ok(map)
    }

    fn add_item(&mut self, scope: &Scope, item: &ReportItem, offset: &mut u32) -> PidffResult<()> {
        let size = item.report_size;
        if item.is_constant || item.usages.is_empty() || size == 0 {
            *offset = advance(*offset, item.bit_len(), item)?;
            return Ok(());
        }

        for k in 0..item.report_count {
            let (usage, member, selectors) = if item.is_array {
                let usage = scope
                    .group
                    .or_else(|| item.usages.first().copied())
                    .unwrap_or_default();
                (usage, None, item.usages.clone())
            } else {
                let last = item.usages.len().saturating_sub(1);
                let declared = item
                    .usages
                    .get((k as usize).min(last))
                    .copied()
                    .unwrap_or_default();
                match scope.groups_member(declared) {
                    Some(group) => (group, Some(declared), Vec::new()),
                    None => (declared, None, Vec::new()),
                }
            };

            if size > MAX_FIELD_BITS && usage.is_pid() {
                return Err(DeviceError::descriptor(format!(
                    "{usage} field is {size} bits wide, at most {MAX_FIELD_BITS} supported"
                ))
                .into());
            }

            let key = (scope.report_usage, usage);
            let slot = self.by_key.entry(key).or_default();
            let field = FieldDescriptor {
                usage,
                member,
                index: slot.len(),
                report_usage: scope.report_usage,
                kind: item.kind,
                report_id: item.report_id,
                bit_offset: *offset,
                bit_size: size,
                logical_min: item.logical_min,
                logical_max: item.logical_max,
                physical_min: item.physical_min,
                physical_max: item.physical_max,
                unit: item.unit,
                unit_exponent: item.unit_exponent,
                selectors,
            };
            slot.push(self.fields.len());
            self.fields.push(field);
            *offset = advance(*offset, size, item)?;
        }
        Ok(())
    }

    fn derive_capabilities(&self) -> PidCapabilities {
        let set_effect = |usage| self.lookup(pid::SET_EFFECT_REPORT, usage);
        let feature = |usage| {
            self.report(usage)
                .is_some_and(|r| r.kind == ReportKind::Feature)
        };

        PidCapabilities {
            device_managed_pool: feature(pid::CREATE_NEW_EFFECT_REPORT)
                && feature(pid::BLOCK_LOAD_REPORT),
            start_delay: set_effect(pid::START_DELAY).is_some(),
            effect_gain: set_effect(pid::GAIN).is_some(),
            trigger_repeat_interval: set_effect(pid::TRIGGER_REPEAT_INTERVAL).is_some(),
            effect_types: set_effect(pid::EFFECT_TYPE)
                .map(|f| f.selectors.clone())
                .unwrap_or_default(),
            axes: self
                .lookup_all(pid::SET_EFFECT_REPORT, pid::AXES_ENABLE)
                .filter_map(|f| f.member)
                .collect(),
            direction_slots: self
                .lookup_all(pid::SET_EFFECT_REPORT, pid::DIRECTION)
                .count(),
            direction_enable: set_effect(pid::DIRECTION_ENABLE).is_some(),
            device_controls: self
                .lookup(pid::DEVICE_CONTROL_REPORT, pid::DEVICE_CONTROL)
                .map(|f| f.selectors.clone())
                .unwrap_or_default(),
            pool_report: feature(pid::POOL_REPORT),
            state_report_ids: self
                .reports
                .iter()
                .filter(|r| r.kind == ReportKind::Input && r.report_usage == Some(pid::STATE_REPORT))
                .map(|r| r.report_id)
                .collect(),
            block_index_range: set_effect(pid::EFFECT_BLOCK_INDEX)
                .map(|f| (f.logical_min, f.logical_max)),
            trigger_button_range: set_effect(pid::TRIGGER_BUTTON)
                .map(|f| (f.logical_min, f.logical_max)),
        }
    }

    /// First field with `usage` in the report named `report_usage`.
    pub fn lookup(&self, report_usage: Usage, usage: Usage) -> Option<&FieldDescriptor> {
        self.lookup_indexed(report_usage, usage, 0)
    }

    pub fn lookup_indexed(
        &self,
        report_usage: Usage,
        usage: Usage,
        index: usize,
    ) -> Option<&FieldDescriptor> {
        let slot = self.by_key.get(&(Some(report_usage), usage))?;
        slot.get(index).and_then(|i| self.fields.get(*i))
    }

    /// Every field with `usage` in the report, in index order.
    pub fn lookup_all(
        &self,
        report_usage: Usage,
        usage: Usage,
    ) -> impl Iterator<Item = &FieldDescriptor> + '_ {
        self.by_key
            .get(&(Some(report_usage), usage))
            .into_iter()
            .flatten()
            .filter_map(|i| self.fields.get(*i))
    }

    /// Layout of the report named `report_usage`.
    pub fn report(&self, report_usage: Usage) -> Option<&ReportLayout> {
        self.reports
            .iter()
            .find(|r| r.report_usage == Some(report_usage))
    }

    pub fn has_report(&self, report_usage: Usage) -> bool {
        self.report(report_usage).is_some()
    }

    pub fn layout(&self, kind: ReportKind, report_id: u8) -> Option<&ReportLayout> {
        self.reports
            .iter()
            .find(|r| r.kind == kind && r.report_id == report_id)
    }

    pub fn reports(&self) -> impl Iterator<Item = &ReportLayout> + '_ {
        self.reports.iter()
    }

    /// All fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> + '_ {
        self.fields.iter()
    }

    pub fn fields_in(&self, kind: ReportKind, report_id: u8) -> impl Iterator<Item = &FieldDescriptor> + '_ {
        self.fields
            .iter()
            .filter(move |f| f.kind == kind && f.report_id == report_id)
    }

    pub fn capabilities(&self) -> &PidCapabilities {
        &self.capabilities
    }
}

fn advance(offset: u32, bits: u32, item: &ReportItem) -> PidffResult<u32> {
    offset.checked_add(bits).ok_or_else(|| {
        DeviceError::descriptor(format!(
            "{} report {} exceeds the addressable bit range",
            item.kind.as_str(),
            item.report_id
        ))
        .into()
    })
}
