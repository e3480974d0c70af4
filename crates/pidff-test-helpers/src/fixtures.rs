//! Reference PID joysticks and scripted device responses.
//!
//! Both descriptors describe a three-axis, two-button joystick. The
//! host-managed one lets the host pick effect blocks; the device-managed
//! one assigns blocks through the create-new-effect and block-load
//! feature reports.

use openracing_pidff_common::descriptor::{
    CollectionKind, DescriptorBuilder, ItemFlags, ReportDescriptor,
};
use openracing_pidff_common::effect::{
    ConditionRecord, EffectDuration, EffectParameters, Envelope, TriggerButton, TypeSpecific,
};
use openracing_pidff_common::units::direction::Direction;
use openracing_pidff_common::usage::{Usage, generic, ordinal, page, pid};
use pidff_errors::PidffResult;

/// Report ids shared by both fixtures.
pub mod ids {
    pub const JOYSTICK_INPUT: u8 = 1;
    pub const STATE: u8 = 2;
    pub const DEVICE_CONTROL: u8 = 1;
    pub const EFFECT_OPERATION: u8 = 2;
    pub const SET_EFFECT: u8 = 3;
}

/// Report ids of [`host_managed_joystick`](super::host_managed_joystick).
pub mod host_ids {
    pub const SET_PERIODIC: u8 = 5;
    pub const SET_ENVELOPE: u8 = 6;
    pub const SET_CONDITION: u8 = 7;
    pub const DEVICE_GAIN: u8 = 8;
}

/// Report ids of [`device_managed_joystick`](super::device_managed_joystick).
pub mod managed_ids {
    pub const SET_CONDITION: u8 = 4;
    pub const BLOCK_FREE: u8 = 5;
    pub const DEVICE_GAIN: u8 = 6;
    pub const POOL: u8 = 1;
    pub const CREATE_NEW_EFFECT: u8 = 2;
    pub const BLOCK_LOAD: u8 = 3;
}

/// Bits of the first state report byte.
pub mod switches {
    pub const PAUSED: u8 = 0x01;
    pub const ACTUATORS_ENABLED: u8 = 0x02;
    pub const SAFETY_SWITCH: u8 = 0x04;
    pub const OVERRIDE_SWITCH: u8 = 0x08;
    pub const ACTUATOR_POWER: u8 = 0x10;
}

pub const JOYSTICK_AXES: [Usage; 3] = [generic::X, generic::Y, generic::Z];

/// Opens the application collection and adds the axis and button input
/// report.
fn joystick_inputs() -> DescriptorBuilder {
    DescriptorBuilder::new()
        .usage_page(page::GENERIC_DESKTOP)
        .usage_of(generic::JOYSTICK)
        .collection(CollectionKind::Application)
        .usage_of(generic::JOYSTICK)
        .collection(CollectionKind::Report)
        .report_id(ids::JOYSTICK_INPUT)
        .usage_of(generic::X)
        .usage_of(generic::Y)
        .usage_of(generic::Z)
        .logical(0, 0x7f)
        .physical(0, 0x7f)
        .report_size(8)
        .report_count(3)
        .input(ItemFlags::DATA_VAR)
        .usage_page(page::BUTTON)
        .usage_range(1, 2)
        .logical(0, 1)
        .physical(0, 1)
        .report_size(1)
        .report_count(2)
        .input(ItemFlags::DATA_VAR)
        .report_count(6)
        .input(ItemFlags::PADDING)
        .end_collection()
}

fn state_switches(builder: DescriptorBuilder) -> DescriptorBuilder {
    builder
        .usage_page(page::PID)
        .usage_of(pid::STATE_REPORT)
        .collection(CollectionKind::Report)
        .report_id(ids::STATE)
        .usage_of(pid::DEVICE_PAUSED)
        .usage_of(pid::ACTUATORS_ENABLED)
        .usage_of(pid::SAFETY_SWITCH)
        .usage_of(pid::ACTUATOR_OVERRIDE_SWITCH)
        .usage_of(pid::ACTUATOR_POWER)
        .logical(0, 1)
        .physical(0, 1)
        .report_size(1)
        .report_count(5)
        .input(ItemFlags::DATA_VAR)
        .report_count(3)
        .input(ItemFlags::PADDING)
}

fn block_index(builder: DescriptorBuilder, min: i32, bits: u32) -> DescriptorBuilder {
    builder
        .usage_of(pid::EFFECT_BLOCK_INDEX)
        .logical(min, 0x7f)
        .physical(min, 0x7f)
        .report_size(bits)
        .report_count(1)
}

fn named_array(builder: DescriptorBuilder, usage: Usage, selectors: &[Usage]) -> DescriptorBuilder {
    let count = i32::try_from(selectors.len()).unwrap_or(i32::MAX);
    selectors
        .iter()
        .fold(builder.usage_of(usage).collection(CollectionKind::NamedArray), |b, s| {
            b.usage_of(*s)
        })
        .logical(1, count)
        .physical(1, count)
        .report_size(8)
        .report_count(1)
}

fn effect_operation(builder: DescriptorBuilder, block_min: i32) -> DescriptorBuilder {
    let builder = builder
        .usage_of(pid::EFFECT_OPERATION_REPORT)
        .collection(CollectionKind::Report)
        .report_id(ids::EFFECT_OPERATION);
    let builder = block_index(builder, block_min, 8).output(ItemFlags::DATA_VAR);
    named_array(
        builder,
        pid::EFFECT_OPERATION,
        &[pid::OP_EFFECT_START, pid::OP_EFFECT_START_SOLO, pid::OP_EFFECT_STOP],
    )
    .output(ItemFlags::DATA_ARRAY)
    .end_collection()
    .usage_of(pid::LOOP_COUNT)
    .logical(0, 0x7f)
    .physical(0, 0x7f)
    .report_size(8)
    .report_count(1)
    .output(ItemFlags::DATA_VAR)
    .end_collection()
}

/// Set effect report: block, type, axis enables, direction enable,
/// duration and start delay in milliseconds, trigger button, two
/// direction slots.
fn set_effect(builder: DescriptorBuilder, block_min: i32) -> DescriptorBuilder {
    let builder = builder
        .usage_of(pid::SET_EFFECT_REPORT)
        .collection(CollectionKind::Report)
        .report_id(ids::SET_EFFECT);
    let builder = block_index(builder, block_min, 8).output(ItemFlags::DATA_VAR);
    named_array(
        builder,
        pid::EFFECT_TYPE,
        &[pid::ET_SQUARE, pid::ET_SINE, pid::ET_SPRING],
    )
    .output(ItemFlags::DATA_ARRAY)
    .end_collection()
    .usage_of(pid::AXES_ENABLE)
    .collection(CollectionKind::Logical)
    .usage_of(generic::X)
    .usage_of(generic::Y)
    .usage_of(generic::Z)
    .logical(0, 1)
    .physical(0, 1)
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
    .usage_of(pid::START_DELAY)
    .unit(0x1003)
    .unit_exponent(-3)
    .logical(0, 0x7fff)
    .physical(0, 0x7fff)
    .report_size(16)
    .report_count(2)
    .output(ItemFlags::DATA_VAR)
    .unit(0)
    .unit_exponent(0)
    .usage_of(pid::TRIGGER_BUTTON)
    .logical(1, 8)
    .physical(1, 8)
    .report_size(8)
    .report_count(1)
    .output(ItemFlags::DATA_VAR)
    .usage_of(pid::DIRECTION)
    .collection(CollectionKind::Logical)
    .usage_of(ordinal(1))
    .usage_of(ordinal(2))
    .unit_exponent(-2)
    .logical(0, 0xff)
    .physical(0, 36_000)
    .report_size(8)
    .report_count(2)
    .output(ItemFlags::DATA_VAR)
    .unit_exponent(0)
    .end_collection()
    .end_collection()
}

/// Condition fields after the block and offset fields.
fn condition_values(builder: DescriptorBuilder) -> DescriptorBuilder {
    builder
        .usage_of(pid::CP_OFFSET)
        .logical(-128, 127)
        .physical(-10_000, 10_000)
        .report_size(8)
        .report_count(1)
        .output(ItemFlags::DATA_VAR)
        .usage_of(pid::POSITIVE_COEFFICIENT)
        .usage_of(pid::NEGATIVE_COEFFICIENT)
        .report_count(2)
        .output(ItemFlags::DATA_VAR)
        .usage_of(pid::POSITIVE_SATURATION)
        .usage_of(pid::NEGATIVE_SATURATION)
        .logical(0, 0xff)
        .physical(0, 10_000)
        .report_count(2)
        .output(ItemFlags::DATA_VAR)
        .usage_of(pid::DEAD_BAND)
        .report_count(1)
        .output(ItemFlags::DATA_VAR)
}

fn type_specific_offsets(builder: DescriptorBuilder) -> DescriptorBuilder {
    builder
        .usage_of(pid::TYPE_SPECIFIC_BLOCK_OFFSET)
        .collection(CollectionKind::Logical)
        .usage_of(ordinal(1))
        .usage_of(ordinal(2))
        .logical(0, 1)
        .physical(0, 1)
        .report_size(2)
        .report_count(2)
        .output(ItemFlags::DATA_VAR)
        .end_collection()
}

fn device_gain(builder: DescriptorBuilder, report_id: u8) -> DescriptorBuilder {
    builder
        .usage_of(pid::DEVICE_GAIN_REPORT)
        .collection(CollectionKind::Logical)
        .report_id(report_id)
        .usage_of(pid::DEVICE_GAIN)
        .logical(0, 0xff)
        .physical(0, 10_000)
        .report_size(8)
        .report_count(1)
        .output(ItemFlags::DATA_VAR)
        .end_collection()
}

/// Joystick whose effect blocks the host assigns.
///
/// | id | kind   | report                                           |
/// |----|--------|--------------------------------------------------|
/// | 1  | input  | X, Y, Z, two buttons                             |
/// | 2  | input  | state: five switches, playing bit, 7-bit block   |
/// | 1  | output | device control: reset only                       |
/// | 2  | output | effect operation, blocks `0..=0x7f`              |
/// | 3  | output | set effect                                       |
/// | 5  | output | set periodic: magnitude                          |
/// | 6  | output | set envelope                                     |
/// | 7  | output | set condition, no block index                    |
/// | 8  | output | device gain                                      |
pub fn host_managed_joystick() -> PidffResult<ReportDescriptor> {
    let builder = state_switches(joystick_inputs())
        .usage_of(pid::EFFECT_PLAYING)
        .report_size(1)
        .report_count(1)
        .input(ItemFlags::DATA_VAR);
    let builder = block_index(builder, 0, 7)
        .input(ItemFlags::DATA_VAR)
        .end_collection()
        .usage_of(pid::DEVICE_CONTROL_REPORT)
        .collection(CollectionKind::Report)
        .report_id(ids::DEVICE_CONTROL)
        .usage_of(pid::DEVICE_CONTROL)
        .collection(CollectionKind::Logical)
        .usage_of(pid::DC_DEVICE_RESET)
        .logical(1, 2)
        .physical(1, 2)
        .report_size(8)
        .report_count(1)
        .output(ItemFlags::DATA_ARRAY)
        .end_collection()
        .end_collection();
    let builder = set_effect(effect_operation(builder, 0), 0)
        .usage_of(pid::SET_PERIODIC_REPORT)
        .collection(CollectionKind::Logical)
        .report_id(host_ids::SET_PERIODIC)
        .usage_of(pid::MAGNITUDE)
        .logical(0, 0xff)
        .physical(0, 10_000)
        .report_size(8)
        .report_count(1)
        .output(ItemFlags::DATA_VAR)
        .end_collection()
        .usage_of(pid::SET_ENVELOPE_REPORT)
        .collection(CollectionKind::Logical)
        .report_id(host_ids::SET_ENVELOPE)
        .usage_of(pid::ATTACK_LEVEL)
        .usage_of(pid::FADE_LEVEL)
        .report_count(2)
        .output(ItemFlags::DATA_VAR)
        .usage_of(pid::ATTACK_TIME)
        .usage_of(pid::FADE_TIME)
        .unit(0x1003)
        .unit_exponent(-3)
        .logical(0, 0x7fff)
        .physical(0, 0x7fff)
        .report_size(16)
        .output(ItemFlags::DATA_VAR)
        .unit(0)
        .unit_exponent(0)
        .end_collection()
        .usage_of(pid::SET_CONDITION_REPORT)
        .collection(CollectionKind::Logical)
        .report_id(host_ids::SET_CONDITION);
    let builder = type_specific_offsets(builder)
        .report_size(4)
        .report_count(1)
        .output(ItemFlags::PADDING);
    let builder = condition_values(builder).end_collection();
    device_gain(builder, host_ids::DEVICE_GAIN)
        .end_collection()
        .build()
}

/// Joystick that assigns effect blocks itself.
///
/// | id | kind    | report                                          |
/// |----|---------|-------------------------------------------------|
/// | 1  | input   | X, Y, Z, two buttons                            |
/// | 2  | input   | state: five switches, 8 playing bits, block     |
/// | 1  | output  | device control: all six commands                |
/// | 2  | output  | effect operation, blocks `1..=0x7f`             |
/// | 3  | output  | set effect                                      |
/// | 4  | output  | set condition with block and parameter offset   |
/// | 5  | output  | block free                                      |
/// | 6  | output  | device gain                                     |
/// | 1  | feature | pool: RAM size, simultaneous max, pool flags    |
/// | 2  | feature | create new effect                               |
/// | 3  | feature | block load: block, status, RAM available        |
pub fn device_managed_joystick() -> PidffResult<ReportDescriptor> {
    let builder = state_switches(joystick_inputs())
        .usage_of(pid::EFFECT_PLAYING)
        .report_size(1)
        .report_count(8)
        .input(ItemFlags::DATA_VAR);
    let builder = block_index(builder, 1, 8)
        .input(ItemFlags::DATA_VAR)
        .end_collection()
        .usage_of(pid::DEVICE_CONTROL_REPORT)
        .collection(CollectionKind::Report)
        .report_id(ids::DEVICE_CONTROL)
        .usage_of(pid::DEVICE_CONTROL)
        .collection(CollectionKind::Logical)
        .usage_of(pid::DC_DEVICE_RESET)
        .usage_of(pid::DC_DEVICE_PAUSE)
        .usage_of(pid::DC_DEVICE_CONTINUE)
        .usage_of(pid::DC_ENABLE_ACTUATORS)
        .usage_of(pid::DC_DISABLE_ACTUATORS)
        .usage_of(pid::DC_STOP_ALL_EFFECTS)
        .logical(1, 6)
        .physical(1, 6)
        .report_size(8)
        .report_count(1)
        .output(ItemFlags::DATA_ARRAY)
        .end_collection()
        .end_collection();
    let builder = set_effect(effect_operation(builder, 1), 1)
        .usage_of(pid::SET_CONDITION_REPORT)
        .collection(CollectionKind::Logical)
        .report_id(managed_ids::SET_CONDITION);
    let builder = block_index(builder, 1, 8)
        .output(ItemFlags::DATA_VAR)
        .usage_of(pid::PARAMETER_BLOCK_OFFSET)
        .logical(0, 1)
        .physical(0, 1)
        .report_size(4)
        .report_count(1)
        .output(ItemFlags::DATA_VAR);
    let builder = condition_values(type_specific_offsets(builder))
        .end_collection()
        .usage_of(pid::BLOCK_FREE_REPORT)
        .collection(CollectionKind::Logical)
        .report_id(managed_ids::BLOCK_FREE);
    let builder = block_index(builder, 1, 8)
        .output(ItemFlags::DATA_VAR)
        .end_collection();
    let builder = device_gain(builder, managed_ids::DEVICE_GAIN)
        .usage_of(pid::POOL_REPORT)
        .collection(CollectionKind::Logical)
        .report_id(managed_ids::POOL)
        .usage_of(pid::RAM_POOL_SIZE)
        .logical(0, 0xffff)
        .physical(0, 0xffff)
        .report_size(16)
        .report_count(1)
        .feature(ItemFlags::DATA_VAR)
        .usage_of(pid::SIMULTANEOUS_EFFECTS_MAX)
        .logical(0, 0x7f)
        .physical(0, 0x7f)
        .report_size(8)
        .feature(ItemFlags::DATA_VAR)
        .usage_of(pid::DEVICE_MANAGED_POOL)
        .usage_of(pid::SHARED_PARAMETER_BLOCKS)
        .logical(0, 1)
        .physical(0, 1)
        .report_size(1)
        .report_count(8)
        .feature(ItemFlags::DATA_VAR)
        .end_collection()
        .usage_of(pid::CREATE_NEW_EFFECT_REPORT)
        .collection(CollectionKind::Logical)
        .report_id(managed_ids::CREATE_NEW_EFFECT);
    let builder = named_array(
        builder,
        pid::EFFECT_TYPE,
        &[pid::ET_SQUARE, pid::ET_SINE, pid::ET_SPRING],
    )
    .feature(ItemFlags::DATA_ARRAY)
    .end_collection()
    .end_collection()
    .usage_of(pid::BLOCK_LOAD_REPORT)
    .collection(CollectionKind::Logical)
    .report_id(managed_ids::BLOCK_LOAD);
    let builder = block_index(builder, 1, 8).feature(ItemFlags::DATA_VAR);
    named_array(
        builder,
        pid::BLOCK_LOAD_STATUS,
        &[pid::BLOCK_LOAD_SUCCESS, pid::BLOCK_LOAD_FULL, pid::BLOCK_LOAD_ERROR],
    )
    .feature(ItemFlags::DATA_ARRAY)
    .end_collection()
    .usage_of(pid::RAM_POOL_AVAILABLE)
    .logical(0, 0xffff)
    .physical(0, 0xffff)
    .report_size(16)
    .report_count(1)
    .feature(ItemFlags::DATA_VAR)
    .end_collection()
    .end_collection()
    .build()
}

/// Block load feature report granting `block`.
pub fn block_load_success(block: u8, ram_available: u16) -> Vec<u8> {
    let [lo, hi] = ram_available.to_le_bytes();
    vec![managed_ids::BLOCK_LOAD, block, 1, lo, hi]
}

/// Block load feature report refusing the allocation for lack of room.
pub fn block_load_full() -> Vec<u8> {
    vec![managed_ids::BLOCK_LOAD, 0, 2, 0, 0]
}

/// Pool feature report of the device-managed joystick.
pub fn pool_report(ram_size: u16, simultaneous_max: u8) -> Vec<u8> {
    let [lo, hi] = ram_size.to_le_bytes();
    vec![managed_ids::POOL, lo, hi, simultaneous_max, 0x01]
}

/// State input report of the host-managed joystick.
pub fn host_state_report(switch_bits: u8, playing: bool, block: u8) -> Vec<u8> {
    vec![ids::STATE, switch_bits & 0x1f, u8::from(playing) | ((block & 0x7f) << 1)]
}

/// State input report of the device-managed joystick.
pub fn managed_state_report(switch_bits: u8, playing: bool, block: u8) -> Vec<u8> {
    vec![ids::STATE, switch_bits & 0x1f, u8::from(playing), block]
}

/// Sine effect on all three axes: 1000 ms, gain 3000, spherical
/// direction (3000, 0, 0), envelope attack (1000, 2000) fade (3000, 4000).
pub fn periodic_scenario_params() -> EffectParameters {
    EffectParameters {
        duration: EffectDuration::Finite(1000),
        gain: 3000,
        axes: JOYSTICK_AXES.to_vec(),
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

/// Two condition records the reference conditions tests expect on the
/// wire.
pub fn spring_records() -> Vec<ConditionRecord> {
    vec![
        ConditionRecord {
            offset: -500,
            positive_coefficient: 2000,
            negative_coefficient: -3000,
            positive_saturation: 10_000,
            negative_saturation: 10_000,
            dead_band: 6000,
        },
        ConditionRecord {
            offset: 6000,
            positive_coefficient: 5000,
            negative_coefficient: -4000,
            positive_saturation: 3000,
            negative_saturation: 2000,
            dead_band: 1000,
        },
    ]
}

/// Two-axis spring triggered by the first button, with a start delay.
pub fn spring_params() -> EffectParameters {
    EffectParameters {
        duration: EffectDuration::Finite(1000),
        gain: 3000,
        trigger_button: TriggerButton::Button(0),
        axes: vec![generic::X, generic::Y],
        direction: Some(Direction::Spherical(vec![3000, 0])),
        type_specific: Some(TypeSpecific::Condition(spring_records())),
        start_delay: 6000,
        ..EffectParameters::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openracing_pidff_common::field_map::ReportFieldMap;

    #[test]
    fn test_host_fixture_capabilities() -> Result<(), Box<dyn std::error::Error>> {
        let map = ReportFieldMap::from_descriptor(&host_managed_joystick()?)?;
        let caps = map.capabilities();
        assert!(!caps.device_managed_pool);
        assert_eq!(caps.axes, JOYSTICK_AXES.to_vec());
        assert_eq!(caps.direction_slots, 2);
        assert_eq!(caps.effect_types, vec![pid::ET_SQUARE, pid::ET_SINE, pid::ET_SPRING]);
        assert_eq!(caps.device_controls, vec![pid::DC_DEVICE_RESET]);
        assert_eq!(map.report(pid::SET_EFFECT_REPORT).map(|l| l.byte_len()), Some(11));
        Ok(())
    }

    #[test]
    fn test_managed_fixture_capabilities() -> Result<(), Box<dyn std::error::Error>> {
        let map = ReportFieldMap::from_descriptor(&device_managed_joystick()?)?;
        let caps = map.capabilities();
        assert!(caps.device_managed_pool);
        assert!(caps.pool_report);
        assert_eq!(caps.block_index_range, Some((1, 0x7f)));
        assert_eq!(caps.device_controls.len(), 6);
        assert_eq!(map.report(pid::SET_CONDITION_REPORT).map(|l| l.byte_len()), Some(9));
        assert_eq!(map.report(pid::BLOCK_LOAD_REPORT).map(|l| l.byte_len()), Some(5));
        assert_eq!(block_load_success(1, 0).len(), 5);
        Ok(())
    }
}
