//! Device and effect status from asynchronous state reports.
//!
//! Input reports arrive on the transport's notification path while
//! application calls query status from their own threads. The tracker
//! keeps one snapshot behind a lock so a query never sees half of a
//! report applied.

use std::sync::Arc;

use bitflags::bitflags;
use parking_lot::RwLock;
use pidff_errors::{DeviceError, PidffResult, StateError};
use pidff_hid_common::ReportReader;
use serde::Serialize;
use tracing::{debug, trace};

use crate::block::{BlockIndex, BlockSet};
use crate::descriptor::ReportKind;
use crate::field_map::{FieldDescriptor, ReportFieldMap};
use crate::transport::hex;
use crate::usage::{Usage, pid};

bitflags! {
    /// Device-level force feedback state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
    pub struct DeviceStateFlags: u32 {
        const EMPTY = 0x0000_0001;
        const STOPPED = 0x0000_0002;
        const PAUSED = 0x0000_0004;
        const ACTUATORS_ON = 0x0000_0010;
        const ACTUATORS_OFF = 0x0000_0020;
        const POWER_ON = 0x0000_0040;
        const POWER_OFF = 0x0000_0080;
        const SAFETY_SWITCH_ON = 0x0000_0100;
        const SAFETY_SWITCH_OFF = 0x0000_0200;
        const USER_SWITCH_ON = 0x0000_0400;
        const USER_SWITCH_OFF = 0x0000_0800;
        const DEVICE_LOST = 0x8000_0000;
    }
}

/// State report usages and the flag pair each one drives.
const SWITCHES: [(Usage, DeviceStateFlags, DeviceStateFlags); 4] = [
    (
        pid::ACTUATORS_ENABLED,
        DeviceStateFlags::ACTUATORS_ON,
        DeviceStateFlags::ACTUATORS_OFF,
    ),
    (
        pid::SAFETY_SWITCH,
        DeviceStateFlags::SAFETY_SWITCH_ON,
        DeviceStateFlags::SAFETY_SWITCH_OFF,
    ),
    (
        pid::ACTUATOR_OVERRIDE_SWITCH,
        DeviceStateFlags::USER_SWITCH_ON,
        DeviceStateFlags::USER_SWITCH_OFF,
    ),
    (
        pid::ACTUATOR_POWER,
        DeviceStateFlags::POWER_ON,
        DeviceStateFlags::POWER_OFF,
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectPlayState {
    Stopped,
    Playing,
}

impl EffectPlayState {
    pub fn is_playing(self) -> bool {
        self == Self::Playing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStateSnapshot {
    /// Device flags as last reported. `EMPTY` is never stored here.
    pub flags: DeviceStateFlags,
    pub playing: BlockSet,
    pub allocated: BlockSet,
}

impl DeviceStateSnapshot {
    fn initial() -> Self {
        Self {
            flags: DeviceStateFlags::STOPPED,
            playing: BlockSet::new(),
            allocated: BlockSet::new(),
        }
    }

    /// Flags with `EMPTY` derived from the allocated blocks.
    pub fn device_state(&self) -> DeviceStateFlags {
        let mut flags = self.flags;
        flags.set(DeviceStateFlags::EMPTY, self.allocated.is_empty());
        flags
    }

    pub fn is_playing(&self, block: BlockIndex) -> bool {
        self.playing.contains(block)
    }
}

impl Default for DeviceStateSnapshot {
    fn default() -> Self {
        Self::initial()
    }
}

#[derive(Debug)]
pub struct DeviceStateTracker {
    map: Arc<ReportFieldMap>,
    state: RwLock<DeviceStateSnapshot>,
}

impl DeviceStateTracker {
    pub fn new(map: Arc<ReportFieldMap>) -> Self {
        Self {
            map,
            state: RwLock::new(DeviceStateSnapshot::initial()),
        }
    }

    /// Applies one input report.
    ///
    /// Returns the updated snapshot, or `None` when the report is not a PID
    /// state report (axis and button reports share the input channel).
    pub fn handle_input_report(&self, data: &[u8]) -> PidffResult<Option<DeviceStateSnapshot>> {
        let Some(&report_id) = data.first() else {
            return Ok(None);
        };
        let Some(layout) = self
            .map
            .layout(ReportKind::Input, report_id)
            .filter(|l| l.report_usage == Some(pid::STATE_REPORT))
        else {
            trace!(report_id, "ignoring non-state input report");
            return Ok(None);
        };
        let expected = layout.byte_len();
        if data.len() < expected {
            return Err(DeviceError::InvalidLength {
                report_id,
                expected,
                actual: data.len(),
            }
            .into());
        }
        let reader = ReportReader::new(data)
            .map_err(|e| DeviceError::transport(e.to_string()))?;
        let fields: Vec<&FieldDescriptor> = self
            .map
            .fields_in(ReportKind::Input, report_id)
            .filter(|f| f.report_usage == Some(pid::STATE_REPORT))
            .collect();
        let field = |usage: Usage| fields.iter().copied().find(|f| f.usage == usage);
        let read = |f: &FieldDescriptor| f.read_logical(&reader);

        // Decode everything before taking the lock.
        let mut reported = DeviceStateFlags::empty();
        let mut seen = DeviceStateFlags::empty();
        if let Some(paused) = field(pid::DEVICE_PAUSED) {
            seen |= DeviceStateFlags::PAUSED;
            reported.set(DeviceStateFlags::PAUSED, read(paused)? != 0);
        }
        for (usage, on, off) in SWITCHES {
            if let Some(f) = field(usage) {
                seen |= on | off;
                reported |= if read(f)? != 0 { on } else { off };
            }
        }

        let playing_fields: Vec<&FieldDescriptor> = fields
            .iter()
            .copied()
            .filter(|f| f.usage == pid::EFFECT_PLAYING)
            .collect();
        let mut playing_updates = Vec::with_capacity(playing_fields.len());
        match field(pid::EFFECT_BLOCK_INDEX) {
            Some(index_field) => {
                let block = read(index_field)?;
                if let (Ok(block), Some(first)) = (u8::try_from(block), playing_fields.first()) {
                    playing_updates.push((BlockIndex(block), read(first)? != 0));
                }
            }
            None => {
                for f in &playing_fields {
                    if let Ok(block) = u8::try_from(f.index.saturating_add(1)) {
                        playing_updates.push((BlockIndex(block), read(f)? != 0));
                    }
                }
            }
        }

        let mut state = self.state.write();
        if !seen.is_empty() {
            state.flags.remove(DeviceStateFlags::STOPPED | seen);
            state.flags.insert(reported);
        }
        for (block, playing) in playing_updates {
            if !state.allocated.contains(block) {
                continue;
            }
            if playing {
                state.playing.insert(block);
            } else {
                state.playing.remove(block);
            }
        }
        debug!(
            report_id,
            data = %hex(data),
            flags = ?state.flags,
            playing = state.playing.len(),
            "applied state report"
        );
        Ok(Some(*state))
    }

    pub fn snapshot(&self) -> DeviceStateSnapshot {
        *self.state.read()
    }

    pub fn device_state(&self) -> DeviceStateFlags {
        self.state.read().device_state()
    }

    pub fn effect_state(&self, block: BlockIndex) -> PidffResult<EffectPlayState> {
        let state = self.state.read();
        if !state.allocated.contains(block) {
            return Err(StateError::NotDownloaded.into());
        }
        Ok(if state.playing.contains(block) {
            EffectPlayState::Playing
        } else {
            EffectPlayState::Stopped
        })
    }

    pub fn block_allocated(&self, block: BlockIndex) {
        self.state.write().allocated.insert(block);
    }

    /// Forgets the block; its playing bit goes with it.
    pub fn block_freed(&self, block: BlockIndex) {
        let mut state = self.state.write();
        state.allocated.remove(block);
        state.playing.remove(block);
    }

    /// Records a start or stop sent by this host.
    pub fn mark_playing(&self, block: BlockIndex, playing: bool) {
        let mut state = self.state.write();
        if playing && state.allocated.contains(block) {
            state.playing.insert(block);
        } else {
            state.playing.remove(block);
        }
    }

    /// Records a solo start: every other block stops.
    pub fn mark_solo(&self, block: BlockIndex) {
        let mut state = self.state.write();
        state.playing.clear();
        if state.allocated.contains(block) {
            state.playing.insert(block);
        }
    }

    /// Back to the post-reset state: nothing allocated, nothing playing.
    pub fn reset(&self) {
        *self.state.write() = DeviceStateSnapshot::initial();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{CollectionKind, DescriptorBuilder, ItemFlags};
    use crate::usage::page;

    /// Five switch bits, padding, then either one playing bit with a block
    /// index or an eight-block bitmap.
    fn tracker(with_block_index: bool) -> PidffResult<DeviceStateTracker> {
        let builder = DescriptorBuilder::new()
            .usage_page(page::PID)
            .usage_of(pid::STATE_REPORT)
            .collection(CollectionKind::Report)
            .report_id(2)
            .usage_of(pid::DEVICE_PAUSED)
            .usage_of(pid::ACTUATORS_ENABLED)
            .usage_of(pid::SAFETY_SWITCH)
            .usage_of(pid::ACTUATOR_OVERRIDE_SWITCH)
            .usage_of(pid::ACTUATOR_POWER)
            .logical(0, 1)
            .report_size(1)
            .report_count(5)
            .input(ItemFlags::DATA_VAR)
            .report_count(3)
            .input(ItemFlags::PADDING)
            .usage_of(pid::EFFECT_PLAYING);
        let builder = if with_block_index {
            builder
                .report_count(1)
                .input(ItemFlags::DATA_VAR)
                .usage_of(pid::EFFECT_BLOCK_INDEX)
                .logical(0, 0x7f)
                .report_size(7)
                .input(ItemFlags::DATA_VAR)
        } else {
            builder.report_count(8).input(ItemFlags::DATA_VAR)
        };
        let descriptor = builder.end_collection().build()?;
        Ok(DeviceStateTracker::new(Arc::new(ReportFieldMap::from_descriptor(
            &descriptor,
        )?)))
    }

    #[test]
    fn test_initial_state_is_stopped_and_empty() -> Result<(), Box<dyn std::error::Error>> {
        let tracker = tracker(true)?;
        assert_eq!(
            tracker.device_state(),
            DeviceStateFlags::STOPPED | DeviceStateFlags::EMPTY
        );
        assert!(tracker.effect_state(BlockIndex(1)).is_err());
        Ok(())
    }

    #[test]
    fn test_switch_bits_map_to_flag_pairs() -> Result<(), Box<dyn std::error::Error>> {
        let tracker = tracker(true)?;
        tracker.handle_input_report(&[2, 0x1f, 0x00])?;
        assert_eq!(
            tracker.device_state(),
            DeviceStateFlags::PAUSED
                | DeviceStateFlags::EMPTY
                | DeviceStateFlags::ACTUATORS_ON
                | DeviceStateFlags::POWER_ON
                | DeviceStateFlags::SAFETY_SWITCH_ON
                | DeviceStateFlags::USER_SWITCH_ON
        );

        tracker.handle_input_report(&[2, 0x00, 0x00])?;
        assert_eq!(
            tracker.device_state(),
            DeviceStateFlags::EMPTY
                | DeviceStateFlags::ACTUATORS_OFF
                | DeviceStateFlags::POWER_OFF
                | DeviceStateFlags::SAFETY_SWITCH_OFF
                | DeviceStateFlags::USER_SWITCH_OFF
        );
        Ok(())
    }

    #[test]
    fn test_playing_bit_with_block_index() -> Result<(), Box<dyn std::error::Error>> {
        let tracker = tracker(true)?;
        // Unallocated blocks are never reported playing.
        tracker.handle_input_report(&[2, 0x00, 0x03])?;
        assert!(!tracker.snapshot().is_playing(BlockIndex(1)));

        tracker.block_allocated(BlockIndex(1));
        tracker.handle_input_report(&[2, 0x00, 0x03])?;
        assert_eq!(tracker.effect_state(BlockIndex(1))?, EffectPlayState::Playing);

        tracker.handle_input_report(&[2, 0x00, 0x02])?;
        assert_eq!(tracker.effect_state(BlockIndex(1))?, EffectPlayState::Stopped);
        Ok(())
    }

    #[test]
    fn test_playing_bitmap() -> Result<(), Box<dyn std::error::Error>> {
        let tracker = tracker(false)?;
        tracker.block_allocated(BlockIndex(1));
        tracker.block_allocated(BlockIndex(3));
        let snapshot = tracker
            .handle_input_report(&[2, 0x00, 0b0000_0111])?
            .ok_or("state report")?;
        assert_eq!(
            snapshot.playing.iter().collect::<Vec<_>>(),
            vec![BlockIndex(1), BlockIndex(3)]
        );
        Ok(())
    }

    #[test]
    fn test_short_and_foreign_reports() -> Result<(), Box<dyn std::error::Error>> {
        let tracker = tracker(true)?;
        assert!(tracker.handle_input_report(&[2, 0x1f]).is_err());
        assert_eq!(tracker.handle_input_report(&[9, 0xff, 0xff])?, None);
        assert_eq!(tracker.handle_input_report(&[])?, None);
        assert!(tracker.device_state().contains(DeviceStateFlags::STOPPED));
        Ok(())
    }

    #[test]
    fn test_local_marks_and_reset() {
        let tracker = DeviceStateTracker::new(Arc::new(ReportFieldMap::default()));
        tracker.block_allocated(BlockIndex(1));
        tracker.block_allocated(BlockIndex(2));
        tracker.mark_playing(BlockIndex(1), true);
        tracker.mark_solo(BlockIndex(2));
        assert!(!tracker.snapshot().is_playing(BlockIndex(1)));
        assert!(tracker.snapshot().is_playing(BlockIndex(2)));

        tracker.block_freed(BlockIndex(2));
        assert!(!tracker.snapshot().is_playing(BlockIndex(2)));
        tracker.reset();
        assert_eq!(tracker.snapshot(), DeviceStateSnapshot::default());
    }
}
