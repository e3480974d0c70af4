//! Effect block allocation.
//!
//! Device-managed pools negotiate every block with the device through the
//! create-new-effect and block-load feature reports. Host-managed pools
//! hand out indices locally and never talk to the device.

use std::sync::Arc;

use pidff_errors::{DeviceError, PidffResult};
use pidff_hid_common::{HidTransport, ReportReader};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::block::{BlockIndex, BlockSet};
use crate::effect::encoder::EffectEncoder;
use crate::effect::params::EffectType;
use crate::field_map::ReportFieldMap;
use crate::transport::read_feature;
use crate::usage::pid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolMode {
    HostManaged,
    DeviceManaged,
}

/// Decoded block-load feature report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLoad {
    pub block: i32,
    pub status: BlockLoadStatus,
    pub ram_available: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockLoadStatus {
    Success,
    Full,
    Error,
    /// Status value outside the selector list.
    Unknown(i32),
}

#[derive(Debug)]
pub struct PoolManager {
    map: Arc<ReportFieldMap>,
    mode: PoolMode,
    first: u8,
    last: u8,
    allocated: BlockSet,
    ram_available: Option<u32>,
}

impl PoolManager {
    /// `max_host_blocks` caps host-managed allocation below the block index
    /// range the device declares.
    pub fn new(map: Arc<ReportFieldMap>, mode: PoolMode, max_host_blocks: Option<u8>) -> Self {
        let (lmin, lmax) = map
            .capabilities()
            .block_index_range
            .unwrap_or((1, i32::from(u8::MAX)));
        let first = u8::try_from(lmin.max(1)).unwrap_or(u8::MAX);
        let mut last = u8::try_from(lmax.clamp(0, i32::from(u8::MAX))).unwrap_or(u8::MAX);
        if let Some(cap) = max_host_blocks {
            last = last.min(cap);
        }
        Self {
            map,
            mode,
            first,
            last,
            allocated: BlockSet::new(),
            ram_available: None,
        }
    }

    pub fn mode(&self) -> PoolMode {
        self.mode
    }

    pub fn allocated(&self) -> &BlockSet {
        &self.allocated
    }

    /// RAM the device reported free in its last block load.
    pub fn ram_available(&self) -> Option<u32> {
        self.ram_available
    }

    /// Blocks addressable by this pool.
    pub fn capacity(&self) -> usize {
        if self.last < self.first {
            return 0;
        }
        usize::from(self.last - self.first) + 1
    }

    pub fn allocate(
        &mut self,
        transport: &mut dyn HidTransport,
        effect_type: EffectType,
    ) -> PidffResult<BlockIndex> {
        let block = match self.mode {
            PoolMode::HostManaged => self.next_free().ok_or(DeviceError::PoolExhausted)?,
            PoolMode::DeviceManaged => self.load_block(transport, effect_type)?,
        };
        self.allocated.insert(block);
        debug!(%block, mode = ?self.mode, "allocated effect block");
        Ok(block)
    }

    fn next_free(&self) -> Option<BlockIndex> {
        (self.first..=self.last)
            .map(BlockIndex)
            .find(|b| !self.allocated.contains(*b))
    }

    fn load_block(
        &mut self,
        transport: &mut dyn HidTransport,
        effect_type: EffectType,
    ) -> PidffResult<BlockIndex> {
        EffectEncoder::new(&self.map)
            .create_new_effect(effect_type)?
            .send(transport)?;
        let load = self.read_block_load(transport)?;
        if load.ram_available.is_some() {
            self.ram_available = load.ram_available;
        }
        match load.status {
            BlockLoadStatus::Success => u8::try_from(load.block)
                .ok()
                .filter(|b| *b != 0)
                .map(BlockIndex)
                .ok_or_else(|| {
                    warn!(block = load.block, "device loaded an unaddressable block");
                    DeviceError::BlockLoadFailed(0).into()
                }),
            BlockLoadStatus::Full => {
                warn!(%effect_type, "device effect pool is full");
                Err(DeviceError::PoolExhausted.into())
            }
            BlockLoadStatus::Error => {
                warn!(%effect_type, "device failed to load effect block");
                Err(DeviceError::BlockLoadFailed(3).into())
            }
            BlockLoadStatus::Unknown(status) => {
                warn!(%effect_type, status, "unexpected block load status");
                Err(DeviceError::BlockLoadFailed(u32::try_from(status).unwrap_or(0)).into())
            }
        }
    }

    fn read_block_load(&self, transport: &mut dyn HidTransport) -> PidffResult<BlockLoad> {
        let layout = self
            .map
            .report(pid::BLOCK_LOAD_REPORT)
            .ok_or(DeviceError::MissingReport("block load"))?;
        let data = read_feature(transport, layout)?;
        let reader = ReportReader::new(&data).map_err(|e| DeviceError::transport(e.to_string()))?;
        let read = |usage| {
            self.map
                .lookup(pid::BLOCK_LOAD_REPORT, usage)
                .map(|f| f.read_logical(&reader).map(|v| (f, v)))
                .transpose()
        };

        let block = read(pid::EFFECT_BLOCK_INDEX)?.map_or(0, |(_, v)| v);
        let status = match read(pid::BLOCK_LOAD_STATUS)? {
            Some((field, value)) => match field.selector_at(value) {
                Some(pid::BLOCK_LOAD_SUCCESS) => BlockLoadStatus::Success,
                Some(pid::BLOCK_LOAD_FULL) => BlockLoadStatus::Full,
                Some(pid::BLOCK_LOAD_ERROR) => BlockLoadStatus::Error,
                _ => BlockLoadStatus::Unknown(value),
            },
            None => return Err(DeviceError::MissingReport("block load status").into()),
        };
        let ram_available = read(pid::RAM_POOL_AVAILABLE)?.and_then(|(_, v)| u32::try_from(v).ok());
        Ok(BlockLoad {
            block,
            status,
            ram_available,
        })
    }

    /// Releases a block, telling the device when it manages the pool.
    pub fn free(&mut self, transport: &mut dyn HidTransport, block: BlockIndex) -> PidffResult<()> {
        if self.mode == PoolMode::DeviceManaged {
            EffectEncoder::new(&self.map).block_free(block)?.send(transport)?;
        }
        self.forget(block);
        Ok(())
    }

    /// Drops a block from the local table without a device transaction.
    pub fn forget(&mut self, block: BlockIndex) {
        if self.allocated.remove(block) {
            debug!(%block, "released effect block");
        }
    }

    /// The device dropped every block (reset or unacquire).
    pub fn reset(&mut self) {
        self.allocated.clear();
        self.ram_available = None;
    }

    /// Percentage of the pool in use.
    ///
    /// With a pool report and a RAM figure from the last block load this is
    /// the share of device RAM taken. Otherwise it is the share of blocks
    /// taken, out of the simultaneous-effects maximum when the device
    /// declares one and the block index range when it does not.
    pub fn load_percent(&self, transport: &mut dyn HidTransport) -> PidffResult<u32> {
        let mut capacity = self.capacity() as u64;
        if let Some(layout) = self.map.report(pid::POOL_REPORT) {
            let data = read_feature(transport, layout)?;
            let reader =
                ReportReader::new(&data).map_err(|e| DeviceError::transport(e.to_string()))?;
            let read = |usage| -> PidffResult<Option<u64>> {
                match self.map.lookup(pid::POOL_REPORT, usage) {
                    Some(field) => Ok(u64::try_from(field.read_logical(&reader)?).ok()),
                    None => Ok(None),
                }
            };
            if let (Some(size), Some(available)) = (read(pid::RAM_POOL_SIZE)?, self.ram_available)
                && size > 0
            {
                let used = size.saturating_sub(u64::from(available));
                return Ok(percent(used, size));
            }
            if let Some(max) = read(pid::SIMULTANEOUS_EFFECTS_MAX)?.filter(|m| *m > 0) {
                capacity = max;
            }
        }
        Ok(percent(self.allocated.len() as u64, capacity))
    }
}

fn percent(used: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    u32::try_from(used.min(total) * 100 / total).unwrap_or(100)
}
