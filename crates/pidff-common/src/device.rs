//! Device facade: one PID device, its effect pool and its effects.
//!
//! Application calls serialize on a single mutex per device. Input reports
//! go straight to the [`DeviceStateTracker`], which has its own lock, so
//! the notification path never waits behind a report write.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pidff_errors::{DeviceError, PidffError, PidffResult, StateError, ValidationError};
use pidff_hid_common::HidTransport;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::DeviceConfig;
use crate::descriptor::ReportDescriptor;
use crate::effect::encoder::{DeviceCommand, EffectEncoder};
use crate::effect::object::{
    DownloadState, EffectContext, EffectObject, EffectStatus, Lifecycle, Outcome, SetOutcome,
};
use crate::effect::params::{
    EffectCapabilities, EffectParamFlags, EffectParameters, EffectType, MAX_LEVEL, StartFlags,
};
use crate::field_map::{PidCapabilities, ReportFieldMap};
use crate::pool::{PoolManager, PoolMode};
use crate::state::{DeviceStateFlags, DeviceStateSnapshot, DeviceStateTracker};
use crate::transport::hid_error;
use crate::units::direction::DirectionKind;
use crate::usage::{Usage, pid};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// Force feedback output allowed.
    #[default]
    Exclusive,
    /// Status and properties only.
    Shared,
}

/// Opaque name of an effect created on a [`PidDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EffectHandle(u64);

impl fmt::Display for EffectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "effect#{}", self.0)
    }
}

/// An effect type the device can play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EffectInfo {
    pub effect_type: EffectType,
    pub usage: Usage,
    pub name: &'static str,
    pub capabilities: EffectCapabilities,
}

struct DeviceInner {
    transport: Box<dyn HidTransport>,
    pool: PoolManager,
    effects: BTreeMap<EffectHandle, EffectObject>,
    next_handle: u64,
    access: Option<AccessMode>,
    gain: u32,
    autocenter: bool,
}

impl DeviceInner {
    fn exclusive(&self) -> bool {
        self.access == Some(AccessMode::Exclusive)
    }

    fn require_exclusive(&self) -> PidffResult<()> {
        if self.exclusive() {
            Ok(())
        } else {
            Err(StateError::NotExclusivelyAcquired.into())
        }
    }

    /// The device dropped every block.
    fn forget_blocks(&mut self, tracker: &DeviceStateTracker) {
        for effect in self.effects.values_mut() {
            effect.invalidate();
        }
        self.pool.reset();
        tracker.reset();
    }

    fn send_command(&mut self, map: &ReportFieldMap, command: DeviceCommand) -> PidffResult<()> {
        EffectEncoder::new(map)
            .device_control(command)?
            .send(self.transport.as_mut())
    }
}

pub struct PidDevice {
    map: Arc<ReportFieldMap>,
    tracker: Arc<DeviceStateTracker>,
    config: DeviceConfig,
    inner: Mutex<DeviceInner>,
}

impl fmt::Debug for PidDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PidDevice")
            .field("config", &self.config)
            .field("capabilities", self.map.capabilities())
            .finish_non_exhaustive()
    }
}

impl PidDevice {
    /// Builds the field map once and checks the device can play effects
    /// in the configured pool mode.
    pub fn open(
        transport: impl HidTransport + 'static,
        descriptor: &ReportDescriptor,
        config: DeviceConfig,
    ) -> PidffResult<Self> {
        config.validate()?;
        let map = Arc::new(ReportFieldMap::from_descriptor(descriptor)?);
        for (usage, name) in [
            (pid::SET_EFFECT_REPORT, "set effect"),
            (pid::EFFECT_OPERATION_REPORT, "effect operation"),
        ] {
            if !map.has_report(usage) {
                return Err(DeviceError::MissingReport(name).into());
            }
        }

        let caps = map.capabilities();
        let mode = config.pool_mode.resolve(caps);
        if mode == PoolMode::DeviceManaged
            && !(caps.device_managed_pool && map.has_report(pid::BLOCK_FREE_REPORT))
        {
            return Err(PidffError::config(
                "device-managed pool needs create new effect, block load and block free reports",
            ));
        }
        info!(
            ?mode,
            effect_types = caps.effect_types.len(),
            axes = caps.axes.len(),
            "opened PID device"
        );

        let inner = DeviceInner {
            transport: Box::new(transport),
            pool: PoolManager::new(Arc::clone(&map), mode, config.max_host_blocks),
            effects: BTreeMap::new(),
            next_handle: 1,
            access: None,
            gain: config.default_gain,
            autocenter: config.autocenter,
        };
        Ok(Self {
            tracker: Arc::new(DeviceStateTracker::new(Arc::clone(&map))),
            map,
            config,
            inner: Mutex::new(inner),
        })
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn field_map(&self) -> &ReportFieldMap {
        &self.map
    }

    pub fn capabilities(&self) -> &PidCapabilities {
        self.map.capabilities()
    }

    /// The tracker to hand to the transport's input report path.
    pub fn tracker(&self) -> Arc<DeviceStateTracker> {
        Arc::clone(&self.tracker)
    }

    pub fn pool_mode(&self) -> PoolMode {
        self.inner.lock().pool.mode()
    }

    pub fn access_mode(&self) -> Option<AccessMode> {
        self.inner.lock().access
    }

    /// Exclusive access resets the device, applies the autocenter setting
    /// and sends the current gain. The device may apply these after this
    /// call returns; see [`wait_for_pending`](Self::wait_for_pending).
    pub fn acquire(&self, mode: AccessMode) -> PidffResult<Outcome> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match inner.access {
            Some(current) if current == mode => return Ok(Outcome::NoEffect),
            Some(_) => return Err(StateError::Acquired.into()),
            None => {}
        }

        if mode == AccessMode::Exclusive {
            let encoder = EffectEncoder::new(&self.map);
            if encoder.supports_command(DeviceCommand::Reset) {
                inner.send_command(&self.map, DeviceCommand::Reset)?;
            }
            inner.forget_blocks(&self.tracker);
            if !inner.autocenter && encoder.supports_command(DeviceCommand::SetActuatorsOn) {
                inner.send_command(&self.map, DeviceCommand::SetActuatorsOn)?;
            }
            if let Some(report) = encoder.device_gain(inner.gain)? {
                report.send(inner.transport.as_mut())?;
            }
        }
        inner.access = Some(mode);
        info!(?mode, gain = inner.gain, "device acquired");
        Ok(Outcome::Done)
    }

    /// Exclusive release resets the device once; every effect loses its
    /// block and has to be downloaded again.
    pub fn unacquire(&self) -> PidffResult<Outcome> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let Some(mode) = inner.access.take() else {
            return Ok(Outcome::NoEffect);
        };
        let mut sent = Ok(());
        if mode == AccessMode::Exclusive {
            if EffectEncoder::new(&self.map).supports_command(DeviceCommand::Reset) {
                sent = inner.send_command(&self.map, DeviceCommand::Reset);
            }
            inner.forget_blocks(&self.tracker);
        }
        info!(?mode, "device released");
        sent.map(|()| Outcome::Done)
    }

    pub fn gain(&self) -> u32 {
        self.inner.lock().gain
    }

    /// Stores the device gain and sends it when acquired exclusively.
    pub fn set_gain(&self, gain: u32) -> PidffResult<()> {
        if gain > MAX_LEVEL {
            return Err(ValidationError::out_of_range("gain", gain, 0, MAX_LEVEL).into());
        }
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.access.is_none() {
            return Err(StateError::NotAcquired.into());
        }
        inner.gain = gain;
        if inner.exclusive()
            && let Some(report) = EffectEncoder::new(&self.map).device_gain(gain)?
        {
            report.send(inner.transport.as_mut())?;
        }
        debug!(gain, "device gain set");
        Ok(())
    }

    pub fn autocenter(&self) -> bool {
        self.inner.lock().autocenter
    }

    /// Device-wide only; takes effect at the next exclusive acquire.
    pub fn set_autocenter(&self, axis: Option<Usage>, on: bool) -> PidffResult<()> {
        if let Some(axis) = axis {
            return Err(ValidationError::unsupported(format!("autocenter on axis {axis}")).into());
        }
        let mut inner = self.inner.lock();
        if inner.access.is_some() {
            return Err(StateError::Acquired.into());
        }
        inner.autocenter = on;
        Ok(())
    }

    /// Percentage of the effect pool in use.
    pub fn ffload(&self) -> PidffResult<u32> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.require_exclusive()?;
        inner.pool.load_percent(inner.transport.as_mut())
    }

    pub fn force_feedback_state(&self) -> PidffResult<DeviceStateFlags> {
        let inner = self.inner.lock();
        inner.require_exclusive()?;
        let mut flags = self.tracker.device_state();
        flags.set(DeviceStateFlags::EMPTY, inner.pool.allocated().is_empty());
        Ok(flags)
    }

    pub fn send_command(&self, command: DeviceCommand) -> PidffResult<Outcome> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.require_exclusive()?;
        inner.send_command(&self.map, command)?;
        if command == DeviceCommand::Reset {
            inner.forget_blocks(&self.tracker);
        }
        debug!(command = command.name(), "device command sent");
        Ok(Outcome::Done)
    }

    /// Asynchronous input path; does not take the device lock.
    pub fn handle_input_report(&self, data: &[u8]) -> PidffResult<Option<DeviceStateSnapshot>> {
        self.tracker.handle_input_report(data)
    }

    /// Waits until the device applied every report written so far.
    ///
    /// `None` waits up to the configured gain apply timeout.
    pub fn wait_for_pending(&self, timeout: Option<Duration>) -> PidffResult<()> {
        let timeout =
            timeout.unwrap_or_else(|| Duration::from_millis(self.config.gain_apply_timeout_ms));
        self.inner
            .lock()
            .transport
            .flush(timeout)
            .map_err(|e| hid_error(e, "flush", 0))
    }

    /// Effect types the descriptor offers.
    pub fn supported_effects(&self) -> impl Iterator<Item = EffectInfo> + '_ {
        self.map
            .capabilities()
            .effect_types
            .iter()
            .filter_map(|usage| EffectType::from_usage(*usage))
            .map(|effect_type| EffectInfo {
                effect_type,
                usage: effect_type.usage(),
                name: effect_type.name(),
                capabilities: effect_type.capabilities(),
            })
    }

    /// Handles of the live effects, in creation order.
    pub fn effects(&self) -> std::vec::IntoIter<EffectHandle> {
        let handles: Vec<_> = self.inner.lock().effects.keys().copied().collect();
        handles.into_iter()
    }

    /// Creates an effect of `effect_type`, optionally setting every
    /// parameter group from `params`.
    pub fn create_effect(
        &self,
        effect_type: EffectType,
        params: Option<&EffectParameters>,
    ) -> PidffResult<EffectHandle> {
        let mut effect = EffectObject::new();
        effect.initialize(effect_type, &self.map.capabilities().effect_types)?;

        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if let Some(params) = params {
            let mut ctx = self.context(inner);
            effect.set_parameters(&mut ctx, params, EffectParamFlags::ALL_PARAMS)?;
        }
        let handle = EffectHandle(inner.next_handle);
        inner.next_handle = inner.next_handle.saturating_add(1);
        inner.effects.insert(handle, effect);
        debug!(%handle, %effect_type, "effect created");
        Ok(handle)
    }

    /// Unloads the effect and forgets the handle.
    pub fn release_effect(&self, handle: EffectHandle) -> PidffResult<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let mut effect = inner
            .effects
            .remove(&handle)
            .ok_or(StateError::UnknownEffect)?;
        let mut ctx = self.context(inner);
        let released = effect.release(&mut ctx);
        if let Err(err) = &released {
            warn!(%handle, error = %err, "effect released without a clean unload");
        }
        released
    }

    fn context<'a>(&'a self, inner: &'a mut DeviceInner) -> EffectContext<'a> {
        let exclusive = inner.exclusive();
        EffectContext {
            map: &self.map,
            transport: inner.transport.as_mut(),
            pool: &mut inner.pool,
            tracker: &self.tracker,
            exclusive,
            api_version: self.config.api_version,
        }
    }

    fn with_effect<T>(
        &self,
        handle: EffectHandle,
        call: impl FnOnce(&mut EffectObject, &mut EffectContext<'_>) -> PidffResult<T>,
    ) -> PidffResult<T> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let exclusive = inner.exclusive();
        let effect = inner
            .effects
            .get_mut(&handle)
            .ok_or(StateError::UnknownEffect)?;
        let mut ctx = EffectContext {
            map: &self.map,
            transport: inner.transport.as_mut(),
            pool: &mut inner.pool,
            tracker: &self.tracker,
            exclusive,
            api_version: self.config.api_version,
        };
        call(effect, &mut ctx)
    }

    fn read_effect<T>(
        &self,
        handle: EffectHandle,
        read: impl FnOnce(&EffectObject) -> PidffResult<T>,
    ) -> PidffResult<T> {
        let inner = self.inner.lock();
        let effect = inner.effects.get(&handle).ok_or(StateError::UnknownEffect)?;
        read(effect)
    }

    pub fn set_parameters(
        &self,
        handle: EffectHandle,
        params: &EffectParameters,
        flags: EffectParamFlags,
    ) -> PidffResult<SetOutcome> {
        self.with_effect(handle, |effect, ctx| effect.set_parameters(ctx, params, flags))
    }

    pub fn get_parameters(
        &self,
        handle: EffectHandle,
        flags: EffectParamFlags,
        direction: DirectionKind,
    ) -> PidffResult<EffectParameters> {
        self.read_effect(handle, |effect| effect.get_parameters(flags, direction))
    }

    pub fn download(&self, handle: EffectHandle) -> PidffResult<Outcome> {
        self.with_effect(handle, |effect, ctx| effect.download(ctx))
    }

    pub fn unload(&self, handle: EffectHandle) -> PidffResult<Outcome> {
        self.with_effect(handle, |effect, ctx| effect.unload(ctx))
    }

    /// Plays the effect `iterations` times; see
    /// [`INFINITE_ITERATIONS`](crate::effect::params::INFINITE_ITERATIONS).
    pub fn start(
        &self,
        handle: EffectHandle,
        iterations: u32,
        flags: StartFlags,
    ) -> PidffResult<Outcome> {
        self.with_effect(handle, |effect, ctx| effect.start(ctx, iterations, flags))
    }

    pub fn stop(&self, handle: EffectHandle) -> PidffResult<Outcome> {
        self.with_effect(handle, |effect, ctx| effect.stop(ctx))
    }

    pub fn effect_status(&self, handle: EffectHandle) -> PidffResult<EffectStatus> {
        self.with_effect(handle, |effect, ctx| effect.status(ctx))
    }

    pub fn download_state(&self, handle: EffectHandle) -> PidffResult<DownloadState> {
        self.read_effect(handle, |effect| Ok(effect.download_state()))
    }

    pub fn effect_type(&self, handle: EffectHandle) -> PidffResult<Option<EffectType>> {
        self.read_effect(handle, |effect| Ok(effect.effect_type()))
    }

    pub fn lifecycle(&self, handle: EffectHandle) -> PidffResult<Lifecycle> {
        self.read_effect(handle, |effect| Ok(effect.lifecycle()))
    }
}

impl Drop for PidDevice {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.exclusive()
            && EffectEncoder::new(&self.map).supports_command(DeviceCommand::Reset)
            && let Err(err) = inner.send_command(&self.map, DeviceCommand::Reset)
        {
            warn!(error = %err, "device reset on close failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolModeSetting;
    use crate::descriptor::{CollectionKind, DescriptorBuilder, ItemFlags};
    use crate::usage::page;
    use pidff_errors::ErrorCategory;
    use pidff_hid_common::mock::MockHidTransport;

    fn set_effect_only() -> DescriptorBuilder {
        DescriptorBuilder::new()
            .usage_page(page::PID)
            .usage_of(pid::SET_EFFECT_REPORT)
            .collection(CollectionKind::Logical)
            .report_id(1)
            .usage_of(pid::EFFECT_BLOCK_INDEX)
            .logical(1, 8)
            .report_size(8)
            .report_count(1)
            .output(ItemFlags::DATA_VAR)
            .end_collection()
    }

    fn with_operation(builder: DescriptorBuilder) -> DescriptorBuilder {
        builder
            .usage_of(pid::EFFECT_OPERATION_REPORT)
            .collection(CollectionKind::Logical)
            .report_id(2)
            .usage_of(pid::EFFECT_BLOCK_INDEX)
            .output(ItemFlags::DATA_VAR)
            .end_collection()
    }

    #[test]
    fn test_open_requires_effect_reports() -> Result<(), Box<dyn std::error::Error>> {
        let descriptor = set_effect_only().build()?;
        let err = PidDevice::open(MockHidTransport::new(), &descriptor, DeviceConfig::default())
            .err()
            .ok_or("open must fail")?;
        assert_eq!(
            err.as_device(),
            Some(&DeviceError::MissingReport("effect operation"))
        );
        Ok(())
    }

    #[test]
    fn test_forced_device_pool_needs_pool_reports() -> Result<(), Box<dyn std::error::Error>> {
        let descriptor = with_operation(set_effect_only()).build()?;
        let config = DeviceConfig::builder()
            .pool_mode(PoolModeSetting::DeviceManaged)
            .build()?;
        let err = PidDevice::open(MockHidTransport::new(), &descriptor, config)
            .err()
            .ok_or("open must fail")?;
        assert_eq!(err.category(), ErrorCategory::Config);

        let device =
            PidDevice::open(MockHidTransport::new(), &descriptor, DeviceConfig::default())?;
        assert_eq!(device.pool_mode(), PoolMode::HostManaged);
        Ok(())
    }

    #[test]
    fn test_access_guards() -> Result<(), Box<dyn std::error::Error>> {
        let descriptor = with_operation(set_effect_only()).build()?;
        let transport = MockHidTransport::new();
        let device = PidDevice::open(transport.clone(), &descriptor, DeviceConfig::default())?;

        let err = device.set_gain(5_000).err().ok_or("gain needs acquisition")?;
        assert_eq!(err.as_state(), Some(&StateError::NotAcquired));
        assert!(device.set_gain(10_001).is_err());
        assert!(device.set_autocenter(Some(crate::usage::generic::X), false).is_err());
        device.set_autocenter(None, false)?;

        assert_eq!(device.acquire(AccessMode::Shared)?, Outcome::Done);
        assert_eq!(device.acquire(AccessMode::Shared)?, Outcome::NoEffect);
        assert!(device.acquire(AccessMode::Exclusive).is_err());
        assert!(device.ffload().is_err());
        assert!(device.force_feedback_state().is_err());
        let err = device
            .set_autocenter(None, true)
            .err()
            .ok_or("autocenter while acquired")?;
        assert_eq!(err.as_state(), Some(&StateError::Acquired));

        device.set_gain(5_000)?;
        assert_eq!(device.gain(), 5_000);
        assert!(transport.history().is_empty());
        assert_eq!(device.unacquire()?, Outcome::Done);
        assert_eq!(device.unacquire()?, Outcome::NoEffect);
        Ok(())
    }

    #[test]
    fn test_unknown_handle() -> Result<(), Box<dyn std::error::Error>> {
        let descriptor = with_operation(set_effect_only()).build()?;
        let device = PidDevice::open(MockHidTransport::new(), &descriptor, DeviceConfig::default())?;
        let err = device
            .download(EffectHandle(42))
            .err()
            .ok_or("unknown handle")?;
        assert_eq!(err.as_state(), Some(&StateError::UnknownEffect));
        assert_eq!(device.effects().count(), 0);
        assert_eq!(device.supported_effects().count(), 0);
        Ok(())
    }
}
