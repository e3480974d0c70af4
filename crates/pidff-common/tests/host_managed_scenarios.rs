//! End-to-end effect flows against the host-managed reference joystick.
//!
//! The mock transport records every report; assertions compare the bytes
//! a real device would receive.

use std::time::Duration;

use insta::assert_snapshot;
use openracing_pidff_common::prelude::*;
use pidff_errors::{DeviceError, ErrorCategory, StateError};
use pidff_test_helpers::fixtures::{ids, switches};
use pidff_test_helpers::prelude::*;

fn hex_lines(reports: &[Vec<u8>]) -> String {
    reports
        .iter()
        .map(|r| {
            r.iter()
                .map(|b| format!("{b:02x}"))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Opened and exclusively acquired, with the acquire traffic cleared.
fn acquired() -> Result<(PidDevice, MockHidTransport), Box<dyn std::error::Error>> {
    let transport = MockHidTransport::new();
    let device = PidDevice::open(
        transport.clone(),
        &host_managed_joystick()?,
        DeviceConfig::default(),
    )?;
    device.acquire(AccessMode::Exclusive)?;
    transport.clear_history();
    Ok((device, transport))
}

fn sine() -> EffectType {
    EffectType::Periodic(Waveform::Sine)
}

#[test]
fn test_acquire_resets_and_sends_gain() -> TestResult {
    let transport = MockHidTransport::new();
    let device = PidDevice::open(
        transport.clone(),
        &host_managed_joystick()?,
        DeviceConfig::default(),
    )?;
    assert_eq!(device.acquire(AccessMode::Exclusive)?, Outcome::Done);
    assert_eq!(transport.output_reports(), vec![vec![1, 1], vec![8, 0xff]]);
    assert_eq!(device.acquire(AccessMode::Exclusive)?, Outcome::NoEffect);
    Ok(())
}

#[test]
fn test_periodic_download_report_sequence() -> TestResult {
    let (device, transport) = acquired()?;
    let effect = device.create_effect(sine(), None)?;
    let outcome = device.set_parameters(
        effect,
        &periodic_scenario_params(),
        EffectParamFlags::ALL_PARAMS | EffectParamFlags::NO_DOWNLOAD,
    )?;
    assert_eq!(outcome, SetOutcome::DownloadSkipped);
    assert!(transport.output_reports().is_empty());

    assert_eq!(device.download(effect)?, Outcome::Done);
    assert_snapshot!(hex_lines(&transport.output_reports()), @r"
    05 19
    06 19 4c d0 07 a0 0f
    03 01 02 08 e8 03 00 00 00 55 00
    ");
    assert_eq!(device.lifecycle(effect)?, Lifecycle::Downloaded);
    assert_eq!(device.download(effect)?, Outcome::NoEffect);
    Ok(())
}

#[test]
fn test_no_download_keeps_parameters_readable() -> TestResult {
    let (device, transport) = acquired()?;
    let effect = device.create_effect(sine(), Some(&periodic_scenario_params()))?;
    assert_eq!(device.download_state(effect)?, DownloadState::Downloaded);
    transport.clear_history();

    let longer = EffectParameters {
        duration: EffectDuration::Finite(2500),
        ..EffectParameters::default()
    };
    let outcome = device.set_parameters(
        effect,
        &longer,
        EffectParamFlags::DURATION | EffectParamFlags::NO_DOWNLOAD,
    )?;
    assert_eq!(outcome, SetOutcome::DownloadSkipped);
    assert!(transport.output_reports().is_empty());

    let read = device.get_parameters(effect, EffectParamFlags::DURATION, DirectionKind::Spherical)?;
    assert_eq!(read.duration, EffectDuration::Finite(2500));
    assert_eq!(device.download_state(effect)?, DownloadState::DownloadedIncomplete);

    // Only the set effect report carries the duration.
    device.download(effect)?;
    assert_eq!(
        transport.output_reports(),
        vec![vec![3, 1, 2, 0x08, 0xc4, 0x09, 0, 0, 0, 0x55, 0]]
    );
    Ok(())
}

#[test]
fn test_solo_start_stops_other_effects() -> TestResult {
    let (device, transport) = acquired()?;
    let a = device.create_effect(sine(), Some(&periodic_scenario_params()))?;
    let b = device.create_effect(sine(), Some(&periodic_scenario_params()))?;
    transport.clear_history();

    device.start(b, 1, StartFlags::empty())?;
    assert!(device.effect_status(b)?.playing);

    device.start(a, 1, StartFlags::SOLO)?;
    assert!(device.effect_status(a)?.playing);
    assert!(!device.effect_status(b)?.playing);
    assert_eq!(
        transport.output_reports(),
        vec![vec![2, 2, 1, 0], vec![2, 1, 2, 0]]
    );
    Ok(())
}

#[test]
fn test_start_loop_count_and_stop() -> TestResult {
    let (device, transport) = acquired()?;
    let effect = device.create_effect(sine(), Some(&periodic_scenario_params()))?;
    transport.clear_history();

    device.start(effect, 3, StartFlags::empty())?;
    device.start(effect, INFINITE_ITERATIONS, StartFlags::empty())?;
    device.stop(effect)?;
    assert_eq!(
        transport.output_reports(),
        vec![vec![2, 1, 1, 2], vec![2, 1, 1, 0x7f], vec![2, 1, 3, 0]]
    );
    assert!(!device.effect_status(effect)?.playing);
    Ok(())
}

#[test]
fn test_start_flag_on_set_parameters() -> TestResult {
    let (device, transport) = acquired()?;
    let effect = device.create_effect(sine(), None)?;
    let outcome = device.set_parameters(
        effect,
        &periodic_scenario_params(),
        EffectParamFlags::ALL_PARAMS | EffectParamFlags::START,
    )?;
    assert_eq!(outcome, SetOutcome::Downloaded);
    let reports = transport.output_reports();
    assert_eq!(reports.last(), Some(&vec![2, 1, 1, 0]));
    assert!(device.effect_status(effect)?.playing);

    // Already playing: NO_RESTART leaves it alone.
    transport.clear_history();
    let quieter = EffectParameters {
        gain: 1000,
        ..EffectParameters::default()
    };
    device.set_parameters(
        effect,
        &quieter,
        EffectParamFlags::GAIN | EffectParamFlags::START | EffectParamFlags::NO_RESTART,
    )?;
    assert!(transport.output_reports().iter().all(|r| r.first() != Some(&2)));
    Ok(())
}

#[test]
fn test_unacquire_invalidates_downloaded_effects() -> TestResult {
    let (device, transport) = acquired()?;
    let effect = device.create_effect(sine(), Some(&periodic_scenario_params()))?;
    device.set_gain(5000)?;
    assert_eq!(transport.output_reports().last(), Some(&vec![8, 0x7f]));
    transport.clear_history();

    assert_eq!(device.unacquire()?, Outcome::Done);
    assert_eq!(transport.output_reports(), vec![vec![1, 1]]);
    assert_eq!(device.download_state(effect)?, DownloadState::NotDownloaded);
    assert_eq!(device.lifecycle(effect)?, Lifecycle::ParametersSet);
    assert_eq!(device.unacquire()?, Outcome::NoEffect);

    let err = device.download(effect).err();
    assert_eq!(
        err.as_ref().and_then(|e| e.as_state()),
        Some(&StateError::NotExclusivelyAcquired)
    );

    // Reacquiring sends the stored gain.
    transport.clear_history();
    device.acquire(AccessMode::Exclusive)?;
    assert_eq!(transport.output_reports(), vec![vec![1, 1], vec![8, 0x7f]]);
    Ok(())
}

#[test]
fn test_shared_access_is_read_only() -> TestResult {
    let transport = MockHidTransport::new();
    let device = PidDevice::open(
        transport.clone(),
        &host_managed_joystick()?,
        DeviceConfig::default(),
    )?;
    device.acquire(AccessMode::Shared)?;
    assert!(transport.history().is_empty());

    let effect = device.create_effect(sine(), Some(&periodic_scenario_params()))?;
    assert_eq!(device.download_state(effect)?, DownloadState::NotDownloaded);
    let err = device.start(effect, 1, StartFlags::empty()).err();
    assert_eq!(err.map(|e| e.category()), Some(ErrorCategory::State));
    assert!(device.acquire(AccessMode::Exclusive).is_err());
    Ok(())
}

#[test]
fn test_state_report_updates_device_and_effect_state() -> TestResult {
    let (device, _transport) = acquired()?;
    let effect = device.create_effect(sine(), Some(&periodic_scenario_params()))?;

    let all_on = switches::ACTUATORS_ENABLED
        | switches::SAFETY_SWITCH
        | switches::OVERRIDE_SWITCH
        | switches::ACTUATOR_POWER;
    let snapshot = device.handle_input_report(&host_state_report(all_on, true, 1))?;
    assert!(snapshot.is_some());
    let flags = device.force_feedback_state()?;
    assert!(flags.contains(DeviceStateFlags::ACTUATORS_ON | DeviceStateFlags::POWER_ON));
    assert!(!flags.intersects(DeviceStateFlags::STOPPED | DeviceStateFlags::EMPTY));
    assert!(device.effect_status(effect)?.playing);

    device.handle_input_report(&host_state_report(switches::PAUSED, false, 1))?;
    let flags = device.force_feedback_state()?;
    assert!(flags.contains(DeviceStateFlags::PAUSED | DeviceStateFlags::ACTUATORS_OFF));
    assert!(!device.effect_status(effect)?.playing);

    // Axis reports share the input channel and are ignored.
    assert_eq!(device.handle_input_report(&[1, 0x40, 0x40, 0x40, 0x01])?, None);
    Ok(())
}

#[test]
fn test_release_effect_frees_block_for_reuse() -> TestResult {
    let (device, transport) = acquired()?;
    let first = device.create_effect(sine(), Some(&periodic_scenario_params()))?;
    device.release_effect(first)?;
    assert_eq!(device.effects().count(), 0);
    assert!(device.force_feedback_state()?.contains(DeviceStateFlags::EMPTY));

    transport.clear_history();
    device.create_effect(sine(), Some(&periodic_scenario_params()))?;
    let set_effect = transport.output_reports().into_iter().find(|r| r.first() == Some(&3));
    assert_eq!(set_effect.and_then(|r| r.get(1).copied()), Some(1));
    Ok(())
}

#[test]
fn test_failed_release_still_returns_block_to_pool() -> TestResult {
    let (device, transport) = acquired()?;
    let effect = must_with(
        device.create_effect(sine(), Some(&periodic_scenario_params())),
        "create sine",
    );
    device.start(effect, 1, StartFlags::empty())?;
    transport.reject_report(ids::EFFECT_OPERATION);

    let err = device.release_effect(effect).err();
    assert!(matches!(
        err.as_ref().and_then(|e| e.as_device()),
        Some(DeviceError::ReportRejected { report_id: 2, .. })
    ));
    assert_eq!(device.effects().count(), 0);
    assert!(device.force_feedback_state()?.contains(DeviceStateFlags::EMPTY));

    transport.clear_history();
    device.create_effect(sine(), Some(&periodic_scenario_params()))?;
    let set_effect = transport.output_reports().into_iter().find(|r| r.first() == Some(&3));
    assert_eq!(set_effect.and_then(|r| r.get(1).copied()), Some(1));
    Ok(())
}

#[test]
fn test_wait_for_pending_times_out_while_writes_are_held() -> TestResult {
    let (device, transport) = acquired()?;
    device.set_gain(2000)?;
    transport.hold_writes(true);
    let err = device.wait_for_pending(Some(Duration::from_millis(25))).err();
    assert!(matches!(
        err.as_ref().and_then(|e| e.as_device()),
        Some(DeviceError::Timeout { timeout_ms: 25, .. })
    ));

    transport.hold_writes(false);
    device.wait_for_pending(None)?;
    Ok(())
}

#[test]
fn test_drop_resets_exclusive_device() {
    let (device, transport) = must(acquired());
    drop(device);
    assert_eq!(transport.output_reports(), vec![vec![1, 1]]);
}
