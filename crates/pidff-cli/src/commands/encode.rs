//! Effect encoding against a recording transport.
//!
//! The effect goes through the same path a real device sees: open, acquire,
//! create with parameters, optionally start. Every report the device would
//! have received is then labelled with the report it belongs to.

use openracing_pidff_common::prelude::*;
use openracing_pidff_common::{PoolMode, ReportFieldMap, ReportKind};
use pidff_hid_common::mock::{MockHidTransport, RecordedReport};
use pidff_hid_common::{ReportTransfer, ReportWriter};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::commands::{EncodeArgs, format_hex, load_config, load_descriptor, load_document};
use crate::error::CliError;
use crate::output;

/// Contents of an effect file.
#[derive(Debug, Clone, Deserialize)]
pub struct EffectFile {
    pub effect_type: EffectType,
    #[serde(default)]
    pub parameters: EffectParameters,
}

#[derive(Debug, Serialize)]
pub struct EncodedReport {
    pub transfer: &'static str,
    pub report: String,
    pub data: String,
}

#[derive(Debug, Serialize)]
pub struct EncodeSummary {
    pub effect_type: String,
    pub pool_mode: PoolMode,
    pub lifecycle: String,
    pub reports: Vec<EncodedReport>,
}

pub fn execute(args: &EncodeArgs, json: bool) -> Result<(), CliError> {
    let descriptor = load_descriptor(&args.descriptor)?;
    let effect: EffectFile = load_document(&args.effect)?;
    let config = load_config(args.config.as_deref())?;
    let summary = encode(
        &descriptor,
        config,
        &effect,
        &EncodeOptions {
            block: args.block,
            start: args.start,
            with_acquire: args.with_acquire,
        },
    )?;
    output::print_encode_summary(&summary, json)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EncodeOptions {
    pub block: Option<u8>,
    pub start: Option<u32>,
    pub with_acquire: bool,
}

pub fn encode(
    descriptor: &ReportDescriptor,
    config: DeviceConfig,
    effect: &EffectFile,
    options: &EncodeOptions,
) -> Result<EncodeSummary, CliError> {
    let transport = MockHidTransport::new();
    let device = PidDevice::open(transport.clone(), descriptor, config)?;
    device.acquire(AccessMode::Exclusive)?;
    if !options.with_acquire {
        transport.clear_history();
    }

    if device.pool_mode() == PoolMode::DeviceManaged {
        let block = options.block.unwrap_or(1);
        let response = block_load_response(device.field_map(), block)?;
        debug!(block, "scripting block load response");
        let report_id = response.first().copied().unwrap_or(0);
        transport.queue_feature_response(report_id, response);
    }

    let handle = device.create_effect(effect.effect_type, Some(&effect.parameters))?;
    if let Some(iterations) = options.start {
        device.start(handle, iterations, StartFlags::empty())?;
    }

    let reports = transport
        .history()
        .iter()
        .map(|r| label(device.field_map(), r))
        .collect::<Vec<_>>();
    info!(
        effect_type = %effect.effect_type,
        reports = reports.len(),
        "effect encoded"
    );
    Ok(EncodeSummary {
        effect_type: effect.effect_type.to_string(),
        pool_mode: device.pool_mode(),
        lifecycle: format!("{:?}", device.lifecycle(handle)?),
        reports,
    })
}

/// Block-load feature report announcing a successful load of `block`.
fn block_load_response(map: &ReportFieldMap, block: u8) -> Result<Vec<u8>, CliError> {
    let layout = map
        .report(pid::BLOCK_LOAD_REPORT)
        .ok_or(CliError::UnknownReport {
            kind: "block load",
            report_id: 0,
        })?;
    let mut writer = ReportWriter::new(layout.report_id, layout.byte_len());
    if let Some(field) = map.lookup(pid::BLOCK_LOAD_REPORT, pid::EFFECT_BLOCK_INDEX) {
        let raw = field.converter().logical_to_raw(i32::from(block));
        field.write_raw(&mut writer, raw)?;
    }
    if let Some(field) = map.lookup(pid::BLOCK_LOAD_REPORT, pid::BLOCK_LOAD_STATUS)
        && let Some(value) = field.selector_value(pid::BLOCK_LOAD_SUCCESS)
    {
        let raw = field.converter().logical_to_raw(value);
        field.write_raw(&mut writer, raw)?;
    }
    Ok(writer.into_bytes())
}

fn label(map: &ReportFieldMap, recorded: &RecordedReport) -> EncodedReport {
    let (transfer, kind) = match recorded.transfer {
        ReportTransfer::Output => ("output", ReportKind::Output),
        ReportTransfer::SetFeature => ("set_feature", ReportKind::Feature),
        ReportTransfer::GetFeature => ("get_feature", ReportKind::Feature),
    };
    let report_id = recorded.data.first().copied().unwrap_or(0);
    let report = map
        .layout(kind, report_id)
        .and_then(|l| l.report_usage)
        .map_or_else(|| format!("report {report_id}"), |u| u.to_string());
    EncodedReport {
        transfer,
        report,
        data: format_hex(&recorded.data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pidff_test_helpers::prelude::*;

    fn sine() -> EffectFile {
        EffectFile {
            effect_type: EffectType::Periodic(Waveform::Sine),
            parameters: periodic_scenario_params(),
        }
    }

    fn lines(summary: &EncodeSummary) -> Vec<String> {
        summary
            .reports
            .iter()
            .map(|r| format!("{} {} {}", r.transfer, r.report, r.data))
            .collect()
    }

    #[test]
    fn test_host_managed_sine_reports() -> TestResult {
        let summary = encode(
            &host_managed_joystick()?,
            DeviceConfig::default(),
            &sine(),
            &EncodeOptions::default(),
        )?;
        assert_eq!(summary.pool_mode, PoolMode::HostManaged);
        assert_eq!(summary.lifecycle, "Downloaded");
        insta::assert_snapshot!(lines(&summary).join("\n"), @r"
        output SET_PERIODIC_REPORT 05 19
        output SET_ENVELOPE_REPORT 06 19 4c d0 07 a0 0f
        output SET_EFFECT_REPORT 03 01 02 08 e8 03 00 00 00 55 00
        ");
        Ok(())
    }

    #[test]
    fn test_start_and_acquire_traffic_are_optional() -> TestResult {
        let options = EncodeOptions {
            start: Some(1),
            with_acquire: true,
            ..EncodeOptions::default()
        };
        let summary = encode(&host_managed_joystick()?, DeviceConfig::default(), &sine(), &options)?;
        let all = lines(&summary);
        assert_eq!(all.first().map(String::as_str), Some("output DEVICE_CONTROL_REPORT 01 01"));
        assert_eq!(
            all.last().map(String::as_str),
            Some("output EFFECT_OPERATION_REPORT 02 01 01 00")
        );
        assert_eq!(all.len(), 6);
        Ok(())
    }

    #[test]
    fn test_device_managed_spring_uses_scripted_block() -> TestResult {
        let spring = EffectFile {
            effect_type: EffectType::Condition(ConditionKind::Spring),
            parameters: spring_params(),
        };
        let options = EncodeOptions {
            block: Some(4),
            ..EncodeOptions::default()
        };
        let summary = encode(&device_managed_joystick()?, DeviceConfig::default(), &spring, &options)?;
        assert_eq!(summary.pool_mode, PoolMode::DeviceManaged);
        insta::assert_snapshot!(lines(&summary).join("\n"), @r"
        set_feature CREATE_NEW_EFFECT_REPORT 02 03
        get_feature BLOCK_LOAD_REPORT 03 04 01 00 00
        output SET_CONDITION_REPORT 04 04 00 f9 19 d9 ff ff 99
        output SET_CONDITION_REPORT 04 04 01 4c 3f cc 4c 33 19
        output SET_EFFECT_REPORT 03 04 03 08 e8 03 70 17 01 55 00
        ");
        Ok(())
    }

    #[test]
    fn test_invalid_parameters_are_rejected() -> TestResult {
        let mut effect = sine();
        effect.parameters.gain = 20_000;
        let result = encode(
            &host_managed_joystick()?,
            DeviceConfig::default(),
            &effect,
            &EncodeOptions::default(),
        );
        assert!(matches!(result, Err(CliError::Pidff(_))));
        Ok(())
    }

    #[test]
    fn test_effect_file_parameters_default() -> TestResult {
        let effect: EffectFile = serde_json::from_str(r#"{ "effect_type": "constant_force" }"#)?;
        assert_eq!(effect.effect_type, EffectType::ConstantForce);
        assert_eq!(effect.parameters, EffectParameters::default());
        Ok(())
    }
}
