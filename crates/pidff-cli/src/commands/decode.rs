//! Report decoding through the field map.

use std::sync::Arc;

use openracing_pidff_common::{DeviceStateTracker, ReportFieldMap, ReportKind};
use pidff_errors::DeviceError;
use pidff_hid_common::ReportReader;
use serde::Serialize;

use crate::commands::{DecodeArgs, load_descriptor, parse_hex};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
pub struct DecodedField {
    pub name: String,
    pub index: usize,
    pub bit_offset: u32,
    pub bit_size: u32,
    pub logical: i32,
    /// Logical value in application units.
    pub value: i64,
    /// Usage an array field selects.
    pub selected: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DecodedReport {
    pub kind: ReportKind,
    pub report_id: u8,
    pub report: Option<String>,
    pub fields: Vec<DecodedField>,
    /// Device state flags when the report is a PID state report.
    pub state: Option<Vec<String>>,
}

pub fn execute(args: &DecodeArgs, json: bool) -> Result<(), CliError> {
    let descriptor = load_descriptor(&args.descriptor)?;
    let map = ReportFieldMap::from_descriptor(&descriptor)?;
    let data = parse_hex(&args.hex)?;
    let decoded = decode(Arc::new(map), args.kind.into(), &data)?;
    output::print_decoded_report(&decoded, json)
}

pub fn decode(
    map: Arc<ReportFieldMap>,
    kind: ReportKind,
    data: &[u8],
) -> Result<DecodedReport, CliError> {
    let report_id = data.first().copied().unwrap_or(0);
    let layout = map
        .layout(kind, report_id)
        .ok_or(CliError::UnknownReport {
            kind: kind.as_str(),
            report_id,
        })?;
    let expected = layout.byte_len();
    if data.len() < expected {
        return Err(CliError::Pidff(
            DeviceError::InvalidLength {
                report_id,
                expected,
                actual: data.len(),
            }
            .into(),
        ));
    }

    let reader = ReportReader::new(data).map_err(|e| CliError::InvalidHex(e.to_string()))?;
    let mut fields = Vec::new();
    for field in map.fields_in(kind, report_id) {
        let logical = field.read_logical(&reader)?;
        fields.push(DecodedField {
            name: field.member.unwrap_or(field.usage).to_string(),
            index: field.index,
            bit_offset: field.bit_offset,
            bit_size: field.bit_size,
            logical,
            value: field.converter().from_device(logical),
            selected: field.selector_at(logical).map(|u| u.to_string()),
        });
    }

    let report = layout.report_usage.map(|u| u.to_string());
    let state = if kind == ReportKind::Input {
        DeviceStateTracker::new(Arc::clone(&map))
            .handle_input_report(data)?
            .map(|snapshot| {
                snapshot
                    .flags
                    .iter_names()
                    .map(|(name, _)| name.to_string())
                    .collect()
            })
    } else {
        None
    };

    Ok(DecodedReport {
        kind,
        report_id,
        report,
        fields,
        state,
    })
}
