//! Report I/O over an [`HidTransport`] with errors in the PID taxonomy.

use pidff_errors::{DeviceError, PidffError, PidffResult};
use pidff_hid_common::{HidCommonError, HidTransport, ReportTransfer};
use tracing::debug;

use crate::field_map::ReportLayout;

pub(crate) fn hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn transfer_name(transfer: ReportTransfer) -> &'static str {
    match transfer {
        ReportTransfer::Output => "output",
        ReportTransfer::SetFeature | ReportTransfer::GetFeature => "feature",
    }
}

pub(crate) fn hid_error(err: HidCommonError, kind: &'static str, report_id: u8) -> PidffError {
    match err {
        HidCommonError::WriteError { .. } => DeviceError::ReportRejected { kind, report_id }.into(),
        HidCommonError::Timeout(timeout_ms) => DeviceError::Timeout {
            operation: kind,
            timeout_ms,
        }
        .into(),
        other => DeviceError::transport(other.to_string()).into(),
    }
}

pub(crate) fn write_report(
    transport: &mut dyn HidTransport,
    transfer: ReportTransfer,
    data: &[u8],
) -> PidffResult<()> {
    let report_id = data.first().copied().unwrap_or(0);
    let kind = transfer_name(transfer);
    debug!(report_id, len = data.len(), data = %hex(data), kind, "writing report");
    let result = match transfer {
        ReportTransfer::Output => transport.write_output_report(data),
        ReportTransfer::SetFeature => transport.set_feature_report(data),
        ReportTransfer::GetFeature => {
            return Err(DeviceError::transport("feature reads carry no payload").into());
        }
    };
    result.map_err(|e| hid_error(e, kind, report_id))
}

/// Reads a feature report and checks its length against the layout.
pub(crate) fn read_feature(
    transport: &mut dyn HidTransport,
    layout: &ReportLayout,
) -> PidffResult<Vec<u8>> {
    let expected = layout.byte_len();
    let data = transport
        .get_feature_report(layout.report_id, expected)
        .map_err(|e| hid_error(e, "feature", layout.report_id))?;
    debug!(report_id = layout.report_id, len = data.len(), data = %hex(&data), "read feature report");
    if data.len() < expected || data.first() != Some(&layout.report_id) {
        return Err(DeviceError::InvalidLength {
            report_id: layout.report_id,
            expected,
            actual: data.len(),
        }
        .into());
    }
    Ok(data)
}
