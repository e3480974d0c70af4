//! Common HID plumbing for the PID force feedback layer
//!
//! Two pieces shared by everything that talks to a PID device:
//!
//! - [`HidTransport`], the byte-oriented report channel (output writes,
//!   feature get/set) plus a [`mock`] implementation that records traffic.
//! - [`ReportWriter`] / [`ReportReader`], which place and extract fields at
//!   arbitrary bit offsets behind the one-byte report-id prefix.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod hid_traits;
pub mod report_bits;

pub use hid_traits::*;
pub use report_bits::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HidCommonError {
    #[error("Failed to write report {report_id}: {reason}")]
    WriteError { report_id: u8, reason: String },

    #[error("Failed to read report {report_id}: {reason}")]
    ReadError { report_id: u8, reason: String },

    #[error("Invalid report format: {0}")]
    InvalidReport(String),

    #[error("Timed out after {0}ms")]
    Timeout(u64),

    #[error("Device disconnected")]
    Disconnected,
}

pub type HidCommonResult<T> = Result<T, HidCommonError>;
