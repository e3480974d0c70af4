//! Error types for pidffctl

use pidff_errors::{ErrorCategory, PidffError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid hex input: {0}")]
    InvalidHex(String),

    #[error("No {kind} report with id {report_id} in the descriptor")]
    UnknownReport { kind: &'static str, report_id: u8 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error(transparent)]
    Pidff(#[from] PidffError),
}

impl CliError {
    /// Process exit code for the error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UnsupportedFormat(_)
            | Self::InvalidHex(_)
            | Self::JsonError(_)
            | Self::YamlError(_) => 4,
            Self::UnknownReport { .. } => 2,
            Self::IoError(_) => 1,
            Self::Pidff(err) => match err.category() {
                ErrorCategory::Validation | ErrorCategory::Config => 4,
                ErrorCategory::Device => 2,
                ErrorCategory::State => 3,
                ErrorCategory::IO => 1,
            },
        }
    }
}
