//! Command implementations for pidffctl

pub mod decode;
pub mod encode;
pub mod fields;

use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use openracing_pidff_common::{DeviceConfig, ReportDescriptor, ReportKind};
use serde::de::DeserializeOwned;

use crate::error::CliError;

#[derive(Args, Debug)]
pub struct FieldsArgs {
    /// Report descriptor tree (.json, .yaml or .yml)
    pub descriptor: PathBuf,
    /// Only list fields of this report id
    #[arg(short, long)]
    pub report: Option<u8>,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Report descriptor tree (.json, .yaml or .yml)
    pub descriptor: PathBuf,
    /// Effect file holding `effect_type` and `parameters`
    pub effect: PathBuf,
    /// Device configuration file
    #[arg(short, long, env = "PIDFFCTL_CONFIG")]
    pub config: Option<PathBuf>,
    /// Block index a device-managed pool hands out
    #[arg(short, long)]
    pub block: Option<u8>,
    /// Start the effect after download with this many iterations
    #[arg(short, long)]
    pub start: Option<u32>,
    /// Also show the reports sent while acquiring the device
    #[arg(long)]
    pub with_acquire: bool,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Report descriptor tree (.json, .yaml or .yml)
    pub descriptor: PathBuf,
    /// Report bytes in hex, report id first (`02 1f 03` or `021f03`)
    pub hex: String,
    /// Which report table the id refers to
    #[arg(short, long, value_enum, default_value_t = KindArg::Input)]
    pub kind: KindArg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Input,
    Output,
    Feature,
}

impl From<KindArg> for ReportKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Input => ReportKind::Input,
            KindArg::Output => ReportKind::Output,
            KindArg::Feature => ReportKind::Feature,
        }
    }
}

/// Reads a JSON or YAML document, picking the format from the extension.
pub fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let text = std::fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(serde_json::from_str(&text)?),
        Some("yaml" | "yml") => Ok(serde_yaml::from_str(&text)?),
        _ => Err(CliError::UnsupportedFormat(path.display().to_string())),
    }
}

pub fn load_descriptor(path: &Path) -> Result<ReportDescriptor, CliError> {
    let text = std::fs::read_to_string(path)?;
    let descriptor = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => ReportDescriptor::from_json_str(&text)?,
        Some("yaml" | "yml") => ReportDescriptor::from_yaml_str(&text)?,
        _ => return Err(CliError::UnsupportedFormat(path.display().to_string())),
    };
    tracing::debug!(path = %path.display(), nodes = descriptor.nodes.len(), "descriptor loaded");
    Ok(descriptor)
}

pub fn load_config(path: Option<&Path>) -> Result<DeviceConfig, CliError> {
    match path {
        Some(path) => Ok(DeviceConfig::load_from_path(path)?),
        None => Ok(DeviceConfig::default()),
    }
}

/// Parses hex bytes, ignoring whitespace, `:` and `-` separators and `0x`
/// prefixes.
pub fn parse_hex(input: &str) -> Result<Vec<u8>, CliError> {
    let digits: Vec<char> = input
        .split(|c: char| c.is_whitespace() || c == ':' || c == '-' || c == ',')
        .map(|token| token.trim_start_matches("0x").trim_start_matches("0X"))
        .flat_map(str::chars)
        .collect();
    if digits.is_empty() {
        return Err(CliError::InvalidHex("no bytes given".to_string()));
    }
    if !digits.len().is_multiple_of(2) {
        return Err(CliError::InvalidHex(format!(
            "odd number of hex digits in '{input}'"
        )));
    }
    digits
        .chunks(2)
        .map(|pair| {
            let text: String = pair.iter().collect();
            u8::from_str_radix(&text, 16)
                .map_err(|e| CliError::InvalidHex(format!("'{text}': {e}")))
        })
        .collect()
}

pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_parse_hex_accepts_common_spellings() -> TestResult {
        assert_eq!(parse_hex("02 1f 03")?, vec![0x02, 0x1f, 0x03]);
        assert_eq!(parse_hex("021F03")?, vec![0x02, 0x1f, 0x03]);
        assert_eq!(parse_hex("0x02,0x1f:03")?, vec![0x02, 0x1f, 0x03]);
        Ok(())
    }

    #[test]
    fn test_parse_hex_rejects_bad_input() {
        assert!(matches!(parse_hex(""), Err(CliError::InvalidHex(_))));
        assert!(matches!(parse_hex("021"), Err(CliError::InvalidHex(_))));
        assert!(matches!(parse_hex("0g"), Err(CliError::InvalidHex(_))));
    }

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(&[3, 0x1a, 0xff]), "03 1a ff");
        assert_eq!(format_hex(&[]), "");
    }

    #[test]
    fn test_unknown_extension_is_rejected() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("descriptor.txt");
        std::fs::write(&path, "{}")?;
        assert!(matches!(
            load_descriptor(&path),
            Err(CliError::UnsupportedFormat(_))
        ));
        Ok(())
    }

    #[test]
    fn test_missing_config_falls_back_to_defaults() -> TestResult {
        assert_eq!(load_config(None)?, DeviceConfig::default());
        Ok(())
    }
}
