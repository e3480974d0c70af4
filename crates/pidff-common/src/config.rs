//! Per-device configuration.

use std::path::Path;

use pidff_errors::{PidffError, PidffResult};
use serde::{Deserialize, Serialize};

use crate::device::AccessMode;
use crate::effect::params::MAX_LEVEL;
use crate::field_map::PidCapabilities;
use crate::pool::PoolMode;

/// Oldest and newest force-feedback API revisions understood.
pub const MIN_API_VERSION: u32 = 0x0300;
pub const MAX_API_VERSION: u32 = 0x0800;

/// Which side assigns effect blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolModeSetting {
    /// Device-managed when the descriptor carries the pool feature reports.
    #[default]
    Auto,
    DeviceManaged,
    HostManaged,
}

impl PoolModeSetting {
    pub fn resolve(self, capabilities: &PidCapabilities) -> PoolMode {
        match self {
            Self::Auto if capabilities.device_managed_pool => PoolMode::DeviceManaged,
            Self::Auto | Self::HostManaged => PoolMode::HostManaged,
            Self::DeviceManaged => PoolMode::DeviceManaged,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Force-feedback API revision of the caller. Start delays need 0x0700.
    pub api_version: u32,
    pub pool_mode: PoolModeSetting,
    /// Gain sent at exclusive acquire until the caller sets one (0..=10000).
    pub default_gain: u32,
    /// Caps host-managed block allocation below the descriptor's range.
    pub max_host_blocks: Option<u8>,
    /// Upper bound for [`wait_for_pending`](crate::PidDevice::wait_for_pending).
    pub gain_apply_timeout_ms: u64,
    /// Autocenter state before the caller changes it.
    pub autocenter: bool,
    pub access_mode: AccessMode,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            api_version: MAX_API_VERSION,
            pool_mode: PoolModeSetting::Auto,
            default_gain: MAX_LEVEL,
            max_host_blocks: None,
            gain_apply_timeout_ms: 100,
            autocenter: true,
            access_mode: AccessMode::Exclusive,
        }
    }
}

impl DeviceConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PidffError::Config`] naming the first invalid value.
    pub fn validate(&self) -> PidffResult<()> {
        if !(MIN_API_VERSION..=MAX_API_VERSION).contains(&self.api_version) {
            return Err(PidffError::config(format!(
                "api_version {:#06x} outside {MIN_API_VERSION:#06x}..={MAX_API_VERSION:#06x}",
                self.api_version
            )));
        }
        if self.default_gain > MAX_LEVEL {
            return Err(PidffError::config(format!(
                "default_gain {} exceeds {MAX_LEVEL}",
                self.default_gain
            )));
        }
        if self.max_host_blocks == Some(0) {
            return Err(PidffError::config("max_host_blocks must be greater than 0"));
        }
        if self.gain_apply_timeout_ms == 0 {
            return Err(PidffError::config(
                "gain_apply_timeout_ms must be greater than 0",
            ));
        }
        Ok(())
    }

    pub fn from_json_str(text: &str) -> PidffResult<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| PidffError::config(format!("invalid JSON config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> PidffResult<Self> {
        let config: Self = serde_yaml::from_str(text)
            .map_err(|e| PidffError::config(format!("invalid YAML config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a `.json`, `.yaml` or `.yml` file.
    pub fn load_from_path(path: impl AsRef<Path>) -> PidffResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(PidffError::Io)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            Some("yaml" | "yml") => Self::from_yaml_str(&text),
            _ => Err(PidffError::config(format!(
                "unrecognized config format: {}",
                path.display()
            ))),
        }
    }

    #[must_use]
    pub fn builder() -> DeviceConfigBuilder {
        DeviceConfigBuilder::default()
    }

    /// Whether start delays are part of the caller's parameter set.
    pub fn supports_start_delay(&self) -> bool {
        self.api_version >= crate::effect::encoder::START_DELAY_API_VERSION
    }
}

#[derive(Debug, Default)]
pub struct DeviceConfigBuilder {
    config: DeviceConfig,
}

impl DeviceConfigBuilder {
    #[must_use]
    pub fn api_version(mut self, version: u32) -> Self {
        self.config.api_version = version;
        self
    }

    #[must_use]
    pub fn pool_mode(mut self, mode: PoolModeSetting) -> Self {
        self.config.pool_mode = mode;
        self
    }

    #[must_use]
    pub fn default_gain(mut self, gain: u32) -> Self {
        self.config.default_gain = gain;
        self
    }

    #[must_use]
    pub fn max_host_blocks(mut self, blocks: u8) -> Self {
        self.config.max_host_blocks = Some(blocks);
        self
    }

    #[must_use]
    pub fn gain_apply_timeout_ms(mut self, ms: u64) -> Self {
        self.config.gain_apply_timeout_ms = ms;
        self
    }

    #[must_use]
    pub fn autocenter(mut self, on: bool) -> Self {
        self.config.autocenter = on;
        self
    }

    #[must_use]
    pub fn access_mode(mut self, mode: AccessMode) -> Self {
        self.config.access_mode = mode;
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> PidffResult<DeviceConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pidff_errors::ErrorCategory;
    use std::io::Write;

    #[test]
    fn test_defaults_validate() -> Result<(), Box<dyn std::error::Error>> {
        let config = DeviceConfig::default();
        config.validate()?;
        assert!(config.supports_start_delay());
        assert_eq!(config.default_gain, 10_000);
        Ok(())
    }

    #[test]
    fn test_partial_json_fills_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let config = DeviceConfig::from_json_str(r#"{ "api_version": 1280, "pool_mode": "host_managed" }"#)?;
        assert_eq!(config.api_version, 0x0500);
        assert_eq!(config.pool_mode, PoolModeSetting::HostManaged);
        assert!(!config.supports_start_delay());
        assert_eq!(config.gain_apply_timeout_ms, 100);
        Ok(())
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let cases = [
            r#"{ "api_version": 512 }"#,
            r#"{ "default_gain": 10001 }"#,
            r#"{ "max_host_blocks": 0 }"#,
            r#"{ "pool_mode": "sometimes" }"#,
        ];
        for case in cases {
            let err = DeviceConfig::from_json_str(case).err();
            assert_eq!(err.map(|e| e.category()), Some(ErrorCategory::Config), "{case}");
        }
    }

    #[test]
    fn test_load_yaml_by_extension() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile()?;
        writeln!(file, "max_host_blocks: 4\naccess_mode: shared\nautocenter: false")?;
        let config = DeviceConfig::load_from_path(file.path())?;
        assert_eq!(config.max_host_blocks, Some(4));
        assert_eq!(config.access_mode, AccessMode::Shared);
        assert!(!config.autocenter);

        let other = tempfile::Builder::new().suffix(".toml").tempfile()?;
        assert!(DeviceConfig::load_from_path(other.path()).is_err());
        Ok(())
    }

    #[test]
    fn test_builder_validates() {
        assert!(DeviceConfig::builder().default_gain(20_000).build().is_err());
        let config = DeviceConfig::builder().max_host_blocks(2).build();
        assert_eq!(config.ok().and_then(|c| c.max_host_blocks), Some(2));
    }

    #[test]
    fn test_pool_mode_resolution() {
        let mut caps = PidCapabilities::default();
        assert_eq!(PoolModeSetting::Auto.resolve(&caps), PoolMode::HostManaged);
        caps.device_managed_pool = true;
        assert_eq!(PoolModeSetting::Auto.resolve(&caps), PoolMode::DeviceManaged);
        assert_eq!(PoolModeSetting::HostManaged.resolve(&caps), PoolMode::HostManaged);
    }
}
