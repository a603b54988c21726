use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::param::DataFormat;
use crate::roi::Roi;

/// The default value for [SensorConfig::exposure_us].
pub const DEFAULT_EXPOSURE_US: f32 = 10_000.0;

/// The default value for [SensorConfig::timeout_ms].
pub const DEFAULT_TIMEOUT_MS: u32 = 10_000;

fn default_exposure_us() -> f32 {
    DEFAULT_EXPOSURE_US
}

fn default_timeout_ms() -> u32 {
    DEFAULT_TIMEOUT_MS
}

fn default_reopen_attempts() -> u32 {
    1
}

/// Acquisition settings of a [crate::XimeaSensor].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SensorConfig {
    /// Index of the device to open.
    #[serde(default)]
    pub device: u32,
    /// Exposure time in microseconds.
    #[serde(default = "default_exposure_us")]
    pub exposure_us: f32,
    /// Gain in dB.
    #[serde(default)]
    pub gain_db: f32,
    /// Frame rate limit. Free running if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framerate: Option<f32>,
    /// Capture on a rising edge of GPI 1 instead of free running.
    #[serde(default)]
    pub external_trigger: bool,
    #[serde(default)]
    pub data_format: DataFormat,
    /// Time to wait for a frame, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u32,
    /// How many times a failed read reopens the device before giving up.
    #[serde(default = "default_reopen_attempts")]
    pub reopen_attempts: u32,
    /// Streamed region of the sensor. Kept last so it serializes as a
    /// trailing TOML table.
    #[serde(default)]
    pub roi: Roi,
}

impl Default for SensorConfig {
    fn default() -> Self {
        SensorConfig {
            device: 0,
            exposure_us: DEFAULT_EXPOSURE_US,
            gain_db: 0.0,
            framerate: None,
            external_trigger: false,
            data_format: DataFormat::default(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            reopen_attempts: default_reopen_attempts(),
            roi: Roi::default(),
        }
    }
}

impl SensorConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_toml_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        log::debug!("loaded configuration from {}", path.as_ref().display());
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }
}
