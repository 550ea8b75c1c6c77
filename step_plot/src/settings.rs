use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::reference::CircuitParams;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid settings: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
    /// Per-read timeout of the port.
    pub read_timeout_ms: u64,
    /// Consecutive timed-out reads without any data before giving up.
    pub max_idle_reads: u32,
}

impl Default for SerialSettings {
    fn default() -> Self {
        let port = if cfg!(windows) { "COM3" } else { "/dev/ttyACM0" };
        Self {
            port: port.to_owned(),
            baud_rate: config::SERIAL_BAUD_RATE,
            read_timeout_ms: 500,
            max_idle_reads: 20,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureSettings {
    /// Points collected per run.
    pub points: usize,
    /// Time range of the reference curve.
    pub span_ms: u32,
    pub reference_step_ms: f64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            points: config::SAMPLE_CAPACITY,
            span_ms: config::RUN_LENGTH_MS,
            reference_step_ms: 1.0,
        }
    }
}

/// Runtime configuration of the analysis tool, read from a TOML file.
///
/// ```toml
/// [serial]
/// port = "/dev/ttyACM0"
///
/// [circuit]
/// v_max = 3.3
/// resistance = 100e3
/// capacitance = 3.3e-6
/// ```
///
/// Every key is optional.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub serial: SerialSettings,
    pub circuit: CircuitParams,
    pub capture: CaptureSettings,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn reference_span(&self) -> f64 {
        self.capture.span_ms as f64 / 1000.0
    }

    pub fn reference_step(&self) -> f64 {
        self.capture.reference_step_ms / 1000.0
    }
}
