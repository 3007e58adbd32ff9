//! Configuration schema definitions.
//!
//! This module defines the structure of the configuration file using serde.
//! All configuration sections are defined here with appropriate defaults.

use crate::port::{ByteSize, FlowControl, Parity, PortSettings, SerialBuilder, StopBits, Timeout};
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port to open and its line settings
    pub port: PortConfig,
    /// Read/write deadline policy
    pub timeout: Timeout,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Hardware testing configuration
    pub testing: TestingConfig,
}

impl Config {
    /// Start a [`SerialBuilder`] from the `[port]` and `[timeout]` sections.
    ///
    /// The builder opens the port on `build()` when `port.name` is set.
    pub fn builder(&self) -> SerialBuilder {
        SerialBuilder::new(self.port.name.clone().unwrap_or_default(), self.port.baud_rate)
            .settings(self.port.settings())
            .timeout(self.timeout)
    }
}

/// Serial port configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortConfig {
    /// Port identifier, e.g. `/dev/ttyUSB0` or `COM3`
    pub name: Option<String>,
    pub baud_rate: u32,
    /// Data bits: 5, 6, 7 or 8
    pub byte_size: ByteSize,
    /// "none", "odd", "even", "mark" or "space"
    pub parity: Parity,
    /// 1, 1.5 or 2
    pub stop_bits: StopBits,
    /// "none", "software" or "hardware"
    pub flow_control: FlowControl,
}

impl Default for PortConfig {
    fn default() -> Self {
        let settings = PortSettings::default();
        Self {
            name: None,
            baud_rate: settings.baud_rate,
            byte_size: settings.byte_size,
            parity: settings.parity,
            stop_bits: settings.stop_bits,
            flow_control: settings.flow_control,
        }
    }
}

impl PortConfig {
    pub fn settings(&self) -> PortSettings {
        PortSettings {
            baud_rate: self.baud_rate,
            byte_size: self.byte_size,
            parity: self.parity,
            stop_bits: self.stop_bits,
            flow_control: self.flow_control,
        }
    }
}

/// Hardware testing configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestingConfig {
    /// Test port name
    pub port: Option<String>,
    /// Test baud rate
    pub baud: u32,
    /// Whether TX is wired to RX on the test port
    pub loopback: bool,
}

impl Default for TestingConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: 115_200,
            loopback: false,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset, e.g. "info" or "serial_line=debug"
    pub level: String,
    /// Log format: "pretty", "compact" or "full"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line with colors
    Pretty,
    /// One line per event
    #[default]
    Compact,
    /// The `tracing-subscriber` default layout
    Full,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "full" => Ok(Self::Full),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}
