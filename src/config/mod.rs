//! Configuration module for serial-line.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `SERIAL_LINE_CONFIG` environment variable (explicit path)
//! 2. `./serial-line.toml` (current directory)
//! 3. `serial-line/config.toml` in the platform config directory
//!    (`~/.config` on Linux, `Application Support` on macOS, `%APPDATA%` on Windows)
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! Any configuration value can be overridden via environment variables.
//! The pattern is: `SERIAL_LINE_<SECTION>_<KEY>`
//!
//! Examples:
//! - `SERIAL_LINE_PORT_NAME=/dev/ttyUSB0`
//! - `SERIAL_LINE_PORT_BAUD_RATE=115200`
//! - `SERIAL_LINE_LOGGING_FORMAT=pretty`
//!
//! Legacy environment variables used by the hardware tests are also supported:
//! `TEST_PORT`, `TEST_BAUD`, `TEST_LOOPBACK`.
//!
//! # Example
//!
//! ```no_run
//! use serial_line::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! let config = loader.config();
//! println!("Default baud: {}", config.port.baud_rate);
//!
//! // Opens the configured port, if one is named
//! let serial = config.builder().build()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{Config, LogFormat, LoggingConfig, PortConfig, TestingConfig};
