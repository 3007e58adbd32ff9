//! Utility functions for hardware testing.
//!
//! Provides helpers for reading the test port from the environment, opening
//! it, and timing operations.

use serial_line::config::ConfigLoader;
use serial_line::{list_ports, PortInfo, Serial, Timeout};
use std::time::{Duration, Instant};

/// Test port configuration from environment.
pub struct TestPortConfig {
    pub port_name: String,
    pub baud_rate: u32,
    pub loopback_enabled: bool,
}

impl TestPortConfig {
    /// Read `TEST_PORT`, `TEST_BAUD` and `TEST_LOOPBACK` (or their
    /// `SERIAL_LINE_TESTING_*` equivalents, or the `[testing]` config section).
    pub fn from_env() -> Option<Self> {
        let testing = ConfigLoader::with_defaults().into_config().testing;
        Some(TestPortConfig {
            port_name: testing.port?,
            baud_rate: testing.baud,
            loopback_enabled: testing.loopback,
        })
    }

    /// Open the test port with a simple timeout.
    pub fn open(&self, timeout: Timeout) -> Serial {
        serial_line::new(&self.port_name, self.baud_rate)
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| panic!("Failed to open {}: {}", self.port_name, e))
    }
}

/// Ports visible to the enumeration layer; empty if enumeration fails.
pub fn discover_available_ports() -> Vec<PortInfo> {
    list_ports().unwrap_or_default()
}

/// Print available ports for debugging.
pub fn print_available_ports() {
    let ports = discover_available_ports();

    if ports.is_empty() {
        println!("No serial ports detected on this system");
        return;
    }

    println!("Available serial ports ({}):", ports.len());
    for (idx, port) in ports.iter().enumerate() {
        println!("  {}. {}", idx + 1, port.port);
        println!("     Description: {}", port.description);
        println!("     Hardware ID: {}", port.hardware_id);
    }
}

/// Timing helper for measuring operation duration.
pub struct TimingHelper {
    start: Instant,
    name: String,
}

impl TimingHelper {
    pub fn new(name: &str) -> Self {
        println!("⏱️  Starting: {}", name);
        TimingHelper {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        println!("✅ Completed: {} in {:?}", self.name, elapsed);
        elapsed
    }
}

/// Skip test with a clear message if hardware is not available.
#[macro_export]
macro_rules! skip_without_hardware {
    () => {
        match $crate::hardware::utils::TestPortConfig::from_env() {
            Some(config) => config,
            None => {
                println!("⏭️  Skipping: TEST_PORT environment variable not set");
                println!("   Set TEST_PORT=COM3 (or /dev/ttyUSB0) to run hardware tests");
                return;
            }
        }
    };
}

/// Skip test with a clear message if loopback is not enabled.
#[macro_export]
macro_rules! skip_without_loopback {
    () => {{
        let config = $crate::skip_without_hardware!();
        if !config.loopback_enabled {
            println!("⏭️  Skipping loopback test: TEST_LOOPBACK not set to 1");
            return;
        }
        config
    }};
}
