//! Serial port access with timeout-bounded I/O.
//!
//! The crate wraps an OS serial port in a [`Serial`] object that owns the
//! handle, remembers its line settings, and bounds every read and write by a
//! [`Timeout`] policy. A read that runs out of time returns a short count
//! instead of failing. One reader and one writer may use the same port from
//! different threads at once.
//!
//! # Modules
//!
//! - `port`: the port object, its settings, timeout policy and backends
//! - `list`: enumeration of the ports present on the system
//! - `config`: TOML configuration with environment overrides
//! - `logging`: `tracing` subscriber setup for applications
//!
//! # Example
//!
//! ```no_run
//! use serial_line::{Parity, Timeout};
//!
//! let serial = serial_line::new("/dev/ttyUSB0", 115_200)
//!     .parity(Parity::Even)
//!     .timeout(Timeout::simple(500))
//!     .build()?;
//!
//! serial.write(b"AT\r\n")?;
//! let reply = serial.read_line(64, "\r\n")?;
//! println!("{reply:?}");
//! # Ok::<(), serial_line::PortError>(())
//! ```

pub mod config;
pub mod list;
pub mod logging;
pub mod port;

// Re-export commonly used types for convenience
pub use list::{list_ports, PortInfo};
pub use port::{
    ByteSize, ErrorKind, FlowControl, InterByte, Parity, PortError, PortResult, PortSettings,
    Serial, SerialBuilder, StopBits, Timeout,
};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};

/// Start building a [`Serial`] for `port` at `baud_rate`.
///
/// Unset parameters default to 8N1, no flow control and a one second
/// [`Timeout::simple`] policy.
pub fn new(port: impl Into<String>, baud_rate: u32) -> SerialBuilder {
    SerialBuilder::new(port, baud_rate)
}
