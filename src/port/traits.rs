//! Core traits for serial port abstraction.
//!
//! [`PortDriver`] acquires the OS resource; the [`PortHandle`] it returns is
//! the only thing that ever touches that resource. Both the real backend and
//! the mock implement these traits, and everything above them (the read and
//! write engine, the lifecycle machine, line segmentation) is written once
//! against them.

use super::error::PortResult;
use super::settings::PortSettings;
use super::timeout::Timeout;
use std::time::Duration;

/// Opens port handles by identifier.
#[cfg_attr(test, mockall::automock)]
pub trait PortDriver: Send + Sync + std::fmt::Debug {
    /// Acquire the OS resource for `port`.
    ///
    /// Implementations report a missing device as `PortError::NotFound` and
    /// other failures as I/O errors. The returned handle has not been
    /// configured yet.
    fn open(&self, port: &str) -> PortResult<Box<dyn PortHandle>>;
}

/// Exclusive owner of one open OS-level serial resource.
#[cfg_attr(test, mockall::automock)]
pub trait PortHandle: Send + std::fmt::Debug {
    /// Apply the full line configuration and timeout policy.
    fn reconfigure(&mut self, settings: &PortSettings, timeout: &Timeout) -> PortResult<()>;

    /// Read whatever is available into `buf`, waiting at most `wait`.
    ///
    /// Returns `Ok(0)` when nothing arrived in time. A zero `wait` must not
    /// block.
    fn read_some(&mut self, buf: &mut [u8], wait: Duration) -> PortResult<usize>;

    /// Write a prefix of `data`, waiting at most `wait` for the line to accept it.
    ///
    /// Returns the number of bytes accepted, `Ok(0)` if none were.
    fn write_some(&mut self, data: &[u8], wait: Duration) -> PortResult<usize>;

    /// Bytes received by the driver and not yet read.
    fn bytes_to_read(&mut self) -> PortResult<usize>;

    /// Discard buffered data in one or both directions.
    fn clear(&mut self, buffer: ClearBuffer) -> PortResult<()>;

    /// Block until all buffered output has been transmitted.
    fn drain(&mut self) -> PortResult<()>;

    /// Sample the modem status lines.
    fn modem_status(&mut self) -> PortResult<ModemStatus>;

    fn set_rts(&mut self, level: bool) -> PortResult<()>;

    fn set_dtr(&mut self, level: bool) -> PortResult<()>;

    fn set_break(&mut self, level: bool) -> PortResult<()>;

    /// Release the OS resource. Called at most once per handle.
    fn close(&mut self) -> PortResult<()>;
}

/// Which driver buffer to discard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearBuffer {
    Input,
    Output,
    All,
}

impl From<ClearBuffer> for serialport::ClearBuffer {
    fn from(buffer: ClearBuffer) -> Self {
        match buffer {
            ClearBuffer::Input => serialport::ClearBuffer::Input,
            ClearBuffer::Output => serialport::ClearBuffer::Output,
            ClearBuffer::All => serialport::ClearBuffer::All,
        }
    }
}

/// Snapshot of the input control lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModemStatus {
    /// Clear To Send.
    pub cts: bool,
    /// Data Set Ready.
    pub dsr: bool,
    /// Ring Indicator.
    pub ri: bool,
    /// Carrier Detect.
    pub cd: bool,
}
