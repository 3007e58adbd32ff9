//! The serial port object: lifecycle, configuration and control lines.
//!
//! A [`Serial`] is either closed (no handle) or open (exactly one handle
//! obtained from its driver). Setters always store the new value; on an open
//! port they also push the whole configuration to the handle before
//! returning, so a failed reconfigure still leaves the requested value staged
//! for the next `open`.
//!
//! Locking: `read_lock` is held for the full duration of read-family calls
//! and `write_lock` for write-family calls, so one reader and one writer can
//! be in flight together. Setters and `set_port` take both. The handle itself
//! sits behind `inner`, which is only held for one bounded backend call at a
//! time. Lock order is always read, write, inner.

use super::error::{PortError, PortResult};
use super::settings::{validate_baud_rate, ByteSize, FlowControl, Parity, PortSettings, StopBits};
use super::system::SystemDriver;
use super::timeout::Timeout;
use super::traits::{ClearBuffer, ModemStatus, PortDriver, PortHandle};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A serial port with timeout-bounded I/O.
///
/// All methods take `&self`; share it between a reader thread and a writer
/// thread with `Arc<Serial>`.
pub struct Serial {
    driver: Arc<dyn PortDriver>,
    pub(super) read_lock: Mutex<()>,
    pub(super) write_lock: Mutex<()>,
    inner: Mutex<Inner>,
}

struct Inner {
    port: String,
    settings: PortSettings,
    timeout: Timeout,
    handle: Option<Box<dyn PortHandle>>,
}

impl Inner {
    fn handle(&mut self, op: &'static str) -> PortResult<&mut dyn PortHandle> {
        match self.handle.as_deref_mut() {
            Some(handle) => Ok(handle),
            None => Err(PortError::NotOpen(op)),
        }
    }

    fn open(&mut self, driver: &dyn PortDriver) -> PortResult<()> {
        if self.port.is_empty() {
            return Err(PortError::invalid("Empty port is invalid."));
        }
        if self.handle.is_some() {
            return Err(PortError::AlreadyOpen(self.port.clone()));
        }
        self.settings.validate()?;

        let mut handle = driver.open(&self.port)?;
        if let Err(e) = handle.reconfigure(&self.settings, &self.timeout) {
            if let Err(close_err) = handle.close() {
                debug!(port = %self.port, error = %close_err, "close after failed configure");
            }
            return Err(e);
        }

        self.handle = Some(handle);
        info!(port = %self.port, settings = %self.settings, "serial port opened");
        Ok(())
    }

    fn close(&mut self) -> PortResult<()> {
        // Taking the handle first marks it invalid even if close fails.
        let Some(mut handle) = self.handle.take() else {
            return Ok(());
        };
        handle.close()?;
        info!(port = %self.port, "serial port closed");
        Ok(())
    }

    fn reconfigure(&mut self) -> PortResult<()> {
        if let Some(handle) = self.handle.as_deref_mut() {
            handle.reconfigure(&self.settings, &self.timeout)?;
            debug!(port = %self.port, settings = %self.settings, "reconfigured");
        }
        Ok(())
    }
}

impl Serial {
    /// Create a port on the OS backend, opening it if `port` is non-empty.
    pub fn new(port: impl Into<String>, settings: PortSettings, timeout: Timeout) -> PortResult<Self> {
        Self::with_driver(Arc::new(SystemDriver), port, settings, timeout)
    }

    /// Create a port on a specific backend, opening it if `port` is non-empty.
    pub fn with_driver(
        driver: Arc<dyn PortDriver>,
        port: impl Into<String>,
        settings: PortSettings,
        timeout: Timeout,
    ) -> PortResult<Self> {
        let serial = Self {
            driver,
            read_lock: Mutex::new(()),
            write_lock: Mutex::new(()),
            inner: Mutex::new(Inner {
                port: port.into(),
                settings,
                timeout,
                handle: None,
            }),
        };

        if !serial.inner.lock().port.is_empty() {
            serial.open()?;
        }
        Ok(serial)
    }

    /// Open the port and apply the stored configuration.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if the port identifier is empty
    /// - `AlreadyOpen` if the port is already open
    /// - `NotFound` if the device does not exist, `Io` for other OS failures
    pub fn open(&self) -> PortResult<()> {
        self.inner.lock().open(&*self.driver)
    }

    /// Close the port. Closing a closed port does nothing.
    pub fn close(&self) -> PortResult<()> {
        self.inner.lock().close()
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock().handle.is_some()
    }

    pub fn port_name(&self) -> String {
        self.inner.lock().port.clone()
    }

    /// Switch to a different port, reopening if the current one is open.
    ///
    /// Waits for in-flight reads and writes to finish first.
    pub fn set_port(&self, port: impl Into<String>) -> PortResult<()> {
        let _read = self.read_lock.lock();
        let _write = self.write_lock.lock();
        let mut inner = self.inner.lock();

        let was_open = inner.handle.is_some();
        if was_open {
            inner.close()?;
        }
        inner.port = port.into();
        if was_open {
            inner.open(&*self.driver)?;
        }
        Ok(())
    }

    /// Current line settings.
    pub fn settings(&self) -> PortSettings {
        self.inner.lock().settings
    }

    /// Store a change and push it to the handle once in-flight I/O is done.
    fn update(&self, apply: impl FnOnce(&mut Inner)) -> PortResult<()> {
        let _read = self.read_lock.lock();
        let _write = self.write_lock.lock();
        let mut inner = self.inner.lock();
        apply(&mut inner);
        inner.reconfigure()
    }

    pub fn baud_rate(&self) -> u32 {
        self.settings().baud_rate
    }

    pub fn set_baud_rate(&self, baud_rate: u32) -> PortResult<()> {
        validate_baud_rate(baud_rate)?;
        self.update(|inner| inner.settings.baud_rate = baud_rate)
    }

    pub fn byte_size(&self) -> ByteSize {
        self.settings().byte_size
    }

    pub fn set_byte_size(&self, byte_size: ByteSize) -> PortResult<()> {
        self.update(|inner| inner.settings.byte_size = byte_size)
    }

    pub fn parity(&self) -> Parity {
        self.settings().parity
    }

    pub fn set_parity(&self, parity: Parity) -> PortResult<()> {
        self.update(|inner| inner.settings.parity = parity)
    }

    pub fn stop_bits(&self) -> StopBits {
        self.settings().stop_bits
    }

    pub fn set_stop_bits(&self, stop_bits: StopBits) -> PortResult<()> {
        self.update(|inner| inner.settings.stop_bits = stop_bits)
    }

    pub fn flow_control(&self) -> FlowControl {
        self.settings().flow_control
    }

    pub fn set_flow_control(&self, flow_control: FlowControl) -> PortResult<()> {
        self.update(|inner| inner.settings.flow_control = flow_control)
    }

    pub fn timeout(&self) -> Timeout {
        self.inner.lock().timeout
    }

    pub fn set_timeout(&self, timeout: Timeout) -> PortResult<()> {
        self.update(|inner| inner.timeout = timeout)
    }

    /// Run one backend call against the open handle.
    pub(super) fn with_handle<T>(
        &self,
        op: &'static str,
        call: impl FnOnce(&mut dyn PortHandle) -> PortResult<T>,
    ) -> PortResult<T> {
        let mut inner = self.inner.lock();
        call(inner.handle(op)?)
    }

    /// The timeout policy, or `NotOpen` if the port is closed.
    pub(super) fn open_timeout(&self, op: &'static str) -> PortResult<Timeout> {
        let inner = self.inner.lock();
        if inner.handle.is_none() {
            return Err(PortError::NotOpen(op));
        }
        Ok(inner.timeout)
    }

    /// Wait until all queued output has been transmitted.
    pub fn flush(&self) -> PortResult<()> {
        let _read = self.read_lock.lock();
        let _write = self.write_lock.lock();
        self.with_handle("flush", |h| h.drain())
    }

    /// Discard received bytes that have not been read.
    pub fn flush_input(&self) -> PortResult<()> {
        let _read = self.read_lock.lock();
        self.with_handle("flush_input", |h| h.clear(ClearBuffer::Input))
    }

    /// Discard output that has not been transmitted yet.
    pub fn flush_output(&self) -> PortResult<()> {
        let _write = self.write_lock.lock();
        self.with_handle("flush_output", |h| h.clear(ClearBuffer::Output))
    }

    pub(super) fn modem_status(&self, op: &'static str) -> PortResult<ModemStatus> {
        self.with_handle(op, |h| h.modem_status())
    }

    /// Clear To Send.
    pub fn cts(&self) -> PortResult<bool> {
        Ok(self.modem_status("cts")?.cts)
    }

    /// Data Set Ready.
    pub fn dsr(&self) -> PortResult<bool> {
        Ok(self.modem_status("dsr")?.dsr)
    }

    /// Ring Indicator.
    pub fn ri(&self) -> PortResult<bool> {
        Ok(self.modem_status("ri")?.ri)
    }

    /// Carrier Detect.
    pub fn cd(&self) -> PortResult<bool> {
        Ok(self.modem_status("cd")?.cd)
    }

    pub fn set_rts(&self, level: bool) -> PortResult<()> {
        self.with_handle("set_rts", |h| h.set_rts(level))
    }

    pub fn set_dtr(&self, level: bool) -> PortResult<()> {
        self.with_handle("set_dtr", |h| h.set_dtr(level))
    }

    pub fn set_break(&self, level: bool) -> PortResult<()> {
        self.with_handle("set_break", |h| h.set_break(level))
    }

    /// Hold the line in the break condition for `duration`.
    pub fn send_break(&self, duration: Duration) -> PortResult<()> {
        let _write = self.write_lock.lock();
        self.with_handle("send_break", |h| h.set_break(true))?;
        std::thread::sleep(duration);
        self.with_handle("send_break", |h| h.set_break(false))
    }
}

impl Drop for Serial {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if let Err(e) = inner.close() {
            warn!(port = %inner.port, error = %e, "ignoring close failure during teardown");
        }
    }
}

impl std::fmt::Debug for Serial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Serial")
            .field("port", &inner.port)
            .field("open", &inner.handle.is_some())
            .field("settings", &inner.settings)
            .field("timeout", &inner.timeout)
            .finish()
    }
}

/// Builder for [`Serial`], started with [`crate::new`].
#[derive(Debug, Clone)]
pub struct SerialBuilder {
    port: String,
    settings: PortSettings,
    timeout: Timeout,
    driver: Option<Arc<dyn PortDriver>>,
}

impl SerialBuilder {
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            settings: PortSettings {
                baud_rate,
                ..PortSettings::default()
            },
            timeout: Timeout::default(),
            driver: None,
        }
    }

    pub fn byte_size(mut self, byte_size: ByteSize) -> Self {
        self.settings.byte_size = byte_size;
        self
    }

    pub fn parity(mut self, parity: Parity) -> Self {
        self.settings.parity = parity;
        self
    }

    pub fn stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.settings.stop_bits = stop_bits;
        self
    }

    pub fn flow_control(mut self, flow_control: FlowControl) -> Self {
        self.settings.flow_control = flow_control;
        self
    }

    pub fn settings(mut self, settings: PortSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use a backend other than the OS one.
    pub fn driver(mut self, driver: impl PortDriver + 'static) -> Self {
        self.driver = Some(Arc::new(driver));
        self
    }

    /// Create the port, opening it when a port identifier was given.
    pub fn build(self) -> PortResult<Serial> {
        let driver = self.driver.unwrap_or_else(|| Arc::new(SystemDriver));
        Serial::with_driver(driver, self.port, self.settings, self.timeout)
    }
}
