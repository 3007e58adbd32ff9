//! Mock serial backend for testing.
//!
//! [`MockDriver`] hands out handles that share one scripted state: bytes to be
//! "received" (optionally at a future instant), a log of everything written,
//! and counters for opens, closes and reconfigurations. Clone the driver to
//! keep an inspection handle after giving it to a `Serial`.

use super::error::{PortError, PortResult};
use super::settings::PortSettings;
use super::timeout::Timeout;
use super::traits::{ClearBuffer, ModemStatus, PortDriver, PortHandle};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashSet, VecDeque};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Inner state of the mock, shared by the driver and its handles.
#[derive(Debug, Default)]
struct MockState {
    /// Bytes available to read right now.
    read_queue: VecDeque<u8>,
    /// Bytes that become readable at a given instant, in arrival order.
    scheduled: VecDeque<(Instant, Vec<u8>)>,
    /// Every byte accepted by a write.
    written: Vec<u8>,
    /// Remaining bytes the "line" will accept; `None` is unlimited.
    write_capacity: Option<usize>,
    /// Port names that report "no such device".
    missing_ports: HashSet<String>,
    /// Error kind for the next `open`, if it should fail.
    open_failure: Option<io::ErrorKind>,
    fail_reconfigure: bool,
    fail_close: bool,
    disconnected: bool,
    opened_ports: Vec<String>,
    open_count: usize,
    close_count: usize,
    live_handles: usize,
    reconfigurations: Vec<(PortSettings, Timeout)>,
    cleared: Vec<ClearBuffer>,
    drain_count: usize,
    modem: ModemStatus,
    rts: bool,
    dtr: bool,
    break_level: bool,
}

impl MockState {
    /// Move every scheduled chunk whose time has come into the read queue.
    fn promote_due(&mut self, now: Instant) {
        while let Some((at, _)) = self.scheduled.front() {
            if *at > now {
                break;
            }
            if let Some((_, data)) = self.scheduled.pop_front() {
                self.read_queue.extend(data);
            }
        }
    }

    fn next_arrival(&self) -> Option<Instant> {
        self.scheduled.front().map(|(at, _)| *at)
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<MockState>,
    changed: Condvar,
}

/// Scripted driver standing in for the OS serial layer.
///
/// # Example
/// ```
/// use serial_line::port::{MockDriver, Timeout};
///
/// let mock = MockDriver::new();
/// mock.push_read(b"OK\r\n");
///
/// let serial = serial_line::new("MOCK0", 9600)
///     .timeout(Timeout::simple(100))
///     .driver(mock.clone())
///     .build()
///     .unwrap();
///
/// assert_eq!(serial.read_line(64, b"\r\n").unwrap(), "OK\r\n");
/// serial.write(b"ATZ\r").unwrap();
/// assert_eq!(mock.written(), b"ATZ\r");
/// assert_eq!(mock.reconfigure_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    shared: Arc<Shared>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make bytes readable immediately.
    pub fn push_read(&self, data: &[u8]) {
        let mut state = self.shared.state.lock();
        state.read_queue.extend(data);
        self.shared.changed.notify_all();
    }

    /// Make bytes readable `delay` from now.
    pub fn push_read_after(&self, delay: Duration, data: &[u8]) {
        let mut state = self.shared.state.lock();
        let at = Instant::now() + delay;
        let pos = state.scheduled.iter().position(|(t, _)| *t > at);
        match pos {
            Some(i) => state.scheduled.insert(i, (at, data.to_vec())),
            None => state.scheduled.push_back((at, data.to_vec())),
        }
        self.shared.changed.notify_all();
    }

    /// Everything written so far.
    pub fn written(&self) -> Vec<u8> {
        self.shared.state.lock().written.clone()
    }

    /// Everything written so far, clearing the log.
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.shared.state.lock().written)
    }

    /// Limit how many more bytes writes will accept. `None` removes the limit.
    pub fn set_write_capacity(&self, capacity: Option<usize>) {
        self.shared.state.lock().write_capacity = capacity;
        self.shared.changed.notify_all();
    }

    /// Make `open` of this port fail with "no such device".
    pub fn add_missing_port(&self, port: impl Into<String>) {
        self.shared.state.lock().missing_ports.insert(port.into());
    }

    /// Make the next `open` fail with an OS error of the given kind.
    pub fn fail_next_open(&self, kind: io::ErrorKind) {
        self.shared.state.lock().open_failure = Some(kind);
    }

    pub fn set_fail_reconfigure(&self, fail: bool) {
        self.shared.state.lock().fail_reconfigure = fail;
    }

    pub fn set_fail_close(&self, fail: bool) {
        self.shared.state.lock().fail_close = fail;
    }

    /// Simulate the device disappearing: further I/O fails.
    pub fn disconnect(&self) {
        self.shared.state.lock().disconnected = true;
        self.shared.changed.notify_all();
    }

    pub fn set_modem_status(&self, status: ModemStatus) {
        self.shared.state.lock().modem = status;
    }

    pub fn open_count(&self) -> usize {
        self.shared.state.lock().open_count
    }

    pub fn close_count(&self) -> usize {
        self.shared.state.lock().close_count
    }

    /// Whether a handle is currently open.
    pub fn is_open(&self) -> bool {
        self.shared.state.lock().live_handles > 0
    }

    pub fn opened_ports(&self) -> Vec<String> {
        self.shared.state.lock().opened_ports.clone()
    }

    pub fn reconfigure_count(&self) -> usize {
        self.shared.state.lock().reconfigurations.len()
    }

    pub fn last_settings(&self) -> Option<PortSettings> {
        self.shared.state.lock().reconfigurations.last().map(|(s, _)| *s)
    }

    pub fn last_timeout(&self) -> Option<Timeout> {
        self.shared.state.lock().reconfigurations.last().map(|(_, t)| *t)
    }

    pub fn cleared(&self) -> Vec<ClearBuffer> {
        self.shared.state.lock().cleared.clone()
    }

    pub fn drain_count(&self) -> usize {
        self.shared.state.lock().drain_count
    }

    pub fn rts(&self) -> bool {
        self.shared.state.lock().rts
    }

    pub fn dtr(&self) -> bool {
        self.shared.state.lock().dtr
    }

    pub fn break_level(&self) -> bool {
        self.shared.state.lock().break_level
    }

    /// Bytes currently readable without waiting.
    pub fn available_bytes(&self) -> usize {
        let mut state = self.shared.state.lock();
        state.promote_due(Instant::now());
        state.read_queue.len()
    }
}

impl PortDriver for MockDriver {
    fn open(&self, port: &str) -> PortResult<Box<dyn PortHandle>> {
        let mut state = self.shared.state.lock();

        if state.missing_ports.contains(port) {
            return Err(PortError::not_found(port));
        }
        if let Some(kind) = state.open_failure.take() {
            return Err(PortError::io(
                "Unknown error opening the serial port",
                io::Error::from(kind),
            ));
        }

        state.open_count += 1;
        state.live_handles += 1;
        state.opened_ports.push(port.to_string());

        Ok(Box::new(MockHandle {
            shared: Arc::clone(&self.shared),
            name: port.to_string(),
            closed: false,
        }))
    }
}

/// Handle produced by [`MockDriver`].
pub struct MockHandle {
    shared: Arc<Shared>,
    name: String,
    closed: bool,
}

impl MockHandle {
    fn check_usable(&self, state: &MockState) -> PortResult<()> {
        if self.closed {
            return Err(PortError::io(
                "Invalid file descriptor, is the serial port open?",
                io::Error::from(io::ErrorKind::NotConnected),
            ));
        }
        if state.disconnected {
            return Err(PortError::io(
                "device disconnected",
                io::Error::from(io::ErrorKind::BrokenPipe),
            ));
        }
        Ok(())
    }
}

impl PortHandle for MockHandle {
    fn reconfigure(&mut self, settings: &PortSettings, timeout: &Timeout) -> PortResult<()> {
        let mut state = self.shared.state.lock();
        self.check_usable(&state)?;
        settings.validate()?;
        state.reconfigurations.push((*settings, *timeout));
        if state.fail_reconfigure {
            return Err(PortError::io(
                "Error setting serial port settings",
                io::Error::from(io::ErrorKind::PermissionDenied),
            ));
        }
        Ok(())
    }

    fn read_some(&mut self, buf: &mut [u8], wait: Duration) -> PortResult<usize> {
        let deadline = Instant::now() + wait;
        let mut state = self.shared.state.lock();

        loop {
            self.check_usable(&state)?;
            let now = Instant::now();
            state.promote_due(now);

            if !state.read_queue.is_empty() {
                let n = buf.len().min(state.read_queue.len());
                for (slot, byte) in buf.iter_mut().zip(state.read_queue.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }
            if now >= deadline {
                return Ok(0);
            }

            let until = state
                .next_arrival()
                .map_or(deadline, |next| next.min(deadline));
            self.shared.changed.wait_until(&mut state, until);
        }
    }

    fn write_some(&mut self, data: &[u8], wait: Duration) -> PortResult<usize> {
        let deadline = Instant::now() + wait;
        let mut state = self.shared.state.lock();

        loop {
            self.check_usable(&state)?;
            let accepted = match state.write_capacity {
                None => data.len(),
                Some(capacity) => capacity.min(data.len()),
            };

            if accepted > 0 || data.is_empty() {
                state.written.extend_from_slice(&data[..accepted]);
                if let Some(capacity) = state.write_capacity.as_mut() {
                    *capacity -= accepted;
                }
                return Ok(accepted);
            }
            if Instant::now() >= deadline {
                return Ok(0);
            }
            self.shared.changed.wait_until(&mut state, deadline);
        }
    }

    fn bytes_to_read(&mut self) -> PortResult<usize> {
        let mut state = self.shared.state.lock();
        self.check_usable(&state)?;
        state.promote_due(Instant::now());
        Ok(state.read_queue.len())
    }

    fn clear(&mut self, buffer: ClearBuffer) -> PortResult<()> {
        let mut state = self.shared.state.lock();
        self.check_usable(&state)?;
        if matches!(buffer, ClearBuffer::Input | ClearBuffer::All) {
            state.read_queue.clear();
        }
        state.cleared.push(buffer);
        Ok(())
    }

    fn drain(&mut self) -> PortResult<()> {
        let mut state = self.shared.state.lock();
        self.check_usable(&state)?;
        state.drain_count += 1;
        Ok(())
    }

    fn modem_status(&mut self) -> PortResult<ModemStatus> {
        let state = self.shared.state.lock();
        self.check_usable(&state)?;
        Ok(state.modem)
    }

    fn set_rts(&mut self, level: bool) -> PortResult<()> {
        let mut state = self.shared.state.lock();
        self.check_usable(&state)?;
        state.rts = level;
        Ok(())
    }

    fn set_dtr(&mut self, level: bool) -> PortResult<()> {
        let mut state = self.shared.state.lock();
        self.check_usable(&state)?;
        state.dtr = level;
        Ok(())
    }

    fn set_break(&mut self, level: bool) -> PortResult<()> {
        let mut state = self.shared.state.lock();
        self.check_usable(&state)?;
        state.break_level = level;
        Ok(())
    }

    fn close(&mut self) -> PortResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut state = self.shared.state.lock();
        state.close_count += 1;
        state.live_handles -= 1;
        self.shared.changed.notify_all();

        if state.fail_close {
            return Err(PortError::io(
                "Error while closing serial port",
                io::Error::from(io::ErrorKind::Other),
            ));
        }
        Ok(())
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            self.shared.state.lock().live_handles -= 1;
        }
    }
}

impl std::fmt::Debug for MockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockHandle")
            .field("name", &self.name)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(mock: &MockDriver) -> Box<dyn PortHandle> {
        mock.open("MOCK0").unwrap()
    }

    #[test]
    fn test_push_and_read() {
        let mock = MockDriver::new();
        let mut handle = open(&mock);
        mock.push_read(b"Hello");

        let mut buffer = [0u8; 10];
        let n = handle.read_some(&mut buffer, Duration::ZERO).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buffer[..n], b"Hello");
    }

    #[test]
    fn test_partial_read_keeps_rest_queued() {
        let mock = MockDriver::new();
        let mut handle = open(&mock);
        mock.push_read(b"Hello, World!");

        let mut buffer = [0u8; 5];
        let n = handle.read_some(&mut buffer, Duration::ZERO).unwrap();
        assert_eq!(&buffer[..n], b"Hello");
        assert_eq!(mock.available_bytes(), 8);
    }

    #[test]
    fn test_empty_read_waits_then_returns_zero() {
        let mock = MockDriver::new();
        let mut handle = open(&mock);

        let started = Instant::now();
        let mut buffer = [0u8; 4];
        let n = handle.read_some(&mut buffer, Duration::from_millis(30)).unwrap();
        assert_eq!(n, 0);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_scheduled_bytes_arrive_later() {
        let mock = MockDriver::new();
        let mut handle = open(&mock);
        mock.push_read_after(Duration::from_millis(20), b"late");

        let mut buffer = [0u8; 8];
        assert_eq!(handle.read_some(&mut buffer, Duration::ZERO).unwrap(), 0);
        let n = handle.read_some(&mut buffer, Duration::from_millis(500)).unwrap();
        assert_eq!(&buffer[..n], b"late");
    }

    #[test]
    fn test_write_logging_and_capacity() {
        let mock = MockDriver::new();
        let mut handle = open(&mock);
        mock.set_write_capacity(Some(3));

        assert_eq!(handle.write_some(b"Test1", Duration::ZERO).unwrap(), 3);
        assert_eq!(handle.write_some(b"1", Duration::from_millis(10)).unwrap(), 0);
        assert_eq!(mock.written(), b"Tes");
    }

    #[test]
    fn test_missing_port() {
        let mock = MockDriver::new();
        mock.add_missing_port("COM9");
        assert!(matches!(mock.open("COM9"), Err(PortError::NotFound(_))));
        assert_eq!(mock.open_count(), 0);
    }

    #[test]
    fn test_clear_input_discards_queue() {
        let mock = MockDriver::new();
        let mut handle = open(&mock);
        mock.push_read(b"Should be cleared");

        handle.clear(ClearBuffer::Input).unwrap();
        assert_eq!(mock.available_bytes(), 0);
        assert_eq!(mock.cleared(), vec![ClearBuffer::Input]);
    }

    #[test]
    fn test_close_and_drop_track_live_handles() {
        let mock = MockDriver::new();
        let mut first = open(&mock);
        let second = open(&mock);
        assert!(mock.is_open());

        first.close().unwrap();
        assert_eq!(mock.close_count(), 1);
        drop(second);
        assert!(!mock.is_open());
        assert!(first.read_some(&mut [0u8; 1], Duration::ZERO).is_err());
    }

    #[test]
    fn test_disconnect_fails_io() {
        let mock = MockDriver::new();
        let mut handle = open(&mock);
        mock.disconnect();
        assert!(handle.write_some(b"x", Duration::ZERO).is_err());
    }
}
