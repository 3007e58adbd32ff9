//! Deadline-bounded reads and writes.
//!
//! Each call computes its overall deadline once from the [`Timeout`](super::Timeout) policy
//! and then talks to the handle in slices of at most [`IO_SLICE`]. A slice
//! never outlives the overall deadline or, for reads, the inter-byte
//! deadline. Running out of time is reported through the returned count.

use super::error::{PortError, PortResult};
use super::serial::Serial;
use super::timeout::Deadline;
use std::io;
use std::time::Duration;
use tracing::trace;

/// Longest single backend call; bounds how long `inner` is held.
pub(crate) const IO_SLICE: Duration = Duration::from_millis(20);

/// Sleep between status polls in the `wait_*` helpers.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

impl Serial {
    /// Read up to `buf.len()` bytes, bounded by the read timeout.
    ///
    /// Returns fewer bytes than requested when the overall or inter-byte
    /// deadline elapses; that is not an error.
    pub fn read(&self, buf: &mut [u8]) -> PortResult<usize> {
        let _read = self.read_lock.lock();
        self.read_locked(buf)
    }

    /// Read up to `size` bytes into a new vector.
    pub fn read_to_vec(&self, size: usize) -> PortResult<Vec<u8>> {
        let mut out = Vec::new();
        self.read_into(&mut out, size)?;
        Ok(out)
    }

    /// Read up to `size` bytes, appending them to `out`.
    pub fn read_into(&self, out: &mut Vec<u8>, size: usize) -> PortResult<usize> {
        out.try_reserve(size)
            .map_err(|_| PortError::invalid(format!("Cannot buffer a read of {size} bytes.")))?;
        let start = out.len();
        out.resize(start + size, 0);
        let result = self.read(&mut out[start..]);
        let n = *result.as_ref().unwrap_or(&0);
        out.truncate(start + n);
        result
    }

    /// Read up to `size` bytes as text, replacing invalid UTF-8.
    pub fn read_string(&self, size: usize) -> PortResult<String> {
        let bytes = self.read_to_vec(size)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// The read loop proper; the caller holds `read_lock`.
    pub(super) fn read_locked(&self, buf: &mut [u8]) -> PortResult<usize> {
        let timeout = self.open_timeout("read")?;
        let size = buf.len();
        if size == 0 {
            return Ok(0);
        }

        let overall = Deadline::after(timeout.read_budget(size));
        let gap = timeout.inter_byte.as_duration();
        let mut inter_byte: Option<Deadline> = None;
        let mut total = 0;

        loop {
            let mut wait = overall.remaining().min(IO_SLICE);
            if let Some(deadline) = &inter_byte {
                wait = wait.min(deadline.remaining());
            }

            let n = self.with_handle("read", |h| h.read_some(&mut buf[total..], wait))?;
            if n > 0 {
                total += n;
                if let Some(gap) = gap {
                    inter_byte = Some(Deadline::after(gap));
                }
            }

            if total == size || overall.expired() {
                break;
            }
            if inter_byte.is_some_and(|deadline| deadline.expired()) {
                break;
            }
        }

        if total < size {
            trace!(requested = size, received = total, "short read");
        }
        Ok(total)
    }

    /// Write `data`, bounded by the write timeout.
    ///
    /// Returns how many bytes were accepted before the deadline.
    pub fn write(&self, data: &[u8]) -> PortResult<usize> {
        let _write = self.write_lock.lock();
        let timeout = self.open_timeout("write")?;
        if data.is_empty() {
            return Ok(0);
        }

        let overall = Deadline::after(timeout.write_budget(data.len()));
        let mut total = 0;

        loop {
            let wait = overall.remaining().min(IO_SLICE);
            total += self.with_handle("write", |h| h.write_some(&data[total..], wait))?;

            if total == data.len() || overall.expired() {
                break;
            }
        }

        if total < data.len() {
            trace!(requested = data.len(), written = total, "short write");
        }
        Ok(total)
    }

    pub fn write_str(&self, data: &str) -> PortResult<usize> {
        self.write(data.as_bytes())
    }

    /// Bytes received by the OS and not yet read.
    pub fn available(&self) -> PortResult<usize> {
        self.with_handle("available", |h| h.bytes_to_read())
    }

    /// Block until data is available or `timeout` elapses.
    pub fn wait_readable(&self, timeout: Duration) -> PortResult<bool> {
        let _read = self.read_lock.lock();
        let deadline = Deadline::after(timeout);
        loop {
            if self.with_handle("wait_readable", |h| h.bytes_to_read())? > 0 {
                return Ok(true);
            }
            if deadline.expired() {
                return Ok(false);
            }
            std::thread::sleep(deadline.remaining().min(POLL_INTERVAL));
        }
    }

    /// Sleep for the time it takes to transmit `count` characters.
    pub fn wait_byte_times(&self, count: usize) {
        let frames = u32::try_from(count).unwrap_or(u32::MAX);
        std::thread::sleep(self.settings().byte_time().saturating_mul(frames));
    }

    /// Block until CTS, DSR, RI or CD changes.
    ///
    /// Returns `false` if the port is closed while waiting.
    pub fn wait_for_change(&self) -> PortResult<bool> {
        let initial = self.modem_status("wait_for_change")?;
        loop {
            std::thread::sleep(POLL_INTERVAL);
            match self.modem_status("wait_for_change") {
                Ok(status) if status != initial => return Ok(true),
                Ok(_) => {}
                Err(PortError::NotOpen(_)) => return Ok(false),
                Err(e) => return Err(e),
            }
        }
    }
}

impl From<PortError> for io::Error {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Io { context, source } => {
                io::Error::new(source.kind(), format!("{context}: {source}"))
            }
            PortError::InvalidArgument(_) => io::Error::new(io::ErrorKind::InvalidInput, err),
            PortError::NotFound(_) => io::Error::new(io::ErrorKind::NotFound, err),
            PortError::NotOpen(_) => io::Error::new(io::ErrorKind::NotConnected, err),
            other => io::Error::other(other),
        }
    }
}

/// `std::io` view of the port. A read that times out with nothing received
/// is reported as `TimedOut` rather than `Ok(0)`, which would mean EOF.
impl io::Read for &Serial {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match Serial::read(*self, buf)? {
            0 if !buf.is_empty() => Err(io::ErrorKind::TimedOut.into()),
            n => Ok(n),
        }
    }
}

impl io::Write for &Serial {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match Serial::write(*self, buf)? {
            0 if !buf.is_empty() => Err(io::ErrorKind::TimedOut.into()),
            n => Ok(n),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(Serial::flush(*self)?)
    }
}

impl io::Read for Serial {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut port: &Serial = self;
        io::Read::read(&mut port, buf)
    }
}

impl io::Write for Serial {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut port: &Serial = self;
        io::Write::write(&mut port, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut port: &Serial = self;
        io::Write::flush(&mut port)
    }
}
