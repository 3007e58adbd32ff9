//! Line segmentation on top of the single-byte read.
//!
//! Every byte is fetched with its own read deadline, so a line ends either at
//! the end-of-line marker, at the size cap, or at the first byte that fails to
//! arrive in time. The read lock is held for the whole call.

use super::error::{PortError, PortResult};
use super::serial::Serial;

fn checked_eol(eol: &[u8]) -> PortResult<&[u8]> {
    if eol.is_empty() {
        return Err(PortError::invalid("End-of-line marker must not be empty."));
    }
    Ok(eol)
}

fn into_text(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

impl Serial {
    /// Read one line of at most `max_size` bytes.
    ///
    /// The returned line includes `eol` when it was found. A line cut short by
    /// a timeout or by `max_size` is returned as-is.
    ///
    /// ```
    /// use serial_line::port::{MockDriver, Timeout};
    ///
    /// let mock = MockDriver::new();
    /// mock.push_read(b"abc\ndef");
    /// let serial = serial_line::new("MOCK0", 115_200)
    ///     .timeout(Timeout::simple(10))
    ///     .driver(mock)
    ///     .build()?;
    ///
    /// assert_eq!(serial.read_line(20, "\n")?, "abc\n");
    /// # Ok::<(), serial_line::port::PortError>(())
    /// ```
    pub fn read_line(&self, max_size: usize, eol: impl AsRef<[u8]>) -> PortResult<String> {
        let mut line = Vec::new();
        self.read_line_into(&mut line, max_size, eol)?;
        Ok(into_text(line))
    }

    /// Like [`Serial::read_line`], appending raw bytes to `out`.
    ///
    /// Returns the number of bytes appended.
    pub fn read_line_into(
        &self,
        out: &mut Vec<u8>,
        max_size: usize,
        eol: impl AsRef<[u8]>,
    ) -> PortResult<usize> {
        let eol = checked_eol(eol.as_ref())?;
        let _read = self.read_lock.lock();
        self.open_timeout("read_line")?;

        let start = out.len();
        while out.len() - start < max_size {
            if !self.read_byte_into(out)? {
                break;
            }
            if out[start..].ends_with(eol) {
                break;
            }
        }
        Ok(out.len() - start)
    }

    /// Read lines until a byte times out or `max_size` bytes were consumed.
    ///
    /// Complete lines keep their `eol`; a trailing partial line is returned
    /// last without one.
    pub fn read_lines(&self, max_size: usize, eol: impl AsRef<[u8]>) -> PortResult<Vec<String>> {
        let eol = checked_eol(eol.as_ref())?;
        let _read = self.read_lock.lock();
        self.open_timeout("read_lines")?;

        let mut lines = Vec::new();
        let mut current = Vec::new();
        let mut consumed = 0;
        while consumed < max_size {
            if !self.read_byte_into(&mut current)? {
                break;
            }
            consumed += 1;
            if current.ends_with(eol) {
                lines.push(into_text(std::mem::take(&mut current)));
            }
        }
        if !current.is_empty() {
            lines.push(into_text(current));
        }
        Ok(lines)
    }

    /// Pull one byte into `out`; `false` once the per-byte deadline passes.
    fn read_byte_into(&self, out: &mut Vec<u8>) -> PortResult<bool> {
        let mut byte = [0u8; 1];
        if self.read_locked(&mut byte)? == 0 {
            return Ok(false);
        }
        out.push(byte[0]);
        Ok(true)
    }
}
