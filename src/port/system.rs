//! OS serial backend.
//!
//! Wraps the native port types of the `serialport` crate (`TTYPort` on unix,
//! `COMPort` on Windows). Deadlines are enforced by the engine one slice at a
//! time, so the handle only ever sets the per-call wait on the underlying
//! port. Mark and space parity, which `serialport` cannot express, are set
//! directly on the descriptor.

use super::error::{PortError, PortResult};
use super::settings::{Parity, PortSettings};
use super::timeout::Timeout;
use super::traits::{ClearBuffer, ModemStatus, PortDriver, PortHandle};
use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;
use tracing::debug;

#[cfg(unix)]
type NativePort = serialport::TTYPort;
#[cfg(windows)]
type NativePort = serialport::COMPort;

/// Driver that opens real serial devices.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDriver;

impl PortDriver for SystemDriver {
    fn open(&self, port: &str) -> PortResult<Box<dyn PortHandle>> {
        // Line parameters are applied by `reconfigure` right after this.
        let native = serialport::new(port, PortSettings::default().baud_rate)
            .timeout(Duration::ZERO)
            .open_native()
            .map_err(|e| PortError::from_serial(port, e))?;

        Ok(Box::new(SystemHandle {
            port: Some(native),
            name: port.to_string(),
        }))
    }
}

/// Open OS serial port.
pub struct SystemHandle {
    /// `None` once the descriptor has been released.
    port: Option<NativePort>,
    /// The port name/path for identification.
    name: String,
}

impl SystemHandle {
    fn parts(&mut self) -> PortResult<(&mut NativePort, &str)> {
        match self.port.as_mut() {
            Some(port) => Ok((port, &self.name)),
            None => Err(PortError::NotOpen("system handle")),
        }
    }
}

/// Timeouts surface from `serialport` as I/O errors; here they mean "nothing yet".
fn is_elapsed(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Parity as far as `serialport` understands it.
///
/// Mark and space share the polarity bit of odd and even; the sticky bit on
/// top is applied by [`apply_sticky_parity`].
fn base_parity(parity: Parity) -> serialport::Parity {
    match parity {
        Parity::None => serialport::Parity::None,
        Parity::Odd | Parity::Mark => serialport::Parity::Odd,
        Parity::Even | Parity::Space => serialport::Parity::Even,
    }
}

/// Set or clear `CMSPAR`. Must run after `set_parity`, which leaves it alone.
#[cfg(any(target_os = "linux", target_os = "android"))]
fn apply_sticky_parity(port: &NativePort, parity: Parity) -> PortResult<()> {
    use std::mem::MaybeUninit;
    use std::os::unix::io::AsRawFd;

    let fd = port.as_raw_fd();
    let mut termios = MaybeUninit::<libc::termios>::uninit();
    // SAFETY: `fd` is the open tty owned by `port`; `tcgetattr` fills the
    // struct when it returns 0.
    let mut termios = unsafe {
        if libc::tcgetattr(fd, termios.as_mut_ptr()) != 0 {
            return Err(PortError::io(
                "Error while reading the terminal attributes",
                io::Error::last_os_error(),
            ));
        }
        termios.assume_init()
    };

    termios.c_cflag &= !libc::CMSPAR;
    if matches!(parity, Parity::Mark | Parity::Space) {
        termios.c_cflag |= libc::PARENB | libc::CMSPAR;
    }

    // SAFETY: same descriptor, fully initialised attributes.
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &termios) } != 0 {
        return Err(PortError::io(
            "Error while setting mark/space parity",
            io::Error::last_os_error(),
        ));
    }
    Ok(())
}

#[cfg(all(unix, not(any(target_os = "linux", target_os = "android"))))]
fn apply_sticky_parity(_port: &NativePort, parity: Parity) -> PortResult<()> {
    match parity {
        Parity::Mark | Parity::Space => Err(PortError::invalid(format!(
            "{parity:?} parity is not supported on this platform"
        ))),
        _ => Ok(()),
    }
}

/// Overwrite the DCB parity for mark/space. Other modes were already set by
/// `set_parity`.
#[cfg(windows)]
fn apply_sticky_parity(port: &NativePort, parity: Parity) -> PortResult<()> {
    use std::os::windows::io::AsRawHandle;
    use winapi::um::commapi::{GetCommState, SetCommState};
    use winapi::um::winbase::{DCB, MARKPARITY, SPACEPARITY};
    use winapi::um::winnt::HANDLE;

    let code = match parity {
        Parity::Mark => MARKPARITY,
        Parity::Space => SPACEPARITY,
        _ => return Ok(()),
    };

    let handle = port.as_raw_handle() as HANDLE;
    // SAFETY: DCB is plain data; `handle` is the open COM handle owned by
    // `port` for the duration of both calls.
    unsafe {
        let mut dcb: DCB = std::mem::zeroed();
        dcb.DCBlength = std::mem::size_of::<DCB>() as u32;
        if GetCommState(handle, &mut dcb) == 0 {
            return Err(PortError::io(
                "Error while reading the COM state",
                io::Error::last_os_error(),
            ));
        }
        dcb.Parity = code as u8;
        dcb.set_fParity(1);
        if SetCommState(handle, &mut dcb) == 0 {
            return Err(PortError::io(
                "Error while setting mark/space parity",
                io::Error::last_os_error(),
            ));
        }
    }
    Ok(())
}

/// Close the descriptor ourselves so a failure can be reported.
#[cfg(unix)]
fn release(port: NativePort) -> io::Result<()> {
    use std::os::unix::io::IntoRawFd;

    let fd = port.into_raw_fd();
    // SAFETY: `into_raw_fd` handed over sole ownership of `fd`.
    if unsafe { libc::close(fd) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(windows)]
fn release(port: NativePort) -> io::Result<()> {
    use std::os::windows::io::IntoRawHandle;
    use winapi::um::handleapi::CloseHandle;

    let handle = port.into_raw_handle();
    // SAFETY: `into_raw_handle` handed over sole ownership of `handle`.
    if unsafe { CloseHandle(handle as _) } == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

impl PortHandle for SystemHandle {
    fn reconfigure(&mut self, settings: &PortSettings, timeout: &Timeout) -> PortResult<()> {
        settings.validate()?;
        let (port, name) = self.parts()?;
        let serial_err = |e: serialport::Error| PortError::from_serial(name, e);

        port.set_data_bits(settings.byte_size.into())
            .map_err(serial_err)?;
        port.set_parity(base_parity(settings.parity))
            .map_err(serial_err)?;
        apply_sticky_parity(port, settings.parity)?;
        port.set_stop_bits(settings.stop_bits.into())
            .map_err(serial_err)?;
        port.set_flow_control(settings.flow_control.into())
            .map_err(serial_err)?;
        // Last, so the speed is written on top of every other attribute.
        port.set_baud_rate(settings.baud_rate).map_err(serial_err)?;

        debug!(port = %name, %settings, inter_byte = %timeout.inter_byte, "applied line settings");
        Ok(())
    }

    fn read_some(&mut self, buf: &mut [u8], wait: Duration) -> PortResult<usize> {
        let (port, name) = self.parts()?;
        port.set_timeout(wait)
            .map_err(|e| PortError::from_serial(name, e))?;
        match port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if is_elapsed(&e) => Ok(0),
            Err(e) => Err(PortError::io("Error while reading from the serial port", e)),
        }
    }

    fn write_some(&mut self, data: &[u8], wait: Duration) -> PortResult<usize> {
        let (port, name) = self.parts()?;
        port.set_timeout(wait)
            .map_err(|e| PortError::from_serial(name, e))?;
        match port.write(data) {
            Ok(n) => Ok(n),
            Err(e) if is_elapsed(&e) => Ok(0),
            Err(e) => Err(PortError::io("Error while writing to the serial port", e)),
        }
    }

    fn bytes_to_read(&mut self) -> PortResult<usize> {
        let (port, name) = self.parts()?;
        port.bytes_to_read()
            .map(|n| n as usize)
            .map_err(|e| PortError::from_serial(name, e))
    }

    fn clear(&mut self, buffer: ClearBuffer) -> PortResult<()> {
        let (port, name) = self.parts()?;
        port.clear(buffer.into())
            .map_err(|e| PortError::from_serial(name, e))
    }

    fn drain(&mut self) -> PortResult<()> {
        let (port, _) = self.parts()?;
        port.flush()
            .map_err(|e| PortError::io("Error while flushing the serial port", e))
    }

    fn modem_status(&mut self) -> PortResult<ModemStatus> {
        let (port, name) = self.parts()?;
        let serial_err = |e: serialport::Error| PortError::from_serial(name, e);
        let cts = port.read_clear_to_send().map_err(serial_err)?;
        let dsr = port.read_data_set_ready().map_err(serial_err)?;
        let ri = port.read_ring_indicator().map_err(serial_err)?;
        let cd = port.read_carrier_detect().map_err(serial_err)?;
        Ok(ModemStatus { cts, dsr, ri, cd })
    }

    fn set_rts(&mut self, level: bool) -> PortResult<()> {
        let (port, name) = self.parts()?;
        port.write_request_to_send(level)
            .map_err(|e| PortError::from_serial(name, e))
    }

    fn set_dtr(&mut self, level: bool) -> PortResult<()> {
        let (port, name) = self.parts()?;
        port.write_data_terminal_ready(level)
            .map_err(|e| PortError::from_serial(name, e))
    }

    fn set_break(&mut self, level: bool) -> PortResult<()> {
        let (port, name) = self.parts()?;
        let result = if level {
            port.set_break()
        } else {
            port.clear_break()
        };
        result.map_err(|e| PortError::from_serial(name, e))
    }

    fn close(&mut self) -> PortResult<()> {
        // No drain here: with flow control held off it would never return.
        let Some(port) = self.port.take() else {
            return Ok(());
        };
        release(port).map_err(|e| PortError::io("Error while closing serial port", e))?;
        debug!(port = %self.name, "descriptor released");
        Ok(())
    }
}

impl std::fmt::Debug for SystemHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemHandle")
            .field("name", &self.name)
            .field("open", &self.port.is_some())
            .field(
                "baud_rate",
                &self.port.as_ref().and_then(|port| port.baud_rate().ok()),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::ErrorKind;

    #[test]
    fn test_port_not_found_error() {
        let result = SystemDriver.open("/dev/nonexistent_port_12345");

        match result {
            Err(PortError::NotFound(name)) => assert!(name.contains("nonexistent")),
            Err(e) => panic!("Expected NotFound error, got: {:?}", e),
            Ok(_) => panic!("Expected NotFound error, got an open handle"),
        }
    }

    #[test]
    fn test_elapsed_kinds() {
        assert!(is_elapsed(&io::Error::from(io::ErrorKind::TimedOut)));
        assert!(is_elapsed(&io::Error::from(io::ErrorKind::WouldBlock)));
        assert!(!is_elapsed(&io::Error::from(io::ErrorKind::BrokenPipe)));
    }

    #[test]
    fn test_sticky_parity_keeps_polarity_bit() {
        assert_eq!(base_parity(Parity::Mark), serialport::Parity::Odd);
        assert_eq!(base_parity(Parity::Space), serialport::Parity::Even);
        assert_eq!(base_parity(Parity::None), serialport::Parity::None);
    }

    #[cfg(unix)]
    #[test]
    fn test_close_releases_descriptor_once() {
        let (_master, slave) = serialport::TTYPort::pair().expect("pty pair");
        let name = slave.name().expect("pty name");
        drop(slave);

        let mut handle = SystemDriver.open(&name).expect("open pty");
        handle.close().unwrap();
        handle.close().unwrap();
        let err = handle.bytes_to_read().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PortNotOpened);
    }
}
