//! Port-specific error types.
//!
//! Every failure of the port layer is a [`PortError`]. Callers that need to
//! decide whether to retry look at [`PortError::kind`], which folds the
//! variants into the four classes the port API promises. Timeouts are not
//! errors: a read or write that runs out of time returns a short count.

use std::io;
use thiserror::Error;

/// Errors that can occur during serial port operations.
#[derive(Debug, Error)]
pub enum PortError {
    /// A configuration value or argument was rejected before touching hardware.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// `open` was called on a port that is already open.
    #[error("Serial port {0} is already open")]
    AlreadyOpen(String),

    /// An operation that needs an open port was called while closed.
    #[error("{0}: serial port is not open")]
    NotOpen(&'static str),

    /// The specified serial port was not found on the system.
    #[error("Specified port, {0}, does not exist")]
    NotFound(String),

    /// An OS-level I/O failure, with a note on what was being attempted.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

/// Coarse classification of [`PortError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    AlreadyOpen,
    PortNotOpened,
    Io,
}

impl PortError {
    /// Create an InvalidArgument error from a message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a NotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    /// Wrap an I/O error with the operation that produced it.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// The class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::AlreadyOpen(_) => ErrorKind::AlreadyOpen,
            Self::NotOpen(_) => ErrorKind::PortNotOpened,
            Self::NotFound(_) | Self::Io { .. } => ErrorKind::Io,
            Self::Serial(e) => match e.kind() {
                serialport::ErrorKind::InvalidInput => ErrorKind::InvalidArgument,
                _ => ErrorKind::Io,
            },
        }
    }

    /// Map a `serialport` failure, keeping "no such device" distinct.
    pub(crate) fn from_serial(port_name: &str, err: serialport::Error) -> Self {
        match err.kind() {
            serialport::ErrorKind::NoDevice => Self::not_found(port_name),
            serialport::ErrorKind::InvalidInput => Self::invalid(err.to_string()),
            serialport::ErrorKind::Io(kind) if kind == io::ErrorKind::NotFound => {
                Self::not_found(port_name)
            }
            _ => Self::Serial(err),
        }
    }
}

/// Result alias used throughout the port layer.
pub type PortResult<T> = Result<T, PortError>;
