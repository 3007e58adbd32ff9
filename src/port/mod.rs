//! Port abstraction layer for serial communication.
//!
//! [`Serial`] is written once against the [`PortDriver`]/[`PortHandle`]
//! capability traits. [`SystemDriver`] talks to the OS through `serialport`;
//! [`MockDriver`] scripts a line in memory for tests.

pub mod error;
pub mod mock;
pub mod settings;
pub mod system;
pub mod timeout;
pub mod traits;

mod engine;
mod lines;
mod serial;

pub use error::{ErrorKind, PortError, PortResult};
pub use mock::{MockDriver, MockHandle};
pub use serial::{Serial, SerialBuilder};
pub use settings::{ByteSize, FlowControl, Parity, PortSettings, StopBits};
pub use system::{SystemDriver, SystemHandle};
pub use timeout::{InterByte, Timeout};
pub use traits::{ClearBuffer, ModemStatus, PortDriver, PortHandle};
