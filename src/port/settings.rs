//! Line parameters for a serial port.
//!
//! Every field of [`PortSettings`] is a closed enumeration except the baud
//! rate, so out-of-range values cannot be constructed; the `TryFrom`
//! conversions are where raw numbers from config files or CLIs are checked.

use super::error::{PortError, PortResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Configuration parameters for a serial port line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSettings {
    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Number of data bits (5, 6, 7, or 8).
    pub byte_size: ByteSize,

    /// Parity checking mode.
    pub parity: Parity,

    /// Number of stop bits.
    pub stop_bits: StopBits,

    /// Flow control mode.
    pub flow_control: FlowControl,
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            byte_size: ByteSize::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
        }
    }
}

impl PortSettings {
    /// Check the parameters that the type system cannot.
    pub fn validate(&self) -> PortResult<()> {
        validate_baud_rate(self.baud_rate)
    }

    /// Number of bits on the wire for one character, start bit included.
    ///
    /// Returned in half-bits so that 1.5 stop bits stays exact.
    fn frame_half_bits(&self) -> u64 {
        let data = u64::from(self.byte_size.bits());
        let parity = if self.parity == Parity::None { 0 } else { 1 };
        2 * (1 + data + parity) + self.stop_bits.half_bits()
    }

    /// Time needed to transmit one character at the current settings.
    pub fn byte_time(&self) -> Duration {
        if self.baud_rate == 0 {
            return Duration::ZERO;
        }
        let nanos = self.frame_half_bits() * 1_000_000_000 / (2 * u64::from(self.baud_rate));
        Duration::from_nanos(nanos)
    }
}

impl fmt::Display for PortSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}{}{} flow={:?}",
            self.baud_rate,
            self.byte_size.bits(),
            self.parity.letter(),
            self.stop_bits,
            self.flow_control
        )
    }
}

pub(crate) fn validate_baud_rate(baud_rate: u32) -> PortResult<()> {
    if baud_rate == 0 {
        return Err(PortError::invalid("baud rate must be greater than zero"));
    }
    Ok(())
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ByteSize {
    Five,
    Six,
    Seven,
    Eight,
}

impl ByteSize {
    pub fn bits(self) -> u8 {
        match self {
            ByteSize::Five => 5,
            ByteSize::Six => 6,
            ByteSize::Seven => 7,
            ByteSize::Eight => 8,
        }
    }
}

impl TryFrom<u8> for ByteSize {
    type Error = PortError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            5 => Ok(ByteSize::Five),
            6 => Ok(ByteSize::Six),
            7 => Ok(ByteSize::Seven),
            8 => Ok(ByteSize::Eight),
            other => Err(PortError::invalid(format!("invalid char len: {other}"))),
        }
    }
}

impl From<ByteSize> for u8 {
    fn from(size: ByteSize) -> Self {
        size.bits()
    }
}

impl From<ByteSize> for serialport::DataBits {
    fn from(bits: ByteSize) -> Self {
        match bits {
            ByteSize::Five => serialport::DataBits::Five,
            ByteSize::Six => serialport::DataBits::Six,
            ByteSize::Seven => serialport::DataBits::Seven,
            ByteSize::Eight => serialport::DataBits::Eight,
        }
    }
}

/// Parity checking modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Odd,
    Even,
    Mark,
    Space,
}

impl Parity {
    fn letter(self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
            Parity::Mark => 'M',
            Parity::Space => 'S',
        }
    }
}

impl std::str::FromStr for Parity {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "n" => Ok(Parity::None),
            "odd" | "o" => Ok(Parity::Odd),
            "even" | "e" => Ok(Parity::Even),
            "mark" | "m" => Ok(Parity::Mark),
            "space" | "s" => Ok(Parity::Space),
            other => Err(PortError::invalid(format!("invalid parity: {other}"))),
        }
    }
}

impl TryFrom<Parity> for serialport::Parity {
    type Error = PortError;

    fn try_from(parity: Parity) -> Result<Self, Self::Error> {
        match parity {
            Parity::None => Ok(serialport::Parity::None),
            Parity::Odd => Ok(serialport::Parity::Odd),
            Parity::Even => Ok(serialport::Parity::Even),
            Parity::Mark | Parity::Space => Err(PortError::invalid(format!(
                "{parity:?} parity is not supported by the system backend"
            ))),
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub enum StopBits {
    One,
    OnePointFive,
    Two,
}

impl StopBits {
    fn half_bits(self) -> u64 {
        match self {
            StopBits::One => 2,
            StopBits::OnePointFive => 3,
            StopBits::Two => 4,
        }
    }
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopBits::One => f.write_str("1"),
            StopBits::OnePointFive => f.write_str("1.5"),
            StopBits::Two => f.write_str("2"),
        }
    }
}

impl TryFrom<f32> for StopBits {
    type Error = PortError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        if value == 1.0 {
            Ok(StopBits::One)
        } else if value == 1.5 {
            Ok(StopBits::OnePointFive)
        } else if value == 2.0 {
            Ok(StopBits::Two)
        } else {
            Err(PortError::invalid(format!("invalid stop bit: {value}")))
        }
    }
}

impl From<StopBits> for f32 {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => 1.0,
            StopBits::OnePointFive => 1.5,
            StopBits::Two => 2.0,
        }
    }
}

/// POSIX has no 1.5 stop bit setting; like termios, treat it as two.
impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::OnePointFive | StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// Flow control modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl std::str::FromStr for FlowControl {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(FlowControl::None),
            "software" | "xonxoff" => Ok(FlowControl::Software),
            "hardware" | "rtscts" => Ok(FlowControl::Hardware),
            other => Err(PortError::invalid(format!("invalid flow control: {other}"))),
        }
    }
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Software => serialport::FlowControl::Software,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
        }
    }
}
