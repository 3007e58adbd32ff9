//! Serial port enumeration.
//!
//! Thin layer over `serialport::available_ports` that drops parallel ports
//! and flattens each entry into a [`PortInfo`].

use crate::port::{PortError, PortResult};
use serde::Serialize;
use serialport::{SerialPortInfo, SerialPortType, UsbPortInfo};
use tracing::{debug, info};

/// Port names containing this are parallel ports, not serial ones.
const PARALLEL_PORT_MARKER: &str = "LPT";

/// One enumerated serial port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortInfo {
    /// Identifier to pass to `open`, e.g. `/dev/ttyUSB0` or `COM3`.
    pub port: String,
    /// Human readable name, or `n/a` when the OS reports none.
    pub description: String,
    /// Bus-specific identifier, e.g. `USB VID:PID=0403:6001 SER=A50285BI`.
    pub hardware_id: String,
}

/// List the serial ports currently known to the OS.
pub fn list_ports() -> PortResult<Vec<PortInfo>> {
    let ports = serialport::available_ports().map_err(PortError::Serial)?;
    let found = collect_ports(ports);
    info!(count = found.len(), "enumerated serial ports");
    Ok(found)
}

/// Filter and convert raw enumeration results, keeping OS order.
pub fn collect_ports(ports: Vec<SerialPortInfo>) -> Vec<PortInfo> {
    ports
        .into_iter()
        .filter(|p| {
            let parallel = p.port_name.contains(PARALLEL_PORT_MARKER);
            if parallel {
                debug!(port = %p.port_name, "skipping parallel port");
            }
            !parallel
        })
        .map(PortInfo::from)
        .collect()
}

fn usb_description(usb: &UsbPortInfo) -> String {
    usb.product
        .clone()
        .or_else(|| usb.manufacturer.clone())
        .unwrap_or_else(|| "USB Serial Device".to_string())
}

fn usb_hardware_id(usb: &UsbPortInfo) -> String {
    let mut id = format!("USB VID:PID={:04X}:{:04X}", usb.vid, usb.pid);
    if let Some(serial) = &usb.serial_number {
        id.push_str(" SER=");
        id.push_str(serial);
    }
    id
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (description, hardware_id) = match &info.port_type {
            SerialPortType::UsbPort(usb) => (usb_description(usb), usb_hardware_id(usb)),
            SerialPortType::PciPort => ("PCI Serial Port".to_string(), "PCI".to_string()),
            SerialPortType::BluetoothPort => {
                ("Bluetooth Serial Port".to_string(), "BLUETOOTH".to_string())
            }
            SerialPortType::Unknown => ("n/a".to_string(), "n/a".to_string()),
        };

        Self {
            port: info.port_name,
            description,
            hardware_id,
        }
    }
}
