//! Tests requiring actual serial hardware.
//!
//! These tests are skipped if no hardware is available.
//!
//! # Running Hardware Tests
//!
//! ```bash
//! # Set environment variables
//! export TEST_PORT=COM3                  # or /dev/ttyUSB0 on Linux
//! export TEST_BAUD=9600                  # optional, default: 115200
//! export TEST_LOOPBACK=1                 # if port has TX-RX loopback
//!
//! # Run tests
//! cargo test --features hardware-tests -- --ignored
//! ```
//!
//! # Hardware Requirements
//!
//! - **Real port tests**: Any available serial port
//! - **Loopback tests**: Port with TX and RX connected together

use crate::hardware::utils::TimingHelper;
use crate::{skip_without_hardware, skip_without_loopback};
use serial_line::{ErrorKind, Parity, Timeout};
use std::time::Duration;

#[test]
#[ignore] // Run with --ignored flag
fn test_real_port_open_close() {
    let config = skip_without_hardware!();
    println!("Testing port: {} at {} baud", config.port_name, config.baud_rate);

    let serial = config.open(Timeout::simple(1000));
    assert!(serial.is_open());
    assert_eq!(serial.port_name(), config.port_name);

    assert_eq!(serial.open().unwrap_err().kind(), ErrorKind::AlreadyOpen);
    serial.close().expect("close");
    assert!(!serial.is_open());
    serial.open().expect("reopen");

    println!("✅ Port open/close test passed");
}

#[test]
#[ignore]
fn test_real_port_reconfigure_while_open() {
    let config = skip_without_hardware!();
    let serial = config.open(Timeout::simple(100));

    serial.set_baud_rate(19_200).expect("set baud");
    serial.set_parity(Parity::Even).expect("set parity");
    assert_eq!(serial.baud_rate(), 19_200);
    assert!(serial.is_open());

    println!("✅ Reconfigure test passed");
}

#[test]
#[ignore]
fn test_real_port_read_timeout() {
    let config = skip_without_hardware!();
    let serial = config.open(Timeout::simple(500));
    serial.flush_input().expect("flush input");

    let timer = TimingHelper::new("silent read");
    let mut buffer = [0u8; 64];
    let n = serial.read(&mut buffer).expect("read");
    let elapsed = timer.finish();

    // A silent line must give a short read after roughly the constant.
    if n < buffer.len() {
        assert!(elapsed >= Duration::from_millis(450), "returned after {elapsed:?}");
    }
}

#[test]
#[ignore]
fn test_real_port_loopback_communication() {
    let config = skip_without_loopback!();
    println!("Testing loopback on: {} at {} baud", config.port_name, config.baud_rate);

    let serial = config.open(Timeout::simple(1000));
    serial.flush_input().expect("Failed to clear input");

    let test_data = "LOOPBACK TEST\r\n";
    let written = serial.write_str(test_data).expect("Failed to write to port");
    assert_eq!(written, test_data.len());
    println!("✅ Wrote {} bytes", written);

    let line = serial.read_line(256, "\r\n").expect("Failed to read from port");
    println!("✅ Read {} bytes", line.len());
    assert_eq!(line, test_data, "Loopback data should match written data");

    println!("✅ Loopback test passed");
}

#[test]
#[ignore]
fn test_real_port_loopback_short_read() {
    let config = skip_without_loopback!();
    let serial = config.open(Timeout::simple(1000));
    serial.flush_input().expect("Failed to clear input");

    // Ask for one byte more than was sent: the timeout ends the read.
    let text = "Testing.";
    serial.write_str(text).expect("write");
    let echoed = serial.read_string(text.len() + 1).expect("read");
    assert_eq!(echoed, text);
}
