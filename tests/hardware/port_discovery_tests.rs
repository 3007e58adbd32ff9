//! Port discovery and enumeration tests.
//!
//! These tests don't require specific hardware but will use any available
//! ports on the system. They are still marked as ignored because they require
//! at least some serial hardware to be meaningful.

use crate::hardware::utils::{discover_available_ports, print_available_ports};
use std::collections::HashSet;

#[test]
#[ignore] // Requires hardware
fn test_port_discovery() {
    println!("Testing port discovery...");

    let ports = discover_available_ports();

    if ports.is_empty() {
        println!("⚠️  No ports found - skipping test");
        println!("   This test requires at least one serial port");
        return;
    }

    print_available_ports();
    for port in &ports {
        assert!(!port.port.is_empty());
        assert!(!port.description.is_empty());
        assert!(!port.hardware_id.is_empty());
        assert!(!port.port.contains("LPT"), "parallel port listed: {}", port.port);
    }
}

#[test]
#[ignore]
fn test_port_names_unique() {
    let ports = discover_available_ports();
    let names: HashSet<_> = ports.iter().map(|p| p.port.as_str()).collect();
    assert_eq!(names.len(), ports.len(), "duplicate port names");
}

#[test]
#[ignore]
fn test_configured_port_is_listed() {
    let config = crate::skip_without_hardware!();
    let ports = discover_available_ports();

    // Virtual ports (socat, com0com) may not be enumerated; only report.
    match ports.iter().find(|p| p.port == config.port_name) {
        Some(info) => println!("✅ {} found: {}", info.port, info.hardware_id),
        None => println!("⚠️  {} not listed by the OS", config.port_name),
    }
}
