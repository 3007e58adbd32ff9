//! Check available serial ports on the system.
//!
//! Displays every port the enumeration layer reports, which is useful for
//! picking a `TEST_PORT` for the hardware tests.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example list_ports
//! ```

use serial_line::list_ports;

fn main() {
    println!("Serial Port Detection Utility");
    println!("{:=<70}", "");
    println!();

    let ports = match list_ports() {
        Ok(ports) => ports,
        Err(e) => {
            println!("❌ Error detecting serial ports: {}", e);
            println!();
            println!("Possible causes:");
            println!("  - Insufficient permissions");
            println!("  - Serial port drivers not installed");
            return;
        }
    };

    if ports.is_empty() {
        println!("❌ No serial ports detected on this system");
        println!();
        println!("This could mean:");
        println!("  - No serial devices are connected");
        println!("  - USB-to-serial drivers are not installed");
        println!("  - Insufficient permissions to access serial ports");
        return;
    }

    println!("✅ Found {} serial port(s):", ports.len());
    println!();

    for (idx, port) in ports.iter().enumerate() {
        println!("{}. {}", idx + 1, port.port);
        println!("{:-<70}", "");
        println!("   Description:  {}", port.description);
        println!("   Hardware ID:  {}", port.hardware_id);
        println!();
    }

    println!("{:=<70}", "");
    println!("Hardware Testing Instructions:");
    println!("{:=<70}", "");
    println!();
    println!("  # Linux/macOS:");
    println!("  export TEST_PORT={}", ports[0].port);
    println!("  export TEST_BAUD=9600");
    println!("  export TEST_LOOPBACK=1   # only if TX is wired to RX");
    println!("  cargo test --features hardware-tests -- --ignored");
    println!();
    println!("  # Windows:");
    println!("  set TEST_PORT={}", ports[0].port);
    println!("  cargo test --features hardware-tests -- --ignored");
}
