//! Write a string and read it back on a looped-back port.
//!
//! Each read asks for one byte more than was written, so it always ends on
//! the read timeout. Without a loopback plug the reads come back empty.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example loopback -- /dev/ttyUSB0 115200
//! cargo run --example loopback            # list ports and exit
//! ```

use serial_line::{list_ports, Timeout};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    serial_line::logging::init(&Default::default())?;

    let mut args = std::env::args().skip(1);
    let Some(port) = args.next() else {
        println!("Usage: loopback <port> [baud]");
        println!();
        for info in list_ports()? {
            println!("({}, {}, {})", info.port, info.description, info.hardware_id);
        }
        return Ok(());
    };
    let baud = args.next().map(|b| b.parse()).transpose()?.unwrap_or(9600);

    let serial = serial_line::new(port, baud)
        .timeout(Timeout::simple(1000))
        .build()?;
    println!("Is the serial port open? {}", if serial.is_open() { "Yes." } else { "No." });

    let text = "Testing.";
    for count in 0..10 {
        let written = serial.write_str(text)?;
        let echoed = serial.read_string(text.len() + 1)?;
        println!(
            "Iteration: {count}, Bytes written: {written}, Bytes read: {}, String read: {echoed}",
            echoed.len()
        );
    }
    Ok(())
}
