use clap::{Parser, Subcommand};
use serial_line::config::{Config, ConfigLoader};
use serial_line::{list_ports, Serial, Timeout};
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Enumerate serial ports and exercise them with timeout-bounded I/O.",
    long_about = "Lists the serial ports present on this machine, runs a write/read loopback check, or prints received lines. Unset options fall back to the configuration file."
)]
struct Args {
    /// Configuration file to use instead of the standard locations.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List available serial ports.
    List {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Write text and read it back; TX must be wired to RX.
    Loopback {
        /// Port to open; defaults to `[port] name` from the config.
        port: Option<String>,
        #[arg(short, long)]
        baud: Option<u32>,
        #[arg(short, long, default_value = "Testing.")]
        text: String,
        #[arg(short = 'n', long, default_value_t = 10)]
        iterations: u32,
    },
    /// Print lines as they arrive.
    Monitor {
        /// Port to open; defaults to `[port] name` from the config.
        port: Option<String>,
        #[arg(short, long)]
        baud: Option<u32>,
        /// End-of-line marker; `\r` and `\n` escapes are understood.
        #[arg(short, long, default_value = "\\n")]
        eol: String,
        /// Bytes to consume per batch of lines.
        #[arg(short, long, default_value_t = 4096)]
        max: usize,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let loader = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    let config = loader.into_config();
    serial_line::logging::init(&config.logging)?;

    match args.command {
        Command::List { json } => run_list(json),
        Command::Loopback {
            port,
            baud,
            text,
            iterations,
        } => run_loopback(&config, port, baud, &text, iterations),
        Command::Monitor {
            port,
            baud,
            eol,
            max,
        } => run_monitor(&config, port, baud, &eol, max),
    }
}

fn run_list(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let ports = list_ports()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&ports)?);
        return Ok(());
    }
    for info in &ports {
        println!("({}, {}, {})", info.port, info.description, info.hardware_id);
    }
    Ok(())
}

/// Open the port named on the command line or in the config.
fn open_port(
    config: &Config,
    port: Option<String>,
    baud: Option<u32>,
    timeout: Timeout,
) -> Result<Serial, Box<dyn std::error::Error>> {
    let name = port
        .or_else(|| config.port.name.clone())
        .ok_or("no port given and none configured")?;
    let settings = config.port.settings();
    let serial = serial_line::new(name, baud.unwrap_or(settings.baud_rate))
        .byte_size(settings.byte_size)
        .parity(settings.parity)
        .stop_bits(settings.stop_bits)
        .flow_control(settings.flow_control)
        .timeout(timeout)
        .build()?;
    Ok(serial)
}

fn run_loopback(
    config: &Config,
    port: Option<String>,
    baud: Option<u32>,
    text: &str,
    iterations: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let serial = open_port(config, port, baud, Timeout::simple(1000))?;
    println!("Is the serial port open? {}", if serial.is_open() { "Yes." } else { "No." });

    // One byte more than sent, so every read runs into the timeout.
    for count in 0..iterations {
        let written = serial.write_str(text)?;
        let echoed = serial.read_string(text.len() + 1)?;
        println!(
            "Iteration: {count}, Bytes written: {written}, Bytes read: {}, String read: {echoed}",
            echoed.len()
        );
        if echoed != text {
            warn!(iteration = count, sent = text, received = %echoed, "loopback mismatch");
        }
    }
    Ok(())
}

fn unescape(eol: &str) -> String {
    eol.replace("\\r", "\r").replace("\\n", "\n")
}

fn run_monitor(
    config: &Config,
    port: Option<String>,
    baud: Option<u32>,
    eol: &str,
    max: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let serial = open_port(config, port, baud, config.timeout)?;
    let eol = unescape(eol);
    info!(port = %serial.port_name(), settings = %serial.settings(), "monitoring");

    let stdout = std::io::stdout();
    loop {
        for line in serial.read_lines(max, &eol)? {
            let mut out = stdout.lock();
            out.write_all(line.as_bytes())?;
            out.flush()?;
        }
    }
}
