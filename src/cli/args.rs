use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Command line arguments for the PAICORE configuration tool
#[derive(Parser, Debug)]
#[command(
    name = "paicore-uart",
    version = env!("CARGO_PKG_VERSION"),
    about = "Send a PAICORE configuration frame over UART and verify the echo",
    long_about = "Encodes the PAICORE configuration frame, writes it to the chip over a serial \
                  link a configurable number of times and checks that every round is echoed back \
                  byte for byte."
)]
pub struct Args {
    /// Serial port path
    #[arg(short, long)]
    pub port: Option<String>,

    /// Baud rate, decimal or 0x-prefixed hex
    #[arg(short, long, value_parser = parse_baudrate)]
    pub baudrate: Option<u32>,

    /// Number of send/verify rounds
    #[arg(short = 'n', long)]
    pub repeat: Option<u32>,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Echo read timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Delay between rounds in milliseconds
    #[arg(long)]
    pub pacing_ms: Option<u64>,

    /// Set the frame's debug bit and read telemetry after every echo
    #[arg(long)]
    pub debug_mode: bool,

    /// Show the encoded frame and its bit layout without touching the port
    #[arg(long)]
    pub print_frame: bool,

    /// List available serial ports
    #[arg(long)]
    pub list_ports: bool,

    /// Write a default project configuration under DIR
    #[arg(long, value_name = "DIR")]
    pub init_config: Option<PathBuf>,

    /// Append progress lines to FILE
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress logging
    #[arg(short, long)]
    pub quiet: bool,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Accept `9600` as well as `0x2580`
pub fn parse_baudrate(value: &str) -> Result<u32, String> {
    let value = value.trim();
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(digits) => u32::from_str_radix(digits, 16),
        None => value.parse::<u32>(),
    };

    match parsed {
        Ok(0) => Err("baud rate must be greater than zero".to_string()),
        Ok(baud) => Ok(baud),
        Err(_) => Err(format!("'{}' is not a valid baud rate", value)),
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
