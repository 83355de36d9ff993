// Serial module - serialport-backed transport
pub mod client;

pub use client::{available_ports, SerialConnector, SerialTransport};
