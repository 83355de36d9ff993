//! PAICORE UART configuration library
//!
//! Encodes the PAICORE chip configuration frame, sends it over a serial
//! link and verifies that the chip echoes every round back unchanged.

pub mod cli;
pub mod core;
pub mod domain;
pub mod infrastructure;

pub use domain::error::{FrameError, PaiCoreError, PaiCoreResult};
pub use domain::config::PaiCoreConfig;
pub use core::frame::{CommandFrame, ConfigurationFrame, TelemetryFrame};
pub use core::exchange::{
    Connector, ExchangeCoordinator, ExchangeEvent, ExchangeSession, ExchangeSettings, Outcome,
    SessionReport, Transport,
};
