// Frame module - PAICORE UART frame codec
pub mod command;
pub mod layout;
pub mod telemetry;

pub use command::{format_bytes, CommandFrame, ConfigurationFrame, PllSettings, FREF_HZ, VCO_MIN_HZ};
pub use layout::{FieldSpec, FrameLayout, Segment, COMMAND_LAYOUT, COMMAND_LEN, TELEMETRY_LAYOUT, TELEMETRY_LEN};
pub use telemetry::TelemetryFrame;
