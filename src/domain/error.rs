use crate::core::exchange::SessionReport;
use thiserror::Error;

/// Errors raised while packing or unpacking a fixed-layout frame
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Field '{field}' value {value} does not fit in {width} bits")]
    FieldOutOfRange {
        field: &'static str,
        value: u64,
        width: u32,
    },

    #[error("Short buffer: expected {expected} bytes, got {actual}")]
    ShortBuffer { expected: usize, actual: usize },
}

/// PAICORE unified error type
#[derive(Error, Debug)]
pub enum PaiCoreError {
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Unable to open serial port {port}: {reason}")]
    TransportOpen { port: String, reason: String },

    #[error("Serial I/O error: {0}")]
    TransportIo(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Output error: {0}")]
    Output(String),

    /// A fatal transport error ended the session; `report` holds the rounds
    /// that completed and a `Failure` verdict
    #[error("Session aborted: {source}")]
    SessionAborted {
        report: Box<SessionReport>,
        source: Box<PaiCoreError>,
    },
}

impl PaiCoreError {
    /// Errors that stop a run before any byte reaches the device
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            PaiCoreError::Frame(_)
                | PaiCoreError::TransportOpen { .. }
                | PaiCoreError::Config { .. }
                | PaiCoreError::InvalidInput(_)
        )
    }
}

pub type PaiCoreResult<T> = Result<T, PaiCoreError>;
