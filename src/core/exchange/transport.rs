use crate::domain::{config::SerialConfig, error::PaiCoreResult};
use async_trait::async_trait;
use std::time::Duration;

/// Byte pipe to the chip.
///
/// `read` returns fewer bytes than requested when the timeout expires; a
/// timeout alone is never an error.
#[async_trait]
pub trait Transport: Send {
    /// Device the transport talks to, for logs and progress output
    fn endpoint(&self) -> &str;

    /// Write all of `data`, returning the number of bytes written
    async fn write(&mut self, data: &[u8]) -> PaiCoreResult<usize>;

    /// Read up to `max_bytes`, giving up once `timeout` has elapsed
    async fn read(&mut self, max_bytes: usize, timeout: Duration) -> PaiCoreResult<Vec<u8>>;

    /// Release the device
    async fn close(&mut self) -> PaiCoreResult<()>;
}

/// Opens transports; kept separate so sessions can be driven by a mock
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, config: &SerialConfig) -> PaiCoreResult<Box<dyn Transport>>;
}
