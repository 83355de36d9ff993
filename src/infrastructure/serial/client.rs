use crate::core::exchange::transport::{Connector, Transport};
use crate::domain::config::{FlowControlConfig, ParityConfig, SerialConfig};
use crate::domain::error::{PaiCoreError, PaiCoreResult};
use async_trait::async_trait;
use serialport::SerialPort;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info};

type SharedPort = Arc<Mutex<Box<dyn SerialPort>>>;

/// Build the serialport builder for a configured link
fn port_builder(config: &SerialConfig) -> PaiCoreResult<serialport::SerialPortBuilder> {
    let mut builder = serialport::new(&config.port, config.baud_rate);

    builder = builder.data_bits(match config.data_bits {
        5 => serialport::DataBits::Five,
        6 => serialport::DataBits::Six,
        7 => serialport::DataBits::Seven,
        8 => serialport::DataBits::Eight,
        other => {
            return Err(PaiCoreError::InvalidInput(format!("Invalid data bits: {}", other)))
        }
    });

    builder = builder.stop_bits(match config.stop_bits {
        1 => serialport::StopBits::One,
        2 => serialport::StopBits::Two,
        other => {
            return Err(PaiCoreError::InvalidInput(format!("Invalid stop bits: {}", other)))
        }
    });

    builder = builder.parity(match config.parity {
        ParityConfig::None => serialport::Parity::None,
        ParityConfig::Even => serialport::Parity::Even,
        ParityConfig::Odd => serialport::Parity::Odd,
    });

    builder = builder.flow_control(match config.flow_control {
        FlowControlConfig::None => serialport::FlowControl::None,
        FlowControlConfig::Software => serialport::FlowControl::Software,
        FlowControlConfig::Hardware => serialport::FlowControl::Hardware,
    });

    Ok(builder.timeout(Duration::from_millis(100)))
}

/// Serial device transport. Blocking port calls run on tokio's blocking pool.
pub struct SerialTransport {
    port: SharedPort,
    name: String,
}

impl SerialTransport {
    /// Open the configured device
    pub fn open(config: &SerialConfig) -> PaiCoreResult<Self> {
        let port = port_builder(config)?
            .open()
            .map_err(|e| PaiCoreError::TransportOpen {
                port: config.port.clone(),
                reason: e.to_string(),
            })?;

        info!("Serial port {} opened at {} baud", config.port, config.baud_rate);

        Ok(Self {
            port: Arc::new(Mutex::new(port)),
            name: config.port.clone(),
        })
    }

    async fn with_port<T, F>(&self, op: F) -> PaiCoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn SerialPort) -> PaiCoreResult<T> + Send + 'static,
    {
        let port = Arc::clone(&self.port);
        tokio::task::spawn_blocking(move || {
            let mut port = port
                .lock()
                .map_err(|_| PaiCoreError::Protocol("serial port lock poisoned".to_string()))?;
            op(&mut **port)
        })
        .await
        .map_err(|e| PaiCoreError::Protocol(format!("Serial worker failed: {}", e)))?
    }
}

/// Read until `max_bytes` arrived or `timeout` elapsed
fn read_with_deadline(
    port: &mut dyn SerialPort,
    max_bytes: usize,
    timeout: Duration,
) -> PaiCoreResult<Vec<u8>> {
    let deadline = Instant::now() + timeout;
    let mut buffer = vec![0u8; max_bytes];
    let mut filled = 0;

    while filled < max_bytes {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        port.set_timeout(deadline - now)?;

        match port.read(&mut buffer[filled..]) {
            Ok(0) => continue,
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => break,
            Err(e) => return Err(e.into()),
        }
    }

    buffer.truncate(filled);
    Ok(buffer)
}

#[async_trait]
impl Transport for SerialTransport {
    fn endpoint(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, data: &[u8]) -> PaiCoreResult<usize> {
        let data = data.to_vec();
        let written = self
            .with_port(move |port| {
                port.write_all(&data)?;
                port.flush()?;
                Ok(data.len())
            })
            .await?;

        debug!("Sent {} bytes over serial", written);
        Ok(written)
    }

    async fn read(&mut self, max_bytes: usize, timeout: Duration) -> PaiCoreResult<Vec<u8>> {
        let data = self
            .with_port(move |port| read_with_deadline(port, max_bytes, timeout))
            .await?;

        debug!("Received {} bytes over serial", data.len());
        Ok(data)
    }

    async fn close(&mut self) -> PaiCoreResult<()> {
        // The device is released when the last handle drops; make sure
        // nothing is left in the output buffer first.
        self.with_port(|port| {
            port.flush()?;
            Ok(())
        })
        .await?;

        info!("Serial port {} closed", self.name);
        Ok(())
    }
}

/// Opens `SerialTransport`s
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialConnector;

#[async_trait]
impl Connector for SerialConnector {
    async fn open(&self, config: &SerialConfig) -> PaiCoreResult<Box<dyn Transport>> {
        let config = config.clone();
        let transport = tokio::task::spawn_blocking(move || SerialTransport::open(&config))
            .await
            .map_err(|e| PaiCoreError::Protocol(format!("Serial worker failed: {}", e)))??;
        Ok(Box::new(transport))
    }
}

/// Names of the serial ports present on this machine
pub fn available_ports() -> PaiCoreResult<Vec<String>> {
    Ok(serialport::available_ports()?
        .into_iter()
        .map(|port| port.port_name)
        .collect())
}
