use async_trait::async_trait;
use paicore_uart::cli::output::{OutputError, OutputWriter};
use paicore_uart::cli::{exit_code, run_session};
use paicore_uart::core::frame::format_bytes;
use paicore_uart::domain::config::SerialConfig;
use paicore_uart::{
    CommandFrame, ConfigurationFrame, Connector, ExchangeEvent, Outcome, PaiCoreConfig,
    PaiCoreError, PaiCoreResult, SessionReport, Transport,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// End-to-end sessions against a scripted device
#[cfg(test)]
mod integration_tests {
    use super::*;

    #[derive(Clone, Copy)]
    enum Device {
        Echo,
        CorruptRound(u32),
        FailWriteRound(u32),
        Silent,
        EchoWithTelemetry,
    }

    struct ScriptedTransport {
        device: Device,
        pending: VecDeque<u8>,
        writes: u32,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        fn endpoint(&self) -> &str {
            "mock"
        }

        async fn write(&mut self, data: &[u8]) -> PaiCoreResult<usize> {
            self.writes += 1;
            let mut echo = data.to_vec();

            match self.device {
                Device::FailWriteRound(round) if round == self.writes => {
                    return Err(PaiCoreError::TransportIo(std::io::Error::new(
                        std::io::ErrorKind::BrokenPipe,
                        "device unplugged",
                    )));
                }
                Device::CorruptRound(round) if round == self.writes => echo[9] ^= 0x10,
                Device::Silent => echo.clear(),
                Device::EchoWithTelemetry => {
                    let mut telemetry = vec![0u8; 19];
                    telemetry[0] = 0x80;
                    echo.extend(telemetry);
                }
                _ => {}
            }

            self.pending.extend(echo);
            Ok(data.len())
        }

        async fn read(&mut self, max_bytes: usize, _timeout: Duration) -> PaiCoreResult<Vec<u8>> {
            let n = max_bytes.min(self.pending.len());
            Ok(self.pending.drain(..n).collect())
        }

        async fn close(&mut self) -> PaiCoreResult<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ScriptedConnector {
        device: Option<Device>,
        closed: Arc<AtomicBool>,
    }

    impl ScriptedConnector {
        fn new(device: Device) -> Self {
            Self {
                device: Some(device),
                closed: Arc::new(AtomicBool::new(false)),
            }
        }

        fn unreachable() -> Self {
            Self {
                device: None,
                closed: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn open(&self, config: &SerialConfig) -> PaiCoreResult<Box<dyn Transport>> {
            match self.device {
                Some(device) => Ok(Box::new(ScriptedTransport {
                    device,
                    pending: VecDeque::new(),
                    writes: 0,
                    closed: Arc::clone(&self.closed),
                })),
                None => Err(PaiCoreError::TransportOpen {
                    port: config.port.clone(),
                    reason: "No such file or directory".to_string(),
                }),
            }
        }
    }

    #[derive(Default)]
    struct RecordingWriter {
        lines: Mutex<Vec<String>>,
    }

    impl RecordingWriter {
        fn lines(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }

        fn count(&self, needle: &str) -> usize {
            self.lines().iter().filter(|line| line.starts_with(needle)).count()
        }

        fn push(&self, line: String) -> Result<(), OutputError> {
            self.lines.lock().unwrap().push(line);
            Ok(())
        }
    }

    impl OutputWriter for RecordingWriter {
        fn write_event(&self, event: &ExchangeEvent) -> Result<(), OutputError> {
            self.push(event.to_string())
        }

        fn write_report(&self, report: &SessionReport) -> Result<(), OutputError> {
            self.push(format!("Report: {} {}", report.outcome, report.mismatches))
        }

        fn write_layout(&self, frame: &CommandFrame) -> Result<(), OutputError> {
            self.push(frame.to_string())
        }

        fn write_message(&self, message: &str) -> Result<(), OutputError> {
            self.push(message.to_string())
        }

        fn write_error(&self, error: &str) -> Result<(), OutputError> {
            self.push(format!("Error: {}", error))
        }
    }

    fn config(repeat_count: u32) -> PaiCoreConfig {
        let mut config = PaiCoreConfig::default();
        config.serial.port = "/dev/ttyMOCK0".to_string();
        config.global.repeat_count = repeat_count;
        config.global.read_timeout_ms = 10;
        config.global.pacing_ms = 0;
        config
    }

    #[tokio::test]
    async fn test_clean_echo_three_rounds() {
        let connector = ScriptedConnector::new(Device::Echo);
        let writer = RecordingWriter::default();

        let result = run_session(&config(3), &connector, &writer).await;
        let report = result.as_ref().unwrap();

        assert_eq!(report.outcome, Outcome::Success);
        assert_eq!(report.mismatches, 0);
        assert_eq!(report.rounds_completed, 3);
        assert_eq!(exit_code(&result), 0);

        assert_eq!(writer.count("Sending done #"), 3);
        assert_eq!(writer.count("End receiving #"), 3);
        assert_eq!(writer.count("All sending done."), 1);
        assert_eq!(writer.count("Serial port close."), 1);
        assert_eq!(writer.count("Config OK."), 1);
        assert_eq!(
            writer.count("Successful connection to /dev/ttyMOCK0, baudrate: 9600"),
            1
        );
        assert!(connector.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_progress_lines_are_ordered() {
        let connector = ScriptedConnector::new(Device::Echo);
        let writer = RecordingWriter::default();
        run_session(&config(2), &connector, &writer).await.unwrap();

        let lines = writer.lines();
        let position = |text: &str| lines.iter().position(|line| line == text).unwrap();

        assert!(position("Start receiving #1...") < position("Sending done #1."));
        assert!(position("Sending done #1.") < position("End receiving #1."));
        assert!(position("End receiving #1.") < position("Start sending #2..."));
        assert!(position("End receiving #2.") < position("Serial port close."));

        let legacy = ConfigurationFrame::default().encode().unwrap();
        assert_eq!(writer.count(&format_bytes(legacy.as_bytes())), 2);
    }

    #[tokio::test]
    async fn test_corrupted_second_round_fails() {
        let connector = ScriptedConnector::new(Device::CorruptRound(2));
        let writer = RecordingWriter::default();

        let result = run_session(&config(3), &connector, &writer).await;
        let report = result.as_ref().unwrap();

        assert_eq!(report.outcome, Outcome::Failure);
        assert_eq!(report.mismatches, 1);
        assert_eq!(report.rounds_completed, 3);
        assert!(!report.rounds[1].matched);
        assert_eq!(exit_code(&result), 1);
        assert_eq!(writer.count("Received error!"), 1);
        assert_eq!(writer.count("Config error."), 1);
    }

    #[tokio::test]
    async fn test_silent_device_counts_every_round() {
        let connector = ScriptedConnector::new(Device::Silent);
        let writer = RecordingWriter::default();

        let report = run_session(&config(2), &connector, &writer).await.unwrap();

        assert_eq!(report.mismatches, 2);
        assert_eq!(report.outcome, Outcome::Failure);
        assert!(report.rounds.iter().all(|round| round.received.is_empty()));
    }

    #[tokio::test]
    async fn test_open_failure_runs_no_rounds() {
        let connector = ScriptedConnector::unreachable();
        let writer = RecordingWriter::default();

        let result = run_session(&config(3), &connector, &writer).await;

        assert!(matches!(result, Err(PaiCoreError::TransportOpen { .. })));
        assert_eq!(exit_code(&result), -22);
        assert_eq!(writer.count("Start sending"), 0);
        assert_eq!(writer.count("Successful connection"), 0);
    }

    #[tokio::test]
    async fn test_write_failure_aborts_session() {
        let connector = ScriptedConnector::new(Device::FailWriteRound(2));
        let writer = RecordingWriter::default();

        let result = run_session(&config(3), &connector, &writer).await;

        match &result {
            Err(PaiCoreError::SessionAborted { report, source }) => {
                assert!(matches!(**source, PaiCoreError::TransportIo(_)));
                assert_eq!(report.outcome, Outcome::Failure);
                assert_eq!(report.rounds_completed, 1);
                assert!(report.aborted);
            }
            other => panic!("expected an aborted session, got {:?}", other),
        }
        assert_eq!(exit_code(&result), 1);
        assert_eq!(writer.count("Sending done #"), 1);
        assert_eq!(writer.count("Unable to write round #2 via serial"), 1);
        assert_eq!(writer.count("Start sending #3"), 0);
        assert_eq!(writer.count("Config OK."), 0);
        assert_eq!(writer.count("Config error."), 1);
        assert_eq!(writer.count("Report: Failure 0"), 1);

        let lines = writer.lines();
        let position = |text: &str| lines.iter().position(|line| line == text).unwrap();
        assert!(position("Serial port close.") < position("Config error."));
        assert!(connector.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_debug_mode_collects_telemetry() {
        let connector = ScriptedConnector::new(Device::EchoWithTelemetry);
        let writer = RecordingWriter::default();
        let mut config = config(2);
        config.frame.debug_mode_enable = true;

        let report = run_session(&config, &connector, &writer).await.unwrap();

        assert_eq!(report.outcome, Outcome::Success);
        for round in &report.rounds {
            let telemetry = round.telemetry.unwrap();
            assert!(telemetry.l5_busy());
        }
        assert_eq!(writer.count("Telemetry #"), 2);
    }

    #[tokio::test]
    async fn test_out_of_range_frame_never_opens_port() {
        let connector = ScriptedConnector::new(Device::Echo);
        let writer = RecordingWriter::default();
        let mut config = config(1);
        config.frame.chip_x = 32;

        let result = run_session(&config, &connector, &writer).await;

        assert!(matches!(result, Err(PaiCoreError::Frame(_))));
        assert_eq!(exit_code(&result), -22);
        assert!(writer.lines().is_empty());
    }

    #[tokio::test]
    async fn test_zero_repeat_rejected() {
        let connector = ScriptedConnector::new(Device::Echo);
        let writer = RecordingWriter::default();

        let result = run_session(&config(0), &connector, &writer).await;
        assert!(matches!(result, Err(PaiCoreError::InvalidInput(_))));
        assert_eq!(exit_code(&result), -22);
    }
}
