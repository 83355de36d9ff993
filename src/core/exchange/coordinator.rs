//! Duplex exchange coordinator.
//!
//! A session runs as two tokio tasks sharing the transport: the sender
//! writes the command once per round and the receiver reads the echo back
//! and verifies it. The handshake keeps them in strict lockstep, so round k
//! is fully written before its listen starts and fully consumed before round
//! k+1 is written.

use crate::core::exchange::handshake::{handshake, ReceiverHandshake, SenderHandshake};
use crate::core::exchange::session::{ExchangeSession, ExchangeState, RoundRecord, SessionReport};
use crate::core::exchange::transport::Transport;
use crate::core::exchange::verifier::{first_mismatch, verify_echo};
use crate::core::frame::{format_bytes, CommandFrame, TelemetryFrame, COMMAND_LEN, TELEMETRY_LEN};
use crate::domain::error::{PaiCoreError, PaiCoreResult};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

type SharedTransport = Arc<Mutex<Box<dyn Transport>>>;
type EventSender = Option<mpsc::UnboundedSender<ExchangeEvent>>;

/// Progress of a running session, one value per human-readable line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeEvent {
    StartSending { round: u32 },
    SendingDone { round: u32 },
    SendFailed { round: u32, reason: String },
    AllSendingDone,
    StartReceiving { round: u32 },
    Received { round: u32, bytes: Vec<u8> },
    EchoMismatch { round: u32 },
    Telemetry { round: u32, frame: TelemetryFrame },
    EndReceiving { round: u32 },
    PortClosed,
}

impl fmt::Display for ExchangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeEvent::StartSending { round } => write!(f, "Start sending #{}...", round),
            ExchangeEvent::SendingDone { round } => write!(f, "Sending done #{}.", round),
            ExchangeEvent::SendFailed { round, reason } => {
                write!(f, "Unable to write round #{} via serial: {}", round, reason)
            }
            ExchangeEvent::AllSendingDone => write!(f, "All sending done."),
            ExchangeEvent::StartReceiving { round } => write!(f, "Start receiving #{}...", round),
            ExchangeEvent::Received { bytes, .. } => write!(f, "{}", format_bytes(bytes)),
            ExchangeEvent::EchoMismatch { .. } => write!(f, "Received error!"),
            ExchangeEvent::Telemetry { round, frame } => write!(f, "Telemetry #{}: {}", round, frame),
            ExchangeEvent::EndReceiving { round } => write!(f, "End receiving #{}.", round),
            ExchangeEvent::PortClosed => write!(f, "Serial port close."),
        }
    }
}

fn emit(events: &EventSender, event: ExchangeEvent) {
    if let Some(events) = events {
        // A dropped listener only loses progress output
        let _ = events.send(event);
    }
}

/// Timing of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeSettings {
    /// How long the receiver waits for a full frame
    pub read_timeout: Duration,
    /// Delay between the end of one transmit and the next
    pub pacing: Duration,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(2000),
            pacing: Duration::from_secs(1),
        }
    }
}

/// Drives an `ExchangeSession` over a transport
pub struct ExchangeCoordinator {
    settings: ExchangeSettings,
    events: EventSender,
}

impl ExchangeCoordinator {
    pub fn new(settings: ExchangeSettings) -> Self {
        Self {
            settings,
            events: None,
        }
    }

    /// Report progress on `events`
    pub fn with_events(mut self, events: mpsc::UnboundedSender<ExchangeEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn settings(&self) -> &ExchangeSettings {
        &self.settings
    }

    /// Run every repetition and return the aggregated report.
    ///
    /// Echo mismatches and failed reads only count against the verdict; a
    /// write failure aborts the session with `SessionAborted`, which still
    /// carries the `Failure` report.
    pub async fn run(
        &self,
        session: ExchangeSession,
        transport: Box<dyn Transport>,
    ) -> PaiCoreResult<SessionReport> {
        let session_id = session.id();
        info!(
            session = %session_id,
            endpoint = transport.endpoint(),
            rounds = session.repeat_count(),
            "Starting exchange"
        );

        let transport: SharedTransport = Arc::new(Mutex::new(transport));
        let (sender_handshake, receiver_handshake) = handshake();

        let sender = Sender {
            transport: Arc::clone(&transport),
            handshake: sender_handshake,
            command: *session.command(),
            repeat_count: session.repeat_count(),
            pacing: self.settings.pacing,
            events: self.events.clone(),
        };

        let receiver = Receiver {
            transport: Arc::clone(&transport),
            handshake: receiver_handshake,
            read_timeout: self.settings.read_timeout,
            events: self.events.clone(),
            session,
        };

        let sender_task = tokio::spawn(sender.run());
        let receiver_task = tokio::spawn(receiver.run());

        let send_result = sender_task
            .await
            .map_err(|e| PaiCoreError::Protocol(format!("Sender task failed: {}", e)))?;
        let mut session = receiver_task
            .await
            .map_err(|e| PaiCoreError::Protocol(format!("Receiver task failed: {}", e)))?;

        if let Err(e) = transport.lock().await.close().await {
            warn!(session = %session_id, "Failed to close transport: {}", e);
        }
        emit(&self.events, ExchangeEvent::PortClosed);

        if let Err(e) = send_result {
            session.abort();
            let report = session.finish();
            warn!(
                session = %session_id,
                rounds = report.rounds_completed,
                "Exchange aborted: {}", e
            );
            return Err(PaiCoreError::SessionAborted {
                report: Box::new(report),
                source: Box::new(e),
            });
        }

        let report = session.finish();
        info!(
            session = %session_id,
            mismatches = report.mismatches,
            outcome = %report.outcome,
            "Exchange completed"
        );
        Ok(report)
    }
}

struct Sender {
    transport: SharedTransport,
    handshake: SenderHandshake,
    command: CommandFrame,
    repeat_count: u32,
    pacing: Duration,
    events: EventSender,
}

impl Sender {
    async fn run(self) -> PaiCoreResult<()> {
        for round in 1..=self.repeat_count {
            if round > 1 && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }

            self.handshake.wait_for_receiver().await?;
            emit(&self.events, ExchangeEvent::StartSending { round });
            debug!(round, state = %ExchangeState::Sending, "Writing command");

            if let Err(e) = self.write_command().await {
                error!(round, "Unable to write via serial: {}", e);
                emit(
                    &self.events,
                    ExchangeEvent::SendFailed {
                        round,
                        reason: e.to_string(),
                    },
                );
                return Err(e);
            }

            emit(&self.events, ExchangeEvent::SendingDone { round });

            if !self.handshake.announce_sent(round).await {
                warn!(round, "Receiver stopped before all rounds were sent");
                return Ok(());
            }
        }

        emit(&self.events, ExchangeEvent::AllSendingDone);
        Ok(())
    }

    async fn write_command(&self) -> PaiCoreResult<()> {
        let mut transport = self.transport.lock().await;
        let written = transport.write(self.command.as_bytes()).await?;

        if written != COMMAND_LEN {
            return Err(PaiCoreError::TransportIo(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                format!("wrote {} of {} bytes", written, COMMAND_LEN),
            )));
        }
        Ok(())
    }
}

struct Receiver {
    transport: SharedTransport,
    handshake: ReceiverHandshake,
    read_timeout: Duration,
    events: EventSender,
    session: ExchangeSession,
}

impl Receiver {
    async fn run(mut self) -> ExchangeSession {
        let expected = *self.session.command();

        for round in 1..=self.session.repeat_count() {
            emit(&self.events, ExchangeEvent::StartReceiving { round });
            self.session.transition(ExchangeState::Sending);
            self.handshake.ready_to_listen();

            let Some(sent) = self.handshake.wait_for_sent().await else {
                warn!(round, "Sender stopped, no more rounds to receive");
                break;
            };
            debug_assert_eq!(sent, round);
            self.session.transition(ExchangeState::WaitingForEcho);

            let received = self.read(COMMAND_LEN).await;
            emit(
                &self.events,
                ExchangeEvent::Received {
                    round,
                    bytes: received.clone(),
                },
            );

            self.session.transition(ExchangeState::Verifying);
            let matched = verify_echo(expected.as_bytes(), &received);
            if !matched {
                warn!(
                    round,
                    received = received.len(),
                    first_mismatch = ?first_mismatch(expected.as_bytes(), &received),
                    "Echo mismatch"
                );
                emit(&self.events, ExchangeEvent::EchoMismatch { round });
            }

            let telemetry = if self.session.debug_mode() {
                self.read_telemetry(round).await
            } else {
                None
            };

            self.session.record_round(RoundRecord {
                round,
                received,
                matched,
                telemetry,
            });
            emit(&self.events, ExchangeEvent::EndReceiving { round });
        }

        self.session
    }

    /// Read one frame; failures and timeouts yield whatever arrived
    async fn read(&self, len: usize) -> Vec<u8> {
        let mut transport = self.transport.lock().await;
        match transport.read(len, self.read_timeout).await {
            Ok(bytes) => {
                if bytes.len() < len {
                    warn!(expected = len, received = bytes.len(), "Short read");
                }
                bytes
            }
            Err(e) => {
                warn!("Read failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn read_telemetry(&self, round: u32) -> Option<TelemetryFrame> {
        let bytes = self.read(TELEMETRY_LEN).await;
        match TelemetryFrame::decode(&bytes) {
            Ok(frame) => {
                emit(&self.events, ExchangeEvent::Telemetry { round, frame });
                Some(frame)
            }
            Err(e) => {
                warn!(round, "Telemetry unavailable: {}", e);
                None
            }
        }
    }
}
