use crate::core::frame::{CommandFrame, TelemetryFrame};
use crate::domain::error::{PaiCoreError, PaiCoreResult};
use serde::{Serialize, Serializer};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

pub type SessionId = Uuid;

/// Terminal verdict of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Success,
    Failure,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => write!(f, "Success"),
            Outcome::Failure => write!(f, "Failure"),
        }
    }
}

/// Exchange state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExchangeState {
    Idle,
    Sending,
    WaitingForEcho,
    Verifying,
    RepeatOrDone,
    Completed(Outcome),
}

impl fmt::Display for ExchangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeState::Idle => write!(f, "Idle"),
            ExchangeState::Sending => write!(f, "Sending"),
            ExchangeState::WaitingForEcho => write!(f, "WaitingForEcho"),
            ExchangeState::Verifying => write!(f, "Verifying"),
            ExchangeState::RepeatOrDone => write!(f, "RepeatOrDone"),
            ExchangeState::Completed(outcome) => write!(f, "Completed({})", outcome),
        }
    }
}

/// Result of one send/receive repetition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundRecord {
    pub round: u32,
    #[serde(serialize_with = "serialize_hex")]
    pub received: Vec<u8>,
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<TelemetryFrame>,
}

fn serialize_hex<T, S>(bytes: T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: AsRef<[u8]>,
    S: Serializer,
{
    serializer.serialize_str(&hex::encode_upper(bytes.as_ref()))
}

/// Run-time state of one configuration attempt.
///
/// The command bytes are fixed at construction; each repetition adds one
/// record to the tally.
#[derive(Debug)]
pub struct ExchangeSession {
    id: SessionId,
    command: CommandFrame,
    repeat_count: u32,
    rounds: Vec<RoundRecord>,
    mismatches: u32,
    aborted: bool,
    state: ExchangeState,
    history: Vec<ExchangeState>,
}

impl ExchangeSession {
    pub fn new(command: CommandFrame, repeat_count: u32) -> PaiCoreResult<Self> {
        if repeat_count == 0 {
            return Err(PaiCoreError::InvalidInput(
                "repeat count must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            command,
            repeat_count,
            rounds: Vec::with_capacity(repeat_count as usize),
            mismatches: 0,
            aborted: false,
            state: ExchangeState::Idle,
            history: vec![ExchangeState::Idle],
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn command(&self) -> &CommandFrame {
        &self.command
    }

    pub fn repeat_count(&self) -> u32 {
        self.repeat_count
    }

    pub fn debug_mode(&self) -> bool {
        self.command.debug_mode()
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn mismatches(&self) -> u32 {
        self.mismatches
    }

    /// Every state entered so far, starting with `Idle`
    pub fn history(&self) -> &[ExchangeState] {
        &self.history
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn rounds(&self) -> &[RoundRecord] {
        &self.rounds
    }

    pub fn rounds_completed(&self) -> u32 {
        self.rounds.len() as u32
    }

    /// Move the state machine; `Completed` is final
    pub fn transition(&mut self, next: ExchangeState) {
        if let ExchangeState::Completed(_) = self.state {
            return;
        }
        debug!(session = %self.id, from = %self.state, to = %next, "state transition");
        self.state = next;
        self.history.push(next);
    }

    /// Tally one verified round
    pub fn record_round(&mut self, record: RoundRecord) {
        if !record.matched {
            self.mismatches += 1;
        }
        self.rounds.push(record);
        self.transition(ExchangeState::RepeatOrDone);
    }

    /// End the session early after a fatal transport error
    pub fn abort(&mut self) {
        self.aborted = true;
        self.transition(ExchangeState::Completed(Outcome::Failure));
    }

    /// Verdict so far: success only while no round has mismatched and the
    /// session ran to the end
    pub fn outcome(&self) -> Outcome {
        if self.mismatches == 0 && !self.aborted {
            Outcome::Success
        } else {
            Outcome::Failure
        }
    }

    /// Close the session and produce the report
    pub fn finish(mut self) -> SessionReport {
        let outcome = self.outcome();
        self.transition(ExchangeState::Completed(outcome));

        SessionReport {
            session_id: self.id,
            command: self.command.to_hex(),
            repeat_count: self.repeat_count,
            rounds_completed: self.rounds.len() as u32,
            mismatches: self.mismatches,
            outcome,
            aborted: self.aborted,
            rounds: self.rounds,
            states: self.history,
        }
    }
}

/// Final, serialisable summary of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub command: String,
    pub repeat_count: u32,
    pub rounds_completed: u32,
    pub mismatches: u32,
    pub outcome: Outcome,
    pub aborted: bool,
    pub rounds: Vec<RoundRecord>,
    pub states: Vec<ExchangeState>,
}

impl SessionReport {
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}
