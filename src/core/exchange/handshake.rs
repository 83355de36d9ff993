//! Lockstep handshake between the sender and receiver actors.
//!
//! Two single-slot primitives enforce strict alternation:
//!
//! * the send permit, armed by the receiver right before it waits to listen
//!   and consumed by the sender before each transmit;
//! * the "sent" token, a channel of capacity 1 carrying the round number
//!   once that round's bytes are on the wire.
//!
//! The permit starts disarmed and never holds more than one grant, so the
//! sender can be at most one round ahead of a receiver that is ready.

use crate::domain::error::{PaiCoreError, PaiCoreResult};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

/// Binary "you may send" grant
#[derive(Debug)]
pub struct SendPermit {
    semaphore: Semaphore,
}

impl SendPermit {
    pub fn new() -> Self {
        Self {
            semaphore: Semaphore::new(0),
        }
    }

    /// Grant one send. Only the receiver arms, and only the sender takes
    /// grants away, so the check cannot race into a second grant.
    pub fn arm(&self) {
        if self.semaphore.available_permits() == 0 {
            self.semaphore.add_permits(1);
        }
    }

    /// Wait for a grant and consume it
    pub async fn acquire(&self) -> PaiCoreResult<()> {
        let permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| PaiCoreError::Protocol("receiver stopped listening".to_string()))?;
        permit.forget();
        Ok(())
    }

    pub fn is_armed(&self) -> bool {
        self.semaphore.available_permits() > 0
    }

    /// Wake a waiting sender with an error
    pub fn close(&self) {
        self.semaphore.close();
    }
}

impl Default for SendPermit {
    fn default() -> Self {
        Self::new()
    }
}

/// Sender half of the handshake
pub struct SenderHandshake {
    permit: Arc<SendPermit>,
    sent: mpsc::Sender<u32>,
}

/// Receiver half of the handshake
pub struct ReceiverHandshake {
    permit: Arc<SendPermit>,
    sent: mpsc::Receiver<u32>,
}

/// Create a connected pair of handshake halves
pub fn handshake() -> (SenderHandshake, ReceiverHandshake) {
    let permit = Arc::new(SendPermit::new());
    let (sent_tx, sent_rx) = mpsc::channel(1);

    (
        SenderHandshake {
            permit: Arc::clone(&permit),
            sent: sent_tx,
        },
        ReceiverHandshake {
            permit,
            sent: sent_rx,
        },
    )
}

impl SenderHandshake {
    /// Block until the receiver is ready for the next round
    pub async fn wait_for_receiver(&self) -> PaiCoreResult<()> {
        self.permit.acquire().await
    }

    /// Tell the receiver that `round` has been transmitted. Returns false if
    /// the receiver is gone.
    pub async fn announce_sent(&self, round: u32) -> bool {
        self.sent.send(round).await.is_ok()
    }
}

impl ReceiverHandshake {
    /// Allow the sender to transmit the next round
    pub fn ready_to_listen(&self) {
        self.permit.arm();
    }

    /// Wait until a round is on the wire. `None` once the sender has stopped.
    pub async fn wait_for_sent(&mut self) -> Option<u32> {
        self.sent.recv().await
    }
}

impl Drop for ReceiverHandshake {
    fn drop(&mut self) {
        self.permit.close();
    }
}
