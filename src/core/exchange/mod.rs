// Exchange module - Send/verify protocol over a byte pipe
pub mod coordinator;
pub mod handshake;
pub mod session;
pub mod transport;
pub mod verifier;

pub use coordinator::{ExchangeCoordinator, ExchangeEvent, ExchangeSettings};
pub use session::{ExchangeSession, ExchangeState, Outcome, RoundRecord, SessionId, SessionReport};
pub use transport::{Connector, Transport};
pub use verifier::{first_mismatch, verify_echo};
