//! Fehlertypen fuer den Relay-Service

use chatrelay_auth::AuthError;
use chatrelay_chat::ChatError;
use chatrelay_protocol::{HandshakeFehler, ProtokollFehler};
use thiserror::Error;

/// Fehlertyp fuer den Relay-Service
#[derive(Debug, Error)]
pub enum RelayError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Session vom Identity-Dienst abgelehnt oder Dienst nicht erreichbar
    #[error("Authentifizierungsfehler: {0}")]
    Auth(#[from] AuthError),

    /// Upgrade-Anfrage unbrauchbar
    #[error("Handshake-Fehler: {0}")]
    Handshake(#[from] HandshakeFehler),

    /// Protokollfehler (ungueltiger Frame)
    #[error("Protokollfehler: {0}")]
    Protokoll(#[from] ProtokollFehler),

    /// Nachricht ist kein gueltiges Chat-Envelope
    #[error("Chat-Fehler: {0}")]
    Chat(#[from] ChatError),

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl RelayError {
    /// Erstellt einen internen Fehler
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}

/// Result-Typ fuer den Relay-Service
pub type RelayResult<T> = Result<T, RelayError>;
