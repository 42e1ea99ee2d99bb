//! Fehlertypen fuer Frame-Codec und Handshake

use chatrelay_core::RelayCoreError;
use thiserror::Error;

/// Protokollfehler beim Dekodieren oder Kodieren eines Frames
///
/// Jeder dieser Fehler ist fuer die betroffene Verbindung fatal.
#[derive(Debug, Error)]
pub enum ProtokollFehler {
    /// Mindestens eines der Bits RSV1..RSV3 ist gesetzt
    #[error("Reservierte Bits gesetzt: {0:#05b}")]
    ReservierteBits(u8),

    /// Opcode 3-7 oder 11-15
    #[error("Reservierter Opcode: {0}")]
    ReservierterOpcode(u8),

    /// 64-Bit-Laengenfeld (Basislaenge 127) wird nicht unterstuetzt
    #[error("Laengenkodierung nicht unterstuetzt (Basislaenge {0})")]
    LaengeNichtUnterstuetzt(u8),

    /// Payload ueberschreitet das Maximum
    #[error("Payload zu gross: {laenge} Bytes (Maximum: {max} Bytes)")]
    PayloadZuGross { laenge: usize, max: usize },

    /// IO-Fehler auf dem darunterliegenden Stream
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

/// Result-Typ fuer den Frame-Codec
pub type ProtokollResult<T> = Result<T, ProtokollFehler>;

/// Fehler beim HTTP-Upgrade-Handshake
#[derive(Debug, Error)]
pub enum HandshakeFehler {
    /// Verbindung wurde vor dem Ende des Anfrage-Kopfs geschlossen
    #[error("Unvollstaendige Handshake-Anfrage")]
    Unvollstaendig,

    /// Anfrage-Kopf ist groesser als erlaubt
    #[error("Handshake-Anfrage zu gross (Maximum: {0} Bytes)")]
    KopfZuGross(usize),

    /// Anfragezeile fehlt oder ist keine GET-Anfrage
    #[error("Ungueltige Anfragezeile: {0}")]
    Anfragezeile(String),

    /// Kopf ist kein gueltiges UTF-8
    #[error("Anfrage ist kein gueltiges UTF-8")]
    KeinUtf8,

    /// Kein `sessionId` in Query oder Cookie
    #[error("Session-ID fehlt")]
    SessionFehlt,

    /// `sessionId` vorhanden, aber nicht UUID-foermig
    #[error("Ungueltige Session-ID: {0}")]
    Session(#[from] RelayCoreError),

    /// Header `Sec-WebSocket-Key` fehlt
    #[error("Sec-WebSocket-Key fehlt")]
    SchluesselFehlt,

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}
