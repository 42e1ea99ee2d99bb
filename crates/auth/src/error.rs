//! Fehlertypen fuer die Session-Validierung

use thiserror::Error;

/// Alle moeglichen Fehler bei der Session-Pruefung
#[derive(Debug, Error)]
pub enum AuthError {
    /// Dienst hat mit einem anderen Status als `200 OK` geantwortet
    #[error("Session abgelehnt (HTTP {0})")]
    SessionAbgelehnt(u16),

    /// Dienst nicht erreichbar oder Antwort nicht lesbar
    #[error("Identity-Dienst nicht erreichbar: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result-Alias fuer die Session-Validierung
pub type AuthResult<T> = Result<T, AuthError>;
