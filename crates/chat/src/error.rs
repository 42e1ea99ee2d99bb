//! Fehlertypen fuer das Chat-Crate

use thiserror::Error;

/// Chat-Fehlertypen
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Keine Berechtigung fuer Chat")]
    NichtAutorisiert,

    #[error("Chat nicht gefunden")]
    NichtGefunden,

    #[error("Storage-Dienst meldet Serverfehler")]
    ServerFehler,

    #[error("Antwort des Storage-Dienstes nicht lesbar: {0}")]
    FormatFehler(String),

    #[error("Speichern fehlgeschlagen: HTTP {status} {grund}")]
    SpeichernFehlgeschlagen { status: u16, grund: String },

    #[error("Unerwarteter Status vom Storage-Dienst: HTTP {0}")]
    UnerwarteterStatus(u16),

    #[error("Ungueltige Chat-Nachricht: {0}")]
    UngueltigeNachricht(#[from] serde_json::Error),

    #[error("HTTP-Fehler: {0}")]
    Http(#[from] reqwest::Error),
}

pub type ChatResult<T> = Result<T, ChatError>;
