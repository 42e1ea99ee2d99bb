//! Fehlertypen fuer chatrelay
//!
//! Zentraler Fehler-Enum fuer die gemeinsamen Typen. Die uebrigen Crates
//! definieren eigene Fehler und konvertieren via `#[from]`.

use thiserror::Error;

/// Globaler Result-Alias fuer chatrelay-core
pub type Result<T> = std::result::Result<T, RelayCoreError>;

/// Fehler beim Erzeugen oder Parsen gemeinsamer Typen
#[derive(Debug, Error)]
pub enum RelayCoreError {
    // --- Session ---
    #[error("Ungueltige Session-ID: {0}")]
    UngueltigeSession(String),

    #[error("Session-ID hat falsche Laenge: erwartet={erwartet}, erhalten={erhalten}")]
    SessionLaenge { erwartet: usize, erhalten: usize },
}
