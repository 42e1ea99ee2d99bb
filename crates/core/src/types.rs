//! Gemeinsame Identifikationstypen fuer chatrelay
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use crate::error::{RelayCoreError, Result};

/// Laenge einer Session-ID im Text-Format (UUID mit Bindestrichen)
pub const SESSION_ID_LAENGE: usize = 36;

static NAECHSTE_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Prozessweit eindeutige ID einer WebSocket-Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    /// Vergibt die naechste freie ConnectionId
    pub fn new() -> Self {
        Self(NAECHSTE_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Gibt den inneren Zaehlerwert zurueck
    pub fn inner(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

/// Session-Token aus dem Handshake
///
/// Wird unveraendert (im Originaltext) an Auth- und Storage-Dienst
/// weitergereicht, daher wird der String und nicht die geparste UUID gehalten.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Prueft Laenge und UUID-Form und erstellt die SessionId
    pub fn parsen(roh: &str) -> Result<Self> {
        if roh.len() != SESSION_ID_LAENGE {
            return Err(RelayCoreError::SessionLaenge {
                erwartet: SESSION_ID_LAENGE,
                erhalten: roh.len(),
            });
        }
        Uuid::parse_str(roh).map_err(|_| RelayCoreError::UngueltigeSession(roh.to_string()))?;
        Ok(Self(roh.to_string()))
    }

    /// Erstellt eine neue zufaellige SessionId
    pub fn zufaellig() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Cookie-Wert fuer Anfragen an die externen Dienste
    pub fn als_cookie(&self) -> String {
        format!("sessionId={}", self.0)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
