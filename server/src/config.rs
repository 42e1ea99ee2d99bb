//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use chatrelay_auth::STANDARD_PRUEF_PFAD;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Umgebungsvariable mit dem Pfad zur Konfigurationsdatei
pub const ENV_CONFIG_PFAD: &str = "CHATRELAY_CONFIG";
/// Standardpfad, falls `CHATRELAY_CONFIG` nicht gesetzt ist
pub const STANDARD_CONFIG_PFAD: &str = "config.toml";

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Externe Dienste (Identity, Storage)
    pub dienste: DiensteEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer den WebSocket-Listener
    pub bind_adresse: String,
    /// Port fuer den WebSocket-Listener
    pub port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 5201,
        }
    }
}

/// Externe HTTP-Dienste
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiensteEinstellungen {
    /// Basis-URL fuer Identity- und Storage-Dienst
    pub basis_url: String,
    /// Pfad des Session-Checks beim Identity-Dienst
    pub auth_pfad: String,
    /// Timeout pro HTTP-Anfrage in Sekunden
    pub timeout_sek: u64,
}

impl Default for DiensteEinstellungen {
    fn default() -> Self {
        Self {
            basis_url: "http://localhost".into(),
            auth_pfad: STANDARD_PRUEF_PFAD.into(),
            timeout_sek: 10,
        }
    }
}

impl DiensteEinstellungen {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_sek)
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Filter: "trace", "debug", "info", "warn", "error" oder Direktiven
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Pfad aus `CHATRELAY_CONFIG` oder `config.toml`
    pub fn pfad_aus_env() -> String {
        std::env::var(ENV_CONFIG_PFAD).unwrap_or_else(|_| STANDARD_CONFIG_PFAD.into())
    }

    /// Gibt die vollstaendige Bind-Adresse fuer den Listener zurueck
    pub fn bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        let roh = format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.port);
        roh.parse()
            .map_err(|e| anyhow::anyhow!("Ungueltige Bind-Adresse '{roh}': {e}"))
    }
}
