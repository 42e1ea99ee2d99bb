//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable (hat Vorrang vor der Config-Datei):
//! - `CR_LOG_LEVEL`: Filter-Direktive (trace/debug/info/warn/error oder
//!   `chatrelay_relay=debug,info`), Standard: info
//! - `CR_LOG_FORMAT`: Format (text/json), Standard: text

use std::str::FromStr;
use thiserror::Error;
use tracing_subscriber::{fmt, EnvFilter};

/// Umgebungsvariable fuer den Log-Filter
pub const ENV_LOG_LEVEL: &str = "CR_LOG_LEVEL";
/// Umgebungsvariable fuer das Log-Format
pub const ENV_LOG_FORMAT: &str = "CR_LOG_FORMAT";

#[derive(Debug, Error)]
pub enum LoggingFehler {
    #[error("Ungueltiges Log-Format: {0} (erlaubt: text, json)")]
    UngueltigesFormat(String),

    #[error("Ungueltiger Log-Filter '{filter}': {grund}")]
    UngueltigerFilter { filter: String, grund: String },

    #[error("Logging bereits initialisiert: {0}")]
    BereitsInitialisiert(String),
}

/// Ausgabeformat der Log-Zeilen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingFehler;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            andere => Err(LoggingFehler::UngueltigesFormat(andere.to_string())),
        }
    }
}

/// Aufgeloeste Logging-Einstellungen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEinstellungen {
    pub filter: String,
    pub format: LogFormat,
}

impl LogEinstellungen {
    /// Kombiniert Config-Werte mit den Overrides aus der Umgebung
    pub fn aus_umgebung(level: &str, format: &str) -> Result<Self, LoggingFehler> {
        Self::aufloesen(
            level,
            format,
            std::env::var(ENV_LOG_LEVEL).ok(),
            std::env::var(ENV_LOG_FORMAT).ok(),
        )
    }

    /// Overrides gewinnen, sofern gesetzt und nicht leer
    pub fn aufloesen(
        level: &str,
        format: &str,
        env_level: Option<String>,
        env_format: Option<String>,
    ) -> Result<Self, LoggingFehler> {
        let filter = env_level
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| level.to_string());
        let format = env_format
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| format.to_string());

        Ok(Self {
            filter,
            format: format.parse()?,
        })
    }

    fn env_filter(&self) -> Result<EnvFilter, LoggingFehler> {
        EnvFilter::try_new(&self.filter).map_err(|e| LoggingFehler::UngueltigerFilter {
            filter: self.filter.clone(),
            grund: e.to_string(),
        })
    }
}

/// Initialisiert das Logging-System.
///
/// `level` und `format` stammen aus der Config und werden von `CR_LOG_LEVEL`
/// bzw. `CR_LOG_FORMAT` ueberschrieben.
pub fn logging_initialisieren(level: &str, format: &str) -> Result<LogEinstellungen, LoggingFehler> {
    let einstellungen = LogEinstellungen::aus_umgebung(level, format)?;
    let filter = einstellungen.env_filter()?;

    let ergebnis = match einstellungen.format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt().with_env_filter(filter).with_target(true).try_init(),
    };
    ergebnis.map_err(|e| LoggingFehler::BereitsInitialisiert(e.to_string()))?;

    Ok(einstellungen)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parsen() {
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("JSON".parse::<LogFormat>().is_err()); // Gross-/Kleinschreibung
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn config_werte_ohne_override() {
        let e = LogEinstellungen::aufloesen("warn", "json", None, None).unwrap();
        assert_eq!(e.filter, "warn");
        assert_eq!(e.format, LogFormat::Json);
    }

    #[test]
    fn override_gewinnt() {
        let e = LogEinstellungen::aufloesen(
            "info",
            "text",
            Some("chatrelay_relay=debug,info".into()),
            Some("json".into()),
        )
        .unwrap();
        assert_eq!(e.filter, "chatrelay_relay=debug,info");
        assert_eq!(e.format, LogFormat::Json);
    }

    #[test]
    fn leerer_override_wird_ignoriert() {
        let e = LogEinstellungen::aufloesen("debug", "text", Some(" ".into()), Some(String::new()))
            .unwrap();
        assert_eq!(e.filter, "debug");
        assert_eq!(e.format, LogFormat::Text);
    }

    #[test]
    fn ungueltiges_format_ist_fehler() {
        assert!(matches!(
            LogEinstellungen::aufloesen("info", "yaml", None, None),
            Err(LoggingFehler::UngueltigesFormat(_))
        ));
    }

    #[test]
    fn filter_wird_geprueft() {
        let gut = LogEinstellungen::aufloesen("info", "text", None, None).unwrap();
        assert!(gut.env_filter().is_ok());

        let schlecht = LogEinstellungen::aufloesen("chatrelay=blub", "text", None, None).unwrap();
        assert!(matches!(
            schlecht.env_filter(),
            Err(LoggingFehler::UngueltigerFilter { .. })
        ));
    }
}
