//! Konsolen-Befehle von stdin
//!
//! Jede Zeile ist ein Befehl. Der Leser laeuft in einem eigenen Task und
//! schickt geparste Befehle ueber einen mpsc-Kanal an die Server-Schleife.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// ANSI-Sequenz: Bildschirm leeren, Cursor nach oben links
pub const BILDSCHIRM_LEEREN: &str = "\x1B[2J\x1B[1;1H";

/// Befehl an die Server-Schleife
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Befehl {
    /// Alle Clients trennen und beenden
    Exit,
    /// Alle Clients trennen und Listener neu binden
    Restart,
    /// Konsole leeren
    Clear,
    /// Anzahl offener Verbindungen ausgeben
    Connections,
    Unbekannt(String),
}

impl Befehl {
    /// Parst eine Eingabezeile; `None` fuer Leerzeilen
    pub fn parsen(zeile: &str) -> Option<Self> {
        let befehl = zeile.trim();
        if befehl.is_empty() {
            return None;
        }

        Some(match befehl.to_ascii_lowercase().as_str() {
            "exit" => Self::Exit,
            "restart" => Self::Restart,
            "clear" => Self::Clear,
            "connections" => Self::Connections,
            _ => Self::Unbekannt(befehl.to_string()),
        })
    }
}

/// Startet den stdin-Leser als Hintergrund-Task
pub fn konsole_starten(tx: mpsc::Sender<Befehl>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(befehle_lesen(BufReader::new(tokio::io::stdin()), tx))
}

/// Liest Zeilen bis EOF oder bis der Empfaenger weg ist
pub async fn befehle_lesen<R>(leser: R, tx: mpsc::Sender<Befehl>)
where
    R: AsyncBufRead + Unpin,
{
    let mut zeilen = leser.lines();
    loop {
        match zeilen.next_line().await {
            Ok(Some(zeile)) => {
                let Some(befehl) = Befehl::parsen(&zeile) else {
                    continue;
                };
                if tx.send(befehl).await.is_err() {
                    break;
                }
            }
            Ok(None) => {
                tracing::debug!("Konsole: stdin geschlossen");
                break;
            }
            Err(e) => {
                tracing::warn!(fehler = %e, "Konsole: Lesefehler");
                break;
            }
        }
    }
}
