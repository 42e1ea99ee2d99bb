//! chatrelay-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;
pub mod console;

use anyhow::{Context, Result};
use chatrelay_auth::{HttpSessionValidator, SessionValidator};
use chatrelay_chat::{HttpNachrichtenSpeicher, NachrichtenSpeicher};
use chatrelay_relay::{RelayListener, RelayState};
use config::ServerConfig;
use console::{Befehl, BILDSCHIRM_LEEREN};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
    state: Arc<RelayState>,
}

impl Server {
    /// Erstellt einen Server mit HTTP-Anbindung an Identity- und Storage-Dienst
    pub fn neu(config: ServerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.dienste.timeout())
            .build()
            .context("HTTP-Client konnte nicht erstellt werden")?;

        let validator = Arc::new(HttpSessionValidator::neu(
            client.clone(),
            &config.dienste.basis_url,
            &config.dienste.auth_pfad,
        ));
        let speicher = Arc::new(HttpNachrichtenSpeicher::neu(client, &config.dienste.basis_url));
        Ok(Self::mit_diensten(config, validator, speicher))
    }

    /// Erstellt einen Server mit beliebigen Dienst-Implementierungen
    pub fn mit_diensten(
        config: ServerConfig,
        validator: Arc<dyn SessionValidator>,
        speicher: Arc<dyn NachrichtenSpeicher>,
    ) -> Self {
        Self {
            config,
            state: RelayState::neu(validator, speicher),
        }
    }

    pub fn state(&self) -> &Arc<RelayState> {
        &self.state
    }

    /// Startet Konsole und Ctrl-C-Handler und laeuft bis `exit`
    pub async fn starten(self) -> Result<()> {
        let (befehl_tx, befehl_rx) = mpsc::channel(16);
        console::konsole_starten(befehl_tx.clone());

        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown-Signal empfangen");
                    let _ = befehl_tx.send(Befehl::Exit).await;
                }
                Err(e) => tracing::error!(fehler = %e, "Ctrl-C-Handler nicht installierbar"),
            }
        });

        self.ausfuehren(befehl_rx).await
    }

    /// Server-Schleife: Listener betreiben und Konsolen-Befehle abarbeiten
    ///
    /// `exit` (oder ein geschlossener Befehlskanal) trennt alle Clients und
    /// beendet. `restart` trennt alle Clients und bindet einen neuen
    /// Listener auf derselben Adresse.
    pub async fn ausfuehren(self, mut befehle: mpsc::Receiver<Befehl>) -> Result<()> {
        let mut adresse = self.config.bind_adresse()?;
        tracing::info!(
            adresse = %adresse,
            dienste = %self.config.dienste.basis_url,
            "Server startet"
        );

        loop {
            let listener = RelayListener::binden(Arc::clone(&self.state), adresse)
                .await
                .with_context(|| format!("Listener konnte nicht an {adresse} binden"))?;
            // Port 0 nur beim ersten Binden aufloesen, Neustarts nutzen denselben Port
            adresse = listener.lokale_adresse()?;

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let listener_task = tokio::spawn(listener.starten(shutdown_rx));

            let neustart = loop {
                match befehle.recv().await {
                    Some(Befehl::Exit) | None => break false,
                    Some(Befehl::Restart) => break true,
                    Some(Befehl::Clear) => {
                        print!("{BILDSCHIRM_LEEREN}");
                        let _ = std::io::stdout().flush();
                    }
                    Some(Befehl::Connections) => {
                        tracing::info!(
                            verbindungen = self.state.verbindungen_anzahl(),
                            registriert = self.state.registry.anzahl(),
                            uptime_sek = self.state.uptime_sek(),
                            "Aktuelle Verbindungen"
                        );
                    }
                    Some(Befehl::Unbekannt(befehl)) => {
                        tracing::warn!(befehl = %befehl, "Unbekannter Befehl");
                    }
                }
            };

            shutdown_tx.send_replace(true);
            listener_task
                .await
                .context("Listener-Task abgebrochen")?
                .context("Listener-Fehler")?;

            let getrennt = self.state.alle_trennen().await;
            tracing::info!(getrennt, "Alle Verbindungen getrennt");

            if !neustart {
                break;
            }
            tracing::info!(adresse = %adresse, "Listener wird neu gestartet");
        }

        tracing::info!("Server beendet");
        Ok(())
    }
}
