//! TCP-Listener – Bindet Socket, akzeptiert Verbindungen
//!
//! Der `RelayListener` bindet einen TCP-Socket und startet fuer jede
//! eingehende Verbindung einen eigenen tokio-Task mit dem
//! `VerbindungsDispatcher`. Ein Neustart erzeugt einen neuen Listener auf
//! derselben Adresse; die Registry bleibt im `RelayState`.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::dispatcher::VerbindungsDispatcher;
use crate::server_state::RelayState;

/// TCP-Listener fuer WebSocket-Clients
pub struct RelayListener {
    listener: TcpListener,
    dispatcher: VerbindungsDispatcher,
}

impl RelayListener {
    /// Bindet den Socket; Port 0 waehlt einen freien Port
    pub async fn binden(state: Arc<RelayState>, bind_addr: SocketAddr) -> std::io::Result<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        Ok(Self {
            listener,
            dispatcher: VerbindungsDispatcher::neu(state),
        })
    }

    /// Tatsaechlich gebundene Adresse
    pub fn lokale_adresse(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Akzeptiert Verbindungen bis `shutdown_rx` ein `true`-Signal empfaengt
    ///
    /// Der Socket wird beim Verlassen freigegeben. Laufende Verbindungen
    /// bleiben davon unberuehrt.
    pub async fn starten(
        self,
        mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) -> std::io::Result<()> {
        let lokale_addr = self.listener.local_addr()?;
        tracing::info!(adresse = %lokale_addr, "Relay-Server gestartet");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            tokio::select! {
                // Neue eingehende Verbindung
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            tracing::debug!(peer = %peer_addr, "Verbindung akzeptiert");
                            if let Err(e) = stream.set_nodelay(true) {
                                tracing::debug!(peer = %peer_addr, fehler = %e, "TCP_NODELAY nicht gesetzt");
                            }

                            let dispatcher = self.dispatcher.clone();
                            tokio::spawn(async move {
                                if let Err(e) = dispatcher.bedienen(stream, peer_addr).await {
                                    tracing::debug!(
                                        peer = %peer_addr,
                                        fehler = %e,
                                        "Verbindung mit Fehler beendet"
                                    );
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        }
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Relay-Server: Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        tracing::info!(adresse = %lokale_addr, "Relay-Server gestoppt");
        Ok(())
    }
}
