//! Dispatcher – Handshake und Lebenszyklus einer eingehenden Verbindung
//!
//! Ablauf pro Socket:
//! 1. Anfrage-Kopf lesen und parsen (`400` bei Fehler)
//! 2. Session beim Identity-Dienst pruefen (`403` bei Ablehnung)
//! 3. `101 Switching Protocols` senden
//! 4. `Connection` erstellen, Abonnenten anhaengen, registrieren
//! 5. Empfangsschleife bis zum Ende, danach genau einmal abmelden

use chatrelay_protocol::handshake::{
    self, antwort_switching_protocols, ANTWORT_BAD_REQUEST, ANTWORT_FORBIDDEN,
};
use chatrelay_protocol::{HandshakeAnfrage, HandshakeFehler};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::connection::Connection;
use crate::error::{RelayError, RelayResult};
use crate::server_state::RelayState;

/// Bedient akzeptierte Sockets
#[derive(Clone)]
pub struct VerbindungsDispatcher {
    state: Arc<RelayState>,
}

impl VerbindungsDispatcher {
    pub fn neu(state: Arc<RelayState>) -> Self {
        Self { state }
    }

    /// Fuehrt Handshake und Empfangsschleife fuer einen Socket aus
    ///
    /// Kehrt zurueck, wenn die Verbindung beendet und abgemeldet ist.
    pub async fn bedienen<S>(&self, mut stream: S, peer_addr: SocketAddr) -> RelayResult<()>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (anfrage, vorgelesen) = match handshake::kopf_lesen(&mut stream).await {
            Ok((kopf, rest)) => match HandshakeAnfrage::parsen(&kopf) {
                Ok(anfrage) => (anfrage, rest),
                Err(e) => return ablehnen(&mut stream, peer_addr, ANTWORT_BAD_REQUEST, e.into()).await,
            },
            Err(HandshakeFehler::Io(e)) => return Err(e.into()),
            Err(HandshakeFehler::Unvollstaendig) => {
                tracing::debug!(peer = %peer_addr, "Verbindung vor Handshake getrennt");
                return Ok(());
            }
            Err(e) => return ablehnen(&mut stream, peer_addr, ANTWORT_BAD_REQUEST, e.into()).await,
        };

        if let Err(e) = self.state.validator.pruefen(&anfrage.session_id).await {
            return ablehnen(&mut stream, peer_addr, ANTWORT_FORBIDDEN, e.into()).await;
        }

        let antwort = antwort_switching_protocols(&anfrage.accept_schluessel());
        stream.write_all(antwort.as_bytes()).await?;
        stream.flush().await?;

        let conn = Connection::mit_puffer(anfrage.session_id, stream, vorgelesen, Some(peer_addr));
        self.state.anmelden(&conn);
        tracing::info!(
            peer = %peer_addr,
            conn = %conn.id(),
            verbindungen = self.state.verbindungen_anzahl(),
            "WebSocket-Handshake abgeschlossen"
        );

        conn.ausfuehren().await;
        self.state.abmelden(&conn).await;
        Ok(())
    }
}

/// Sendet eine Fehlerantwort, schliesst den Socket und gibt `fehler` zurueck
async fn ablehnen<S>(
    stream: &mut S,
    peer_addr: SocketAddr,
    antwort: &str,
    fehler: RelayError,
) -> RelayResult<()>
where
    S: AsyncWrite + Unpin,
{
    tracing::warn!(peer = %peer_addr, fehler = %fehler, "Verbindungsversuch abgelehnt");
    if let Err(e) = stream.write_all(antwort.as_bytes()).await {
        tracing::debug!(peer = %peer_addr, fehler = %e, "Fehlerantwort nicht zustellbar");
    }
    if let Err(e) = stream.shutdown().await {
        tracing::debug!(peer = %peer_addr, fehler = %e, "Shutdown nach Ablehnung fehlgeschlagen");
    }
    Err(fehler)
}
