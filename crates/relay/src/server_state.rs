//! Gemeinsamer Server-Zustand fuer den Relay-Service
//!
//! Haelt Registry, Broadcaster und die externen Dienste als Arc-Referenzen,
//! die sicher zwischen tokio-Tasks geteilt werden koennen.

use chatrelay_auth::SessionValidator;
use chatrelay_chat::NachrichtenSpeicher;
use futures_util::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::abonnent::{Persistierung, Weiterleitung};
use crate::broadcast::Broadcaster;
use crate::connection::Connection;
use crate::registry::ConnectionRegistry;

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
pub struct RelayState {
    pub registry: ConnectionRegistry,
    pub broadcaster: Broadcaster,
    /// Identity-Dienst
    pub validator: Arc<dyn SessionValidator>,
    /// Storage-Dienst
    pub speicher: Arc<dyn NachrichtenSpeicher>,
    /// Anzahl aufgebauter, noch nicht abgemeldeter Verbindungen
    verbindungen: AtomicUsize,
    pub start_zeit: Instant,
}

impl RelayState {
    pub fn neu(
        validator: Arc<dyn SessionValidator>,
        speicher: Arc<dyn NachrichtenSpeicher>,
    ) -> Arc<Self> {
        let registry = ConnectionRegistry::neu();
        Arc::new(Self {
            broadcaster: Broadcaster::neu(registry.clone()),
            registry,
            validator,
            speicher,
            verbindungen: AtomicUsize::new(0),
            start_zeit: Instant::now(),
        })
    }

    pub fn verbindungen_anzahl(&self) -> usize {
        self.verbindungen.load(Ordering::Relaxed)
    }

    pub fn uptime_sek(&self) -> u64 {
        self.start_zeit.elapsed().as_secs()
    }

    /// Haengt die Standard-Abonnenten an und registriert die Verbindung
    ///
    /// Reihenfolge: erst Weiterleitung, dann Persistierung.
    pub fn anmelden(&self, conn: &Arc<Connection>) {
        conn.abonnieren(Arc::new(Weiterleitung::neu(self.broadcaster.clone())));
        conn.abonnieren(Arc::new(Persistierung::neu(Arc::clone(&self.speicher))));

        if self.registry.hinzufuegen(Arc::clone(conn)) {
            let anzahl = self.verbindungen.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!(conn = %conn.id(), verbindungen = anzahl, "Verbindung angemeldet");
        }
    }

    /// Schliesst die Verbindung und entfernt sie aus der Registry
    ///
    /// Nur der erste Aufruf pro Verbindung wirkt; `true` genau dann.
    pub async fn abmelden(&self, conn: &Arc<Connection>) -> bool {
        if !conn.schliessen().await {
            return false;
        }
        self.austragen(conn);
        true
    }

    /// Entfernt die Verbindung aus der Registry und zaehlt herunter
    ///
    /// Darf nur von dem Pfad aufgerufen werden, dessen `schliessen` `true`
    /// geliefert hat.
    fn austragen(&self, conn: &Connection) -> bool {
        if self.registry.entfernen(&conn.id()).is_none() {
            return false;
        }
        let _ = self
            .verbindungen
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(1))
            });
        true
    }

    /// Sendet Close an alle Clients, schliesst und entfernt danach jede
    /// Verbindung genau einmal
    ///
    /// Verbindungen, die ein anderer Pfad bereits geschlossen hat, traegt
    /// dieser Pfad selbst aus. Gibt die Anzahl der hier getrennten
    /// Verbindungen zurueck.
    pub async fn alle_trennen(&self) -> usize {
        let bericht = self.broadcaster.close_an_alle().await;
        tracing::info!(
            close_gesendet = bericht.zugestellt,
            fehlgeschlagen = bericht.fehlgeschlagen,
            "Alle Clients werden getrennt"
        );

        let ergebnisse = join_all(self.registry.alle().into_iter().map(|conn| async move {
            conn.schliessen().await && self.austragen(&conn)
        }))
        .await;
        ergebnisse.into_iter().filter(|ok| *ok).count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chatrelay_auth::AuthResult;
    use chatrelay_chat::{Chat, ChatError, ChatResult, ServerNachricht};
    use chatrelay_core::SessionId;

    struct AllesGueltig;

    #[async_trait]
    impl SessionValidator for AllesGueltig {
        async fn pruefen(&self, _: &SessionId) -> AuthResult<()> {
            Ok(())
        }
    }

    struct KeinSpeicher;

    #[async_trait]
    impl NachrichtenSpeicher for KeinSpeicher {
        async fn speichern(&self, _: &SessionId, _: &ServerNachricht) -> ChatResult<()> {
            Ok(())
        }

        async fn chat_laden(&self, _: &SessionId, _: &str) -> ChatResult<Chat> {
            Err(ChatError::NichtGefunden)
        }
    }

    fn state() -> Arc<RelayState> {
        RelayState::neu(Arc::new(AllesGueltig), Arc::new(KeinSpeicher))
    }

    fn conn() -> (Arc<Connection>, tokio::io::DuplexStream) {
        let (client, server) = tokio::io::duplex(1024);
        (Connection::neu(SessionId::zufaellig(), server), client)
    }

    #[tokio::test]
    async fn anmelden_registriert_abonnenten() {
        let state = state();
        let (c, _client) = conn();

        state.anmelden(&c);
        assert_eq!(c.abonnenten_anzahl(), 2);
        assert_eq!(state.verbindungen_anzahl(), 1);
        assert!(state.registry.enthaelt(&c.id()));
    }

    #[tokio::test]
    async fn abmelden_wirkt_genau_einmal() {
        let state = state();
        let (c, _client) = conn();
        state.anmelden(&c);

        assert!(state.abmelden(&c).await);
        assert!(!state.abmelden(&c).await);
        assert_eq!(state.verbindungen_anzahl(), 0);
        assert_eq!(state.registry.anzahl(), 0);
    }

    #[tokio::test]
    async fn alle_trennen_waehrend_abmelden_zaehlt_genau_einmal() {
        let state = state();
        let (c, _client) = conn();
        state.anmelden(&c);

        // Verbindungs-Task hat `schliessen` gewonnen, aber noch nicht ausgetragen
        assert!(c.schliessen().await);
        assert_eq!(state.alle_trennen().await, 0);
        assert!(state.registry.enthaelt(&c.id()));
        assert_eq!(state.verbindungen_anzahl(), 1);

        assert!(state.austragen(&c));
        assert_eq!(state.registry.anzahl(), 0);
        assert_eq!(state.verbindungen_anzahl(), 0);
    }

    #[tokio::test]
    async fn alle_trennen_mit_haengendem_client() {
        let state = state();
        // Kleiner Puffer, Client liest nie
        let (_client, server) = tokio::io::duplex(64);
        let c = Connection::neu(SessionId::zufaellig(), server);
        state.anmelden(&c);

        let sender = {
            let c = Arc::clone(&c);
            tokio::spawn(async move { c.frame_senden(&"x".repeat(4000)).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let getrennt = tokio::time::timeout(
            crate::connection::CLOSE_SENDE_TIMEOUT * 3,
            state.alle_trennen(),
        )
        .await
        .expect("alle_trennen darf nicht am Client haengen");
        assert_eq!(getrennt, 1);
        assert_eq!(state.verbindungen_anzahl(), 0);
        assert!(!sender.await.unwrap());
    }

    #[tokio::test]
    async fn alle_trennen_leert_registry() {
        let state = state();
        let mut clients = Vec::new();
        let mut conns = Vec::new();
        for _ in 0..3 {
            let (c, client) = conn();
            state.anmelden(&c);
            conns.push(c);
            clients.push(client);
        }

        assert_eq!(state.alle_trennen().await, 3);
        assert_eq!(state.registry.anzahl(), 0);
        assert_eq!(state.verbindungen_anzahl(), 0);

        // Spaetes Abmelden durch den Verbindungs-Task bleibt folgenlos
        for c in &conns {
            assert!(!state.abmelden(c).await);
        }
        assert_eq!(state.verbindungen_anzahl(), 0);
    }
}
