//! Broadcaster – Verteilt Nachrichten an alle anderen Verbindungen
//!
//! Sendungen an die Empfaenger laufen nebenlaeufig via `join_all`.
//! `weiterleiten` kehrt erst zurueck, wenn jede Sendung abgeschlossen ist;
//! einzelne Fehlschlaege werden gezaehlt und geloggt, brechen aber nichts ab.

use chatrelay_core::ConnectionId;
use futures_util::future::join_all;
use std::future::Future;
use std::sync::Arc;

use crate::connection::Connection;
use crate::registry::ConnectionRegistry;

/// Ergebnis eines Broadcasts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastBericht {
    pub zugestellt: usize,
    pub fehlgeschlagen: usize,
}

/// Fan-out ueber die ConnectionRegistry
#[derive(Clone)]
pub struct Broadcaster {
    registry: ConnectionRegistry,
}

impl Broadcaster {
    pub fn neu(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    /// Sendet `nachricht` als Text-Frame an jede Verbindung ausser `absender`
    pub async fn weiterleiten(
        &self,
        absender: &ConnectionId,
        nachricht: Arc<str>,
    ) -> BroadcastBericht {
        let empfaenger = self.registry.alle_ausser(absender);
        let anzahl = empfaenger.len();

        let bericht = an_alle(empfaenger, move |conn| {
            let nachricht = Arc::clone(&nachricht);
            async move { conn.frame_senden(&nachricht).await }
        })
        .await;

        tracing::trace!(
            absender = %absender,
            empfaenger = anzahl,
            zugestellt = bericht.zugestellt,
            "Nachricht weitergeleitet"
        );
        bericht
    }

    /// Sendet Close an jede registrierte Verbindung
    pub async fn close_an_alle(&self) -> BroadcastBericht {
        an_alle(self.registry.alle(), |conn| async move { conn.close_senden().await }).await
    }
}

async fn an_alle<F, Fut>(empfaenger: Vec<Arc<Connection>>, senden: F) -> BroadcastBericht
where
    F: FnMut(Arc<Connection>) -> Fut,
    Fut: Future<Output = bool>,
{
    let ergebnisse = join_all(empfaenger.into_iter().map(senden)).await;
    let zugestellt = ergebnisse.iter().filter(|ok| **ok).count();
    BroadcastBericht {
        zugestellt,
        fehlgeschlagen: ergebnisse.len() - zugestellt,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chatrelay_core::SessionId;
    use chatrelay_protocol::{FrameCodec, OpCode};
    use futures_util::StreamExt;
    use std::time::Duration;
    use tokio::io::DuplexStream;
    use tokio_util::codec::FramedRead;

    fn registrieren(registry: &ConnectionRegistry) -> (Arc<Connection>, FramedRead<DuplexStream, FrameCodec>) {
        let (client, server) = tokio::io::duplex(4096);
        let conn = Connection::neu(SessionId::zufaellig(), server);
        registry.hinzufuegen(Arc::clone(&conn));
        (conn, FramedRead::new(client, FrameCodec::new()))
    }

    #[tokio::test]
    async fn absender_wird_ausgelassen() {
        let registry = ConnectionRegistry::neu();
        let broadcaster = Broadcaster::neu(registry.clone());
        let (a, mut leser_a) = registrieren(&registry);
        let (_b, mut leser_b) = registrieren(&registry);
        let (_c, mut leser_c) = registrieren(&registry);

        let bericht = broadcaster.weiterleiten(&a.id(), Arc::from("hi")).await;
        assert_eq!(bericht, BroadcastBericht { zugestellt: 2, fehlgeschlagen: 0 });

        for leser in [&mut leser_b, &mut leser_c] {
            let frame = leser.next().await.unwrap().unwrap();
            assert_eq!(frame.opcode, OpCode::Text);
            assert_eq!(&frame.payload[..], b"hi");
        }
        let nichts = tokio::time::timeout(Duration::from_millis(100), leser_a.next()).await;
        assert!(nichts.is_err(), "Absender darf nichts erhalten");
    }

    #[tokio::test]
    async fn einzelner_absender_sendet_nichts() {
        let registry = ConnectionRegistry::neu();
        let broadcaster = Broadcaster::neu(registry.clone());
        let (a, _leser) = registrieren(&registry);

        let bericht = broadcaster.weiterleiten(&a.id(), Arc::from("allein")).await;
        assert_eq!(bericht, BroadcastBericht::default());
    }

    #[tokio::test]
    async fn geschlossener_empfaenger_zaehlt_als_fehlschlag() {
        let registry = ConnectionRegistry::neu();
        let broadcaster = Broadcaster::neu(registry.clone());
        let (a, _la) = registrieren(&registry);
        let (b, _lb) = registrieren(&registry);
        let (_c, mut lc) = registrieren(&registry);
        b.schliessen().await;

        let bericht = broadcaster.weiterleiten(&a.id(), Arc::from("x")).await;
        assert_eq!(bericht, BroadcastBericht { zugestellt: 1, fehlgeschlagen: 1 });
        assert_eq!(&lc.next().await.unwrap().unwrap().payload[..], b"x");
    }

    #[tokio::test]
    async fn close_an_alle() {
        let registry = ConnectionRegistry::neu();
        let broadcaster = Broadcaster::neu(registry.clone());
        let (_a, mut la) = registrieren(&registry);
        let (_b, mut lb) = registrieren(&registry);

        let bericht = broadcaster.close_an_alle().await;
        assert_eq!(bericht.zugestellt, 2);
        for leser in [&mut la, &mut lb] {
            assert_eq!(leser.next().await.unwrap().unwrap().opcode, OpCode::Close);
        }
    }
}
