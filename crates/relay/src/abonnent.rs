//! Abonnenten empfangener Nachrichten
//!
//! Jede `Connection` haelt eine geordnete Liste von Abonnenten. Der Listener
//! registriert pro Verbindung zwei: die Weiterleitung an alle anderen Clients
//! und die Persistierung beim Storage-Dienst.

use async_trait::async_trait;
use chatrelay_chat::{NachrichtenSpeicher, ServerNachricht};
use chatrelay_core::{ConnectionId, SessionId};
use std::sync::Arc;

use crate::broadcast::Broadcaster;
use crate::error::RelayResult;

/// Dekodierter Text plus Identitaet des Absenders
#[derive(Debug, Clone)]
pub struct AnwendungsNachricht {
    pub absender: ConnectionId,
    pub session_id: SessionId,
    pub text: Arc<str>,
}

/// Empfaenger fuer Nachrichten einer Verbindung
#[async_trait]
pub trait NachrichtenAbonnent: Send + Sync {
    async fn nachricht_empfangen(&self, nachricht: &AnwendungsNachricht) -> RelayResult<()>;
}

// ---------------------------------------------------------------------------
// Weiterleitung
// ---------------------------------------------------------------------------

/// Leitet jede Nachricht unveraendert an alle anderen Verbindungen weiter
pub struct Weiterleitung {
    broadcaster: Broadcaster,
}

impl Weiterleitung {
    pub fn neu(broadcaster: Broadcaster) -> Self {
        Self { broadcaster }
    }
}

#[async_trait]
impl NachrichtenAbonnent for Weiterleitung {
    async fn nachricht_empfangen(&self, nachricht: &AnwendungsNachricht) -> RelayResult<()> {
        let bericht = self
            .broadcaster
            .weiterleiten(&nachricht.absender, Arc::clone(&nachricht.text))
            .await;

        if bericht.fehlgeschlagen > 0 {
            tracing::warn!(
                absender = %nachricht.absender,
                zugestellt = bericht.zugestellt,
                fehlgeschlagen = bericht.fehlgeschlagen,
                "Broadcast teilweise fehlgeschlagen"
            );
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Persistierung
// ---------------------------------------------------------------------------

/// Parst das Chat-Envelope und speichert es im Hintergrund
///
/// Das Speichern blockiert die Empfangsschleife nicht; Fehler werden nur
/// geloggt.
pub struct Persistierung {
    speicher: Arc<dyn NachrichtenSpeicher>,
}

impl Persistierung {
    pub fn neu(speicher: Arc<dyn NachrichtenSpeicher>) -> Self {
        Self { speicher }
    }
}

#[async_trait]
impl NachrichtenAbonnent for Persistierung {
    async fn nachricht_empfangen(&self, nachricht: &AnwendungsNachricht) -> RelayResult<()> {
        let envelope = ServerNachricht::parsen(&nachricht.text)?;
        let speicher = Arc::clone(&self.speicher);
        let session = nachricht.session_id.clone();

        tokio::spawn(async move {
            if let Err(e) = speicher.speichern(&session, &envelope).await {
                tracing::warn!(
                    chat_id = %envelope.chat_id,
                    message_id = %envelope.message_id,
                    fehler = %e,
                    "Nachricht konnte nicht gespeichert werden"
                );
            }
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
