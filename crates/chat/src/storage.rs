//! Storage-Dienst fuer Chat-Nachrichten
//!
//! Das `NachrichtenSpeicher`-Trait abstrahiert den externen Dienst. Fehler
//! werden an den Aufrufer gegeben und dort geloggt; es gibt keine
//! Wiederholungen, die Nachricht ist zu diesem Zeitpunkt bereits verteilt.

use async_trait::async_trait;
use chatrelay_core::SessionId;
use reqwest::{header, Client, StatusCode};

use crate::error::{ChatError, ChatResult};
use crate::types::{Chat, ServerNachricht};

/// Pfad-Praefix des Storage-Dienstes; die Chat-ID wird angehaengt
pub const STORAGE_PFAD: &str = "/api/chat/storage/";

/// Abstrakter Storage-Dienst
#[async_trait]
pub trait NachrichtenSpeicher: Send + Sync {
    /// Nachricht im Chat `nachricht.chat_id` speichern
    async fn speichern(&self, session: &SessionId, nachricht: &ServerNachricht) -> ChatResult<()>;

    /// Chat inkl. Nachrichten laden
    async fn chat_laden(&self, session: &SessionId, chat_id: &str) -> ChatResult<Chat>;
}

/// HTTP-basierter Storage-Dienst, authentifiziert per Session-Cookie
#[derive(Debug, Clone)]
pub struct HttpNachrichtenSpeicher {
    client: Client,
    basis_url: String,
}

impl HttpNachrichtenSpeicher {
    pub fn neu(client: Client, basis_url: &str) -> Self {
        Self {
            client,
            basis_url: basis_url.trim_end_matches('/').to_string(),
        }
    }

    /// Vollstaendige URL fuer einen Chat
    pub fn chat_url(&self, chat_id: &str) -> String {
        format!("{}{}{}", self.basis_url, STORAGE_PFAD, chat_id)
    }
}

#[async_trait]
impl NachrichtenSpeicher for HttpNachrichtenSpeicher {
    async fn speichern(&self, session: &SessionId, nachricht: &ServerNachricht) -> ChatResult<()> {
        let antwort = self
            .client
            .post(self.chat_url(&nachricht.chat_id))
            .header(header::COOKIE, session.als_cookie())
            .json(&nachricht.speicher_eintrag())
            .send()
            .await?;

        let status = antwort.status();
        if !status.is_success() {
            return Err(ChatError::SpeichernFehlgeschlagen {
                status: status.as_u16(),
                grund: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        tracing::debug!(
            chat_id = %nachricht.chat_id,
            message_id = %nachricht.message_id,
            "Nachricht gespeichert"
        );
        Ok(())
    }

    async fn chat_laden(&self, session: &SessionId, chat_id: &str) -> ChatResult<Chat> {
        let antwort = self
            .client
            .get(self.chat_url(chat_id))
            .header(header::COOKIE, session.als_cookie())
            .send()
            .await?;

        match antwort.status() {
            s if s.is_success() => {}
            StatusCode::FORBIDDEN => return Err(ChatError::NichtAutorisiert),
            StatusCode::NOT_FOUND => return Err(ChatError::NichtGefunden),
            StatusCode::INTERNAL_SERVER_ERROR => return Err(ChatError::ServerFehler),
            s => return Err(ChatError::UnerwarteterStatus(s.as_u16())),
        }

        let body = antwort.text().await?;
        serde_json::from_str(&body).map_err(|e| ChatError::FormatFehler(e.to_string()))
    }
}
