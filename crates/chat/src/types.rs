//! Oeffentliche Typen fuer Chat-Nachrichten

use serde::{Deserialize, Serialize};

use crate::error::ChatResult;

/// Envelope, das ein Client als Text-Frame schickt
///
/// Der Relay leitet den Text unveraendert weiter; geparst wird nur fuer
/// die Persistierung.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerNachricht {
    pub content: String,
    pub version: i64,
    pub message_id: String,
    pub user_id: String,
    pub chat_id: String,
}

impl ServerNachricht {
    /// Parst das JSON-Envelope aus einem empfangenen Text-Frame
    pub fn parsen(text: &str) -> ChatResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Body fuer den Storage-Dienst (ohne `chatId`, die steht im Pfad)
    pub fn speicher_eintrag(&self) -> SpeicherEintrag<'_> {
        SpeicherEintrag {
            content: &self.content,
            version: self.version,
            message_id: &self.message_id,
            user_id: &self.user_id,
        }
    }
}

/// JSON-Body eines POST an den Storage-Dienst
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeicherEintrag<'a> {
    pub content: &'a str,
    pub version: i64,
    pub message_id: &'a str,
    pub user_id: &'a str,
}

/// Gespeicherte Nachricht innerhalb eines Chats
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatNachricht {
    pub message_id: String,
    pub version: i64,
    pub user_id: String,
    pub content: String,
}

/// Chat wie ihn der Storage-Dienst liefert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub messages: Vec<ChatNachricht>,
}
