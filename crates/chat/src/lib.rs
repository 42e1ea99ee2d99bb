//! chatrelay-chat – Chat-Nachrichten und Storage-Dienst
//!
//! Dieses Crate implementiert:
//! - `ServerNachricht`: das JSON-Envelope, das Clients als Text-Frame senden
//! - `NachrichtenSpeicher`-Trait als Grenze zum externen Storage-Dienst
//! - `HttpNachrichtenSpeicher`: POST/GET gegen `/api/chat/storage/{chatId}`
//!
//! # Beispiel
//!
//! ```no_run
//! use chatrelay_chat::{HttpNachrichtenSpeicher, NachrichtenSpeicher, ServerNachricht};
//! use chatrelay_core::SessionId;
//!
//! #[tokio::main]
//! async fn main() {
//!     let speicher = HttpNachrichtenSpeicher::neu(reqwest::Client::new(), "http://localhost");
//!     let nachricht = ServerNachricht::parsen(r#"{"content":"Hallo","version":1,
//!         "messageId":"m1","userId":"u1","chatId":"c1"}"#).unwrap();
//!     speicher.speichern(&SessionId::zufaellig(), &nachricht).await.unwrap();
//! }
//! ```

pub mod error;
pub mod storage;
pub mod types;

#[cfg(test)]
mod tests;

// Bequeme Re-Exporte
pub use error::{ChatError, ChatResult};
pub use storage::{HttpNachrichtenSpeicher, NachrichtenSpeicher, STORAGE_PFAD};
pub use types::{Chat, ChatNachricht, ServerNachricht, SpeicherEintrag};
