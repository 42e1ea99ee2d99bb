//! chatrelay-relay – WebSocket Relay
//!
//! Dieser Crate nimmt WebSocket-Verbindungen an, prueft die Session beim
//! Identity-Dienst und verteilt jede empfangene Text-Nachricht an alle
//! anderen Clients. Parallel wird die Nachricht beim Storage-Dienst
//! gespeichert.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (RelayListener)
//!     |
//!     v
//! VerbindungsDispatcher (pro Socket ein Task)
//!     |  Handshake -> Session pruefen -> 101
//!     v
//! Connection (Empfangsschleife)
//!     |
//!     +-- Weiterleitung  -> Broadcaster -> alle anderen Connections
//!     +-- Persistierung  -> NachrichtenSpeicher
//!
//! ConnectionRegistry – alle offenen Verbindungen
//! ```

pub mod abonnent;
pub mod broadcast;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod registry;
pub mod server_state;
pub mod tcp;

// Bequeme Re-Exporte
pub use abonnent::{AnwendungsNachricht, NachrichtenAbonnent, Persistierung, Weiterleitung};
pub use broadcast::{BroadcastBericht, Broadcaster};
pub use connection::{Connection, VerbindungsZustand};
pub use dispatcher::VerbindungsDispatcher;
pub use error::{RelayError, RelayResult};
pub use registry::ConnectionRegistry;
pub use server_state::RelayState;
pub use tcp::RelayListener;
