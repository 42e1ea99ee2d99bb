//! chatrelay-protocol – WebSocket-Protokoll
//!
//! Dieses Crate kapselt alles, was byte-genau auf der Leitung passiert:
//! Frame-Aufbau, Maskierung, Laengenkodierung, den tokio-util Codec fuer
//! gestueckelte Socket-Reads und den HTTP-Upgrade-Handshake.

pub mod error;
pub mod frame;
pub mod handshake;
pub mod wire;

pub use error::{HandshakeFehler, ProtokollFehler, ProtokollResult};
pub use frame::{Dekodiert, Frame, OpCode};
pub use handshake::HandshakeAnfrage;
pub use wire::FrameCodec;
