//! tokio-util Codec fuer WebSocket-Frames
//!
//! `FrameCodec` verbindet die reinen Funktionen aus [`crate::frame`] mit
//! `tokio_util::codec::{FramedRead, FramedWrite}`. Liefert ein Socket-Read
//! nur einen Teil des Frames, gibt `decode` `Ok(None)` zurueck, reserviert
//! die fehlenden Bytes im Buffer und `FramedRead` liest weiter, bis der
//! Payload vollstaendig ist.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtokollFehler;
use crate::frame::{self, Dekodiert, Frame, MAX_PAYLOAD_LAENGE};

// ---------------------------------------------------------------------------
// FrameCodec
// ---------------------------------------------------------------------------

/// Codec fuer WebSocket-Frames
///
/// # Beispiel
///
/// ```rust,no_run
/// use tokio_util::codec::FramedRead;
/// use chatrelay_protocol::wire::FrameCodec;
///
/// // let (lesen, schreiben) = tokio::io::split(stream);
/// // let frames = FramedRead::new(lesen, FrameCodec::new());
/// ```
#[derive(Debug, Clone)]
pub struct FrameCodec {
    /// Maximale erlaubte Payload-Groesse in Bytes
    max_payload: usize,
}

impl FrameCodec {
    /// Erstellt einen neuen `FrameCodec` mit dem Protokoll-Maximum (65535 Bytes)
    pub fn new() -> Self {
        Self {
            max_payload: MAX_PAYLOAD_LAENGE,
        }
    }

    /// Erstellt einen `FrameCodec` mit kleinerer maximaler Payload-Groesse
    ///
    /// Werte ueber 65535 werden auf 65535 begrenzt.
    pub fn with_max_size(max_payload: usize) -> Self {
        Self {
            max_payload: max_payload.min(MAX_PAYLOAD_LAENGE),
        }
    }

    pub fn max_payload(&self) -> usize {
        self.max_payload
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Decoder-Implementierung
// ---------------------------------------------------------------------------

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProtokollFehler;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Kopf zuerst, damit zu grosse Frames abgelehnt werden bevor gepuffert wird
        let kopf = match frame::kopf_dekodieren(src)? {
            Dekodiert::Vollstaendig { wert, .. } => wert,
            Dekodiert::BrauchtMehr(n) => {
                src.reserve(n);
                return Ok(None);
            }
        };

        if kopf.payload_laenge > self.max_payload {
            return Err(ProtokollFehler::PayloadZuGross {
                laenge: kopf.payload_laenge,
                max: self.max_payload,
            });
        }

        match frame::dekodieren(src)? {
            Dekodiert::Vollstaendig { wert, verbraucht } => {
                src.advance(verbraucht);
                Ok(Some(wert))
            }
            Dekodiert::BrauchtMehr(n) => {
                // Speicher vorbelegen um Reallocations zu vermeiden
                src.reserve(n);
                Ok(None)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Encoder-Implementierung
// ---------------------------------------------------------------------------

impl Encoder<Frame> for FrameCodec {
    type Error = ProtokollFehler;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.payload.len() > self.max_payload {
            return Err(ProtokollFehler::PayloadZuGross {
                laenge: item.payload.len(),
                max: self.max_payload,
            });
        }
        frame::kodieren(&item, dst)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
