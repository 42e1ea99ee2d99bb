//! WebSocket-Frames (RFC 6455, Abschnitt 5.2)
//!
//! ## Frame-Format
//!
//! ```text
//!  0               1               2               3
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Basislaenge |  erweiterte Laenge (u16 BE)   |
//! |I|S|S|S|  (4)  |A|     (7)     |  nur bei Basislaenge == 126   |
//! |N|V|V|V|       |S|             |                               |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |  Masking-Key (4 Bytes, nur wenn MASK gesetzt)                 |
//! +---------------------------------------------------------------+
//! |  Payload                                                      |
//! +---------------------------------------------------------------+
//! ```
//!
//! Die erweiterte Laenge wird in beiden Richtungen in Network Byte Order
//! gelesen und geschrieben. 64-Bit-Laengen (Basislaenge 127) werden
//! abgelehnt, das Maximum liegt bei 65535 Payload-Bytes.
//!
//! Fortsetzungs-Frames werden nicht zu einer Nachricht zusammengesetzt;
//! jeder Frame wird einzeln behandelt.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{ProtokollFehler, ProtokollResult};

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Maximale Payload-Laenge (16-Bit-Laengenfeld)
pub const MAX_PAYLOAD_LAENGE: usize = u16::MAX as usize;

/// Groesste Laenge, die direkt im 7-Bit-Feld steht
pub const MAX_KURZE_LAENGE: usize = 125;

/// Basislaenge, der ein 16-Bit-Laengenfeld folgt
pub const LAENGE_16_BIT: u8 = 126;

/// Basislaenge, der ein 64-Bit-Laengenfeld folgt (nicht unterstuetzt)
pub const LAENGE_64_BIT: u8 = 127;

const FIN_BIT: u8 = 0b1000_0000;
const RSV_BITS: u8 = 0b0111_0000;
const OPCODE_BITS: u8 = 0b0000_1111;
const MASK_BIT: u8 = 0b1000_0000;
const LAENGE_BITS: u8 = 0b0111_1111;

// ---------------------------------------------------------------------------
// OpCode
// ---------------------------------------------------------------------------

/// Frame-Typ
///
/// Werte 3-7 und 11-15 werden auf `Reserved` abgebildet und sind immer ungueltig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OpCode {
    #[default]
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
    Reserved,
}

impl OpCode {
    /// Bildet die unteren vier Bits eines Bytes auf einen OpCode ab
    pub fn aus_byte(byte: u8) -> Self {
        match byte & OPCODE_BITS {
            0 => Self::Continuation,
            1 => Self::Text,
            2 => Self::Binary,
            8 => Self::Close,
            9 => Self::Ping,
            10 => Self::Pong,
            _ => Self::Reserved,
        }
    }

    /// Wert auf der Leitung; `None` fuer `Reserved`
    pub fn als_byte(self) -> Option<u8> {
        match self {
            Self::Continuation => Some(0),
            Self::Text => Some(1),
            Self::Binary => Some(2),
            Self::Close => Some(8),
            Self::Ping => Some(9),
            Self::Pong => Some(10),
            Self::Reserved => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// Ein einzelner WebSocket-Frame
///
/// `payload` ist immer unmaskiert. `mask` haelt den Schluessel, mit dem der
/// Frame auf der Leitung maskiert war (Client -> Server) bzw. maskiert
/// werden soll. Server -> Client Frames haben keinen Schluessel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    pub fin: bool,
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
    pub opcode: OpCode,
    pub mask: Option<[u8; 4]>,
    pub payload: Bytes,
}

impl Frame {
    /// Erstellt einen finalen, unmaskierten Frame
    pub fn neu(opcode: OpCode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin: true,
            opcode,
            payload: payload.into(),
            ..Default::default()
        }
    }

    /// Text-Frame (Header-Byte 0x81)
    pub fn text(text: impl Into<String>) -> Self {
        Self::neu(OpCode::Text, Bytes::from(text.into()))
    }

    /// Ping ohne Payload (0x89)
    pub fn ping() -> Self {
        Self::neu(OpCode::Ping, Bytes::new())
    }

    /// Pong ohne Payload (0x8A)
    pub fn pong() -> Self {
        Self::neu(OpCode::Pong, Bytes::new())
    }

    /// Close ohne Statuscode (0x88)
    pub fn close() -> Self {
        Self::neu(OpCode::Close, Bytes::new())
    }

    /// Setzt den Masking-Key (wie ein Client ihn verwenden wuerde)
    pub fn mit_maske(mut self, key: [u8; 4]) -> Self {
        self.mask = Some(key);
        self
    }

    pub fn ist_maskiert(&self) -> bool {
        self.mask.is_some()
    }

    pub fn payload_laenge(&self) -> usize {
        self.payload.len()
    }

    /// Gueltig genau dann, wenn keine reservierten Bits gesetzt sind und
    /// der OpCode nicht `Reserved` ist
    pub fn ist_gueltig(&self) -> bool {
        !self.rsv1 && !self.rsv2 && !self.rsv3 && self.opcode != OpCode::Reserved
    }

    /// Alle Felder auf Standardwert: kein verwertbarer Frame
    pub fn ist_leer(&self) -> bool {
        *self == Self::default()
    }
}

/// XOR der Bytes mit dem zyklisch wiederholten Schluessel (in-place)
///
/// Maskieren und Demaskieren sind dieselbe Operation.
pub fn maskieren(daten: &mut [u8], key: [u8; 4]) {
    for (i, byte) in daten.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

// ---------------------------------------------------------------------------
// Dekodieren
// ---------------------------------------------------------------------------

/// Geparster Frame-Kopf (alles vor dem Payload)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameKopf {
    pub fin: bool,
    pub opcode: OpCode,
    pub mask: Option<[u8; 4]>,
    pub payload_laenge: usize,
    /// Anzahl der Kopf-Bytes inkl. erweiterter Laenge und Masking-Key
    pub kopf_laenge: usize,
}

impl FrameKopf {
    /// Gesamtgroesse des Frames auf der Leitung
    pub fn frame_laenge(&self) -> usize {
        self.kopf_laenge + self.payload_laenge
    }
}

/// Ergebnis eines Dekodierversuchs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dekodiert<T> {
    /// Vollstaendig gelesen; `verbraucht` Bytes gehoeren zu diesem Frame
    Vollstaendig { wert: T, verbraucht: usize },
    /// Es fehlen noch mindestens so viele Bytes
    BrauchtMehr(usize),
}

/// Liest den Frame-Kopf
///
/// Byte 0 wird zuerst geprueft: reservierte Bits oder ein reservierter
/// OpCode brechen sofort ab, ohne Laenge oder Payload anzusehen.
pub fn kopf_dekodieren(buf: &[u8]) -> ProtokollResult<Dekodiert<FrameKopf>> {
    let Some(&byte0) = buf.first() else {
        return Ok(Dekodiert::BrauchtMehr(2));
    };

    let rsv = byte0 & RSV_BITS;
    if rsv != 0 {
        return Err(ProtokollFehler::ReservierteBits(rsv >> 4));
    }

    let opcode = OpCode::aus_byte(byte0);
    if opcode == OpCode::Reserved {
        return Err(ProtokollFehler::ReservierterOpcode(byte0 & OPCODE_BITS));
    }

    let Some(&byte1) = buf.get(1) else {
        return Ok(Dekodiert::BrauchtMehr(1));
    };

    let maskiert = byte1 & MASK_BIT != 0;
    let basis = byte1 & LAENGE_BITS;

    let (payload_laenge, mut offset) = match basis {
        LAENGE_16_BIT => {
            if buf.len() < 4 {
                return Ok(Dekodiert::BrauchtMehr(4 - buf.len()));
            }
            (u16::from_be_bytes([buf[2], buf[3]]) as usize, 4)
        }
        LAENGE_64_BIT => return Err(ProtokollFehler::LaengeNichtUnterstuetzt(basis)),
        kurz => (kurz as usize, 2),
    };

    let mask = if maskiert {
        if buf.len() < offset + 4 {
            return Ok(Dekodiert::BrauchtMehr(offset + 4 - buf.len()));
        }
        let key = [buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]];
        offset += 4;
        Some(key)
    } else {
        None
    };

    Ok(Dekodiert::Vollstaendig {
        wert: FrameKopf {
            fin: byte0 & FIN_BIT != 0,
            opcode,
            mask,
            payload_laenge,
            kopf_laenge: offset,
        },
        verbraucht: offset,
    })
}

/// Dekodiert einen vollstaendigen Frame aus `buf`
///
/// Reine Funktion ohne IO. Liegt der Frame nur teilweise vor, wird
/// `BrauchtMehr` mit der Anzahl fehlender Bytes zurueckgegeben; der Aufrufer
/// liest nach und ruft erneut auf. Der Payload wird erst demaskiert, wenn er
/// vollstaendig vorliegt.
pub fn dekodieren(buf: &[u8]) -> ProtokollResult<Dekodiert<Frame>> {
    let kopf = match kopf_dekodieren(buf)? {
        Dekodiert::Vollstaendig { wert, .. } => wert,
        Dekodiert::BrauchtMehr(n) => return Ok(Dekodiert::BrauchtMehr(n)),
    };

    let gesamt = kopf.frame_laenge();
    if buf.len() < gesamt {
        return Ok(Dekodiert::BrauchtMehr(gesamt - buf.len()));
    }

    let mut payload = buf[kopf.kopf_laenge..gesamt].to_vec();
    if let Some(key) = kopf.mask {
        maskieren(&mut payload, key);
    }

    Ok(Dekodiert::Vollstaendig {
        wert: Frame {
            fin: kopf.fin,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode: kopf.opcode,
            mask: kopf.mask,
            payload: Bytes::from(payload),
        },
        verbraucht: gesamt,
    })
}

// ---------------------------------------------------------------------------
// Kodieren
// ---------------------------------------------------------------------------

/// Schreibt `frame` in `dst`
///
/// Laengen bis 125 stehen direkt im 7-Bit-Feld, groessere als 126 + u16 BE.
/// Ist ein Masking-Key gesetzt, wird der Payload beim Schreiben maskiert.
pub fn kodieren(frame: &Frame, dst: &mut BytesMut) -> ProtokollResult<()> {
    if frame.rsv1 || frame.rsv2 || frame.rsv3 {
        let rsv = (frame.rsv1 as u8) << 2 | (frame.rsv2 as u8) << 1 | frame.rsv3 as u8;
        return Err(ProtokollFehler::ReservierteBits(rsv));
    }
    let opcode = frame
        .opcode
        .als_byte()
        .ok_or(ProtokollFehler::ReservierterOpcode(OPCODE_BITS))?;

    let laenge = frame.payload.len();
    if laenge > MAX_PAYLOAD_LAENGE {
        return Err(ProtokollFehler::PayloadZuGross {
            laenge,
            max: MAX_PAYLOAD_LAENGE,
        });
    }

    let mask_bit = if frame.mask.is_some() { MASK_BIT } else { 0 };
    let erweitert = if laenge > MAX_KURZE_LAENGE { 2 } else { 0 };
    let schluessel = if frame.mask.is_some() { 4 } else { 0 };
    dst.reserve(2 + erweitert + schluessel + laenge);

    let fin_bit = if frame.fin { FIN_BIT } else { 0 };
    dst.put_u8(fin_bit | opcode);
    if laenge > MAX_KURZE_LAENGE {
        dst.put_u8(mask_bit | LAENGE_16_BIT);
        dst.put_u16(laenge as u16);
    } else {
        dst.put_u8(mask_bit | laenge as u8);
    }

    match frame.mask {
        Some(key) => {
            dst.put_slice(&key);
            let start = dst.len();
            dst.put_slice(&frame.payload);
            maskieren(&mut dst[start..], key);
        }
        None => dst.put_slice(&frame.payload),
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
