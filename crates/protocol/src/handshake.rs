//! HTTP-Upgrade-Handshake (RFC 6455, Abschnitt 4.2)
//!
//! Der Client schickt eine GET-Anfrage mit `sessionId` (Query-Parameter oder
//! Cookie) und `Sec-WebSocket-Key`. Der Server antwortet mit
//! `101 Switching Protocols` oder, wenn die Session abgelehnt wird, mit
//! `403 Forbidden`. Unbrauchbare Anfragen erhalten `400 Bad Request`.

use base64::prelude::*;
use bytes::BytesMut;
use chatrelay_core::SessionId;
use sha1::{Digest, Sha1};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::HandshakeFehler;

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Protokoll-GUID fuer `Sec-WebSocket-Accept`
pub const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Maximale Groesse des Anfrage-Kopfs
pub const MAX_KOPF_GROESSE: usize = 8 * 1024;

/// Name des Session-Parameters in Query und Cookie
pub const SESSION_PARAMETER: &str = "sessionId";

pub const ANTWORT_FORBIDDEN: &str = "HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\n\r\n";

pub const ANTWORT_BAD_REQUEST: &str = "HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n";

const KOPF_ENDE: &[u8] = b"\r\n\r\n";

// ---------------------------------------------------------------------------
// HandshakeAnfrage
// ---------------------------------------------------------------------------

/// Geparste Upgrade-Anfrage eines Clients
#[derive(Debug, Clone)]
pub struct HandshakeAnfrage {
    /// Anfrage-Ziel inkl. Query (z.B. `/chat?sessionId=...`)
    pub ziel: String,
    pub session_id: SessionId,
    /// Wert des `Sec-WebSocket-Key`-Headers
    pub client_schluessel: String,
    /// Header mit kleingeschriebenen Namen, in Eingangsreihenfolge
    headers: Vec<(String, String)>,
}

impl HandshakeAnfrage {
    /// Parst den Anfrage-Kopf (ohne abschliessende Leerzeile)
    pub fn parsen(kopf: &str) -> Result<Self, HandshakeFehler> {
        let mut zeilen = kopf.split("\r\n");

        let anfragezeile = zeilen.next().unwrap_or_default();
        let mut teile = anfragezeile.split_whitespace();
        let (methode, ziel, version) = match (teile.next(), teile.next(), teile.next()) {
            (Some(m), Some(z), Some(v)) => (m, z, v),
            _ => return Err(HandshakeFehler::Anfragezeile(anfragezeile.to_string())),
        };
        if methode != "GET" || !version.starts_with("HTTP/1.") {
            return Err(HandshakeFehler::Anfragezeile(anfragezeile.to_string()));
        }

        let headers: Vec<(String, String)> = zeilen
            .take_while(|zeile| !zeile.is_empty())
            .filter_map(|zeile| zeile.split_once(':'))
            .map(|(name, wert)| (name.trim().to_ascii_lowercase(), wert.trim().to_string()))
            .collect();

        let session_roh = query_parameter(ziel, SESSION_PARAMETER)
            .or_else(|| {
                headers
                    .iter()
                    .filter(|(name, _)| name == "cookie")
                    .find_map(|(_, wert)| cookie_wert(wert, SESSION_PARAMETER))
            })
            .ok_or(HandshakeFehler::SessionFehlt)?;
        let session_id = SessionId::parsen(session_roh)?;

        let client_schluessel = headers
            .iter()
            .find(|(name, _)| name == "sec-websocket-key")
            .map(|(_, wert)| wert.clone())
            .filter(|wert| !wert.is_empty())
            .ok_or(HandshakeFehler::SchluesselFehlt)?;

        Ok(Self {
            ziel: ziel.to_string(),
            session_id,
            client_schluessel,
            headers,
        })
    }

    /// Header-Wert, Name wird ohne Beachtung der Gross-/Kleinschreibung verglichen
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, wert)| wert.as_str())
    }

    /// Wert fuer `Sec-WebSocket-Accept`
    pub fn accept_schluessel(&self) -> String {
        accept_schluessel(&self.client_schluessel)
    }
}

fn query_parameter<'a>(ziel: &'a str, name: &str) -> Option<&'a str> {
    let (_, query) = ziel.split_once('?')?;
    query
        .split('&')
        .filter_map(|paar| paar.split_once('='))
        .find(|(schluessel, _)| *schluessel == name)
        .map(|(_, wert)| wert)
}

fn cookie_wert<'a>(cookie: &'a str, name: &str) -> Option<&'a str> {
    cookie
        .split(';')
        .filter_map(|paar| paar.trim().split_once('='))
        .find(|(schluessel, _)| *schluessel == name)
        .map(|(_, wert)| wert)
}

// ---------------------------------------------------------------------------
// Antworten
// ---------------------------------------------------------------------------

/// base64(SHA-1(client_key + GUID))
pub fn accept_schluessel(client_schluessel: &str) -> String {
    let mut sha1 = Sha1::new();
    sha1.update(client_schluessel.as_bytes());
    sha1.update(WEBSOCKET_GUID.as_bytes());
    BASE64_STANDARD.encode(sha1.finalize())
}

/// `101 Switching Protocols` mit dem berechneten Accept-Schluessel
pub fn antwort_switching_protocols(accept: &str) -> String {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept}\r\n\r\n"
    )
}

// ---------------------------------------------------------------------------
// Lesen
// ---------------------------------------------------------------------------

/// Position direkt hinter `\r\n\r\n`, falls vorhanden
pub fn kopf_ende(buf: &[u8]) -> Option<usize> {
    buf.windows(KOPF_ENDE.len())
        .position(|fenster| fenster == KOPF_ENDE)
        .map(|pos| pos + KOPF_ENDE.len())
}

/// Liest den Anfrage-Kopf vom Stream
///
/// Gibt den Kopf als Text und alle bereits mitgelesenen Bytes danach zurueck;
/// diese gehoeren zum ersten Frame und muessen dem Frame-Leser uebergeben werden.
pub async fn kopf_lesen<R>(reader: &mut R) -> Result<(String, BytesMut), HandshakeFehler>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(1024);
    loop {
        if let Some(ende) = kopf_ende(&buf) {
            let kopf = buf.split_to(ende);
            let text = std::str::from_utf8(&kopf[..ende - KOPF_ENDE.len()])
                .map_err(|_| HandshakeFehler::KeinUtf8)?
                .to_string();
            return Ok((text, buf));
        }
        if buf.len() >= MAX_KOPF_GROESSE {
            return Err(HandshakeFehler::KopfZuGross(MAX_KOPF_GROESSE));
        }
        if reader.read_buf(&mut buf).await? == 0 {
            return Err(HandshakeFehler::Unvollstaendig);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SESSION: &str = "0ccbd809-845a-4d48-939a-68c981ab0f39";

    fn anfrage(ziel: &str, headers: &[&str]) -> String {
        let mut s = format!("GET {ziel} HTTP/1.1\r\nHost: localhost:5201\r\n");
        for h in headers {
            s.push_str(h);
            s.push_str("\r\n");
        }
        s
    }

    #[test]
    fn accept_schluessel_rfc_beispiel() {
        assert_eq!(
            accept_schluessel("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn anfrage_mit_kanonischem_header() {
        let kopf = anfrage(
            &format!("/?sessionId={SESSION}"),
            &["Upgrade: websocket", "Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ=="],
        );
        let a = HandshakeAnfrage::parsen(&kopf).unwrap();
        assert_eq!(a.session_id.as_str(), SESSION);
        assert_eq!(a.client_schluessel, "dGhlIHNhbXBsZSBub25jZQ==");
        assert_eq!(a.accept_schluessel(), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
        assert_eq!(a.header("UPGRADE"), Some("websocket"));
    }

    #[test]
    fn anfrage_mit_kleingeschriebenem_header() {
        let kopf = anfrage(
            &format!("/chat?foo=1&sessionId={SESSION}"),
            &["sec-websocket-key: abc=="],
        );
        let a = HandshakeAnfrage::parsen(&kopf).unwrap();
        assert_eq!(a.client_schluessel, "abc==");
        assert_eq!(a.ziel, format!("/chat?foo=1&sessionId={SESSION}"));
    }

    #[test]
    fn session_aus_cookie() {
        let kopf = anfrage(
            "/",
            &[
                &format!("Cookie: theme=dark; sessionId={SESSION}"),
                "Sec-WebSocket-Key: abc==",
            ],
        );
        let a = HandshakeAnfrage::parsen(&kopf).unwrap();
        assert_eq!(a.session_id.as_str(), SESSION);
    }

    #[test]
    fn fehlende_session() {
        let kopf = anfrage("/", &["Sec-WebSocket-Key: abc=="]);
        assert!(matches!(
            HandshakeAnfrage::parsen(&kopf),
            Err(HandshakeFehler::SessionFehlt)
        ));
    }

    #[test]
    fn kurze_session_wird_abgelehnt() {
        let kopf = anfrage("/?sessionId=1234", &["Sec-WebSocket-Key: abc=="]);
        assert!(matches!(
            HandshakeAnfrage::parsen(&kopf),
            Err(HandshakeFehler::Session(_))
        ));
    }

    #[test]
    fn fehlender_schluessel() {
        let kopf = anfrage(&format!("/?sessionId={SESSION}"), &[]);
        assert!(matches!(
            HandshakeAnfrage::parsen(&kopf),
            Err(HandshakeFehler::SchluesselFehlt)
        ));
    }

    #[test]
    fn falsche_methode() {
        let kopf = format!("POST /?sessionId={SESSION} HTTP/1.1\r\nSec-WebSocket-Key: a\r\n");
        assert!(matches!(
            HandshakeAnfrage::parsen(&kopf),
            Err(HandshakeFehler::Anfragezeile(_))
        ));
    }

    #[test]
    fn antwort_101_enthaelt_accept() {
        let antwort = antwort_switching_protocols("xyz=");
        assert!(antwort.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(antwort.contains("Upgrade: websocket\r\n"));
        assert!(antwort.contains("Connection: Upgrade\r\n"));
        assert!(antwort.ends_with("Sec-WebSocket-Accept: xyz=\r\n\r\n"));
    }

    #[tokio::test]
    async fn kopf_lesen_behaelt_restbytes() {
        let mut roh = anfrage("/", &["X: y"]).into_bytes();
        roh.extend_from_slice(b"\r\n");
        roh.extend_from_slice(&[0x81, 0x80]);

        let mut cursor = std::io::Cursor::new(roh);
        let (kopf, rest) = kopf_lesen(&mut cursor).await.unwrap();
        assert!(kopf.starts_with("GET / HTTP/1.1"));
        assert!(kopf.ends_with("X: y"));
        assert_eq!(&rest[..], &[0x81, 0x80]);
    }

    #[tokio::test]
    async fn kopf_lesen_unvollstaendig() {
        let mut cursor = std::io::Cursor::new(b"GET / HTTP/1.1\r\n".to_vec());
        assert!(matches!(
            kopf_lesen(&mut cursor).await,
            Err(HandshakeFehler::Unvollstaendig)
        ));
    }
}
