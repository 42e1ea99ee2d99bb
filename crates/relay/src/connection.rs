//! WebSocket-Verbindung nach erfolgreichem Handshake
//!
//! Jede `Connection` besitzt ihren Stream exklusiv. Die Lese-Haelfte gehoert
//! der Empfangsschleife (`ausfuehren`), die Schreib-Haelfte liegt hinter
//! einem Mutex, damit Broadcaster, Ping/Pong-Antworten und Shutdown
//! gleichzeitig senden koennen ohne Frames zu verschraenken.
//!
//! ## Zustaende
//! ```text
//! Offen -> Schliessend -> Geschlossen
//!   |                        ^
//!   +------- schliessen -----+
//! ```
//!
//! Ping und Pong beenden die Verbindung nicht: auf Ping folgt ein Pong, auf
//! Pong ein Ping, danach wird weitergelesen.
//!
//! `schliessen` loest ein `CancellationToken` aus. Wartende Lesevorgaenge und
//! haengende Sendungen brechen daran ab, ein bereits empfangener Frame wird
//! aber noch vollstaendig verarbeitet.

use bytes::BytesMut;
use chatrelay_core::{ConnectionId, SessionId};
use chatrelay_protocol::{Frame, FrameCodec, OpCode, ProtokollFehler};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

use crate::abonnent::{AnwendungsNachricht, NachrichtenAbonnent};

type Leser = FramedRead<Box<dyn AsyncRead + Send + Unpin>, FrameCodec>;
type Schreiber = FramedWrite<Box<dyn AsyncWrite + Send + Unpin>, FrameCodec>;

/// Obergrenze fuer das Zustellen eines Close-Frames an einen Client
pub const CLOSE_SENDE_TIMEOUT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Verbindungszustand
// ---------------------------------------------------------------------------

/// Zustand der WebSocket-Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbindungsZustand {
    /// Handshake abgeschlossen, Frames werden gelesen
    Offen,
    /// Close gesendet/empfangen oder Lesefehler
    Schliessend,
    /// Stream freigegeben
    Geschlossen,
}

impl VerbindungsZustand {
    fn als_u8(self) -> u8 {
        match self {
            Self::Offen => 0,
            Self::Schliessend => 1,
            Self::Geschlossen => 2,
        }
    }

    fn aus_u8(wert: u8) -> Self {
        match wert {
            0 => Self::Offen,
            1 => Self::Schliessend,
            _ => Self::Geschlossen,
        }
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// Eine aufgebaute WebSocket-Verbindung
pub struct Connection {
    id: ConnectionId,
    session_id: SessionId,
    peer_addr: Option<SocketAddr>,
    leser: Mutex<Option<Leser>>,
    schreiber: Mutex<Option<Schreiber>>,
    zustand: AtomicU8,
    geschlossen: AtomicBool,
    abbruch: CancellationToken,
    abonnenten: RwLock<Vec<Arc<dyn NachrichtenAbonnent>>>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("session_id", &self.session_id)
            .field("peer_addr", &self.peer_addr)
            .field("zustand", &self.zustand())
            .finish()
    }
}

impl Connection {
    /// Erstellt eine Verbindung ueber einen bereits upgegradeten Stream
    pub fn neu<S>(session_id: SessionId, stream: S) -> Arc<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::mit_puffer(session_id, stream, BytesMut::new(), None)
    }

    /// Wie `neu`, uebernimmt aber Bytes, die beim Handshake bereits hinter
    /// dem Anfrage-Kopf gelesen wurden
    pub fn mit_puffer<S>(
        session_id: SessionId,
        stream: S,
        vorgelesen: BytesMut,
        peer_addr: Option<SocketAddr>,
    ) -> Arc<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (lese_haelfte, schreib_haelfte) = tokio::io::split(stream);
        let lesen: Box<dyn AsyncRead + Send + Unpin> =
            Box::new(Cursor::new(vorgelesen.to_vec()).chain(lese_haelfte));
        let schreiben: Box<dyn AsyncWrite + Send + Unpin> = Box::new(schreib_haelfte);

        Arc::new(Self {
            id: ConnectionId::new(),
            session_id,
            peer_addr,
            leser: Mutex::new(Some(FramedRead::new(lesen, FrameCodec::new()))),
            schreiber: Mutex::new(Some(FramedWrite::new(schreiben, FrameCodec::new()))),
            zustand: AtomicU8::new(VerbindungsZustand::Offen.als_u8()),
            geschlossen: AtomicBool::new(false),
            abbruch: CancellationToken::new(),
            abonnenten: RwLock::new(Vec::new()),
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub fn zustand(&self) -> VerbindungsZustand {
        VerbindungsZustand::aus_u8(self.zustand.load(Ordering::Acquire))
    }

    /// Offen -> Schliessend; spaetere Zustaende bleiben unberuehrt
    fn schliessend_markieren(&self) {
        let _ = self.zustand.compare_exchange(
            VerbindungsZustand::Offen.als_u8(),
            VerbindungsZustand::Schliessend.als_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    // -----------------------------------------------------------------------
    // Abonnenten
    // -----------------------------------------------------------------------

    /// Haengt einen Abonnenten an; Aufruf erfolgt in Registrierungsreihenfolge
    pub fn abonnieren(&self, abonnent: Arc<dyn NachrichtenAbonnent>) {
        self.abonnenten.write().push(abonnent);
    }

    pub fn abonnenten_anzahl(&self) -> usize {
        self.abonnenten.read().len()
    }

    /// Reicht einen dekodierten Text an alle Abonnenten weiter
    ///
    /// Ein fehlschlagender Abonnent haelt die folgenden nicht auf.
    pub async fn veroeffentlichen(&self, text: &str) {
        let abonnenten = self.abonnenten.read().clone();
        if abonnenten.is_empty() {
            return;
        }

        let nachricht = AnwendungsNachricht {
            absender: self.id,
            session_id: self.session_id.clone(),
            text: Arc::from(text),
        };

        for abonnent in abonnenten {
            if let Err(e) = abonnent.nachricht_empfangen(&nachricht).await {
                tracing::warn!(
                    conn = %self.id,
                    fehler = %e,
                    "Abonnent konnte Nachricht nicht verarbeiten"
                );
            }
        }
    }

    // -----------------------------------------------------------------------
    // Empfangen
    // -----------------------------------------------------------------------

    /// Empfangsschleife; laeuft bis Close, Lesefehler, ungueltigem Frame
    /// oder `schliessen`
    ///
    /// Nur das Warten auf den naechsten Frame ist abbrechbar. Ein gelesener
    /// Frame wird inklusive Weiterleitung zu Ende verarbeitet, bevor das
    /// Shutdown-Signal greift. Der Stream wird hier nicht freigegeben, das
    /// erledigt der Aufrufer ueber `schliessen`.
    pub async fn ausfuehren(&self) {
        let Some(mut leser) = self.leser.lock().await.take() else {
            tracing::debug!(conn = %self.id, "Empfangsschleife laeuft bereits oder Verbindung geschlossen");
            return;
        };

        tracing::info!(conn = %self.id, peer = ?self.peer_addr, "Client verbunden");

        loop {
            let gelesen = tokio::select! {
                biased;

                () = self.abbruch.cancelled() => {
                    tracing::debug!(conn = %self.id, "Empfangsschleife: Shutdown-Signal");
                    break;
                }

                gelesen = leser.next() => gelesen,
            };

            match self.frame_auswerten(gelesen).await {
                Some(f) if f.opcode == OpCode::Close => {
                    tracing::debug!(conn = %self.id, "Close-Frame empfangen");
                    break;
                }
                Some(_) => {}
                None => break,
            }
        }

        self.schliessend_markieren();
    }

    /// Verarbeitet das Ergebnis eines Lesevorgangs
    ///
    /// `None` beendet die Empfangsschleife.
    async fn frame_auswerten(
        &self,
        gelesen: Option<Result<Frame, ProtokollFehler>>,
    ) -> Option<Frame> {
        match gelesen {
            Some(Ok(frame)) => self.frame_verarbeiten(frame).await,
            Some(Err(ProtokollFehler::Io(e))) => {
                tracing::warn!(conn = %self.id, fehler = %e, "Frame-Lesefehler");
                None
            }
            Some(Err(e)) => {
                tracing::warn!(conn = %self.id, fehler = %e, "Ungueltiger Frame");
                None
            }
            None => {
                tracing::info!(conn = %self.id, "Verbindung vom Client getrennt");
                None
            }
        }
    }

    /// Reagiert auf einen dekodierten Frame
    ///
    /// Ping wird mit Pong beantwortet, Pong mit Ping. Daten-Frames mit
    /// Payload werden als UTF-8 dekodiert und veroeffentlicht. `None` fuer
    /// ungueltige, leere oder payloadlose Daten-Frames.
    pub async fn frame_verarbeiten(&self, frame: Frame) -> Option<Frame> {
        match frame.opcode {
            OpCode::Ping => {
                self.pong_senden().await;
                return Some(frame);
            }
            OpCode::Pong => {
                self.ping_senden().await;
                return Some(frame);
            }
            _ => {}
        }

        if !frame.ist_gueltig() || frame.ist_leer() {
            return None;
        }

        if frame.opcode == OpCode::Close {
            self.schliessend_markieren();
            return Some(frame);
        }

        if frame.payload.is_empty() {
            tracing::warn!(
                conn = %self.id,
                fin = frame.fin,
                opcode = ?frame.opcode,
                maskiert = frame.ist_maskiert(),
                "Frame ohne Payload"
            );
            return None;
        }

        match std::str::from_utf8(&frame.payload) {
            Ok(text) => {
                tracing::trace!(conn = %self.id, laenge = text.len(), "Nachricht empfangen");
                self.veroeffentlichen(text).await;
            }
            Err(e) => {
                tracing::error!(conn = %self.id, fehler = %e, "Payload ist kein UTF-8");
            }
        }
        Some(frame)
    }

    // -----------------------------------------------------------------------
    // Senden
    // -----------------------------------------------------------------------

    /// Sendet `text` als einzelnen, unmaskierten Text-Frame
    ///
    /// Fehler werden geloggt; `false` wenn nicht gesendet wurde.
    pub async fn frame_senden(&self, text: &str) -> bool {
        self.senden(Frame::text(text)).await
    }

    pub async fn ping_senden(&self) -> bool {
        self.senden(Frame::ping()).await
    }

    pub async fn pong_senden(&self) -> bool {
        self.senden(Frame::pong()).await
    }

    /// Sendet Close; die Verbindung gilt danach als schliessend
    ///
    /// Liest der Client nicht mehr, gibt der Aufruf nach
    /// `CLOSE_SENDE_TIMEOUT` mit `false` auf.
    pub async fn close_senden(&self) -> bool {
        self.schliessend_markieren();
        match tokio::time::timeout(CLOSE_SENDE_TIMEOUT, self.senden(Frame::close())).await {
            Ok(gesendet) => gesendet,
            Err(_) => {
                tracing::warn!(conn = %self.id, "Close-Frame nicht zustellbar (Timeout)");
                false
            }
        }
    }

    /// Sendet einen Frame; bricht ab, sobald `schliessen` aufgerufen wird
    async fn senden(&self, frame: Frame) -> bool {
        let opcode = frame.opcode;
        tokio::select! {
            biased;

            () = self.abbruch.cancelled() => {
                tracing::debug!(conn = %self.id, opcode = ?opcode, "Senden abgebrochen, Verbindung wird geschlossen");
                false
            }

            gesendet = self.gesperrt_senden(frame) => gesendet,
        }
    }

    async fn gesperrt_senden(&self, frame: Frame) -> bool {
        let opcode = frame.opcode;
        let mut schreiber = self.schreiber.lock().await;
        let Some(schreiber) = schreiber.as_mut() else {
            tracing::debug!(conn = %self.id, opcode = ?opcode, "Senden an geschlossene Verbindung");
            return false;
        };

        match schreiber.send(frame).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    conn = %self.id,
                    opcode = ?opcode,
                    fehler = %e,
                    "Senden fehlgeschlagen"
                );
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Schliessen
    // -----------------------------------------------------------------------

    /// Gibt den Stream frei und beendet die Empfangsschleife
    ///
    /// Idempotent: nur der erste Aufruf liefert `true`.
    pub async fn schliessen(&self) -> bool {
        if self.geschlossen.swap(true, Ordering::AcqRel) {
            return false;
        }

        self.schliessend_markieren();
        // Laufende Sendungen geben den Schreib-Mutex frei
        self.abbruch.cancel();

        if let Some(mut schreiber) = self.schreiber.lock().await.take() {
            if let Err(e) = schreiber.get_mut().shutdown().await {
                tracing::debug!(conn = %self.id, fehler = %e, "Shutdown des Streams fehlgeschlagen");
            }
        }
        // Lese-Haelfte freigeben, falls die Schleife nie lief
        self.leser.lock().await.take();

        self.zustand
            .store(VerbindungsZustand::Geschlossen.als_u8(), Ordering::Release);
        tracing::info!(conn = %self.id, "Client getrennt");
        true
    }

    pub fn ist_geschlossen(&self) -> bool {
        self.geschlossen.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
