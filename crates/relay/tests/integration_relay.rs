//! Integration-Tests fuer den Relay ueber echte TCP-Verbindungen

use async_trait::async_trait;
use chatrelay_auth::{AuthError, AuthResult, SessionValidator};
use chatrelay_chat::{Chat, ChatError, ChatResult, NachrichtenSpeicher, ServerNachricht};
use chatrelay_core::SessionId;
use chatrelay_protocol::handshake::kopf_lesen;
use chatrelay_protocol::{Frame, FrameCodec, OpCode};
use chatrelay_relay::{RelayListener, RelayState};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_util::codec::Framed;

const GUELTIG_A: &str = "0ccbd809-845a-4d48-939a-68c981ab0f39";
const GUELTIG_B: &str = "1f0e2d3c-4b5a-4697-8877-665544332211";
const GUELTIG_C: &str = "2a2a2a2a-bbbb-4ccc-8ddd-eeeeeeeeeeee";
const UNGUELTIG: &str = "99999999-9999-4999-8999-999999999999";
const KEY: [u8; 4] = [0x12, 0x34, 0x56, 0x78];

// ---------------------------------------------------------------------------
// Test-Dienste
// ---------------------------------------------------------------------------

struct TestValidator;

#[async_trait]
impl SessionValidator for TestValidator {
    async fn pruefen(&self, session: &SessionId) -> AuthResult<()> {
        match session.as_str() {
            GUELTIG_A | GUELTIG_B | GUELTIG_C => Ok(()),
            _ => Err(AuthError::SessionAbgelehnt(401)),
        }
    }
}

struct TestSpeicher {
    tx: mpsc::UnboundedSender<(SessionId, ServerNachricht)>,
}

#[async_trait]
impl NachrichtenSpeicher for TestSpeicher {
    async fn speichern(&self, session: &SessionId, n: &ServerNachricht) -> ChatResult<()> {
        let _ = self.tx.send((session.clone(), n.clone()));
        Ok(())
    }

    async fn chat_laden(&self, _: &SessionId, _: &str) -> ChatResult<Chat> {
        Err(ChatError::NichtGefunden)
    }
}

struct TestServer {
    adresse: std::net::SocketAddr,
    state: Arc<RelayState>,
    gespeichert: mpsc::UnboundedReceiver<(SessionId, ServerNachricht)>,
    shutdown_tx: watch::Sender<bool>,
}

async fn server() -> TestServer {
    let (tx, gespeichert) = mpsc::unbounded_channel();
    let state = RelayState::neu(Arc::new(TestValidator), Arc::new(TestSpeicher { tx }));
    let listener = RelayListener::binden(Arc::clone(&state), "127.0.0.1:0".parse().unwrap())
        .await
        .expect("Binden fehlgeschlagen");
    let adresse = listener.lokale_adresse().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(listener.starten(shutdown_rx));

    TestServer {
        adresse,
        state,
        gespeichert,
        shutdown_tx,
    }
}

/// Sendet die Upgrade-Anfrage und liefert die Antwort-Kopfzeilen
async fn anfragen(adresse: std::net::SocketAddr, ziel: &str) -> (TcpStream, String) {
    let mut stream = TcpStream::connect(adresse).await.unwrap();
    let anfrage = format!(
        "GET {ziel} HTTP/1.1\r\n\
         Host: localhost\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
         Sec-WebSocket-Version: 13\r\n\r\n"
    );
    stream.write_all(anfrage.as_bytes()).await.unwrap();
    let (kopf, rest) = kopf_lesen(&mut stream).await.expect("Antwort-Kopf");
    assert!(rest.is_empty());
    (stream, kopf)
}

async fn verbinden(adresse: std::net::SocketAddr, session: &str) -> Framed<TcpStream, FrameCodec> {
    let (stream, kopf) = anfragen(adresse, &format!("/chat?sessionId={session}")).await;
    assert!(kopf.starts_with("HTTP/1.1 101"), "Antwort: {kopf}");
    assert!(kopf.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));
    Framed::new(stream, FrameCodec::new())
}

async fn warten_bis(state: &RelayState, anzahl: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while state.verbindungen_anzahl() != anzahl {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("erwartet {anzahl} Verbindungen"));
}

async fn naechster(client: &mut Framed<TcpStream, FrameCodec>) -> Option<Frame> {
    tokio::time::timeout(Duration::from_secs(2), client.next())
        .await
        .expect("Timeout beim Lesen")
        .map(|r| r.expect("gueltiger Frame"))
}

async fn nichts_erwartet(client: &mut Framed<TcpStream, FrameCodec>) {
    let ergebnis = tokio::time::timeout(Duration::from_millis(150), client.next()).await;
    assert!(ergebnis.is_err(), "unerwarteter Frame: {ergebnis:?}");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn nachricht_erreicht_alle_anderen() {
    let mut server = server().await;
    let mut a = verbinden(server.adresse, GUELTIG_A).await;
    let mut b = verbinden(server.adresse, GUELTIG_B).await;
    let mut c = verbinden(server.adresse, GUELTIG_C).await;
    warten_bis(&server.state, 3).await;

    let text = r#"{"content":"Hallo","version":1,"messageId":"m1","userId":"u1","chatId":"c1"}"#;
    a.send(Frame::text(text).mit_maske(KEY)).await.unwrap();

    for client in [&mut b, &mut c] {
        let frame = naechster(client).await.unwrap();
        assert_eq!(frame.opcode, OpCode::Text);
        assert!(!frame.ist_maskiert());
        assert_eq!(&frame.payload[..], text.as_bytes());
    }
    nichts_erwartet(&mut a).await;

    let (session, gespeichert) = tokio::time::timeout(Duration::from_secs(2), server.gespeichert.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.as_str(), GUELTIG_A);
    assert_eq!(gespeichert.chat_id, "c1");
}

#[tokio::test]
async fn kein_json_wird_trotzdem_verteilt() {
    let mut server = server().await;
    let mut a = verbinden(server.adresse, GUELTIG_A).await;
    let mut b = verbinden(server.adresse, GUELTIG_B).await;
    warten_bis(&server.state, 2).await;

    a.send(Frame::text("0123456789").mit_maske(KEY)).await.unwrap();
    assert_eq!(&naechster(&mut b).await.unwrap().payload[..], b"0123456789");
    assert!(server.gespeichert.try_recv().is_err());
}

#[tokio::test]
async fn ungueltige_session_wird_abgelehnt() {
    let server = server().await;
    let (_stream, kopf) = anfragen(server.adresse, &format!("/chat?sessionId={UNGUELTIG}")).await;
    assert!(kopf.starts_with("HTTP/1.1 403"), "Antwort: {kopf}");
    assert_eq!(server.state.registry.anzahl(), 0);
    assert_eq!(server.state.verbindungen_anzahl(), 0);
}

#[tokio::test]
async fn fehlende_session_ist_bad_request() {
    let server = server().await;
    let (_stream, kopf) = anfragen(server.adresse, "/chat").await;
    assert!(kopf.starts_with("HTTP/1.1 400"), "Antwort: {kopf}");
}

#[tokio::test]
async fn ping_ueber_tcp() {
    let server = server().await;
    let mut a = verbinden(server.adresse, GUELTIG_A).await;
    warten_bis(&server.state, 1).await;

    a.send(Frame::ping().mit_maske(KEY)).await.unwrap();
    assert_eq!(naechster(&mut a).await.unwrap().opcode, OpCode::Pong);
    nichts_erwartet(&mut a).await;
    assert_eq!(server.state.verbindungen_anzahl(), 1);
}

#[tokio::test]
async fn close_vom_client_meldet_ab() {
    let server = server().await;
    let mut a = verbinden(server.adresse, GUELTIG_A).await;
    let _b = verbinden(server.adresse, GUELTIG_B).await;
    warten_bis(&server.state, 2).await;

    a.send(Frame::close().mit_maske(KEY)).await.unwrap();
    warten_bis(&server.state, 1).await;
    assert_eq!(server.state.registry.anzahl(), 1);
    assert!(naechster(&mut a).await.is_none(), "Server muss den Socket schliessen");
}

#[tokio::test]
async fn alle_trennen_sendet_close() {
    let server = server().await;
    let mut a = verbinden(server.adresse, GUELTIG_A).await;
    let mut b = verbinden(server.adresse, GUELTIG_B).await;
    warten_bis(&server.state, 2).await;

    assert_eq!(server.state.alle_trennen().await, 2);
    for client in [&mut a, &mut b] {
        assert_eq!(naechster(client).await.unwrap().opcode, OpCode::Close);
        assert!(naechster(client).await.is_none());
    }
    assert_eq!(server.state.verbindungen_anzahl(), 0);
    assert_eq!(server.state.registry.anzahl(), 0);
}

#[tokio::test]
async fn neustart_auf_gleicher_adresse() {
    let server = server().await;
    server.shutdown_tx.send_replace(true);

    // Nach dem Stoppen ist die Adresse wieder frei
    let neu = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match RelayListener::binden(Arc::clone(&server.state), server.adresse).await {
                Ok(l) => break l,
                Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        }
    })
    .await
    .expect("Adresse muss wieder frei werden");

    let (tx, rx) = watch::channel(false);
    tokio::spawn(neu.starten(rx));
    let _a = verbinden(server.adresse, GUELTIG_A).await;
    warten_bis(&server.state, 1).await;
    tx.send_replace(true);
}
