//! Unit-Tests fuer das Chat-Crate


use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Minimaler HTTP-Server fuer genau eine Anfrage
///
/// Antwortet mit `status` und `body` und liefert die komplette empfangene
/// Anfrage (Kopf + Body) zurueck.
pub(crate) async fn einmal_antworten(
    status: &'static str,
    body: &'static str,
) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("Bind fehlgeschlagen");
    let basis = format!("http://{}", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut anfrage = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = sock.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            anfrage.extend_from_slice(&buf[..n]);
            if anfrage_vollstaendig(&anfrage) {
                break;
            }
        }
        let antwort = format!(
            "HTTP/1.1 {status}\r\nContent-Length: {}\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        sock.write_all(antwort.as_bytes()).await.unwrap();
        String::from_utf8_lossy(&anfrage).into_owned()
    });
    (basis, handle)
}

fn anfrage_vollstaendig(anfrage: &[u8]) -> bool {
    let Some(ende) = anfrage.windows(4).position(|w| w == b"\r\n\r\n") else {
        return false;
    };
    let kopf = String::from_utf8_lossy(&anfrage[..ende]).to_ascii_lowercase();
    let laenge = kopf
        .lines()
        .find_map(|z| z.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    anfrage.len() >= ende + 4 + laenge
}
