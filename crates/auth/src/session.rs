//! Session-Validierung gegen den externen Identity-Dienst
//!
//! Die Session-ID aus dem Handshake wird genau einmal geprueft, bevor die
//! Verbindung in die Registry aufgenommen wird. Nur `200 OK` gilt als
//! gueltig; jede andere Antwort und jeder Transportfehler fuehrt zur
//! Ablehnung. Es gibt keine automatischen Wiederholungen.

use async_trait::async_trait;
use chatrelay_core::SessionId;
use reqwest::{header, Client, StatusCode};

use crate::error::{AuthError, AuthResult};

/// Pfad des Login-Checks beim Identity-Dienst
pub const STANDARD_PRUEF_PFAD: &str = "/api/identity/login/valid";

/// Grenze zum Identity-Dienst
#[async_trait]
pub trait SessionValidator: Send + Sync {
    /// `Ok(())` wenn die Session gueltig ist
    async fn pruefen(&self, session: &SessionId) -> AuthResult<()>;
}

/// Prueft Sessions per HTTP GET, Session-ID als Cookie
#[derive(Debug, Clone)]
pub struct HttpSessionValidator {
    client: Client,
    url: String,
}

impl HttpSessionValidator {
    /// Erstellt einen Validator fuer `basis_url` + `pfad`
    pub fn neu(client: Client, basis_url: &str, pfad: &str) -> Self {
        Self {
            client,
            url: format!("{}{}", basis_url.trim_end_matches('/'), pfad),
        }
    }

    /// Validator mit Standardpfad
    pub fn mit_standardpfad(client: Client, basis_url: &str) -> Self {
        Self::neu(client, basis_url, STANDARD_PRUEF_PFAD)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SessionValidator for HttpSessionValidator {
    async fn pruefen(&self, session: &SessionId) -> AuthResult<()> {
        let antwort = self
            .client
            .get(&self.url)
            .header(header::COOKIE, session.als_cookie())
            .send()
            .await?;

        let status = antwort.status();
        if status == StatusCode::OK {
            tracing::debug!(session = %session, "Session gueltig");
            Ok(())
        } else {
            tracing::debug!(session = %session, status = status.as_u16(), "Session abgelehnt");
            Err(AuthError::SessionAbgelehnt(status.as_u16()))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
