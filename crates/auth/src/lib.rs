//! chatrelay-auth – Session-Validierung
//!
//! Dieses Crate implementiert:
//! - `SessionValidator`-Trait als Grenze zum externen Identity-Dienst
//! - `HttpSessionValidator`: GET auf den Login-Check, Session als Cookie

pub mod error;
pub mod session;

// Bequeme Re-Exporte
pub use error::{AuthError, AuthResult};
pub use session::{HttpSessionValidator, SessionValidator, STANDARD_PRUEF_PFAD};
