//! Registry aller offenen Verbindungen
//!
//! Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
//! Iterationen arbeiten auf einem Schnappschuss, damit Hinzufuegen und
//! Entfernen waehrend eines Broadcasts sicher bleiben.

use chatrelay_core::ConnectionId;
use dashmap::DashMap;
use std::sync::Arc;

use crate::connection::Connection;

/// Menge der Verbindungen, indiziert nach ConnectionId
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<DashMap<ConnectionId, Arc<Connection>>>,
}

impl ConnectionRegistry {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Nimmt eine Verbindung auf; `false` wenn sie schon registriert ist
    pub fn hinzufuegen(&self, conn: Arc<Connection>) -> bool {
        let id = conn.id();
        match self.inner.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(eintrag) => {
                eintrag.insert(conn);
                tracing::debug!(conn = %id, "Verbindung registriert");
                true
            }
        }
    }

    /// Entfernt eine Verbindung; `None` wenn sie nicht (mehr) registriert ist
    pub fn entfernen(&self, id: &ConnectionId) -> Option<Arc<Connection>> {
        let entfernt = self.inner.remove(id).map(|(_, conn)| conn);
        if entfernt.is_some() {
            tracing::debug!(conn = %id, "Verbindung aus Registry entfernt");
        }
        entfernt
    }

    pub fn enthaelt(&self, id: &ConnectionId) -> bool {
        self.inner.contains_key(id)
    }

    pub fn anzahl(&self) -> usize {
        self.inner.len()
    }

    /// Schnappschuss aller Verbindungen
    pub fn alle(&self) -> Vec<Arc<Connection>> {
        self.inner.iter().map(|e| Arc::clone(e.value())).collect()
    }

    /// Schnappschuss aller Verbindungen ausser `ausgeschlossen`
    pub fn alle_ausser(&self, ausgeschlossen: &ConnectionId) -> Vec<Arc<Connection>> {
        let mut ergebnis = Vec::with_capacity(self.inner.len());
        self.fuer_alle_ausser(ausgeschlossen, |conn| ergebnis.push(Arc::clone(conn)));
        ergebnis
    }

    /// Ruft `f` fuer jede Verbindung ausser `ausgeschlossen` auf
    ///
    /// `f` laeuft waehrend die Shards gelesen werden und darf die Registry
    /// nicht veraendern.
    pub fn fuer_alle_ausser<F>(&self, ausgeschlossen: &ConnectionId, mut f: F)
    where
        F: FnMut(&Arc<Connection>),
    {
        for eintrag in self.inner.iter() {
            if eintrag.key() != ausgeschlossen {
                f(eintrag.value());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
