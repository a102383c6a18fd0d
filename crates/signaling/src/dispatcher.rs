//! Dispatcher – Routet eingehende Nachrichten an registrierte Handler
//!
//! Pro Nachrichtentyp gibt es eine geordnete Liste von Handlern, die
//! synchron in Registrierungsreihenfolge aufgerufen werden. Ein Handler-Fehler
//! oder -Panic wird geloggt; die uebrigen Handler und die Dispatch-Schleife
//! laufen weiter.
//!
//! Typen ohne registrierten Handler gehen an den Standard-Handler, der
//! eine Warnung loggt.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use lauscher_protocol::{Nachricht, NachrichtenTyp};

use crate::connection::HubSender;

/// Handler fuer einen Nachrichtentyp
pub type Handler = Box<dyn Fn(&Nachricht, &HubSender) -> anyhow::Result<()> + Send + Sync>;

/// Wird beim Abbau der Verbindung aufgerufen
pub type TrennungsHook = Box<dyn Fn() + Send + Sync>;

/// Zentrale Dispatch-Tabelle einer Verbindung
pub struct Dispatcher {
    handler: HashMap<NachrichtenTyp, Vec<Handler>>,
    unbekannt: Handler,
    trennung: Vec<TrennungsHook>,
}

impl Dispatcher {
    /// Erstellt einen leeren Dispatcher mit loggendem Standard-Handler
    pub fn neu() -> Self {
        Self {
            handler: HashMap::new(),
            unbekannt: Box::new(|nachricht, _| {
                tracing::warn!(typ = %nachricht.typ, "Nachricht ohne Handler ignoriert");
                Ok(())
            }),
            trennung: Vec::new(),
        }
    }

    /// Haengt einen Handler fuer `typ` an
    pub fn bei<F>(&mut self, typ: NachrichtenTyp, handler: F) -> &mut Self
    where
        F: Fn(&Nachricht, &HubSender) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handler.entry(typ).or_default().push(Box::new(handler));
        self
    }

    /// Ersetzt den Standard-Handler fuer Typen ohne Handler
    pub fn bei_unbekannt<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&Nachricht, &HubSender) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.unbekannt = Box::new(handler);
        self
    }

    /// Registriert einen Hook fuer den Verbindungsabbau
    pub fn bei_trennung<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.trennung.push(Box::new(hook));
        self
    }

    /// Anzahl der Handler fuer einen Typ
    pub fn anzahl_handler(&self, typ: &NachrichtenTyp) -> usize {
        self.handler.get(typ).map_or(0, Vec::len)
    }

    /// Ruft alle Handler fuer den Typ der Nachricht auf
    ///
    /// `intern_behandelt` unterdrueckt den Standard-Handler fuer Typen,
    /// die die Verbindung selbst verarbeitet hat. Gibt die Anzahl der
    /// aufgerufenen Handler zurueck.
    pub fn verteilen(&self, nachricht: &Nachricht, sender: &HubSender, intern_behandelt: bool) -> usize {
        match self.handler.get(&nachricht.typ) {
            Some(liste) if !liste.is_empty() => {
                for handler in liste {
                    handler_aufrufen(handler, nachricht, sender);
                }
                liste.len()
            }
            _ => {
                if !intern_behandelt {
                    handler_aufrufen(&self.unbekannt, nachricht, sender);
                }
                0
            }
        }
    }

    /// Fuehrt alle Trennungs-Hooks in Registrierungsreihenfolge aus
    pub fn trennung_ausfuehren(&self) {
        for hook in &self.trennung {
            if catch_unwind(AssertUnwindSafe(|| hook())).is_err() {
                tracing::error!("Trennungs-Hook ist abgestuerzt");
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::neu()
    }
}

fn handler_aufrufen(handler: &Handler, nachricht: &Nachricht, sender: &HubSender) {
    match catch_unwind(AssertUnwindSafe(|| handler(nachricht, sender))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!(typ = %nachricht.typ, fehler = %e, "Handler fehlgeschlagen");
        }
        Err(_) => {
            tracing::error!(typ = %nachricht.typ, "Handler ist abgestuerzt");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn protokoll() -> Arc<Mutex<Vec<&'static str>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[test]
    fn handler_in_registrierungsreihenfolge() {
        let log = protokoll();
        let mut d = Dispatcher::neu();
        let (l1, l2) = (Arc::clone(&log), Arc::clone(&log));
        d.bei(NachrichtenTyp::MsgQuery, move |_, _| {
            l1.lock().push("erster");
            Ok(())
        })
        .bei(NachrichtenTyp::MsgQuery, move |_, _| {
            l2.lock().push("zweiter");
            Ok(())
        });

        let (sender, _rx) = HubSender::mit_kanal();
        let n = d.verteilen(&Nachricht::leer(NachrichtenTyp::MsgQuery), &sender, false);
        assert_eq!(n, 2);
        assert_eq!(*log.lock(), vec!["erster", "zweiter"]);
    }

    #[test]
    fn fehler_und_panic_stoppen_dispatch_nicht() {
        let log = protokoll();
        let mut d = Dispatcher::neu();
        let l = Arc::clone(&log);
        d.bei(NachrichtenTyp::AppDependency, |_, _| anyhow::bail!("kaputt"))
            .bei(NachrichtenTyp::AppDependency, |_, _| panic!("absichtlich"))
            .bei(NachrichtenTyp::AppDependency, move |_, _| {
                l.lock().push("danach");
                Ok(())
            });

        let (sender, _rx) = HubSender::mit_kanal();
        d.verteilen(&Nachricht::leer(NachrichtenTyp::AppDependency), &sender, false);
        assert_eq!(*log.lock(), vec!["danach"]);
    }

    #[test]
    fn unbekannter_typ_geht_an_standard_handler() {
        let log = protokoll();
        let mut d = Dispatcher::neu();
        let l = Arc::clone(&log);
        d.bei_unbekannt(move |_, _| {
            l.lock().push("unbekannt");
            Ok(())
        });

        let (sender, _rx) = HubSender::mit_kanal();
        let nachricht = Nachricht::leer(NachrichtenTyp::aus_token("FOO_BAR"));
        assert_eq!(d.verteilen(&nachricht, &sender, false), 0);
        d.verteilen(&Nachricht::leer(NachrichtenTyp::AppManifestOk), &sender, true);
        assert_eq!(*log.lock(), vec!["unbekannt"]);
    }

    #[test]
    fn trennungs_hooks_laufen_alle() {
        let log = protokoll();
        let mut d = Dispatcher::neu();
        let l = Arc::clone(&log);
        d.bei_trennung(|| panic!("absichtlich"))
            .bei_trennung(move || l.lock().push("aufgeraeumt"));
        d.trennung_ausfuehren();
        assert_eq!(*log.lock(), vec!["aufgeraeumt"]);
        assert_eq!(d.anzahl_handler(&NachrichtenTyp::AppUp), 0);
    }
}
