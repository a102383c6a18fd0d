//! Sitzungs-Manager – verbindet Hub-Nachrichten mit Mikrofon-Sitzungen
//!
//! Haelt das Grammatik-Register und alle Sitzungen hinter einem einzigen
//! Mutex. Dadurch schliessen sich Aenderungen am Register und das Laden
//! aller Grammatiken in eine neue Sitzung gegenseitig aus.
//!
//! ## Nachrichten
//! - `APP_DEPENDENCY` – Mikrofone kommen und gehen (`"up"` / sonst)
//! - `MSG_QUERY` – `load_grammar` / `unload_grammar`
//! - `MSG_BROADCAST` – `spoken_text` (Emulation) / `unloadGrammar`
//!
//! Ergebnisse der Erkenner laufen ueber einen Kanal in
//! [`ereignisse_weiterleiten`] und von dort als `MSG_BROADCAST` zum Hub.

use std::collections::{BTreeMap, HashMap};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use lauscher_core::AudioFormat;
use lauscher_protocol::control::{Anfrage, Broadcast, STANDARD_PRIORITAET};
use lauscher_protocol::NachrichtenTyp;
use lauscher_signaling::{Dispatcher, HubSender};
use lauscher_voice::stream_buffer::STANDARD_KAPAZITAET;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::engine::{ErkennerFabrik, EreignisEmpfaenger, EreignisSender, ErkennungsEreignis};
use crate::error::{SpeechError, SpeechResult};
use crate::grammar::GrammatikRegister;
use crate::session::{MikrofonSitzung, SitzungsParameter, SitzungsZustand};

/// Kategorie fuer echte Mikrofone (Erkennung startet automatisch)
pub const KATEGORIE_MIKROFON: &str = "microphone";
/// Kategorie fuer Test-Mikrofone (nur Emulation, kein Autostart)
pub const KATEGORIE_MOCK_MIKROFON: &str = "mock_microphone";

/// Meldung bei doppelter Grammatik, wie sie der Hub erwartet
const MELDUNG_GRAMMATIK_EXISTIERT: &str = "Grammar has already been added";

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Einstellungen fuer neue Mikrofon-Sitzungen
#[derive(Debug, Clone)]
pub struct SitzungsKonfig {
    /// Adresse, die dem Mikrofon in der Einladung genannt wird
    pub werbe_adresse: IpAddr,
    /// Adresse, an die die RTP-Sockets gebunden werden
    pub bind_adresse: IpAddr,
    /// Port der ersten Sitzung, jede weitere zaehlt hoch (0 = OS waehlt)
    pub basis_port: u16,
    /// Kapazitaet des Stream-Puffers pro Sitzung
    pub puffer_kapazitaet: usize,
    pub format: AudioFormat,
}

impl Default for SitzungsKonfig {
    fn default() -> Self {
        Self {
            werbe_adresse: IpAddr::V4(Ipv4Addr::LOCALHOST),
            bind_adresse: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            basis_port: 1848,
            puffer_kapazitaet: STANDARD_KAPAZITAET,
            format: AudioFormat::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// SitzungsManager
// ---------------------------------------------------------------------------

struct Inneres {
    grammatiken: GrammatikRegister,
    sitzungen: HashMap<String, MikrofonSitzung>,
    naechster_port: u16,
}

/// Verwaltet Grammatiken und Mikrofon-Sitzungen einer Hub-Verbindung
pub struct SitzungsManager {
    konfig: SitzungsKonfig,
    fabrik: Arc<dyn ErkennerFabrik>,
    ereignisse: EreignisSender,
    inneres: Mutex<Inneres>,
}

impl SitzungsManager {
    /// Erstellt den Manager und den Empfaenger fuer Erkenner-Ereignisse
    pub fn neu(
        konfig: SitzungsKonfig,
        fabrik: Arc<dyn ErkennerFabrik>,
    ) -> (Arc<Self>, EreignisEmpfaenger) {
        let (ereignisse, rx) = mpsc::unbounded_channel();
        let naechster_port = konfig.basis_port;
        let manager = Arc::new(Self {
            konfig,
            fabrik,
            ereignisse,
            inneres: Mutex::new(Inneres {
                grammatiken: GrammatikRegister::neu(),
                sitzungen: HashMap::new(),
                naechster_port,
            }),
        });
        (manager, rx)
    }

    /// Registriert die Handler fuer Abhaengigkeiten, Anfragen und Broadcasts
    ///
    /// Beim Verbindungsabbau werden alle Sitzungen beendet.
    pub fn registrieren(self: &Arc<Self>, dispatcher: &mut Dispatcher) {
        let m = Arc::clone(self);
        dispatcher.bei(NachrichtenTyp::AppDependency, move |nachricht, sender| {
            m.abhaengigkeit_verarbeiten(&nachricht.payload, sender)?;
            Ok(())
        });

        let m = Arc::clone(self);
        dispatcher.bei(NachrichtenTyp::MsgQuery, move |nachricht, sender| {
            let anfrage: Anfrage = nachricht.als()?;
            m.anfrage_verarbeiten(&anfrage, sender)?;
            Ok(())
        });

        let m = Arc::clone(self);
        dispatcher.bei(NachrichtenTyp::MsgBroadcast, move |nachricht, sender| {
            let broadcast: Broadcast = nachricht.als()?;
            m.broadcast_verarbeiten(&broadcast, sender)?;
            Ok(())
        });

        let m = Arc::clone(self);
        dispatcher.bei_trennung(move || m.alle_entfernen());
    }

    // -----------------------------------------------------------------------
    // Abfragen
    // -----------------------------------------------------------------------

    pub fn zustand(&self, instanz: &str) -> Option<SitzungsZustand> {
        self.inneres.lock().sitzungen.get(instanz).map(MikrofonSitzung::zustand)
    }

    /// Lokaler RTP-Port einer Sitzung
    pub fn port(&self, instanz: &str) -> Option<u16> {
        self.inneres.lock().sitzungen.get(instanz).map(MikrofonSitzung::port)
    }

    pub fn anzahl_sitzungen(&self) -> usize {
        self.inneres.lock().sitzungen.len()
    }

    pub fn anzahl_grammatiken(&self) -> usize {
        self.inneres.lock().grammatiken.len()
    }

    /// Ob die Sitzung die Grammatik geladen hat
    pub fn sitzung_hat_grammatik(&self, instanz: &str, grammatik: &str) -> bool {
        self.inneres
            .lock()
            .sitzungen
            .get(instanz)
            .is_some_and(|s| s.hat_grammatik(grammatik))
    }

    /// Anzahl gueltiger RTP-Pakete, die eine Sitzung empfangen hat
    pub fn empfangene_pakete(&self, instanz: &str) -> Option<u64> {
        self.inneres
            .lock()
            .sitzungen
            .get(instanz)
            .map(|s| s.empfaenger().statistik().pakete())
    }

    // -----------------------------------------------------------------------
    // Abhaengigkeiten
    // -----------------------------------------------------------------------

    /// Verarbeitet eine `APP_DEPENDENCY`-Payload
    ///
    /// Nur die Mikrofon-Kategorien werden ausgewertet. Hat eine davon nicht
    /// die Form `{instanz: status}`, werden alle Sitzungen pausiert.
    pub fn abhaengigkeit_verarbeiten(&self, payload: &Value, sender: &HubSender) -> SpeechResult<()> {
        let kategorien = match payload.as_object() {
            Some(objekt) => objekt,
            None => {
                self.alle_pausieren();
                return Err(SpeechError::Abhaengigkeit("Payload ist kein Objekt".into()));
            }
        };

        for (kategorie, soll_an) in [(KATEGORIE_MIKROFON, true), (KATEGORIE_MOCK_MIKROFON, false)] {
            let Some(eintrag) = kategorien.get(kategorie) else {
                continue;
            };
            let instanzen = match BTreeMap::<String, String>::deserialize(eintrag) {
                Ok(instanzen) => instanzen,
                Err(e) => {
                    self.alle_pausieren();
                    return Err(SpeechError::Abhaengigkeit(format!("{kategorie}: {e}")));
                }
            };

            for (instanz, status) in &instanzen {
                self.mikrofon_status(instanz, status, soll_an, sender);
            }
        }
        Ok(())
    }

    fn mikrofon_status(&self, instanz: &str, status: &str, soll_an: bool, sender: &HubSender) {
        let mut inneres = self.inneres.lock();
        let inneres = &mut *inneres;

        if status != "up" {
            if let Some(sitzung) = inneres.sitzungen.get_mut(instanz) {
                if let Err(e) = sitzung.stoppen() {
                    tracing::warn!(instanz, fehler = %e, "Sitzung liess sich nicht pausieren");
                }
                tracing::info!(instanz, status, "Mikrofon pausiert");
            }
            return;
        }

        if let Some(sitzung) = inneres.sitzungen.get_mut(instanz) {
            if let Err(e) = sitzung.fortsetzen() {
                tracing::warn!(instanz, fehler = %e, "Sitzung liess sich nicht fortsetzen");
            }
            return;
        }

        let port = inneres.naechster_port;
        let parameter = SitzungsParameter {
            bind_adresse: SocketAddr::new(self.konfig.bind_adresse, port),
            kapazitaet: self.konfig.puffer_kapazitaet,
            format: self.konfig.format,
            fabrik: self.fabrik.as_ref(),
            ereignisse: self.ereignisse.clone(),
        };
        if port != 0 {
            inneres.naechster_port = port.wrapping_add(1);
        }

        let mut sitzung =
            match MikrofonSitzung::eroeffnen(instanz, soll_an, parameter, &inneres.grammatiken) {
                Ok(sitzung) => sitzung,
                Err(e) => {
                    tracing::error!(instanz, port, fehler = %e, "Mikrofon-Sitzung nicht eroeffnet");
                    return;
                }
            };
        if let Err(e) = sitzung.fortsetzen() {
            tracing::warn!(instanz, fehler = %e, "Erkennung nicht gestartet");
        }

        let einladung = json!({
            "ip": self.konfig.werbe_adresse.to_string(),
            "port": sitzung.port(),
        });
        inneres.sitzungen.insert(instanz.to_string(), sitzung);

        if let Err(e) = sender.anfrage_senden(
            KATEGORIE_MIKROFON,
            "invite",
            einladung,
            vec![instanz.to_string()],
            STANDARD_PRIORITAET,
        ) {
            tracing::warn!(instanz, fehler = %e, "Einladung nicht gesendet");
        }
    }

    /// Pausiert alle Sitzungen
    pub fn alle_pausieren(&self) {
        let mut inneres = self.inneres.lock();
        for (instanz, sitzung) in inneres.sitzungen.iter_mut() {
            if let Err(e) = sitzung.stoppen() {
                tracing::warn!(instanz = %instanz, fehler = %e, "Sitzung liess sich nicht pausieren");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Grammatiken
    // -----------------------------------------------------------------------

    /// Registriert eine Grammatik und laedt sie in alle Sitzungen
    ///
    /// Hoerende Sitzungen werden neu gestartet, wartende starten.
    pub fn grammatik_hinzufuegen(&self, name: &str, spezifikation: &str) -> SpeechResult<()> {
        let mut inneres = self.inneres.lock();
        inneres.grammatiken.hinzufuegen(name, spezifikation)?;

        for (instanz, sitzung) in inneres.sitzungen.iter_mut() {
            if let Err(e) = sitzung.grammatik_anhaengen(name, spezifikation) {
                tracing::warn!(instanz = %instanz, grammatik = name, fehler = %e, "Grammatik nicht angehaengt");
            }
        }
        tracing::info!(grammatik = name, "Grammatik hinzugefuegt");
        Ok(())
    }

    /// Entfernt eine Grammatik aus allen Sitzungen und dem Register
    pub fn grammatik_entfernen(&self, name: &str) -> SpeechResult<()> {
        let mut inneres = self.inneres.lock();
        if !inneres.grammatiken.enthaelt(name) {
            return Err(SpeechError::GrammatikNichtGefunden(name.to_string()));
        }

        for (instanz, sitzung) in inneres.sitzungen.iter_mut() {
            match sitzung.grammatik_abhaengen(name) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(instanz = %instanz, grammatik = name, "Grammatik war nicht geladen");
                }
                Err(e) => {
                    tracing::warn!(instanz = %instanz, grammatik = name, fehler = %e, "Grammatik nicht entladen");
                }
            }
        }
        inneres.grammatiken.entfernen(name)?;
        tracing::info!(grammatik = name, "Grammatik entfernt");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Sitzungen beenden
    // -----------------------------------------------------------------------

    /// Beendet eine Sitzung; gibt zurueck, ob sie existierte
    pub fn sitzung_entfernen(&self, instanz: &str) -> bool {
        let sitzung = self.inneres.lock().sitzungen.remove(instanz);
        match sitzung {
            Some(sitzung) => {
                sitzung.beenden();
                true
            }
            None => false,
        }
    }

    /// Beendet alle Sitzungen
    pub fn alle_entfernen(&self) {
        let sitzungen: Vec<_> = self.inneres.lock().sitzungen.drain().collect();
        for (_, sitzung) in sitzungen {
            sitzung.beenden();
        }
    }

    // -----------------------------------------------------------------------
    // Anfragen und Broadcasts
    // -----------------------------------------------------------------------

    /// Beantwortet `load_grammar` / `unload_grammar`
    ///
    /// Grammatik-Fehler gehen als `MSG_QUERY_FAIL` an den Hub und werden
    /// nicht weitergereicht.
    pub fn anfrage_verarbeiten(&self, anfrage: &Anfrage, sender: &HubSender) -> SpeechResult<()> {
        let ergebnis = match anfrage.action.as_str() {
            "load_grammar" => {
                let grammatik = &anfrage.data["grammar"];
                match (grammatik["name"].as_str(), grammatik["xml"].as_str()) {
                    (Some(name), Some(xml)) => self.grammatik_hinzufuegen(name, xml),
                    _ => Err(SpeechError::ungueltig("data.grammar braucht name und xml")),
                }
            }
            "unload_grammar" => match anfrage.data["grammar"].as_str() {
                Some(name) => self.grammatik_entfernen(name),
                None => Err(SpeechError::ungueltig("data.grammar muss ein Name sein")),
            },
            andere => Err(SpeechError::ungueltig(format!("Unbekannte Aktion: {andere}"))),
        };

        let antwort = match ergebnis {
            Ok(()) => sender.anfrage_erfolg(&anfrage.id, json!({})),
            Err(SpeechError::GrammatikExistiert(name)) => {
                tracing::info!(grammatik = %name, "Grammatik bereits vorhanden");
                sender.anfrage_fehler(&anfrage.id, MELDUNG_GRAMMATIK_EXISTIERT)
            }
            Err(e) => {
                tracing::info!(aktion = %anfrage.action, fehler = %e, "Anfrage abgelehnt");
                sender.anfrage_fehler(&anfrage.id, &e.to_string())
            }
        };
        antwort?;
        Ok(())
    }

    /// Verarbeitet `spoken_text` und `unloadGrammar` aus einem Broadcast
    pub fn broadcast_verarbeiten(&self, broadcast: &Broadcast, sender: &HubSender) -> SpeechResult<()> {
        if let Some(text) = broadcast.content["spoken_text"].as_str() {
            let von = broadcast
                .from_instance_id
                .as_deref()
                .ok_or_else(|| SpeechError::ungueltig("spoken_text ohne fromInstanceId"))?;
            let mut inneres = self.inneres.lock();
            let sitzung = inneres
                .sitzungen
                .get_mut(von)
                .ok_or_else(|| SpeechError::SitzungUnbekannt(von.to_string()))?;
            sitzung.emulieren(text)?;
        }

        if let Some(name) = broadcast.content["unloadGrammar"].as_str() {
            let antwort = match self.grammatik_entfernen(name) {
                Ok(()) => sender.senden(
                    NachrichtenTyp::MsgBroadcastSuccess,
                    json!({"message": "Success"}),
                ),
                Err(e) => sender.senden(
                    NachrichtenTyp::MsgBroadcastFail,
                    json!({"message": e.to_string()}),
                ),
            };
            antwort?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Ergebnis-Weiterleitung
// ---------------------------------------------------------------------------

/// Leitet Erkenner-Ergebnisse als `MSG_BROADCAST` an den Hub
///
/// Laeuft bis alle Erkenner und der Manager verschwunden sind oder die
/// Verbindung geschlossen ist. Abgelehnte Aeusserungen werden nur geloggt.
pub async fn ereignisse_weiterleiten(mut rx: EreignisEmpfaenger, sender: HubSender) {
    while let Some(ereignis) = rx.recv().await {
        match ereignis {
            ErkennungsEreignis::Erkannt {
                instanz,
                text,
                konfidenz,
                grammatik,
                tags,
            } => {
                tracing::info!(instanz = %instanz, text = %text, konfidenz, grammatik = %grammatik, "Sprache erkannt");
                let inhalt = json!({
                    "text": text,
                    "confidence": konfidenz,
                    "grammar": grammatik,
                    "tags": tags,
                });
                if let Err(e) = sender.broadcast_senden(inhalt) {
                    tracing::debug!(fehler = %e, "Ergebnis nicht gesendet, Weiterleitung endet");
                    break;
                }
            }
            ErkennungsEreignis::Abgelehnt {
                instanz,
                alternativen,
            } => {
                for (text, konfidenz) in &alternativen {
                    tracing::info!(instanz = %instanz, text = %text, konfidenz, "Sprache abgelehnt");
                }
                if alternativen.is_empty() {
                    tracing::info!(instanz = %instanz, "Sprache abgelehnt");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phrase::PhrasenFabrik;
    use lauscher_core::KorrelationsId;
    use lauscher_protocol::Nachricht;

    fn manager() -> Arc<SitzungsManager> {
        let konfig = SitzungsKonfig {
            bind_adresse: IpAddr::V4(Ipv4Addr::LOCALHOST),
            basis_port: 0,
            puffer_kapazitaet: 1024,
            ..SitzungsKonfig::default()
        };
        SitzungsManager::neu(konfig, Arc::new(PhrasenFabrik)).0
    }

    fn anfrage(action: &str, data: Value) -> Anfrage {
        Anfrage {
            id: KorrelationsId::from("q1"),
            capability: String::new(),
            action: action.into(),
            data,
            instance_id: Vec::new(),
            priority: STANDARD_PRIORITAET,
            from_instance_id: None,
        }
    }

    fn alle(rx: &mut mpsc::UnboundedReceiver<Nachricht>) -> Vec<Nachricht> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[tokio::test]
    async fn mikrofon_ohne_grammatik_bleibt_in_verhandlung() {
        let m = manager();
        let (sender, mut rx) = HubSender::mit_kanal();

        m.abhaengigkeit_verarbeiten(&json!({"microphone": {"micA": "up"}}), &sender)
            .unwrap();
        assert_eq!(m.zustand("micA"), Some(SitzungsZustand::Verhandlung));

        let einladung = alle(&mut rx).pop().unwrap();
        assert_eq!(einladung.typ, NachrichtenTyp::MsgQuery);
        assert_eq!(einladung.payload["action"], "invite");
        assert_eq!(einladung.payload["capability"], "microphone");
        assert_eq!(einladung.payload["instanceId"], json!(["micA"]));
        assert_eq!(einladung.payload["data"]["port"], m.port("micA").unwrap());

        m.grammatik_hinzufuegen("g1", "<item>hallo</item>").unwrap();
        assert_eq!(m.zustand("micA"), Some(SitzungsZustand::Hoert));
        assert!(m.sitzung_hat_grammatik("micA", "g1"));
    }

    #[tokio::test]
    async fn bekannte_instanz_wird_nicht_neu_eingeladen() {
        let m = manager();
        let (sender, mut rx) = HubSender::mit_kanal();
        m.grammatik_hinzufuegen("g1", "x").unwrap();

        m.abhaengigkeit_verarbeiten(&json!({"microphone": {"micA": "up"}}), &sender)
            .unwrap();
        assert_eq!(m.zustand("micA"), Some(SitzungsZustand::Hoert));

        m.abhaengigkeit_verarbeiten(&json!({"microphone": {"micA": "down"}}), &sender)
            .unwrap();
        assert_eq!(m.zustand("micA"), Some(SitzungsZustand::Gestoppt));

        m.abhaengigkeit_verarbeiten(&json!({"microphone": {"micA": "up"}}), &sender)
            .unwrap();
        assert_eq!(m.zustand("micA"), Some(SitzungsZustand::Hoert));
        assert_eq!(alle(&mut rx).len(), 1, "Nur die erste Meldung laedt ein");
    }

    #[tokio::test]
    async fn mock_mikrofon_startet_nicht_automatisch() {
        let m = manager();
        let (sender, _rx) = HubSender::mit_kanal();
        m.grammatik_hinzufuegen("g1", "x").unwrap();

        m.abhaengigkeit_verarbeiten(&json!({"mock_microphone": {"mock1": "up"}}), &sender)
            .unwrap();
        assert_eq!(m.zustand("mock1"), Some(SitzungsZustand::Verhandlung));
    }

    #[tokio::test]
    async fn fehlerhafte_abhaengigkeit_pausiert_alles() {
        let m = manager();
        let (sender, _rx) = HubSender::mit_kanal();
        m.grammatik_hinzufuegen("g1", "x").unwrap();
        m.abhaengigkeit_verarbeiten(&json!({"microphone": {"micA": "up"}}), &sender)
            .unwrap();

        let e = m
            .abhaengigkeit_verarbeiten(&json!({"microphone": ["micA"]}), &sender)
            .unwrap_err();
        assert!(matches!(e, SpeechError::Abhaengigkeit(_)));
        assert_eq!(m.zustand("micA"), Some(SitzungsZustand::Gestoppt));

        // Andere Kategorien werden ignoriert
        m.abhaengigkeit_verarbeiten(&json!({"speaker": 5}), &sender).unwrap();
    }

    #[tokio::test]
    async fn load_grammar_doppelt_liefert_query_fail() {
        let m = manager();
        let (sender, mut rx) = HubSender::mit_kanal();
        let data = json!({"grammar": {"name": "g1", "xml": "<grammar/>"}});

        m.anfrage_verarbeiten(&anfrage("load_grammar", data.clone()), &sender)
            .unwrap();
        m.anfrage_verarbeiten(&anfrage("load_grammar", data), &sender)
            .unwrap();

        let antworten = alle(&mut rx);
        assert_eq!(antworten[0].typ, NachrichtenTyp::MsgQuerySuccess);
        assert_eq!(antworten[0].payload["id"], "q1");
        assert_eq!(antworten[1].typ, NachrichtenTyp::MsgQueryFail);
        assert_eq!(antworten[1].payload["message"], "Grammar has already been added");
        assert_eq!(m.anzahl_grammatiken(), 1);
    }

    #[tokio::test]
    async fn unload_grammar_unbekannt_liefert_query_fail() {
        let m = manager();
        let (sender, mut rx) = HubSender::mit_kanal();
        m.anfrage_verarbeiten(&anfrage("unload_grammar", json!({"grammar": "missing"})), &sender)
            .unwrap();
        m.anfrage_verarbeiten(&anfrage("dance", json!({})), &sender)
            .unwrap();

        let antworten = alle(&mut rx);
        assert!(antworten.iter().all(|a| a.typ == NachrichtenTyp::MsgQueryFail));
        assert_eq!(antworten.len(), 2);
    }

    #[tokio::test]
    async fn entfernen_toleriert_sitzungen_ohne_grammatik() {
        let m = manager();
        let (sender, _rx) = HubSender::mit_kanal();
        m.abhaengigkeit_verarbeiten(&json!({"microphone": {"micA": "up"}}), &sender)
            .unwrap();
        m.grammatik_hinzufuegen("g1", "x").unwrap();
        m.abhaengigkeit_verarbeiten(&json!({"microphone": {"micB": "up"}}), &sender)
            .unwrap();

        m.grammatik_entfernen("g1").unwrap();
        assert_eq!(m.anzahl_grammatiken(), 0);
        assert!(!m.sitzung_hat_grammatik("micA", "g1"));
        assert!(matches!(
            m.grammatik_entfernen("g1"),
            Err(SpeechError::GrammatikNichtGefunden(_))
        ));
    }

    #[tokio::test]
    async fn broadcast_unload_grammar_antwortet_success() {
        let m = manager();
        let (sender, mut rx) = HubSender::mit_kanal();
        m.grammatik_hinzufuegen("g1", "x").unwrap();

        let broadcast = Broadcast {
            id: KorrelationsId::from("b1"),
            content: json!({"unloadGrammar": "g1"}),
            from_instance_id: None,
        };
        m.broadcast_verarbeiten(&broadcast, &sender).unwrap();

        let antwort = alle(&mut rx).pop().unwrap();
        assert_eq!(antwort.typ, NachrichtenTyp::MsgBroadcastSuccess);
        assert_eq!(antwort.payload["message"], "Success");
        assert_eq!(m.anzahl_grammatiken(), 0);
    }

    #[tokio::test]
    async fn spoken_text_unbekannte_instanz_ist_fehler() {
        let m = manager();
        let (sender, _rx) = HubSender::mit_kanal();
        let broadcast = Broadcast {
            id: KorrelationsId::new(),
            content: json!({"spoken_text": "hallo"}),
            from_instance_id: Some("niemand".into()),
        };
        assert!(matches!(
            m.broadcast_verarbeiten(&broadcast, &sender),
            Err(SpeechError::SitzungUnbekannt(_))
        ));
    }

    #[tokio::test]
    async fn weiterleitung_sendet_broadcast_mit_ergebnis() {
        let (sender, mut rx) = HubSender::mit_kanal();
        let (tx, ereignis_rx) = mpsc::unbounded_channel();

        tx.send(ErkennungsEreignis::Abgelehnt {
            instanz: "micA".into(),
            alternativen: vec![],
        })
        .unwrap();
        tx.send(ErkennungsEreignis::Erkannt {
            instanz: "micA".into(),
            text: "hallo welt".into(),
            konfidenz: 0.5,
            grammatik: "g1".into(),
            tags: BTreeMap::from([("ort".to_string(), "welt".to_string())]),
        })
        .unwrap();
        drop(tx);

        ereignisse_weiterleiten(ereignis_rx, sender).await;

        let gesendet = alle(&mut rx);
        assert_eq!(gesendet.len(), 1);
        assert_eq!(gesendet[0].typ, NachrichtenTyp::MsgBroadcast);
        let inhalt = &gesendet[0].payload["content"];
        assert_eq!(inhalt["text"], "hallo welt");
        assert_eq!(inhalt["confidence"], 0.5);
        assert_eq!(inhalt["grammar"], "g1");
        assert_eq!(inhalt["tags"]["ort"], "welt");
    }

    #[tokio::test]
    async fn alle_entfernen_leert_sitzungen() {
        let m = manager();
        let (sender, _rx) = HubSender::mit_kanal();
        m.abhaengigkeit_verarbeiten(&json!({"microphone": {"micA": "up", "micB": "up"}}), &sender)
            .unwrap();
        assert_eq!(m.anzahl_sitzungen(), 2);

        assert!(m.sitzung_entfernen("micA"));
        assert!(!m.sitzung_entfernen("micA"));
        m.alle_entfernen();
        assert_eq!(m.anzahl_sitzungen(), 0);
    }
}
