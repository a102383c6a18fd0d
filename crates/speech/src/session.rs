//! Mikrofon-Sitzung – RTP-Empfang plus Erkenner fuer eine Instanz
//!
//! ## State Machine
//! ```text
//!  (abwesend) --eroeffnen--> Verhandlung --starten--> Hoert
//!                                ^   |                 |  ^
//!                                |   +----stoppen----+ |  | fortsetzen
//!                                |                   v v  |
//!                                +----fortsetzen---- Gestoppt
//!
//!  beenden: jeder Zustand -> (entfernt)
//! ```
//! Eine Sitzung hoert genau dann, wenn sie automatisch starten soll und
//! mindestens eine Grammatik geladen ist.

use std::collections::BTreeSet;
use std::net::SocketAddr;

use lauscher_core::AudioFormat;
use lauscher_voice::RtpEmpfaenger;

use crate::engine::{Erkenner, ErkennerFabrik, EreignisSender};
use crate::error::SpeechResult;
use crate::grammar::GrammatikRegister;

/// Zustand einer bestehenden Sitzung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SitzungsZustand {
    /// Empfang laeuft, Erkenner erstellt, aber nicht gestartet
    Verhandlung,
    /// Erkennung laeuft
    Hoert,
    /// Erkenner pausiert, Empfang laeuft weiter
    Gestoppt,
}

/// Parameter zum Eroeffnen einer Sitzung
pub struct SitzungsParameter<'a> {
    pub bind_adresse: SocketAddr,
    pub kapazitaet: usize,
    pub format: AudioFormat,
    pub fabrik: &'a dyn ErkennerFabrik,
    pub ereignisse: EreignisSender,
}

/// Laufende Sitzung eines Mikrofons
pub struct MikrofonSitzung {
    instanz: String,
    empfaenger: RtpEmpfaenger,
    erkenner: Box<dyn Erkenner>,
    geladen: BTreeSet<String>,
    soll_an: bool,
    zustand: SitzungsZustand,
}

impl MikrofonSitzung {
    /// Bindet den RTP-Port, erstellt den Erkenner und laedt alle Grammatiken
    ///
    /// Schlaegt das Binden oder das Erstellen fehl, bleibt nichts zurueck.
    pub fn eroeffnen(
        instanz: &str,
        soll_an: bool,
        parameter: SitzungsParameter<'_>,
        grammatiken: &GrammatikRegister,
    ) -> SpeechResult<Self> {
        let (empfaenger, strom) =
            RtpEmpfaenger::starten(parameter.bind_adresse, parameter.kapazitaet)?;
        let mut erkenner =
            parameter
                .fabrik
                .erstellen(instanz, strom, parameter.format, parameter.ereignisse)?;

        let mut geladen = BTreeSet::new();
        for (name, spezifikation) in grammatiken.iter() {
            match erkenner.grammatik_laden(name, spezifikation) {
                Ok(()) => {
                    geladen.insert(name.to_string());
                }
                Err(e) => {
                    tracing::warn!(instanz, grammatik = name, fehler = %e, "Grammatik nicht geladen");
                }
            }
        }

        tracing::info!(
            instanz,
            port = empfaenger.port(),
            grammatiken = geladen.len(),
            soll_an,
            "Mikrofon-Sitzung eroeffnet"
        );

        Ok(Self {
            instanz: instanz.to_string(),
            empfaenger,
            erkenner,
            geladen,
            soll_an,
            zustand: SitzungsZustand::Verhandlung,
        })
    }

    pub fn instanz(&self) -> &str {
        &self.instanz
    }

    pub fn zustand(&self) -> SitzungsZustand {
        self.zustand
    }

    pub fn soll_an(&self) -> bool {
        self.soll_an
    }

    /// Lokaler RTP-Port dieser Sitzung
    pub fn port(&self) -> u16 {
        self.empfaenger.port()
    }

    pub fn empfaenger(&self) -> &RtpEmpfaenger {
        &self.empfaenger
    }

    pub fn hat_grammatik(&self, name: &str) -> bool {
        self.geladen.contains(name)
    }

    fn kann_hoeren(&self) -> bool {
        self.soll_an && !self.geladen.is_empty()
    }

    fn starten(&mut self) -> SpeechResult<()> {
        self.erkenner.starten()?;
        self.zustand = SitzungsZustand::Hoert;
        tracing::debug!(instanz = %self.instanz, "Erkennung gestartet");
        Ok(())
    }

    /// Pausiert die Erkennung; der Empfang laeuft weiter
    pub fn stoppen(&mut self) -> SpeechResult<()> {
        if self.zustand == SitzungsZustand::Hoert {
            self.erkenner.stoppen()?;
            tracing::debug!(instanz = %self.instanz, "Erkennung pausiert");
        }
        self.zustand = SitzungsZustand::Gestoppt;
        Ok(())
    }

    /// Hoeren, falls moeglich, sonst zurueck in die Verhandlung
    pub fn fortsetzen(&mut self) -> SpeechResult<()> {
        match self.zustand {
            SitzungsZustand::Hoert => Ok(()),
            _ if self.kann_hoeren() => self.starten(),
            _ => {
                self.zustand = SitzungsZustand::Verhandlung;
                Ok(())
            }
        }
    }

    /// Laedt eine neue Grammatik live nach
    ///
    /// Eine hoerende Sitzung wird neu gestartet, eine wartende startet.
    pub fn grammatik_anhaengen(&mut self, name: &str, spezifikation: &str) -> SpeechResult<()> {
        self.erkenner.grammatik_laden(name, spezifikation)?;
        self.geladen.insert(name.to_string());

        match self.zustand {
            SitzungsZustand::Hoert => {
                self.erkenner.stoppen()?;
                self.starten()
            }
            SitzungsZustand::Verhandlung if self.kann_hoeren() => self.starten(),
            _ => Ok(()),
        }
    }

    /// Entlaedt eine Grammatik, falls sie geladen ist
    ///
    /// Gibt zurueck, ob die Grammatik geladen war. Eine hoerende Sitzung
    /// bleibt hoerend, auch wenn keine Grammatik mehr uebrig ist.
    pub fn grammatik_abhaengen(&mut self, name: &str) -> SpeechResult<bool> {
        if !self.geladen.remove(name) {
            return Ok(false);
        }
        self.erkenner.grammatik_entladen(name)?;
        Ok(true)
    }

    /// Reicht Text an den Erkenner weiter
    pub fn emulieren(&mut self, text: &str) -> SpeechResult<()> {
        self.erkenner.emulieren(text)?;
        Ok(())
    }

    /// Stoppt Erkenner und Empfang; Puffer und Port werden freigegeben
    pub fn beenden(mut self) {
        if let Err(e) = self.stoppen() {
            tracing::warn!(instanz = %self.instanz, fehler = %e, "Erkenner liess sich nicht stoppen");
        }
        self.empfaenger.stoppen();
        tracing::info!(instanz = %self.instanz, "Mikrofon-Sitzung beendet");
    }
}

impl std::fmt::Debug for MikrofonSitzung {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MikrofonSitzung")
            .field("instanz", &self.instanz)
            .field("port", &self.port())
            .field("zustand", &self.zustand)
            .field("grammatiken", &self.geladen)
            .finish()
    }
}
