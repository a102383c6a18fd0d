//! Schnittstelle zum Spracherkenner
//!
//! Der Erkenner selbst ist eine Black Box: er erhaelt beim Erstellen das
//! Lese-Ende des Audio-Puffers und das PCM-Format, laedt Grammatiken und
//! meldet Ergebnisse asynchron ueber einen Ereignis-Kanal.

use std::collections::BTreeMap;

use lauscher_core::AudioFormat;
use lauscher_voice::AudioStrom;
use tokio::sync::mpsc;

/// Ergebnis des Spracherkenners
#[derive(Debug, Clone, PartialEq)]
pub enum ErkennungsEreignis {
    /// Eine Aeusserung wurde einer Grammatik zugeordnet
    Erkannt {
        instanz: String,
        text: String,
        konfidenz: f32,
        grammatik: String,
        tags: BTreeMap<String, String>,
    },
    /// Aeusserung wurde verworfen, mit moeglichen Alternativen
    Abgelehnt {
        instanz: String,
        alternativen: Vec<(String, f32)>,
    },
}

/// Kanal fuer Erkenner-Ereignisse; Senden ist synchron und von jedem Thread moeglich
pub type EreignisSender = mpsc::UnboundedSender<ErkennungsEreignis>;
pub type EreignisEmpfaenger = mpsc::UnboundedReceiver<ErkennungsEreignis>;

/// Ein Erkenner-Handle pro Mikrofon
pub trait Erkenner: Send {
    /// Laedt eine Grammatik; wirksam ab dem naechsten `starten`
    fn grammatik_laden(&mut self, name: &str, spezifikation: &str) -> anyhow::Result<()>;

    /// Entlaedt eine Grammatik
    fn grammatik_entladen(&mut self, name: &str) -> anyhow::Result<()>;

    /// Startet die fortlaufende Erkennung
    fn starten(&mut self) -> anyhow::Result<()>;

    /// Pausiert die Erkennung; das Audio laeuft weiter
    fn stoppen(&mut self) -> anyhow::Result<()>;

    /// Erkennt Text so, als waere er gesprochen worden
    fn emulieren(&mut self, text: &str) -> anyhow::Result<()> {
        anyhow::bail!("Emulation nicht unterstuetzt (Text: {text:?})")
    }
}

/// Erzeugt Erkenner fuer neue Mikrofon-Sitzungen
pub trait ErkennerFabrik: Send + Sync {
    fn erstellen(
        &self,
        instanz: &str,
        quelle: AudioStrom,
        format: AudioFormat,
        ereignisse: EreignisSender,
    ) -> anyhow::Result<Box<dyn Erkenner>>;
}
