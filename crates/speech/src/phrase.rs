//! Eingebauter Phrasen-Erkenner
//!
//! Liest den Audio-Strom in einem eigenen Thread bis zum Stream-Ende und
//! zaehlt die Bytes mit; eine akustische Erkennung findet nicht statt.
//! Text kommt ueber `emulieren` herein und wird gegen die geladenen
//! Grammatiken abgeglichen: eine Grammatik trifft, wenn ihre Spezifikation
//! den Text enthaelt (ohne Gross-/Kleinschreibung).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lauscher_core::AudioFormat;
use lauscher_voice::AudioStrom;

use crate::engine::{Erkenner, ErkennerFabrik, EreignisSender, ErkennungsEreignis};

/// Leseblock des Audio-Threads
const LESE_BLOCK: usize = 4096;

/// Erkenner, der emulierten Text gegen Grammatik-Spezifikationen abgleicht
pub struct PhrasenErkenner {
    instanz: String,
    grammatiken: BTreeMap<String, String>,
    laeuft: bool,
    ereignisse: EreignisSender,
    bytes_gelesen: Arc<AtomicU64>,
}

impl PhrasenErkenner {
    /// Erstellt den Erkenner und startet den Audio-Thread
    pub fn neu(
        instanz: &str,
        quelle: AudioStrom,
        format: AudioFormat,
        ereignisse: EreignisSender,
    ) -> anyhow::Result<Self> {
        let bytes_gelesen = Arc::new(AtomicU64::new(0));
        let zaehler = Arc::clone(&bytes_gelesen);
        let name = instanz.to_string();

        std::thread::Builder::new()
            .name(format!("audio-{instanz}"))
            .spawn(move || audio_lesen(&name, quelle, &zaehler))?;

        tracing::debug!(
            instanz,
            abtastrate = format.abtastrate,
            bits = format.bits_pro_sample,
            kanaele = format.kanaele,
            "Phrasen-Erkenner erstellt"
        );

        Ok(Self {
            instanz: instanz.to_string(),
            grammatiken: BTreeMap::new(),
            laeuft: false,
            ereignisse,
            bytes_gelesen,
        })
    }

    pub fn laeuft(&self) -> bool {
        self.laeuft
    }

    /// Bisher vom Audio-Thread gelesene Bytes
    pub fn bytes_gelesen(&self) -> u64 {
        self.bytes_gelesen.load(Ordering::Relaxed)
    }

    pub fn grammatiken(&self) -> impl Iterator<Item = &str> {
        self.grammatiken.keys().map(String::as_str)
    }

    fn melden(&self, ereignis: ErkennungsEreignis) {
        if self.ereignisse.send(ereignis).is_err() {
            tracing::debug!(instanz = %self.instanz, "Kein Empfaenger fuer Erkenner-Ereignisse");
        }
    }
}

fn audio_lesen(instanz: &str, quelle: AudioStrom, zaehler: &AtomicU64) {
    let mut buf = [0u8; LESE_BLOCK];
    loop {
        let n = quelle.lesen(&mut buf);
        if n == 0 {
            break;
        }
        zaehler.fetch_add(n as u64, Ordering::Relaxed);
    }
    tracing::debug!(
        instanz,
        bytes = zaehler.load(Ordering::Relaxed),
        "Audio-Strom beendet"
    );
}

impl Erkenner for PhrasenErkenner {
    fn grammatik_laden(&mut self, name: &str, spezifikation: &str) -> anyhow::Result<()> {
        self.grammatiken
            .insert(name.to_string(), spezifikation.to_lowercase());
        Ok(())
    }

    fn grammatik_entladen(&mut self, name: &str) -> anyhow::Result<()> {
        if self.grammatiken.remove(name).is_none() {
            anyhow::bail!("Grammatik {name} ist nicht geladen");
        }
        Ok(())
    }

    fn starten(&mut self) -> anyhow::Result<()> {
        self.laeuft = true;
        Ok(())
    }

    fn stoppen(&mut self) -> anyhow::Result<()> {
        self.laeuft = false;
        Ok(())
    }

    fn emulieren(&mut self, text: &str) -> anyhow::Result<()> {
        let gesucht = text.trim().to_lowercase();
        let treffer = if gesucht.is_empty() {
            None
        } else {
            self.grammatiken
                .iter()
                .find(|(_, spezifikation)| spezifikation.contains(&gesucht))
                .map(|(name, _)| name.clone())
        };

        let ereignis = match treffer {
            Some(grammatik) => ErkennungsEreignis::Erkannt {
                instanz: self.instanz.clone(),
                text: text.trim().to_string(),
                konfidenz: 1.0,
                grammatik,
                tags: BTreeMap::new(),
            },
            None => ErkennungsEreignis::Abgelehnt {
                instanz: self.instanz.clone(),
                alternativen: vec![(text.to_string(), 0.0)],
            },
        };
        self.melden(ereignis);
        Ok(())
    }
}

/// Fabrik fuer `PhrasenErkenner`
#[derive(Debug, Default, Clone, Copy)]
pub struct PhrasenFabrik;

impl ErkennerFabrik for PhrasenFabrik {
    fn erstellen(
        &self,
        instanz: &str,
        quelle: AudioStrom,
        format: AudioFormat,
        ereignisse: EreignisSender,
    ) -> anyhow::Result<Box<dyn Erkenner>> {
        Ok(Box::new(PhrasenErkenner::neu(
            instanz, quelle, format, ereignisse,
        )?))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use lauscher_voice::stream_puffer;
    use std::time::Duration;
    use tokio::sync::mpsc;

    const WETTER_GRAMMATIK: &str =
        r#"<grammar root="r"><rule id="r"><item>What is the weather</item></rule></grammar>"#;

    fn erkenner() -> (PhrasenErkenner, lauscher_voice::PufferSchreiber, mpsc::UnboundedReceiver<ErkennungsEreignis>) {
        let (schreiber, strom) = stream_puffer(64);
        let (tx, rx) = mpsc::unbounded_channel();
        let e = PhrasenErkenner::neu("micA", strom, AudioFormat::default(), tx).unwrap();
        (e, schreiber, rx)
    }

    #[test]
    fn emulierter_text_trifft_grammatik() {
        let (mut e, _schreiber, mut rx) = erkenner();
        e.grammatik_laden("wetter", WETTER_GRAMMATIK).unwrap();

        e.emulieren("what is the WEATHER").unwrap();
        match rx.try_recv().unwrap() {
            ErkennungsEreignis::Erkannt {
                instanz,
                grammatik,
                konfidenz,
                ..
            } => {
                assert_eq!(instanz, "micA");
                assert_eq!(grammatik, "wetter");
                assert_eq!(konfidenz, 1.0);
            }
            anderes => panic!("Erwartet Erkannt, war {:?}", anderes),
        }
    }

    #[test]
    fn unbekannter_text_wird_abgelehnt() {
        let (mut e, _schreiber, mut rx) = erkenner();
        e.grammatik_laden("wetter", WETTER_GRAMMATIK).unwrap();
        e.emulieren("play some music").unwrap();
        assert!(matches!(
            rx.try_recv().unwrap(),
            ErkennungsEreignis::Abgelehnt { .. }
        ));
    }

    #[test]
    fn entladen_unbekannter_grammatik_ist_fehler() {
        let (mut e, _schreiber, _rx) = erkenner();
        assert!(e.grammatik_entladen("fehlt").is_err());
        e.grammatik_laden("g1", "x").unwrap();
        e.grammatik_entladen("g1").unwrap();
        assert_eq!(e.grammatiken().count(), 0);
    }

    #[tokio::test]
    async fn audio_thread_liest_bis_stream_ende() {
        let (mut e, schreiber, _rx) = erkenner();
        e.starten().unwrap();
        assert!(e.laeuft());

        schreiber.schreiben(&[0u8; 200]).await.unwrap();
        drop(schreiber);

        for _ in 0..100 {
            if e.bytes_gelesen() == 200 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(e.bytes_gelesen(), 200);
    }
}
