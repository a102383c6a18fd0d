//! Begrenzter Byte-Puffer zwischen UDP-Empfang und Spracherkenner
//!
//! Ein Schreiber (async, Empfangs-Task) und ein Leser (blockierend, Thread
//! des Erkenners) teilen sich einen Ringpuffer fester Kapazitaet.
//!
//! ```text
//! RtpEmpfaenger --schreiben().await--> [ HeapRb<u8> ] --lesen()--> Erkenner
//!                  wartet bei vollem      |               blockiert bei leerem
//!                  Puffer (Notify)        |               Puffer (Condvar)
//!                                  schliessen() weckt beide Seiten
//! ```
//!
//! Es gehen nie Bytes verloren: ist der Puffer voll, wartet der Schreiber,
//! bis der Leser Platz geschaffen hat. Ungelesene Daten werden nie
//! ueberschrieben.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use ringbuf::traits::{Consumer, Observer, Producer};
use ringbuf::HeapRb;
use tokio::sync::Notify;

use crate::error::{Result, VoiceFehler};

/// Standard-Kapazitaet (64 KiB)
pub const STANDARD_KAPAZITAET: usize = 64 * 1024;

/// Kapazitaet fuer genau eine maximale RTP-Nutzlast
pub const RTP_NUTZLAST_KAPAZITAET: usize = 1475;

// ---------------------------------------------------------------------------
// Geteilter Zustand
// ---------------------------------------------------------------------------

struct Zustand {
    ring: HeapRb<u8>,
    geschlossen: bool,
    geschrieben: u64,
    gelesen: u64,
}

struct Geteilt {
    zustand: Mutex<Zustand>,
    /// Weckt den Leser, wenn Daten ankommen oder geschlossen wird
    lesbar: Condvar,
    /// Weckt den Schreiber, wenn Platz frei wird oder geschlossen wird
    schreibbar: Notify,
    kapazitaet: usize,
}

impl Geteilt {
    fn schliessen(&self) {
        let mut zustand = self.zustand.lock();
        if zustand.geschlossen {
            return;
        }
        zustand.geschlossen = true;
        drop(zustand);
        self.lesbar.notify_all();
        self.schreibbar.notify_one();
    }

    fn statistik(&self) -> PufferStatistik {
        let zustand = self.zustand.lock();
        PufferStatistik {
            kapazitaet: self.kapazitaet,
            belegt: zustand.ring.occupied_len(),
            geschrieben: zustand.geschrieben,
            gelesen: zustand.gelesen,
            geschlossen: zustand.geschlossen,
        }
    }
}

/// Momentaufnahme eines Puffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PufferStatistik {
    pub kapazitaet: usize,
    pub belegt: usize,
    pub geschrieben: u64,
    pub gelesen: u64,
    pub geschlossen: bool,
}

/// Erstellt einen neuen Puffer und gibt Schreib- und Lese-Ende zurueck
///
/// Eine Kapazitaet von 0 wird auf 1 angehoben.
pub fn stream_puffer(kapazitaet: usize) -> (PufferSchreiber, AudioStrom) {
    let kapazitaet = kapazitaet.max(1);
    let geteilt = Arc::new(Geteilt {
        zustand: Mutex::new(Zustand {
            ring: HeapRb::new(kapazitaet),
            geschlossen: false,
            geschrieben: 0,
            gelesen: 0,
        }),
        lesbar: Condvar::new(),
        schreibbar: Notify::new(),
        kapazitaet,
    });

    (
        PufferSchreiber {
            geteilt: Arc::clone(&geteilt),
        },
        AudioStrom { geteilt },
    )
}

// ---------------------------------------------------------------------------
// PufferSchreiber
// ---------------------------------------------------------------------------

/// Schreib-Ende des Puffers (genau ein Produzent)
///
/// Beim Drop wird der Puffer geschlossen; der Leser sieht danach
/// die restlichen Bytes und anschliessend Stream-Ende.
pub struct PufferSchreiber {
    geteilt: Arc<Geteilt>,
}

impl PufferSchreiber {
    /// Haengt alle Bytes in Reihenfolge an
    ///
    /// Wartet, solange nicht genug Platz frei ist, und schreibt dabei
    /// stueckweise, sobald der Leser Platz schafft.
    ///
    /// # Fehler
    /// - `Geschlossen` wenn der Puffer vorher oder waehrend des Wartens
    ///   geschlossen wird
    pub async fn schreiben(&self, mut daten: &[u8]) -> Result<()> {
        while !daten.is_empty() {
            let platz_frei = self.geteilt.schreibbar.notified();
            {
                let mut zustand = self.geteilt.zustand.lock();
                if zustand.geschlossen {
                    return Err(VoiceFehler::Geschlossen);
                }
                let n = zustand.ring.push_slice(daten);
                if n > 0 {
                    zustand.geschrieben += n as u64;
                    daten = &daten[n..];
                    drop(zustand);
                    self.geteilt.lesbar.notify_all();
                    continue;
                }
            }
            platz_frei.await;
        }
        Ok(())
    }

    /// Liefert ein Handle, das den Puffer von aussen schliessen kann
    pub fn schliesser(&self) -> PufferSchliesser {
        PufferSchliesser {
            geteilt: Arc::clone(&self.geteilt),
        }
    }

    /// Schliesst den Puffer
    pub fn schliessen(&self) {
        self.geteilt.schliessen();
    }

    pub fn statistik(&self) -> PufferStatistik {
        self.geteilt.statistik()
    }
}

impl Drop for PufferSchreiber {
    fn drop(&mut self) {
        self.geteilt.schliessen();
    }
}

/// Handle zum Schliessen eines Puffers ohne Schreib- oder Leserecht
#[derive(Clone)]
pub struct PufferSchliesser {
    geteilt: Arc<Geteilt>,
}

impl PufferSchliesser {
    pub fn schliessen(&self) {
        self.geteilt.schliessen();
    }

    pub fn ist_geschlossen(&self) -> bool {
        self.geteilt.zustand.lock().geschlossen
    }
}

// ---------------------------------------------------------------------------
// AudioStrom
// ---------------------------------------------------------------------------

/// Lese-Ende des Puffers (genau ein Konsument)
///
/// Implementiert `std::io::Read`; `read` blockiert den aufrufenden Thread
/// und darf daher nicht auf einem async Worker laufen.
pub struct AudioStrom {
    geteilt: Arc<Geteilt>,
}

impl AudioStrom {
    /// Liest bis zu `ziel.len()` Bytes
    ///
    /// Blockiert, bis mindestens ein Byte verfuegbar ist oder der Puffer
    /// geschlossen wurde. Gibt `0` erst zurueck, wenn der Puffer geschlossen
    /// und leer ist (Stream-Ende).
    pub fn lesen(&self, ziel: &mut [u8]) -> usize {
        if ziel.is_empty() {
            return 0;
        }

        let mut zustand = self.geteilt.zustand.lock();
        loop {
            let n = zustand.ring.pop_slice(ziel);
            if n > 0 {
                zustand.gelesen += n as u64;
                drop(zustand);
                self.geteilt.schreibbar.notify_one();
                return n;
            }
            if zustand.geschlossen {
                return 0;
            }
            self.geteilt.lesbar.wait(&mut zustand);
        }
    }

    /// Schliesst den Puffer; ein wartender Schreiber erhaelt `Geschlossen`
    pub fn schliessen(&self) {
        self.geteilt.schliessen();
    }

    pub fn kapazitaet(&self) -> usize {
        self.geteilt.kapazitaet
    }

    pub fn statistik(&self) -> PufferStatistik {
        self.geteilt.statistik()
    }
}

impl std::io::Read for AudioStrom {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(self.lesen(buf))
    }
}

impl Drop for AudioStrom {
    fn drop(&mut self) {
        self.geteilt.schliessen();
    }
}

impl std::fmt::Debug for AudioStrom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioStrom")
            .field("statistik", &self.statistik())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
