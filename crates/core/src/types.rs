//! Gemeinsame Identifikations- und Formattypen fuer Lauscher
//!
//! Korrelations-IDs verwenden das Newtype-Pattern, damit sie nicht mit
//! Instanz-IDs (freie Strings vom Hub) verwechselt werden.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opakes Token, das eine Anfrage mit ihrer Erfolgs-/Fehlerantwort verbindet
///
/// Auf dem Draht ein String; der Hub vergibt bei eingehenden Anfragen
/// beliebige Werte, deshalb wird hier nicht auf UUIDs eingeschraenkt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KorrelationsId(pub String);

impl KorrelationsId {
    /// Erstellt eine neue zufaellige KorrelationsId (UUID v4)
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Gibt das Token als &str zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for KorrelationsId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for KorrelationsId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for KorrelationsId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for KorrelationsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Out-of-band vereinbartes PCM-Format eines Mikrofon-Streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Abtastrate in Hz
    pub abtastrate: u32,
    /// Bits pro Sample (8 oder 16)
    pub bits_pro_sample: u16,
    /// Anzahl der Kanaele
    pub kanaele: u16,
}

impl AudioFormat {
    /// Bytes pro Sekunde Audio in diesem Format
    pub fn bytes_pro_sekunde(&self) -> u64 {
        self.abtastrate as u64 * (self.bits_pro_sample as u64 / 8) * self.kanaele as u64
    }
}

impl Default for AudioFormat {
    /// 16 kHz, 16 Bit, Mono
    fn default() -> Self {
        Self {
            abtastrate: 16_000,
            bits_pro_sample: 16,
            kanaele: 1,
        }
    }
}
