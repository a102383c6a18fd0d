//! Fehlertypen des Protokoll-Crates

use thiserror::Error;

/// Fehler beim Lesen oder Schreiben von Kontrollkanal-Frames
#[derive(Debug, Error)]
pub enum FrameFehler {
    /// IO-Fehler auf dem darunterliegenden Stream
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Laengenzeile ist keine nicht-negative Dezimalzahl
    #[error("Ungueltige Laengenzeile: {0:?}")]
    UngueltigeLaenge(String),

    /// Deklarierte Laenge ueberschreitet das Limit
    #[error("Frame zu gross: {laenge} Bytes (Maximum: {maximum} Bytes)")]
    ZuGross { laenge: usize, maximum: usize },

    /// Am Anfang des Frames steht kein `[A-Z_]`-Typ
    #[error("Kein Nachrichtentyp am Frame-Anfang: {0:?}")]
    KeinTyp(String),

    /// Typ-Token einer ausgehenden Nachricht ist nicht `[A-Z_]+`
    #[error("Ungueltiger Nachrichtentyp: {0:?}")]
    UngueltigerTyp(String),

    /// Stream endete bevor die deklarierte Laenge gelesen war
    #[error("Frame abgeschnitten: {erwartet} Bytes deklariert, {vorhanden} vorhanden")]
    Abgeschnitten { erwartet: usize, vorhanden: usize },

    /// Frame-Inhalt ist kein gueltiges UTF-8
    #[error("Frame ist kein gueltiges UTF-8")]
    KeinUtf8,

    /// Payload konnte nicht serialisiert werden
    #[error("JSON-Fehler: {0}")]
    Json(#[from] serde_json::Error),
}

/// Fehler beim Dekodieren eines RTP-Datagramms
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RtpFehler {
    /// Datagramm kuerzer als der feste 12-Byte-Header
    #[error("RTP-Paket zu kurz: {laenge} Bytes (mindestens 12)")]
    ZuKurz { laenge: usize },
}

/// Fehler beim Laden des App-Manifests
#[derive(Debug, Error)]
pub enum ManifestFehler {
    /// Datei nicht lesbar
    #[error("Manifest nicht lesbar ({pfad}): {quelle}")]
    Lesen {
        pfad: String,
        #[source]
        quelle: std::io::Error,
    },

    /// Kein gueltiges JSON oder Pflichtfeld fehlt
    #[error("Manifest ungueltig: {0}")]
    Json(#[from] serde_json::Error),

    /// Pflichtfeld ist leer
    #[error("Pflichtfeld leer: {0}")]
    Pflichtfeld(&'static str),
}
