//! Fehlertypen fuer die Hub-Verbindung

use lauscher_protocol::FrameFehler;
use thiserror::Error;

/// Fehlertyp fuer die Hub-Verbindung
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Fehlerhafter oder abgeschnittener Frame, beendet die Verbindung
    #[error("Frame-Fehler: {0}")]
    Frame(#[from] FrameFehler),

    /// Protokollfehler (z.B. Manifest abgelehnt)
    #[error("Protokollfehler: {0}")]
    Protokoll(String),

    /// Payload konnte nicht serialisiert werden
    #[error("JSON-Fehler: {0}")]
    Json(#[from] serde_json::Error),

    /// Senden nicht mehr moeglich, Verbindung ist geschlossen
    #[error("Verbindung geschlossen")]
    VerbindungGeschlossen,
}

impl SignalingError {
    /// Erstellt einen Protokollfehler
    pub fn protokoll(msg: impl Into<String>) -> Self {
        Self::Protokoll(msg.into())
    }
}

/// Result-Typ fuer die Hub-Verbindung
pub type SignalingResult<T> = Result<T, SignalingError>;
