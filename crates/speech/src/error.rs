//! Fehlertypen fuer Sitzungen und Grammatiken

use lauscher_signaling::SignalingError;
use lauscher_voice::VoiceFehler;
use thiserror::Error;

/// Fehlertyp fuer den Sitzungs-Manager
#[derive(Debug, Error)]
pub enum SpeechError {
    /// Grammatik mit diesem Namen ist bereits registriert
    #[error("Grammatik existiert bereits: {0}")]
    GrammatikExistiert(String),

    /// Grammatik mit diesem Namen ist nicht registriert
    #[error("Grammatik nicht gefunden: {0}")]
    GrammatikNichtGefunden(String),

    /// Audio-Empfang konnte nicht gestartet werden
    #[error("Audio-Empfang fehlgeschlagen: {0}")]
    Ingestion(#[from] VoiceFehler),

    /// Fehler des Spracherkenners
    #[error("Erkenner-Fehler: {0}")]
    Erkenner(#[from] anyhow::Error),

    /// Antwort konnte nicht an den Hub gesendet werden
    #[error("Senden fehlgeschlagen: {0}")]
    Senden(#[from] SignalingError),

    /// APP_DEPENDENCY-Payload hat nicht die erwartete Form
    #[error("Ungueltige Abhaengigkeitsmeldung: {0}")]
    Abhaengigkeit(String),

    /// Anfrage oder Broadcast ist unvollstaendig oder unbekannt
    #[error("Ungueltige Anfrage: {0}")]
    UngueltigeAnfrage(String),

    /// Instanz hat keine Sitzung
    #[error("Keine Sitzung fuer Instanz: {0}")]
    SitzungUnbekannt(String),
}

impl SpeechError {
    /// Erstellt einen Fehler fuer eine ungueltige Anfrage
    pub fn ungueltig(msg: impl Into<String>) -> Self {
        Self::UngueltigeAnfrage(msg.into())
    }
}

/// Result-Typ fuer den Sitzungs-Manager
pub type SpeechResult<T> = Result<T, SpeechError>;
