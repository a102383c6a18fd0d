//! Fehlertypen der Audio-Ingestion

use std::net::SocketAddr;
use thiserror::Error;

/// Fehler beim Empfang und Puffern von Audio
#[derive(Debug, Error)]
pub enum VoiceFehler {
    /// UDP-Port konnte nicht gebunden werden (z.B. bereits belegt)
    #[error("UDP-Socket {adresse} konnte nicht gebunden werden: {quelle}")]
    Binden {
        adresse: SocketAddr,
        #[source]
        quelle: std::io::Error,
    },

    /// Puffer wurde geschlossen
    #[error("Stream-Puffer ist geschlossen")]
    Geschlossen,

    /// Sonstiger IO-Fehler
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VoiceFehler>;
