//! Lauscher – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und verbindet sich
//! mit dem Hub.

use anyhow::Result;
use lauscher::{
    config::{ConfigQuelle, LauscherConfig},
    logging::logging_initialisieren,
    App,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("LAUSCHER_CONFIG").unwrap_or_else(|_| "lauscher.toml".into());

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let (config, quelle) = LauscherConfig::laden(&config_pfad)?;

    logging_initialisieren(&config.logging.level, &config.logging.format);

    if quelle == ConfigQuelle::Standardwerte {
        tracing::warn!(
            pfad = %config_pfad,
            "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
        );
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "Lauscher wird initialisiert"
    );

    App::neu(config).starten().await
}
