//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable, die Vorrang vor der Datei hat:
//! - `LAUSCHER_LOG_LEVEL`: Level oder Filter-Direktive, Standard aus `[logging]`
//! - `LAUSCHER_LOG_FORMAT`: Format (text/json), Standard aus `[logging]`

use tracing_subscriber::{fmt, EnvFilter};

pub const ENV_LOG_LEVEL: &str = "LAUSCHER_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "LAUSCHER_LOG_FORMAT";

/// Initialisiert das Logging-System.
///
/// Darf nur einmal pro Prozess aufgerufen werden. Ein ungueltiger Filter
/// faellt auf `info` zurueck, ein unbekanntes Format auf `text`.
pub fn logging_initialisieren(level: &str, format: &str) {
    let level = wert_waehlen(std::env::var(ENV_LOG_LEVEL).ok(), level);
    let format = wert_waehlen(std::env::var(ENV_LOG_FORMAT).ok(), format);

    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));

    match format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_current_span(true)
                .init();
        }
        _ => {
            fmt().with_env_filter(filter).with_target(true).init();
        }
    }

    if !log_level_gueltig(&level) {
        tracing::debug!(filter = %level, "Log-Level ist eine Filter-Direktive");
    }
    if !log_format_gueltig(&format) {
        tracing::warn!(format = %format, "Unbekanntes Log-Format, verwende text");
    }
}

/// Umgebungswert vor Konfigurationswert; leere Umgebungswerte zaehlen nicht
fn wert_waehlen(aus_env: Option<String>, aus_config: &str) -> String {
    match aus_env {
        Some(wert) if !wert.trim().is_empty() => wert.trim().to_string(),
        _ => aus_config.to_string(),
    }
}

/// Validiert ob ein Log-Level-String ein einfaches Level ist.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_gueltige_werte() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            assert!(log_level_gueltig(level));
        }
    }

    #[test]
    fn log_level_ungueltige_werte() {
        assert!(!log_level_gueltig("verbose"));
        assert!(!log_level_gueltig("INFO")); // Gross-/Kleinschreibung
        assert!(!log_level_gueltig(""));
    }

    #[test]
    fn log_format_werte() {
        assert!(log_format_gueltig("text"));
        assert!(log_format_gueltig("json"));
        assert!(!log_format_gueltig("xml"));
        assert!(!log_format_gueltig("JSON"));
    }

    #[test]
    fn umgebung_hat_vorrang() {
        assert_eq!(wert_waehlen(Some("debug".into()), "info"), "debug");
        assert_eq!(wert_waehlen(Some(" json ".into()), "text"), "json");
    }

    #[test]
    fn leere_umgebung_faellt_auf_config_zurueck() {
        assert_eq!(wert_waehlen(None, "warn"), "warn");
        assert_eq!(wert_waehlen(Some("  ".into()), "warn"), "warn");
    }
}
