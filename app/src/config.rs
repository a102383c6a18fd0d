//! App-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass die App ohne Konfigurationsdatei
//! lauffaehig ist.

use std::net::{IpAddr, Ipv4Addr};

use lauscher_core::AudioFormat;
use lauscher_protocol::wire::DEFAULT_MAX_FRAME_SIZE;
use lauscher_speech::SitzungsKonfig;
use lauscher_voice::stream_buffer::STANDARD_KAPAZITAET;
use serde::{Deserialize, Serialize};

/// Vollstaendige App-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LauscherConfig {
    /// Verbindung zum Hub
    pub hub: HubEinstellungen,
    /// RTP-Empfang und Audio-Format
    pub audio: AudioEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Verbindung zum Hub
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubEinstellungen {
    /// Host oder IP des Hubs
    pub adresse: String,
    /// TCP-Port des Hubs
    pub port: u16,
    /// Pfad zum App-Manifest (JSON)
    pub manifest: String,
    /// Groesste akzeptierte Frame-Laenge in Bytes
    pub max_frame_groesse: usize,
}

impl Default for HubEinstellungen {
    fn default() -> Self {
        Self {
            adresse: "127.0.0.1".into(),
            port: 1847,
            manifest: "app_manifest.json".into(),
            max_frame_groesse: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// RTP-Empfang und Audio-Format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioEinstellungen {
    /// IP, die Mikrofonen in der Einladung genannt wird
    pub werbe_adresse: IpAddr,
    /// Bind-Adresse der RTP-Sockets
    pub bind_adresse: IpAddr,
    /// Port des ersten Mikrofons, weitere zaehlen hoch (0 = OS waehlt)
    pub basis_port: u16,
    /// Stream-Puffer pro Mikrofon in Bytes
    pub puffer_kapazitaet: usize,
    pub abtastrate: u32,
    pub bits_pro_sample: u16,
    pub kanaele: u16,
}

impl Default for AudioEinstellungen {
    fn default() -> Self {
        let format = AudioFormat::default();
        Self {
            werbe_adresse: IpAddr::V4(Ipv4Addr::LOCALHOST),
            bind_adresse: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            basis_port: 1848,
            puffer_kapazitaet: STANDARD_KAPAZITAET,
            abtastrate: format.abtastrate,
            bits_pro_sample: format.bits_pro_sample,
            kanaele: format.kanaele,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level oder Filter-Direktive, z.B. "info" oder "lauscher_speech=debug"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Herkunft einer geladenen Konfiguration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigQuelle {
    /// Aus der angegebenen TOML-Datei gelesen
    Datei,
    /// Datei fehlt, Standardwerte werden verwendet
    Standardwerte,
}

impl LauscherConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    ///
    /// Loggt nichts; der Aufrufer meldet die Quelle nach der
    /// Logging-Initialisierung.
    pub fn laden(pfad: &str) -> anyhow::Result<(Self, ConfigQuelle)> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok((config, ConfigQuelle::Datei))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok((Self::default(), ConfigQuelle::Standardwerte))
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Gibt die Hub-Adresse als `host:port` zurueck
    pub fn hub_adresse(&self) -> String {
        format!("{}:{}", self.hub.adresse, self.hub.port)
    }

    /// Audio-Format der Mikrofone
    pub fn audio_format(&self) -> AudioFormat {
        AudioFormat {
            abtastrate: self.audio.abtastrate,
            bits_pro_sample: self.audio.bits_pro_sample,
            kanaele: self.audio.kanaele,
        }
    }

    /// Einstellungen fuer den Sitzungs-Manager
    pub fn sitzungs_konfig(&self) -> SitzungsKonfig {
        SitzungsKonfig {
            werbe_adresse: self.audio.werbe_adresse,
            bind_adresse: self.audio.bind_adresse,
            basis_port: self.audio.basis_port,
            puffer_kapazitaet: self.audio.puffer_kapazitaet,
            format: self.audio_format(),
        }
    }
}
