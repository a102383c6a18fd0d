//! Kontrollkanal-Nachrichten
//!
//! Definiert die Nachrichtentypen, die zwischen App und Hub ausgetauscht
//! werden, sowie typisierte Sichten auf die bekannten Payload-Formen.
//!
//! ## Design
//! - Der Typ ist ein Token aus `[A-Z_]+`, bekannte Tokens als Enum-Varianten
//! - Die Payload bleibt ein `serde_json::Value`; `Nachricht::als` liefert
//!   eine typisierte Sicht, unbekannte Felder bleiben im `rest` erhalten

use lauscher_core::KorrelationsId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// NachrichtenTyp
// ---------------------------------------------------------------------------

/// Typ-Token einer Kontrollnachricht
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NachrichtenTyp {
    AppManifest,
    AppManifestOk,
    AppManifestFail,
    AppUp,
    AppDown,
    AppInUse,
    AppDependency,
    MsgQuery,
    MsgQuerySuccess,
    MsgQueryFail,
    MsgBroadcast,
    MsgBroadcastSuccess,
    MsgBroadcastFail,
    /// Syntaktisch gueltiges, aber nicht gelistetes Token
    Unbekannt(String),
}

impl NachrichtenTyp {
    /// Alle bekannten Typen (ohne `Unbekannt`)
    pub const BEKANNT: [NachrichtenTyp; 13] = [
        Self::AppManifest,
        Self::AppManifestOk,
        Self::AppManifestFail,
        Self::AppUp,
        Self::AppDown,
        Self::AppInUse,
        Self::AppDependency,
        Self::MsgQuery,
        Self::MsgQuerySuccess,
        Self::MsgQueryFail,
        Self::MsgBroadcast,
        Self::MsgBroadcastSuccess,
        Self::MsgBroadcastFail,
    ];

    /// Ordnet ein Token seinem Typ zu; unbekannte Tokens werden `Unbekannt`
    pub fn aus_token(token: &str) -> Self {
        match token {
            "APP_MANIFEST" => Self::AppManifest,
            "APP_MANIFEST_OK" => Self::AppManifestOk,
            "APP_MANIFEST_FAIL" => Self::AppManifestFail,
            "APP_UP" => Self::AppUp,
            "APP_DOWN" => Self::AppDown,
            "APP_IN_USE" => Self::AppInUse,
            "APP_DEPENDENCY" => Self::AppDependency,
            "MSG_QUERY" => Self::MsgQuery,
            "MSG_QUERY_SUCCESS" => Self::MsgQuerySuccess,
            "MSG_QUERY_FAIL" => Self::MsgQueryFail,
            "MSG_BROADCAST" => Self::MsgBroadcast,
            "MSG_BROADCAST_SUCCESS" => Self::MsgBroadcastSuccess,
            "MSG_BROADCAST_FAIL" => Self::MsgBroadcastFail,
            anderes => Self::Unbekannt(anderes.to_string()),
        }
    }

    /// Token wie es auf der Leitung steht
    pub fn as_str(&self) -> &str {
        match self {
            Self::AppManifest => "APP_MANIFEST",
            Self::AppManifestOk => "APP_MANIFEST_OK",
            Self::AppManifestFail => "APP_MANIFEST_FAIL",
            Self::AppUp => "APP_UP",
            Self::AppDown => "APP_DOWN",
            Self::AppInUse => "APP_IN_USE",
            Self::AppDependency => "APP_DEPENDENCY",
            Self::MsgQuery => "MSG_QUERY",
            Self::MsgQuerySuccess => "MSG_QUERY_SUCCESS",
            Self::MsgQueryFail => "MSG_QUERY_FAIL",
            Self::MsgBroadcast => "MSG_BROADCAST",
            Self::MsgBroadcastSuccess => "MSG_BROADCAST_SUCCESS",
            Self::MsgBroadcastFail => "MSG_BROADCAST_FAIL",
            Self::Unbekannt(token) => token,
        }
    }

    /// Prueft ob das Token dem Muster `[A-Z_]+` entspricht
    pub fn token_gueltig(token: &str) -> bool {
        !token.is_empty() && token.bytes().all(|b| b.is_ascii_uppercase() || b == b'_')
    }
}

impl std::fmt::Display for NachrichtenTyp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Nachricht
// ---------------------------------------------------------------------------

/// Eine Kontrollnachricht: Typ + strukturierte Payload
///
/// Eine leere Payload wird als leeres JSON-Objekt dargestellt.
#[derive(Debug, Clone, PartialEq)]
pub struct Nachricht {
    pub typ: NachrichtenTyp,
    pub payload: Value,
}

impl Nachricht {
    /// Erstellt eine Nachricht mit Payload
    pub fn neu(typ: NachrichtenTyp, payload: Value) -> Self {
        Self { typ, payload }
    }

    /// Erstellt eine Nachricht ohne Payload
    pub fn leer(typ: NachrichtenTyp) -> Self {
        Self {
            typ,
            payload: Value::Object(Map::new()),
        }
    }

    /// Serialisiert einen typisierten Payload in eine Nachricht
    pub fn mit<T: Serialize>(typ: NachrichtenTyp, payload: &T) -> serde_json::Result<Self> {
        Ok(Self {
            typ,
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Prueft ob die Payload das leere Objekt ist. `null` zaehlt nicht als
    /// leer und wird als `TYP null` uebertragen.
    pub fn payload_leer(&self) -> bool {
        matches!(&self.payload, Value::Object(map) if map.is_empty())
    }

    /// Typisierte Sicht auf die Payload
    pub fn als<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.payload)
    }
}

// ---------------------------------------------------------------------------
// Typisierte Payloads
// ---------------------------------------------------------------------------

/// Standard-Prioritaet einer Anfrage
pub const STANDARD_PRIORITAET: u32 = 30;

fn standard_prioritaet() -> u32 {
    STANDARD_PRIORITAET
}

/// APP_MANIFEST_OK – Hub akzeptiert das Manifest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestOk {
    /// Vom Hub vergebene Instanz-ID (ueberschreibt die lokale)
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// APP_DEPENDENCY – Status abhaengiger Apps
///
/// Kategorie (z.B. `"microphone"`) -> Instanz-ID -> Status (`"up"`, `"down"`, ...)
pub type Abhaengigkeiten = BTreeMap<String, BTreeMap<String, String>>;

/// MSG_QUERY – Anfrage an eine Capability
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anfrage {
    pub id: KorrelationsId,
    #[serde(default)]
    pub capability: String,
    pub action: String,
    #[serde(default)]
    pub data: Value,
    /// Ziel-Instanzen (leer = alle)
    #[serde(default)]
    pub instance_id: Vec<String>,
    #[serde(default = "standard_prioritaet")]
    pub priority: u32,
    /// Nur bei eingehenden Anfragen vom Hub gesetzt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_instance_id: Option<String>,
}

/// MSG_QUERY_SUCCESS
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnfrageErfolg {
    pub id: KorrelationsId,
    #[serde(default)]
    pub ret: Value,
}

/// MSG_QUERY_FAIL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnfrageFehler {
    pub id: KorrelationsId,
    pub message: String,
}

/// MSG_BROADCAST
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Broadcast {
    pub id: KorrelationsId,
    #[serde(default)]
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_instance_id: Option<String>,
}

/// APP_IN_USE
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InBenutzung {
    pub priority: u32,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
