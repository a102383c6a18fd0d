//! App-Manifest (app_manifest.json)
//!
//! Identitaet der App gegenueber dem Hub. Wird einmal beim Start geladen und
//! als Payload von `APP_MANIFEST` gesendet.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ManifestFehler;

/// Vollstaendiges App-Manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub name: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "instanceId", default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(rename = "API")]
    pub api: i64,
    pub description: String,
    /// Angebotene Capabilities (Name -> Version)
    #[serde(default)]
    pub capabilities: BTreeMap<String, String>,
    /// Benoetigte Capabilities (Name -> Version)
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl Manifest {
    /// Laedt und validiert ein Manifest aus einer JSON-Datei
    pub fn from_file(pfad: &Path) -> Result<Self, ManifestFehler> {
        let inhalt = std::fs::read_to_string(pfad).map_err(|quelle| ManifestFehler::Lesen {
            pfad: pfad.display().to_string(),
            quelle,
        })?;
        Self::parse(&inhalt)
    }

    /// Parst und validiert ein Manifest aus einem JSON-String
    pub fn parse(inhalt: &str) -> Result<Self, ManifestFehler> {
        let manifest: Self = serde_json::from_str(inhalt)?;
        manifest.validieren()?;
        Ok(manifest)
    }

    /// Prueft dass keine Pflichtfelder leer sind
    pub fn validieren(&self) -> Result<(), ManifestFehler> {
        if self.version.trim().is_empty() {
            return Err(ManifestFehler::Pflichtfeld("version"));
        }
        if self.name.trim().is_empty() {
            return Err(ManifestFehler::Pflichtfeld("name"));
        }
        if self.display_name.trim().is_empty() {
            return Err(ManifestFehler::Pflichtfeld("displayName"));
        }
        if self.description.trim().is_empty() {
            return Err(ManifestFehler::Pflichtfeld("description"));
        }
        Ok(())
    }
}
