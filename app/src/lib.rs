//! lauscher – Bibliotheks-Root
//!
//! Deklariert die App-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;
pub mod logging;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use config::LauscherConfig;
use lauscher_protocol::Manifest;
use lauscher_signaling::{Dispatcher, Verbindung};
use lauscher_speech::{ereignisse_weiterleiten, PhrasenFabrik, SitzungsManager};

/// Haelt die Konfiguration der laufenden App zusammen
pub struct App {
    pub config: LauscherConfig,
}

impl App {
    /// Erstellt eine neue App aus der gegebenen Konfiguration
    pub fn neu(config: LauscherConfig) -> Self {
        Self { config }
    }

    /// Verbindet sich mit dem Hub und laeuft bis Ctrl-C oder Verbindungsende
    ///
    /// Reihenfolge:
    /// 1. Manifest laden
    /// 2. Sitzungs-Manager und Dispatcher aufbauen
    /// 3. Verbindung zum Hub herstellen (Manifest wird gesendet)
    /// 4. Dispatch-Schleife und Ergebnis-Weiterleitung starten
    /// 5. Bei Ctrl-C Verbindung schliessen, danach alle Sitzungen beenden
    pub async fn starten(self) -> Result<()> {
        let manifest_pfad = Path::new(&self.config.hub.manifest);
        let manifest = Manifest::from_file(manifest_pfad)
            .with_context(|| format!("Manifest '{}' nicht ladbar", manifest_pfad.display()))?;

        tracing::info!(
            name = %manifest.name,
            version = %manifest.version,
            hub = %self.config.hub_adresse(),
            basis_port = self.config.audio.basis_port,
            "Lauscher startet"
        );

        let (manager, ereignisse) =
            SitzungsManager::neu(self.config.sitzungs_konfig(), Arc::new(PhrasenFabrik));
        let mut dispatcher = Dispatcher::neu();
        manager.registrieren(&mut dispatcher);

        let verbindung = Verbindung::verbinden(
            self.config.hub_adresse(),
            &manifest,
            dispatcher,
            self.config.hub.max_frame_groesse,
        )
        .await
        .with_context(|| format!("Hub unter {} nicht erreichbar", self.config.hub_adresse()))?;

        let weiterleitung = tokio::spawn(ereignisse_weiterleiten(ereignisse, verbindung.sender()));
        let schliessen = verbindung.schliessen_handle();

        let lauf = verbindung.ausfuehren();
        tokio::pin!(lauf);

        let ergebnis = tokio::select! {
            ergebnis = &mut lauf => ergebnis,
            signal = tokio::signal::ctrl_c() => {
                match signal {
                    Ok(()) => {
                        tracing::info!("Shutdown-Signal empfangen, Verbindung wird geschlossen");
                        schliessen.schliessen();
                    }
                    Err(e) => {
                        tracing::warn!(fehler = %e, "Ctrl-C-Handler nicht verfuegbar, warte auf Verbindungsende");
                    }
                }
                lauf.await
            }
        };

        manager.alle_entfernen();
        weiterleitung.abort();

        ergebnis.context("Hub-Verbindung mit Fehler beendet")?;
        tracing::info!("Lauscher beendet");
        Ok(())
    }
}
