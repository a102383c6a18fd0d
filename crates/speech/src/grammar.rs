//! Grammatik-Register – Name -> Spezifikation

use std::collections::BTreeMap;

use crate::error::{SpeechError, SpeechResult};

/// Registrierte Grammatiken, Namen sind eindeutig
#[derive(Debug, Default, Clone)]
pub struct GrammatikRegister {
    eintraege: BTreeMap<String, String>,
}

impl GrammatikRegister {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert eine Grammatik
    ///
    /// # Fehler
    /// - `GrammatikExistiert` wenn der Name bereits vergeben ist
    pub fn hinzufuegen(&mut self, name: &str, spezifikation: &str) -> SpeechResult<()> {
        if self.eintraege.contains_key(name) {
            return Err(SpeechError::GrammatikExistiert(name.to_string()));
        }
        self.eintraege
            .insert(name.to_string(), spezifikation.to_string());
        Ok(())
    }

    /// Entfernt eine Grammatik und gibt ihre Spezifikation zurueck
    ///
    /// # Fehler
    /// - `GrammatikNichtGefunden` wenn der Name nicht registriert ist
    pub fn entfernen(&mut self, name: &str) -> SpeechResult<String> {
        self.eintraege
            .remove(name)
            .ok_or_else(|| SpeechError::GrammatikNichtGefunden(name.to_string()))
    }

    pub fn enthaelt(&self, name: &str) -> bool {
        self.eintraege.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.eintraege.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eintraege.is_empty()
    }

    /// Alle Grammatiken in Namensreihenfolge
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.eintraege
            .iter()
            .map(|(name, spezifikation)| (name.as_str(), spezifikation.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doppeltes_hinzufuegen_schlaegt_fehl() {
        let mut r = GrammatikRegister::neu();
        r.hinzufuegen("g1", "<grammar/>").unwrap();
        let e = r.hinzufuegen("g1", "<andere/>").unwrap_err();
        assert!(matches!(e, SpeechError::GrammatikExistiert(ref n) if n == "g1"));
        assert_eq!(r.len(), 1);
        assert_eq!(r.iter().next(), Some(("g1", "<grammar/>")));
    }

    #[test]
    fn entfernen_unbekannt_ohne_seiteneffekt() {
        let mut r = GrammatikRegister::neu();
        r.hinzufuegen("g1", "x").unwrap();
        assert!(matches!(
            r.entfernen("missing"),
            Err(SpeechError::GrammatikNichtGefunden(_))
        ));
        assert_eq!(r.len(), 1);
        assert_eq!(r.entfernen("g1").unwrap(), "x");
        assert!(r.is_empty());
    }
}
