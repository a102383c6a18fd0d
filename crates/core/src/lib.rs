//! lauscher-core – Gemeinsame Typen
//!
//! Dieses Crate stellt die Bausteine bereit, die von Protokoll-, Voice-
//! und Speech-Crate gemeinsam genutzt werden.

pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use types::{AudioFormat, KorrelationsId};
