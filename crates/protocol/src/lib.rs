//! lauscher-protocol – Protokoll-Definitionen
//!
//! Dieses Crate definiert alles, was ueber die Leitung geht:
//! - [`control`] – Nachrichtentypen und typisierte Payloads des Kontrollkanals
//! - [`wire`] – Laengen-praefixiertes Frame-Format `<LAENGE>\n<TYP> <payload>`
//! - [`manifest`] – App-Manifest, das beim Handshake gesendet wird
//! - [`rtp`] – Dekodierung von RTP-Headern aus UDP-Datagrammen

pub mod control;
pub mod error;
pub mod manifest;
pub mod rtp;
pub mod wire;

pub use control::{Nachricht, NachrichtenTyp};
pub use error::{FrameFehler, ManifestFehler, RtpFehler};
pub use manifest::Manifest;
pub use rtp::{RtpHeader, RtpPaket};
pub use wire::HubCodec;
