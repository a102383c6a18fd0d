//! lauscher-voice – Audio-Ingestion
//!
//! Empfaengt RTP-Audio ueber UDP und stellt es dem Spracherkenner als
//! blockierend lesbaren Byte-Strom bereit.
//!
//! ## Module
//! - [`udp`] – UDP-Socket und Empfangs-Schleife pro Mikrofon
//! - [`stream_buffer`] – Begrenzter Puffer zwischen Empfang und Erkenner
//! - [`error`] – Fehlertypen

pub mod error;
pub mod stream_buffer;
pub mod udp;

pub use error::VoiceFehler;
pub use stream_buffer::{stream_puffer, AudioStrom, PufferSchreiber, PufferStatistik};
pub use udp::RtpEmpfaenger;
