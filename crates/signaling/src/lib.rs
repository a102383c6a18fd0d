//! lauscher-signaling – Verbindung zum Nachrichten-Hub
//!
//! Baut die Kontrollverbindung auf, sendet das Manifest und verteilt
//! eingehende Nachrichten an registrierte Handler.
//!
//! ## Architektur
//!
//! ```text
//! TCP / beliebiger Byte-Strom
//!     |
//!     +-- FramedRead<HubCodec> --> Verbindung::ausfuehren()
//!     |                               |  Init -> Handshake -> Aktiv -> Schliessend -> Geschlossen
//!     |                               v
//!     |                           Dispatcher (Typ -> Handler in Registrierungsreihenfolge)
//!     |                               |
//!     +-- FramedWrite<HubCodec> <-- HubSender (mpsc, ein Schreib-Task)
//! ```

pub mod connection;
pub mod dispatcher;
pub mod error;

// Bequeme Re-Exporte
pub use connection::{HubSender, SchliessenHandle, Verbindung, VerbindungsZustand};
pub use dispatcher::Dispatcher;
pub use error::{SignalingError, SignalingResult};
