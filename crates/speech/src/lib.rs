//! lauscher-speech – Mikrofon-Sitzungen und Spracherkennung
//!
//! Verwaltet pro Mikrofon eine Sitzung aus RTP-Empfang und Erkenner und
//! haelt die Grammatiken, die in jede Sitzung geladen werden.
//!
//! ## Architektur
//!
//! ```text
//! Hub --APP_DEPENDENCY/MSG_QUERY/MSG_BROADCAST--> SitzungsManager
//!                                                    |
//!                        +---------------------------+-----------+
//!                        v                                       v
//!               GrammatikRegister                  MikrofonSitzung (pro Instanz)
//!                                                    RtpEmpfaenger --> AudioStrom --> Erkenner
//!                                                                                       |
//! Hub <--MSG_BROADCAST-- ereignisse_weiterleiten <--ErkennungsEreignis------------------+
//! ```

pub mod engine;
pub mod error;
pub mod grammar;
pub mod manager;
pub mod phrase;
pub mod session;

pub use engine::{Erkenner, ErkennerFabrik, ErkennungsEreignis, EreignisEmpfaenger, EreignisSender};
pub use error::{SpeechError, SpeechResult};
pub use grammar::GrammatikRegister;
pub use manager::{ereignisse_weiterleiten, SitzungsKonfig, SitzungsManager};
pub use phrase::{PhrasenErkenner, PhrasenFabrik};
pub use session::{MikrofonSitzung, SitzungsParameter, SitzungsZustand};
