//! RTP-Dekodierung (UDP-Audiokanal)
//!
//! Zerlegt ein einzelnes Datagramm in die Felder des festen RTP-Headers
//! (RFC 3550) und die Nutzdaten.
//!
//! ## Paketformat (Header = 12 Bytes, kein serde)
//!
//! ```text
//! Bit     Len  Feld
//! ------  ---  -----------
//!  0       2   Version
//!  2       1   Padding
//!  3       1   Extension
//!  4       4   CSRC-Anzahl
//!  8       1   Marker
//!  9       7   Payload-Typ
//! 16      16   Sequenznummer
//! 32      32   Zeitstempel
//! 64      32   SSRC
//! 96+          Nutzdaten (rohes PCM)
//! ```
//!
//! CSRC-Liste und Extension-Header werden nicht uebersprungen. Sind sie im
//! Paket vorhanden, landen sie in den Nutzdaten.

use crate::error::RtpFehler;

/// Groesse des festen RTP-Headers in Bytes
pub const RTP_HEADER_GROESSE: usize = 12;

/// Liest die Bits `[start, ende)` big-endian als Zahl
///
/// Bit 0 ist das hoechstwertige Bit des ersten Bytes.
fn bits(paket: &[u8], start: usize, ende: usize) -> u32 {
    (start..ende).fold(0u32, |wert, bit| {
        let byte = paket[bit / 8];
        let gesetzt = (byte >> (7 - bit % 8)) & 1;
        (wert << 1) | u32::from(gesetzt)
    })
}

// ---------------------------------------------------------------------------
// RtpHeader
// ---------------------------------------------------------------------------

/// Fester 12-Byte-Header eines RTP-Pakets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    pub version: u8,
    pub padding: bool,
    pub extension: bool,
    pub csrc_anzahl: u8,
    pub marker: bool,
    pub payload_typ: u8,
    pub sequenz: u16,
    pub zeitstempel: u32,
    pub ssrc: u32,
}

impl RtpHeader {
    /// Dekodiert die Header-Felder aus den ersten 12 Bytes
    ///
    /// # Fehler
    /// - `ZuKurz` wenn das Slice kuerzer als 12 Bytes ist
    pub fn decode(paket: &[u8]) -> Result<Self, RtpFehler> {
        if paket.len() < RTP_HEADER_GROESSE {
            return Err(RtpFehler::ZuKurz {
                laenge: paket.len(),
            });
        }

        Ok(Self {
            version: bits(paket, 0, 2) as u8,
            padding: bits(paket, 2, 3) == 1,
            extension: bits(paket, 3, 4) == 1,
            csrc_anzahl: bits(paket, 4, 8) as u8,
            marker: bits(paket, 8, 9) == 1,
            payload_typ: bits(paket, 9, 16) as u8,
            sequenz: bits(paket, 16, 32) as u16,
            zeitstempel: bits(paket, 32, 64),
            ssrc: bits(paket, 64, 96),
        })
    }

    /// Serialisiert den Header in ein 12-Byte-Array (big-endian)
    pub fn encode(&self) -> [u8; RTP_HEADER_GROESSE] {
        let mut buf = [0u8; RTP_HEADER_GROESSE];
        buf[0] = (self.version & 0b11) << 6
            | u8::from(self.padding) << 5
            | u8::from(self.extension) << 4
            | (self.csrc_anzahl & 0x0F);
        buf[1] = u8::from(self.marker) << 7 | (self.payload_typ & 0x7F);
        buf[2..4].copy_from_slice(&self.sequenz.to_be_bytes());
        buf[4..8].copy_from_slice(&self.zeitstempel.to_be_bytes());
        buf[8..12].copy_from_slice(&self.ssrc.to_be_bytes());
        buf
    }
}

// ---------------------------------------------------------------------------
// RtpPaket
// ---------------------------------------------------------------------------

/// Dekodiertes RTP-Datagramm (Header + Nutzdaten)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPaket<'a> {
    pub header: RtpHeader,
    /// Alle Bytes ab Offset 12
    pub nutzdaten: &'a [u8],
}

impl<'a> RtpPaket<'a> {
    /// Dekodiert ein Datagramm ohne die Nutzdaten zu kopieren
    pub fn decode(paket: &'a [u8]) -> Result<Self, RtpFehler> {
        let header = RtpHeader::decode(paket)?;
        Ok(Self {
            header,
            nutzdaten: &paket[RTP_HEADER_GROESSE..],
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
