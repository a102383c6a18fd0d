//! Wire-Format des Hub-Kontrollkanals
//!
//! Frame-basiertes Protokoll: Laengenzeile + Frame-Inhalt.
//!
//! ## Frame-Format
//!
//! ```text
//! <N als ASCII-Dezimalzahl>\n
//! <TYP>[ <JSON-Payload>]          <- genau N UTF-8-Bytes
//! ```
//!
//! Die Laenge zaehlt die Bytes des Inhalts (ohne die Laengenzeile). Der Leser
//! verlaesst sich nie auf Zeilenumbrueche innerhalb des Inhalts, die Payload
//! darf also beliebige Whitespace-Zeichen und Newlines enthalten.

use bytes::{Buf, BytesMut};
use serde_json::{Map, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};

use crate::control::{Nachricht, NachrichtenTyp};
use crate::error::FrameFehler;

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Frame-Groesse (1 MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Laengste akzeptierte Laengenzeile (u64::MAX hat 20 Stellen)
const MAX_LAENGENZEILE: usize = 20;

// ---------------------------------------------------------------------------
// Reine Kodierung
// ---------------------------------------------------------------------------

/// Baut den Frame-Inhalt `<TYP> <payload>`; bei leerer Payload nur `<TYP>`
///
/// Typ-Tokens ausserhalb von `[A-Z_]+` sind nicht kodierbar.
pub fn encode_body(nachricht: &Nachricht) -> Result<String, FrameFehler> {
    if !NachrichtenTyp::token_gueltig(nachricht.typ.as_str()) {
        return Err(FrameFehler::UngueltigerTyp(nachricht.typ.as_str().to_string()));
    }
    if nachricht.payload_leer() {
        return Ok(nachricht.typ.as_str().to_string());
    }
    let json = serde_json::to_string(&nachricht.payload)?;
    Ok(format!("{} {}", nachricht.typ.as_str(), json))
}

/// Kodiert eine Nachricht als vollstaendigen Frame inklusive Laengenzeile
pub fn encode_frame(nachricht: &Nachricht) -> Result<String, FrameFehler> {
    let body = encode_body(nachricht)?;
    Ok(format!("{}\n{}", body.len(), body))
}

/// Dekodiert einen Frame-Inhalt (ohne Laengenzeile)
///
/// Der Typ ist die fuehrende maximale Folge aus `[A-Z_]`, der Rest
/// (getrimmt) die Payload. Leerer Rest ergibt ein leeres Objekt; ein Rest,
/// der kein JSON ist, wird als String-Payload durchgereicht.
pub fn decode_body(body: &str) -> Result<Nachricht, FrameFehler> {
    let typ_ende = body
        .find(|c: char| !(c.is_ascii_uppercase() || c == '_'))
        .unwrap_or(body.len());

    if typ_ende == 0 {
        let vorschau: String = body.chars().take(40).collect();
        return Err(FrameFehler::KeinTyp(vorschau));
    }

    let typ = NachrichtenTyp::aus_token(&body[..typ_ende]);
    let rest = body[typ_ende..].trim();

    let payload = if rest.is_empty() {
        Value::Object(Map::new())
    } else {
        serde_json::from_str(rest).unwrap_or_else(|_| Value::String(rest.to_string()))
    };

    Ok(Nachricht { typ, payload })
}

/// Parst eine Laengenzeile (ohne `\n`)
fn laenge_parsen(zeile: &[u8]) -> Result<usize, FrameFehler> {
    let text = std::str::from_utf8(zeile)
        .map_err(|_| FrameFehler::UngueltigeLaenge(String::from_utf8_lossy(zeile).into_owned()))?;
    let text = text.trim();
    text.parse::<usize>()
        .map_err(|_| FrameFehler::UngueltigeLaenge(text.to_string()))
}

fn ist_zeilenende(b: &u8) -> bool {
    *b == b'\n' || *b == b'\r'
}

// ---------------------------------------------------------------------------
// HubCodec
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer den Hub-Kontrollkanal
///
/// Implementiert `Encoder<Nachricht>` und `Decoder` fuer `Framed`,
/// `FramedRead` und `FramedWrite`.
#[derive(Debug, Clone)]
pub struct HubCodec {
    /// Maximale erlaubte Frame-Groesse in Bytes
    max_frame_size: usize,
}

impl HubCodec {
    /// Erstellt einen neuen `HubCodec` mit Standard-Limit
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Erstellt einen `HubCodec` mit benutzerdefinierter maximaler Frame-Groesse
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Gibt die konfigurierte maximale Frame-Groesse zurueck
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for HubCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for HubCodec {
    type Item = Nachricht;
    type Error = FrameFehler;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Verirrte Zeilenenden vor der Laengenzeile ueberspringen
        let fuehrend = src.iter().take_while(|b| ist_zeilenende(b)).count();
        src.advance(fuehrend);

        let zeilen_ende = match src.iter().position(|b| *b == b'\n') {
            Some(pos) => pos,
            None => {
                if src.len() > MAX_LAENGENZEILE {
                    return Err(FrameFehler::UngueltigeLaenge(
                        String::from_utf8_lossy(&src[..MAX_LAENGENZEILE]).into_owned(),
                    ));
                }
                return Ok(None);
            }
        };

        if zeilen_ende > MAX_LAENGENZEILE {
            return Err(FrameFehler::UngueltigeLaenge(
                String::from_utf8_lossy(&src[..MAX_LAENGENZEILE]).into_owned(),
            ));
        }

        let laenge = laenge_parsen(&src[..zeilen_ende])?;
        if laenge > self.max_frame_size {
            return Err(FrameFehler::ZuGross {
                laenge,
                maximum: self.max_frame_size,
            });
        }

        // Erst dekodieren, wenn der komplette Inhalt im Buffer liegt
        let gesamt = zeilen_ende + 1 + laenge;
        if src.len() < gesamt {
            src.reserve(gesamt - src.len());
            return Ok(None);
        }

        src.advance(zeilen_ende + 1);
        let inhalt = src.split_to(laenge);
        let text = std::str::from_utf8(&inhalt).map_err(|_| FrameFehler::KeinUtf8)?;

        decode_body(text).map(Some)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(nachricht) = self.decode(src)? {
            return Ok(Some(nachricht));
        }
        if src.is_empty() {
            return Ok(None);
        }

        // Stream zu Ende, aber ein angefangener Frame liegt noch im Buffer
        let (erwartet, vorhanden) = match src.iter().position(|b| *b == b'\n') {
            Some(pos) => (laenge_parsen(&src[..pos]).unwrap_or(0), src.len() - pos - 1),
            None => (0, 0),
        };
        src.clear();
        Err(FrameFehler::Abgeschnitten {
            erwartet,
            vorhanden,
        })
    }
}

impl Encoder<Nachricht> for HubCodec {
    type Error = FrameFehler;

    fn encode(&mut self, item: Nachricht, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = encode_body(&item)?;

        if body.len() > self.max_frame_size {
            return Err(FrameFehler::ZuGross {
                laenge: body.len(),
                maximum: self.max_frame_size,
            });
        }

        let kopf = format!("{}\n", body.len());
        dst.reserve(kopf.len() + body.len());
        dst.extend_from_slice(kopf.as_bytes());
        dst.extend_from_slice(body.as_bytes());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Hilfsfunktionen fuer direktes async Lesen/Schreiben
// ---------------------------------------------------------------------------

/// Liest einen einzelnen Frame aus einem `AsyncBufRead`
///
/// Gibt `Ok(None)` zurueck wenn der Stream vor einer Laengenzeile sauber endet.
///
/// # Fehler
/// - `Abgeschnitten` wenn der Stream mitten im Frame endet
/// - `UngueltigeLaenge`, `ZuGross`, `KeinTyp` bei fehlerhaftem Frame
pub async fn read_frame<R>(reader: &mut R, max_frame_size: usize) -> Result<Option<Nachricht>, FrameFehler>
where
    R: AsyncBufRead + Unpin,
{
    // Laengenzeile lesen, leere Zeilen ueberspringen
    let mut zeile = String::new();
    loop {
        zeile.clear();
        if reader.read_line(&mut zeile).await? == 0 {
            return Ok(None);
        }
        if !zeile.trim().is_empty() {
            break;
        }
    }

    let laenge = laenge_parsen(zeile.as_bytes())?;
    if laenge > max_frame_size {
        return Err(FrameFehler::ZuGross {
            laenge,
            maximum: max_frame_size,
        });
    }

    let mut inhalt = vec![0u8; laenge];
    if let Err(e) = reader.read_exact(&mut inhalt).await {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            return Err(FrameFehler::Abgeschnitten {
                erwartet: laenge,
                vorhanden: 0,
            });
        }
        return Err(e.into());
    }

    let text = std::str::from_utf8(&inhalt).map_err(|_| FrameFehler::KeinUtf8)?;
    decode_body(text).map(Some)
}

/// Schreibt einen einzelnen Frame in einen `AsyncWrite`
pub async fn write_frame<W>(writer: &mut W, nachricht: &Nachricht) -> Result<(), FrameFehler>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(nachricht)?;
    writer.write_all(frame.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query_nachricht() -> Nachricht {
        Nachricht::neu(
            NachrichtenTyp::MsgQuery,
            json!({"id": "q1", "action": "load_grammar", "data": {"grammar": {"name": "g1"}}}),
        )
    }

    #[test]
    fn leere_payload_ohne_leerzeichen() {
        let frame = encode_frame(&Nachricht::leer(NachrichtenTyp::AppUp)).unwrap();
        assert_eq!(frame, "6\nAPP_UP");
    }

    #[test]
    fn laenge_zaehlt_utf8_bytes() {
        let n = Nachricht::neu(NachrichtenTyp::MsgBroadcast, json!({"text": "Grüße"}));
        let frame = encode_frame(&n).unwrap();
        let (kopf, body) = frame.split_once('\n').unwrap();
        assert_eq!(kopf.parse::<usize>().unwrap(), body.len());
        assert!(body.len() > body.chars().count());
    }

    #[test]
    fn codec_encode_decode_round_trip() {
        let mut codec = HubCodec::new();
        let gesendet = query_nachricht();

        let mut buf = BytesMut::new();
        codec.encode(gesendet.clone(), &mut buf).unwrap();

        let decoded = codec
            .decode(&mut buf)
            .unwrap()
            .expect("Muss eine Nachricht enthalten");
        assert_eq!(decoded, gesendet);
        assert!(buf.is_empty());
    }

    #[test]
    fn payload_mit_zeilenumbruechen_und_falscher_laengenzeile() {
        // Der Inhalt enthaelt Newlines und etwas, das wie eine Laengenzeile aussieht
        let body = "MSG_BROADCAST {\"content\":\n\"x\\n12\\nAPP_UP\",\n\"id\":\"b\"}";
        let mut buf = BytesMut::from(format!("{}\n{}7\nAPP_UP", body.len(), body).as_bytes());
        let mut codec = HubCodec::new();

        let erste = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(erste.typ, NachrichtenTyp::MsgBroadcast);
        assert_eq!(erste.payload["id"], "b");

        // Genau N Bytes verbraucht: "5\nAPP_UP" ist ein unvollstaendiger Frame
        assert_eq!(&buf[..], b"7\nAPP_UP");
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn echte_newline_in_payload() {
        let body = "MSG_BROADCAST {\"id\": \"b\",\n \"content\": {}}";
        let mut buf = BytesMut::from(format!("{}\n{}", body.len(), body).as_bytes());
        let n = HubCodec::new().decode(&mut buf).unwrap().unwrap();
        assert_eq!(n.payload["id"], "b");
    }

    #[test]
    fn unvollstaendiger_frame_wartet() {
        let mut codec = HubCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(query_nachricht(), &mut buf).unwrap();

        let haelfte = buf.len() / 2;
        let mut teil = buf.split_to(haelfte);
        assert!(codec.decode(&mut teil).unwrap().is_none());
    }

    #[test]
    fn abgeschnittener_frame_am_stream_ende() {
        let mut codec = HubCodec::new();
        let mut buf = BytesMut::from(&b"40\nMSG_QUERY {\"id\""[..]);
        match codec.decode_eof(&mut buf) {
            Err(FrameFehler::Abgeschnitten { erwartet, vorhanden }) => {
                assert_eq!(erwartet, 40);
                assert_eq!(vorhanden, 15);
            }
            anderes => panic!("Erwartet Abgeschnitten, war {:?}", anderes),
        }
    }

    #[test]
    fn sauberes_stream_ende() {
        let mut codec = HubCodec::new();
        let mut buf = BytesMut::from(&b"\n"[..]);
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn nicht_objekt_payloads_ueberleben_den_round_trip() {
        let payloads = [
            Value::Null,
            json!([]),
            json!(0),
            json!(false),
            json!("text"),
            json!({"leer": {}}),
        ];
        for payload in payloads {
            let gesendet = Nachricht::neu(NachrichtenTyp::MsgQuerySuccess, payload);
            let body = encode_body(&gesendet).unwrap();
            assert_eq!(decode_body(&body).unwrap(), gesendet, "Inhalt: {body}");
        }
        assert_eq!(
            encode_body(&Nachricht::neu(NachrichtenTyp::AppUp, Value::Null)).unwrap(),
            "APP_UP null"
        );
    }

    #[test]
    fn ungueltiger_typ_wird_nicht_kodiert() {
        for token in ["app_up", "APP-UP", "MSG QUERY", ""] {
            let n = Nachricht::leer(NachrichtenTyp::Unbekannt(token.into()));
            assert!(
                matches!(encode_body(&n), Err(FrameFehler::UngueltigerTyp(_))),
                "Token {token:?} darf nicht kodiert werden"
            );
            let mut buf = BytesMut::new();
            assert!(HubCodec::new().encode(n, &mut buf).is_err());
            assert!(buf.is_empty());
        }

        // Unbekannte, aber gueltige Tokens bleiben kodierbar
        let n = Nachricht::leer(NachrichtenTyp::aus_token("APP_REBOOT"));
        assert_eq!(encode_body(&n).unwrap(), "APP_REBOOT");
    }

    #[test]
    fn kein_typ_ist_fehler() {
        let mut buf = BytesMut::from(&b"7\n{\"a\":1}"[..]);
        let result = HubCodec::new().decode(&mut buf);
        assert!(matches!(result, Err(FrameFehler::KeinTyp(_))));
    }

    #[test]
    fn ungueltige_laengenzeile() {
        let mut buf = BytesMut::from(&b"abc\nAPP_UP"[..]);
        assert!(matches!(
            HubCodec::new().decode(&mut buf),
            Err(FrameFehler::UngueltigeLaenge(_))
        ));

        let mut buf = BytesMut::from(&b"-3\nAPP"[..]);
        assert!(HubCodec::new().decode(&mut buf).is_err());
    }

    #[test]
    fn endlose_laengenzeile_wird_abgelehnt() {
        let mut buf = BytesMut::from(&[b'9'; 32][..]);
        assert!(HubCodec::new().decode(&mut buf).is_err());
    }

    #[test]
    fn ablehnung_zu_grosser_frame() {
        let mut codec = HubCodec::with_max_size(10);
        let mut buf = BytesMut::from(&b"200\nAPP_UP"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(FrameFehler::ZuGross { laenge: 200, maximum: 10 })
        ));

        let mut out = BytesMut::new();
        assert!(codec.encode(query_nachricht(), &mut out).is_err());
    }

    #[test]
    fn fuehrende_zeilenenden_werden_uebersprungen() {
        // Aeltere Hub-Versionen haengen nach jedem Frame ein Newline an
        let mut buf = BytesMut::from(&b"6\nAPP_UP\r\n8\nAPP_DOWN"[..]);
        let mut codec = HubCodec::new();
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().typ, NachrichtenTyp::AppUp);
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().typ, NachrichtenTyp::AppDown);
    }

    #[test]
    fn nicht_json_payload_wird_string() {
        let n = decode_body("APP_MANIFEST_FAIL manifest rejected").unwrap();
        assert_eq!(n.typ, NachrichtenTyp::AppManifestFail);
        assert_eq!(n.payload, json!("manifest rejected"));
    }

    #[test]
    fn typ_ohne_leerzeichen_vor_payload() {
        let n = decode_body("APP_MANIFEST_OK{\"instanceId\":\"x\"}").unwrap();
        assert_eq!(n.typ, NachrichtenTyp::AppManifestOk);
        assert_eq!(n.payload["instanceId"], "x");
    }

    #[test]
    fn mehrere_nachrichten_im_buffer() {
        let mut codec = HubCodec::new();
        let mut buf = BytesMut::new();
        for typ in [NachrichtenTyp::AppUp, NachrichtenTyp::AppDown, NachrichtenTyp::AppUp] {
            codec.encode(Nachricht::leer(typ), &mut buf).unwrap();
        }
        let typen: Vec<_> = std::iter::from_fn(|| codec.decode(&mut buf).unwrap())
            .map(|n| n.typ)
            .collect();
        assert_eq!(
            typen,
            vec![NachrichtenTyp::AppUp, NachrichtenTyp::AppDown, NachrichtenTyp::AppUp]
        );
    }

    #[tokio::test]
    async fn async_read_write_frame_round_trip() {
        let gesendet = query_nachricht();

        let mut buffer: Vec<u8> = Vec::new();
        write_frame(&mut buffer, &gesendet).await.unwrap();
        write_frame(&mut buffer, &Nachricht::leer(NachrichtenTyp::AppDown))
            .await
            .unwrap();

        let mut cursor = std::io::Cursor::new(buffer);
        let erste = read_frame(&mut cursor, DEFAULT_MAX_FRAME_SIZE).await.unwrap();
        assert_eq!(erste, Some(gesendet));
        let zweite = read_frame(&mut cursor, DEFAULT_MAX_FRAME_SIZE).await.unwrap();
        assert_eq!(zweite.map(|n| n.typ), Some(NachrichtenTyp::AppDown));
        assert!(read_frame(&mut cursor, DEFAULT_MAX_FRAME_SIZE).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn async_read_frame_abgeschnitten() {
        let mut cursor = std::io::Cursor::new(b"50\nMSG_QUERY {}".to_vec());
        let result = read_frame(&mut cursor, DEFAULT_MAX_FRAME_SIZE).await;
        assert!(matches!(result, Err(FrameFehler::Abgeschnitten { erwartet: 50, .. })));
    }
}
