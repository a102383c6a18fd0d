//! RTP-Empfaenger – ein UDP-Socket pro Mikrofon
//!
//! Bindet einen UDP-Socket, empfaengt RTP-Datagramme, dekodiert den Header
//! und schreibt die Nutzdaten in den Stream-Puffer der Sitzung.
//!
//! ## Architektur
//!
//! ```text
//! UDP Socket (recv_from)
//!     |
//!     v
//! RtpPaket::decode()         <- zu kurze Pakete werden verworfen
//!     |
//!     v
//! PufferSchreiber::schreiben()  <- wartet bei vollem Puffer
//!     |
//!     v
//! AudioStrom (Erkenner-Thread)
//! ```
//!
//! Ein Stopp-Signal beendet die Schleife auch waehrend eines wartenden
//! Schreibvorgangs; danach werden Socket und Puffer geschlossen.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lauscher_protocol::RtpPaket;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{Result, VoiceFehler};
use crate::stream_buffer::{stream_puffer, AudioStrom, PufferSchliesser, PufferSchreiber};

/// Empfangspuffer pro Datagramm, gross genug fuer jedes UDP-Datagramm
const UDP_BUFFER_SIZE: usize = 65_536;

// ---------------------------------------------------------------------------
// Statistik
// ---------------------------------------------------------------------------

/// Zaehler eines Empfaengers
#[derive(Debug, Default)]
pub struct EmpfangsStatistik {
    pakete: AtomicU64,
    verworfen: AtomicU64,
    nutzdaten_bytes: AtomicU64,
}

impl EmpfangsStatistik {
    /// Anzahl erfolgreich dekodierter Pakete
    pub fn pakete(&self) -> u64 {
        self.pakete.load(Ordering::Relaxed)
    }

    /// Anzahl verworfener (nicht dekodierbarer) Pakete
    pub fn verworfen(&self) -> u64 {
        self.verworfen.load(Ordering::Relaxed)
    }

    /// Summe der in den Puffer geschriebenen Nutzdaten
    pub fn nutzdaten_bytes(&self) -> u64 {
        self.nutzdaten_bytes.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// RtpEmpfaenger
// ---------------------------------------------------------------------------

/// Laufender RTP-Empfang fuer ein Mikrofon
///
/// Beim Drop wird der Empfang gestoppt.
pub struct RtpEmpfaenger {
    lokale_adresse: SocketAddr,
    stopp_tx: watch::Sender<bool>,
    schliesser: PufferSchliesser,
    statistik: Arc<EmpfangsStatistik>,
    task: Option<JoinHandle<()>>,
}

impl RtpEmpfaenger {
    /// Bindet den Socket und startet die Empfangs-Schleife
    ///
    /// Das Binden erfolgt synchron, damit ein belegter Port sofort als
    /// Fehler beim Aufrufer ankommt. Muss innerhalb einer Tokio-Runtime
    /// aufgerufen werden.
    ///
    /// Gibt den Empfaenger und das Lese-Ende des Puffers zurueck.
    pub fn starten(bind_addr: SocketAddr, kapazitaet: usize) -> Result<(Self, AudioStrom)> {
        let std_socket = std::net::UdpSocket::bind(bind_addr).map_err(|quelle| {
            VoiceFehler::Binden {
                adresse: bind_addr,
                quelle,
            }
        })?;
        std_socket.set_nonblocking(true)?;
        let socket = UdpSocket::from_std(std_socket)?;
        let lokale_adresse = socket.local_addr()?;

        let (schreiber, strom) = stream_puffer(kapazitaet);
        let schliesser = schreiber.schliesser();
        let (stopp_tx, stopp_rx) = watch::channel(false);
        let statistik = Arc::new(EmpfangsStatistik::default());

        let task = tokio::spawn(empfangs_schleife(
            socket,
            schreiber,
            stopp_rx,
            Arc::clone(&statistik),
        ));

        tracing::info!(adresse = %lokale_adresse, kapazitaet, "RTP-Empfang gestartet");

        Ok((
            Self {
                lokale_adresse,
                stopp_tx,
                schliesser,
                statistik,
                task: Some(task),
            },
            strom,
        ))
    }

    /// Gibt die tatsaechlich gebundene Adresse zurueck
    pub fn lokale_adresse(&self) -> SocketAddr {
        self.lokale_adresse
    }

    /// Gibt den tatsaechlich gebundenen Port zurueck
    pub fn port(&self) -> u16 {
        self.lokale_adresse.port()
    }

    pub fn statistik(&self) -> &EmpfangsStatistik {
        &self.statistik
    }

    /// Fordert das Ende des Empfangs an und schliesst den Puffer
    ///
    /// Der Socket wird freigegeben, sobald die Schleife beendet ist.
    pub fn stoppen(&self) {
        let _ = self.stopp_tx.send(true);
        self.schliesser.schliessen();
    }

    /// Stoppt den Empfang und wartet, bis der Socket freigegeben ist
    pub async fn beenden(mut self) {
        self.stoppen();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(fehler = %e, "RTP-Empfangs-Task abgebrochen");
            }
        }
    }
}

impl Drop for RtpEmpfaenger {
    fn drop(&mut self) {
        self.stoppen();
    }
}

impl std::fmt::Debug for RtpEmpfaenger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RtpEmpfaenger")
            .field("lokale_adresse", &self.lokale_adresse)
            .field("pakete", &self.statistik.pakete())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Empfangs-Schleife
// ---------------------------------------------------------------------------

async fn empfangs_schleife(
    socket: UdpSocket,
    schreiber: PufferSchreiber,
    mut stopp_rx: watch::Receiver<bool>,
    statistik: Arc<EmpfangsStatistik>,
) {
    // Einmal auf dem Heap allokiert, fuer jedes Datagramm wiederverwendet
    let mut buf = vec![0u8; UDP_BUFFER_SIZE];

    loop {
        let (laenge, absender) = tokio::select! {
            _ = stopp_rx.changed() => break,
            ergebnis = socket.recv_from(&mut buf) => match ergebnis {
                Ok(empfangen) => empfangen,
                Err(e) => {
                    tracing::warn!(fehler = %e, "UDP-Empfangsfehler");
                    // Kurze Pause um Busy-Loop bei persistentem Fehler zu vermeiden
                    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                    continue;
                }
            },
        };

        let paket = match RtpPaket::decode(&buf[..laenge]) {
            Ok(p) => p,
            Err(e) => {
                statistik.verworfen.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(fehler = %e, absender = %absender, "Ungueltiges RTP-Paket");
                continue;
            }
        };

        tracing::trace!(
            sequenz = paket.header.sequenz,
            ssrc = paket.header.ssrc,
            bytes = paket.nutzdaten.len(),
            "RTP-Paket empfangen"
        );

        // Schreiben wartet bei vollem Puffer; ein Stopp hat Vorrang
        tokio::select! {
            _ = stopp_rx.changed() => break,
            ergebnis = schreiber.schreiben(paket.nutzdaten) => {
                if ergebnis.is_err() {
                    break;
                }
                statistik.pakete.fetch_add(1, Ordering::Relaxed);
                statistik
                    .nutzdaten_bytes
                    .fetch_add(paket.nutzdaten.len() as u64, Ordering::Relaxed);
            }
        }
    }

    schreiber.schliessen();
    tracing::debug!(
        pakete = statistik.pakete(),
        verworfen = statistik.verworfen(),
        "RTP-Empfang beendet"
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use lauscher_protocol::RtpHeader;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    fn localhost(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    fn rtp_datagramm(sequenz: u16, nutzdaten: &[u8]) -> Vec<u8> {
        let header = RtpHeader {
            version: 2,
            padding: false,
            extension: false,
            csrc_anzahl: 0,
            marker: false,
            payload_typ: 0x60,
            sequenz,
            zeitstempel: u32::from(sequenz) * 160,
            ssrc: 0x1234,
        };
        let mut paket = header.encode().to_vec();
        paket.extend_from_slice(nutzdaten);
        paket
    }

    async fn lesen_async(strom: AudioStrom, anzahl: usize) -> (AudioStrom, Vec<u8>) {
        tokio::task::spawn_blocking(move || {
            let mut gesammelt = Vec::new();
            let mut buf = [0u8; 256];
            while gesammelt.len() < anzahl {
                let n = strom.lesen(&mut buf);
                if n == 0 {
                    break;
                }
                gesammelt.extend_from_slice(&buf[..n]);
            }
            (strom, gesammelt)
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn empfaenger_binden_os_port() {
        let (empfaenger, _strom) = RtpEmpfaenger::starten(localhost(0), 1024)
            .expect("Empfaenger muss binden koennen");
        assert_ne!(empfaenger.port(), 0, "OS muss einen Port zuweisen");
    }

    #[tokio::test]
    async fn belegter_port_liefert_binden_fehler() {
        let (erster, _strom) = RtpEmpfaenger::starten(localhost(0), 1024).unwrap();
        let ergebnis = RtpEmpfaenger::starten(erster.lokale_adresse(), 1024);
        assert!(matches!(ergebnis, Err(VoiceFehler::Binden { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn nutzdaten_landen_im_puffer() {
        let (empfaenger, strom) = RtpEmpfaenger::starten(localhost(0), 1024).unwrap();
        let sender = UdpSocket::bind(localhost(0)).await.unwrap();

        sender
            .send_to(&rtp_datagramm(1, &[1, 2, 3, 4]), empfaenger.lokale_adresse())
            .await
            .unwrap();
        // Zu kurz: wird verworfen
        sender
            .send_to(&[0x80, 0x60, 0x00], empfaenger.lokale_adresse())
            .await
            .unwrap();
        sender
            .send_to(&rtp_datagramm(2, &[5, 6]), empfaenger.lokale_adresse())
            .await
            .unwrap();

        let (_strom, daten) = tokio::time::timeout(Duration::from_secs(2), lesen_async(strom, 6))
            .await
            .expect("Audio muss ankommen");
        assert_eq!(daten, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(empfaenger.statistik().pakete(), 2);
        assert_eq!(empfaenger.statistik().verworfen(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn grosses_datagramm_kommt_vollstaendig_an() {
        let (empfaenger, strom) = RtpEmpfaenger::starten(localhost(0), 8192).unwrap();
        let sender = UdpSocket::bind(localhost(0)).await.unwrap();

        // 100 ms bei 16 kHz / 16 Bit
        let nutzdaten: Vec<u8> = (0..3200u32).map(|i| (i % 251) as u8).collect();
        sender
            .send_to(&rtp_datagramm(1, &nutzdaten), empfaenger.lokale_adresse())
            .await
            .unwrap();

        let (_strom, daten) =
            tokio::time::timeout(Duration::from_secs(2), lesen_async(strom, nutzdaten.len()))
                .await
                .expect("Audio muss ankommen");
        assert_eq!(daten, nutzdaten);
        assert_eq!(empfaenger.statistik().nutzdaten_bytes(), 3200);
        assert_eq!(empfaenger.statistik().verworfen(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stoppen_beendet_stream_und_gibt_port_frei() {
        let (empfaenger, strom) = RtpEmpfaenger::starten(localhost(0), 1024).unwrap();
        let adresse = empfaenger.lokale_adresse();

        empfaenger.beenden().await;

        let (_strom, daten) = lesen_async(strom, 1).await;
        assert!(daten.is_empty(), "Nach dem Stopp muss der Strom enden");

        let (wieder, _strom) = RtpEmpfaenger::starten(adresse, 1024)
            .expect("Port muss nach dem Stopp frei sein");
        drop(wieder);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stoppen_waehrend_voller_puffer() {
        let (empfaenger, _strom) = RtpEmpfaenger::starten(localhost(0), 4).unwrap();
        let sender = UdpSocket::bind(localhost(0)).await.unwrap();

        // Mehr Nutzdaten als Kapazitaet, niemand liest
        sender
            .send_to(&rtp_datagramm(1, &[0; 64]), empfaenger.lokale_adresse())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(Duration::from_secs(2), empfaenger.beenden())
            .await
            .expect("Stopp darf nicht am vollen Puffer haengen");
    }
}
