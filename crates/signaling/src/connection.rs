//! Hub-Verbindung – Handshake, Dispatch-Schleife und serialisiertes Senden
//!
//! Eine `Verbindung` liest Frames via `HubCodec` und verteilt sie ueber den
//! `Dispatcher`. Alle ausgehenden Nachrichten laufen ueber eine mpsc-Queue
//! in genau einen Schreib-Task, egal aus welchem Task oder Thread sie
//! stammen.
//!
//! ## State Machine
//! ```text
//! Init -> Handshake -> Aktiv -> Schliessend -> Geschlossen
//!  (Manifest   (APP_MANIFEST_OK)   (APP_DOWN,
//!   gesendet)                       Transport zu)
//! ```
//! Es gibt nur Vorwaertsuebergaenge; `Geschlossen` ist endgueltig.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use lauscher_core::KorrelationsId;
use lauscher_protocol::control::{
    Anfrage, AnfrageErfolg, AnfrageFehler, Broadcast, InBenutzung, ManifestOk,
};
use lauscher_protocol::{HubCodec, Manifest, Nachricht, NachrichtenTyp};
use parking_lot::RwLock;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::dispatcher::Dispatcher;
use crate::error::{SignalingError, SignalingResult};

/// Wie lange der Abbau auf das Leeren der Sende-Queue wartet
const ABBAU_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Verbindungszustand
// ---------------------------------------------------------------------------

/// Zustand der Hub-Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum VerbindungsZustand {
    /// Transport steht, Manifest noch nicht gesendet
    Init,
    /// Manifest gesendet, warte auf Bestaetigung
    Handshake,
    /// Manifest akzeptiert, Dispatch laeuft
    Aktiv,
    /// Abbau eingeleitet
    Schliessend,
    /// Transport freigegeben
    Geschlossen,
}

// ---------------------------------------------------------------------------
// HubSender
// ---------------------------------------------------------------------------

/// Sende-Handle fuer die Hub-Verbindung
///
/// Klonbar und `Send`; alle Klone schreiben in dieselbe Queue.
///
/// Die Queue ist unbegrenzt: gesendet wird aus synchronen Handlern und
/// Erkenner-Threads, die weder warten noch Nachrichten verlieren duerfen.
/// Die Last ist durch die Zahl der Anfragen und Erkennungsereignisse
/// begrenzt, nicht durch Audio-Daten.
#[derive(Clone)]
pub struct HubSender {
    tx: mpsc::UnboundedSender<Nachricht>,
    instanz_id: Arc<RwLock<Option<String>>>,
}

impl HubSender {
    /// Erstellt einen Sender ohne Transport
    ///
    /// Fuer Tests und eigene Transporte: der Empfaenger erhaelt alle
    /// gesendeten Nachrichten in Reihenfolge.
    pub fn mit_kanal() -> (Self, mpsc::UnboundedReceiver<Nachricht>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                instanz_id: Arc::new(RwLock::new(None)),
            },
            rx,
        )
    }

    /// Instanz-ID dieser App (vom Manifest oder vom Hub vergeben)
    pub fn instanz_id(&self) -> Option<String> {
        self.instanz_id.read().clone()
    }

    fn instanz_id_setzen(&self, id: String) {
        *self.instanz_id.write() = Some(id);
    }

    /// Reiht eine fertige Nachricht in die Sende-Queue ein
    pub fn nachricht_senden(&self, nachricht: Nachricht) -> SignalingResult<()> {
        self.tx
            .send(nachricht)
            .map_err(|_| SignalingError::VerbindungGeschlossen)
    }

    /// Sendet `typ` mit beliebiger Payload (fire-and-forget)
    pub fn senden(&self, typ: NachrichtenTyp, payload: Value) -> SignalingResult<()> {
        self.nachricht_senden(Nachricht::neu(typ, payload))
    }

    /// Sendet `MSG_QUERY` und gibt die neue Korrelations-ID zurueck
    pub fn anfrage_senden(
        &self,
        capability: &str,
        action: &str,
        data: Value,
        ziele: Vec<String>,
        prioritaet: u32,
    ) -> SignalingResult<KorrelationsId> {
        let id = KorrelationsId::new();
        let anfrage = Anfrage {
            id: id.clone(),
            capability: capability.to_string(),
            action: action.to_string(),
            data,
            instance_id: ziele,
            priority: prioritaet,
            from_instance_id: None,
        };
        self.nachricht_senden(Nachricht::mit(NachrichtenTyp::MsgQuery, &anfrage)?)?;
        Ok(id)
    }

    /// Beantwortet eine Anfrage erfolgreich (`MSG_QUERY_SUCCESS`)
    pub fn anfrage_erfolg(&self, id: &KorrelationsId, ret: Value) -> SignalingResult<()> {
        let erfolg = AnfrageErfolg { id: id.clone(), ret };
        self.nachricht_senden(Nachricht::mit(NachrichtenTyp::MsgQuerySuccess, &erfolg)?)
    }

    /// Beantwortet eine Anfrage mit Fehler (`MSG_QUERY_FAIL`)
    pub fn anfrage_fehler(&self, id: &KorrelationsId, meldung: &str) -> SignalingResult<()> {
        let fehler = AnfrageFehler {
            id: id.clone(),
            message: meldung.to_string(),
        };
        self.nachricht_senden(Nachricht::mit(NachrichtenTyp::MsgQueryFail, &fehler)?)
    }

    /// Sendet `MSG_BROADCAST` und gibt die neue Korrelations-ID zurueck
    pub fn broadcast_senden(&self, inhalt: Value) -> SignalingResult<KorrelationsId> {
        let id = KorrelationsId::new();
        let broadcast = Broadcast {
            id: id.clone(),
            content: inhalt,
            from_instance_id: None,
        };
        self.nachricht_senden(Nachricht::mit(NachrichtenTyp::MsgBroadcast, &broadcast)?)?;
        Ok(id)
    }

    pub fn app_up(&self) -> SignalingResult<()> {
        self.nachricht_senden(Nachricht::leer(NachrichtenTyp::AppUp))
    }

    pub fn app_down(&self) -> SignalingResult<()> {
        self.nachricht_senden(Nachricht::leer(NachrichtenTyp::AppDown))
    }

    /// Meldet die App als belegt (`APP_IN_USE`)
    pub fn in_benutzung(&self, prioritaet: u32) -> SignalingResult<()> {
        let payload = InBenutzung {
            priority: prioritaet,
        };
        self.nachricht_senden(Nachricht::mit(NachrichtenTyp::AppInUse, &payload)?)
    }
}

impl std::fmt::Debug for HubSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubSender")
            .field("instanz_id", &self.instanz_id())
            .field("geschlossen", &self.tx.is_closed())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// SchliessenHandle
// ---------------------------------------------------------------------------

/// Loest den Abbau einer laufenden Verbindung aus beliebigen Tasks aus
#[derive(Clone)]
pub struct SchliessenHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl SchliessenHandle {
    pub fn schliessen(&self) {
        let _ = self.tx.send(true);
    }
}

// ---------------------------------------------------------------------------
// Verbindung
// ---------------------------------------------------------------------------

/// Kontrollverbindung zum Hub
pub struct Verbindung<S> {
    leser: FramedRead<ReadHalf<S>, HubCodec>,
    sender: HubSender,
    dispatcher: Dispatcher,
    zustand: watch::Sender<VerbindungsZustand>,
    schliessen_tx: Arc<watch::Sender<bool>>,
    schliessen_rx: watch::Receiver<bool>,
    schreib_ende: Option<oneshot::Sender<()>>,
    schreiber: Option<JoinHandle<SignalingResult<()>>>,
}

impl Verbindung<TcpStream> {
    /// Verbindet per TCP und sendet das Manifest
    pub async fn verbinden<A>(
        adresse: A,
        manifest: &Manifest,
        dispatcher: Dispatcher,
        max_frame_groesse: usize,
    ) -> SignalingResult<Self>
    where
        A: ToSocketAddrs,
    {
        let stream = TcpStream::connect(adresse).await?;
        stream.set_nodelay(true)?;
        tracing::info!(peer = %stream.peer_addr()?, "Mit Hub verbunden");
        Self::ueber_stream(stream, manifest, dispatcher, max_frame_groesse)
    }
}

impl<S> Verbindung<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Uebernimmt einen bestehenden Byte-Strom und sendet das Manifest
    ///
    /// Muss innerhalb einer Tokio-Runtime aufgerufen werden.
    pub fn ueber_stream(
        stream: S,
        manifest: &Manifest,
        dispatcher: Dispatcher,
        max_frame_groesse: usize,
    ) -> SignalingResult<Self> {
        let (lesen, schreiben) = tokio::io::split(stream);
        let leser = FramedRead::new(lesen, HubCodec::with_max_size(max_frame_groesse));
        let schreib_framed = FramedWrite::new(schreiben, HubCodec::with_max_size(max_frame_groesse));

        let (tx, rx) = mpsc::unbounded_channel();
        let (ende_tx, ende_rx) = oneshot::channel();
        let schreiber = tokio::spawn(schreib_schleife(schreib_framed, rx, ende_rx));

        let sender = HubSender {
            tx,
            instanz_id: Arc::new(RwLock::new(manifest.instance_id.clone())),
        };
        let (schliessen_tx, schliessen_rx) = watch::channel(false);
        let (zustand, _) = watch::channel(VerbindungsZustand::Init);

        let verbindung = Self {
            leser,
            sender,
            dispatcher,
            zustand,
            schliessen_tx: Arc::new(schliessen_tx),
            schliessen_rx,
            schreib_ende: Some(ende_tx),
            schreiber: Some(schreiber),
        };

        verbindung
            .sender
            .nachricht_senden(Nachricht::mit(NachrichtenTyp::AppManifest, manifest)?)?;
        verbindung.zustand_setzen(VerbindungsZustand::Handshake);
        tracing::debug!(app = %manifest.name, "Manifest gesendet");

        Ok(verbindung)
    }

    /// Sende-Handle fuer Komponenten ausserhalb der Dispatch-Schleife
    pub fn sender(&self) -> HubSender {
        self.sender.clone()
    }

    pub fn schliessen_handle(&self) -> SchliessenHandle {
        SchliessenHandle {
            tx: Arc::clone(&self.schliessen_tx),
        }
    }

    pub fn zustand(&self) -> VerbindungsZustand {
        *self.zustand.borrow()
    }

    /// Beobachtet Zustandswechsel der Verbindung
    pub fn zustand_beobachten(&self) -> watch::Receiver<VerbindungsZustand> {
        self.zustand.subscribe()
    }

    /// Setzt den Zustand, nur Vorwaertsuebergaenge werden uebernommen
    fn zustand_setzen(&self, neu: VerbindungsZustand) -> bool {
        self.zustand.send_if_modified(|aktuell| {
            if neu > *aktuell {
                tracing::debug!(von = ?*aktuell, nach = ?neu, "Verbindungszustand");
                *aktuell = neu;
                true
            } else {
                false
            }
        })
    }

    /// Dispatch-Schleife bis Stream-Ende, Schliessen-Anforderung oder Protokollfehler
    ///
    /// Baut die Verbindung in jedem Fall ab. Stream-Ende und Schliessen
    /// liefern `Ok(())`; ein fehlerhafter Frame oder ein abgelehntes Manifest
    /// liefern einen Fehler.
    pub async fn ausfuehren(mut self) -> SignalingResult<()> {
        let ergebnis = loop {
            if *self.schliessen_rx.borrow() {
                tracing::info!("Schliessen angefordert");
                break Ok(());
            }

            tokio::select! {
                _ = self.schliessen_rx.changed() => {}

                frame = self.leser.next() => match frame {
                    Some(Ok(nachricht)) => {
                        if let Err(e) = self.verarbeiten(nachricht) {
                            break Err(e);
                        }
                    }
                    Some(Err(e)) => {
                        tracing::error!(fehler = %e, "Fehlerhafter Frame, Verbindung wird beendet");
                        break Err(SignalingError::Frame(e));
                    }
                    None => {
                        tracing::info!("Hub hat die Verbindung beendet");
                        break Ok(());
                    }
                },
            }
        };

        self.abbauen().await;
        ergebnis
    }

    /// Verarbeitet eine eingehende Nachricht
    fn verarbeiten(&mut self, nachricht: Nachricht) -> SignalingResult<()> {
        tracing::trace!(typ = %nachricht.typ, "Nachricht empfangen");

        let intern = match nachricht.typ {
            NachrichtenTyp::AppManifestOk => {
                let ok: ManifestOk = nachricht.als().unwrap_or_default();
                if let Some(id) = ok.instance_id {
                    self.sender.instanz_id_setzen(id);
                }
                self.zustand_setzen(VerbindungsZustand::Aktiv);
                tracing::info!(instanz = ?self.sender.instanz_id(), "Manifest akzeptiert");
                self.sender.app_up()?;
                true
            }
            NachrichtenTyp::AppManifestFail => {
                tracing::error!(antwort = %nachricht.payload, "Manifest vom Hub abgelehnt");
                self.dispatcher.verteilen(&nachricht, &self.sender, true);
                return Err(SignalingError::protokoll("Manifest abgelehnt"));
            }
            _ => false,
        };

        self.dispatcher.verteilen(&nachricht, &self.sender, intern);
        Ok(())
    }

    /// Schliessend -> Hooks -> APP_DOWN -> Transport zu -> Geschlossen
    async fn abbauen(&mut self) {
        self.zustand_setzen(VerbindungsZustand::Schliessend);
        self.dispatcher.trennung_ausfuehren();

        if let Err(e) = self.sender.app_down() {
            tracing::debug!(fehler = %e, "APP_DOWN nicht gesendet");
        }

        if let Some(ende) = self.schreib_ende.take() {
            let _ = ende.send(());
        }
        if let Some(schreiber) = self.schreiber.take() {
            match tokio::time::timeout(ABBAU_TIMEOUT, schreiber).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => tracing::debug!(fehler = %e, "Schreib-Task mit Fehler beendet"),
                Ok(Err(e)) => tracing::warn!(fehler = %e, "Schreib-Task abgebrochen"),
                Err(_) => tracing::warn!("Timeout beim Leeren der Sende-Queue"),
            }
        }

        self.zustand_setzen(VerbindungsZustand::Geschlossen);
        tracing::info!("Hub-Verbindung geschlossen");
    }
}

// ---------------------------------------------------------------------------
// Schreib-Task
// ---------------------------------------------------------------------------

/// Schreibt Nachrichten aus der Queue in Reihenfolge
///
/// Auf das Ende-Signal hin werden bereits eingereihte Nachrichten noch
/// geschrieben, dann wird der Transport geschlossen.
async fn schreib_schleife<W>(
    mut framed: FramedWrite<WriteHalf<W>, HubCodec>,
    mut rx: mpsc::UnboundedReceiver<Nachricht>,
    mut ende_rx: oneshot::Receiver<()>,
) -> SignalingResult<()>
where
    W: AsyncWrite,
{
    loop {
        tokio::select! {
            biased;

            nachricht = rx.recv() => match nachricht {
                Some(n) => {
                    tracing::trace!(typ = %n.typ, "Nachricht gesendet");
                    framed.send(n).await?;
                }
                None => break,
            },

            _ = &mut ende_rx => {
                rx.close();
                while let Ok(n) = rx.try_recv() {
                    framed.send(n).await?;
                }
                break;
            }
        }
    }

    framed.close().await?;
    Ok(())
}
